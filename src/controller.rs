//! Everything the viewer knows about the current search.
//!
//! The render loop owns one [`AppController`] and feeds it user input,
//! lookup outcomes and frame time. Rendering only reads from it.

use std::{f64::consts::TAU, time::Duration};

use cgmath::{Point3, Rad};

use crate::client::ClientError;
use crate::components::camera::{CameraRig, RigState, REFERENCE_FRAME};
use crate::geocode::{GeocodeError, GeocodeResult, Query};
use crate::systems::geospatial::coordinates::CoordinatesSystem;
use crate::{CAMERA_DISTANCE_FACTOR, PLANET_RADIUS};

/// Globe spin per reference frame while nothing is selected.
pub const AUTO_ROTATION_STEP: f64 = 0.0005;
/// Cloud layer spin per reference frame. Never stops.
pub const CLOUD_ROTATION_STEP: f64 = 0.0007;

/// What changed on screen after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    Selected(GeocodeResult),
    Cleared,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct AppController {
    selection: Option<GeocodeResult>,
    in_flight: usize,
    error: Option<String>,
    rig: CameraRig,
    spin: f64,
    cloud_spin: f64,
}

impl AppController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<&GeocodeResult> {
        self.selection.as_ref()
    }

    /// True until every submitted lookup has come back.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    pub fn spin(&self) -> Rad<f64> {
        Rad(self.spin)
    }

    pub fn cloud_spin(&self) -> Rad<f64> {
        Rad(self.cloud_spin)
    }

    /// Starts a search. Blank input is refused before anything goes out
    /// and leaves the state as it was.
    pub fn submit(&mut self, input: &str) -> Result<Query, GeocodeError> {
        let query = Query::parse(input)?;
        self.in_flight += 1;
        self.error = None;
        Ok(query)
    }

    /// Applies the outcome of a lookup. Failures keep the old selection.
    pub fn lookup_finished(
        &mut self,
        outcome: Result<GeocodeResult, ClientError>,
    ) -> SelectionChange {
        self.in_flight = self.in_flight.saturating_sub(1);
        match outcome {
            Ok(result) => {
                let camera_target = CoordinatesSystem::project_spun(
                    result.lat,
                    result.lng,
                    PLANET_RADIUS * CAMERA_DISTANCE_FACTOR,
                    self.spin(),
                );
                self.rig.track(camera_target);
                self.error = None;
                self.selection = Some(result.clone());
                SelectionChange::Selected(result)
            }
            Err(err) => {
                tracing::warn!(error = %err, "lookup failed");
                self.error = Some(err.user_message().to_owned());
                SelectionChange::Unchanged
            }
        }
    }

    /// Drops the selection and lets the globe spin again.
    pub fn clear(&mut self) -> SelectionChange {
        self.rig.release();
        match self.selection.take() {
            Some(_) => SelectionChange::Cleared,
            None => SelectionChange::Unchanged,
        }
    }

    /// Advances one frame and returns where the camera should be.
    pub fn advance(&mut self, eye: Point3<f64>, elapsed: Duration) -> Point3<f64> {
        let frames = elapsed.as_secs_f64() / REFERENCE_FRAME.as_secs_f64();
        if let RigState::Idle = self.rig.state() {
            self.spin = (self.spin + AUTO_ROTATION_STEP * frames) % TAU;
        }
        self.cloud_spin = (self.cloud_spin + CLOUD_ROTATION_STEP * frames) % TAU;
        self.rig.update(eye, elapsed)
    }

    /// World-space position of the pin, following the globe's spin.
    pub fn marker_position(&self) -> Option<Point3<f64>> {
        self.selection.as_ref().map(|s| {
            CoordinatesSystem::project_spun(s.lat, s.lng, PLANET_RADIUS, self.spin())
        })
    }

    /// One-line summary for the status display.
    pub fn status_line(&self) -> String {
        if self.is_loading() {
            return "...".to_owned();
        }
        if let Some(error) = &self.error {
            return error.clone();
        }
        match &self.selection {
            Some(s) => format!("{} (Lat: {:.4}, Lng: {:.4})", s.formatted, s.lat, s.lng),
            None => String::new(),
        }
    }
}
