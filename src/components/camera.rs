use std::time::Duration;

use cgmath::{EuclideanSpace, InnerSpace, Point3, VectorSpace};
use winit::event::{
    ElementState, KeyboardInput, MouseButton, MouseScrollDelta, VirtualKeyCode, WindowEvent,
};

pub const IDENTITY_MATRIX_4: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Frame duration the per-frame constants are tuned for.
pub const REFERENCE_FRAME: Duration = Duration::from_micros(16_667);

/// Share of the remaining distance the camera covers per reference frame.
pub const TRACKING_STEP: f64 = 0.1;

pub struct CameraComponent {
    pub camera: Camera,
    pub camera_uniform: CameraUniform,
    pub camera_buffer: wgpu::Buffer,
    pub camera_bind_group: wgpu::BindGroup,
    pub camera_bind_group_layout: wgpu::BindGroupLayout,
    pub camera_controller: CameraController,
}

pub struct Camera {
    pub eye: cgmath::Point3<f32>,
    pub target: cgmath::Point3<f32>,
    pub up: cgmath::Vector3<f32>,
    pub aspect: f32,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    // cgmath builds OpenGL style clip space, wgpu wants z in [0, 1]
    pub fn build_view_projection_matrix(
        &self,
    ) -> (
        cgmath::Matrix4<f32>,
        cgmath::Matrix4<f32>,
        cgmath::Matrix4<f32>,
    ) {
        let view = cgmath::Matrix4::look_at_rh(self.eye, self.target, self.up);
        let proj = OPENGL_TO_WGPU_MATRIX
            * cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar);
        (proj * view, view, proj)
    }

    pub fn eye_f64(&self) -> Point3<f64> {
        Point3::new(self.eye.x as f64, self.eye.y as f64, self.eye.z as f64)
    }

    pub fn set_eye_f64(&mut self, eye: Point3<f64>) {
        self.eye = Point3::new(eye.x as f32, eye.y as f32, eye.z as f32);
    }
}

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Radians of orbit per pixel of pointer drag.
pub const DRAG_ROTATION: f32 = 0.005;
/// Share of the current distance one wheel notch zooms by.
pub const WHEEL_ZOOM: f32 = 0.1;
/// Closest the eye may get to either pole while orbiting, in radians.
const POLE_MARGIN: f32 = 0.05;

/// Orbit and zoom around the globe with the arrow keys, a left-button drag
/// or the wheel. Letter keys are left alone because they feed the search box.
pub struct CameraController {
    speed: f32,
    min_distance: f32,
    max_distance: f32,
    is_forward_pressed: bool,
    is_backward_pressed: bool,
    is_left_pressed: bool,
    is_right_pressed: bool,
    is_dragging: bool,
    cursor: Option<(f64, f64)>,
    // accumulated since the last update_camera
    drag: (f32, f32),
    zoom: f32,
}

impl CameraController {
    pub fn new(speed: f32, min_distance: f32, max_distance: f32) -> Self {
        Self {
            speed,
            min_distance,
            max_distance,
            is_forward_pressed: false,
            is_backward_pressed: false,
            is_left_pressed: false,
            is_right_pressed: false,
            is_dragging: false,
            cursor: None,
            drag: (0.0, 0.0),
            zoom: 0.0,
        }
    }

    /// Returns true for events that steer the camera. Plain cursor motion
    /// is tracked but not reported as consumed.
    pub fn process_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } => {
                let is_pressed = *state == ElementState::Pressed;
                match keycode {
                    VirtualKeyCode::Up => {
                        self.is_forward_pressed = is_pressed;
                        true
                    }
                    VirtualKeyCode::Left => {
                        self.is_left_pressed = is_pressed;
                        true
                    }
                    VirtualKeyCode::Down => {
                        self.is_backward_pressed = is_pressed;
                        true
                    }
                    VirtualKeyCode::Right => {
                        self.is_right_pressed = is_pressed;
                        true
                    }
                    _ => false,
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.set_dragging(*state == ElementState::Pressed);
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(position.x, position.y);
                false
            }
            WindowEvent::CursorLeft { .. } => {
                self.set_dragging(false);
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 100.0,
                };
                self.scroll(notches);
                true
            }
            _ => false,
        }
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.is_dragging = dragging;
    }

    pub fn move_cursor(&mut self, x: f64, y: f64) {
        if let (true, Some((last_x, last_y))) = (self.is_dragging, self.cursor) {
            self.drag.0 += (x - last_x) as f32;
            self.drag.1 += (y - last_y) as f32;
        }
        self.cursor = Some((x, y));
    }

    /// Positive notches zoom in.
    pub fn scroll(&mut self, notches: f32) {
        self.zoom += notches;
    }

    /// Throws away pointer motion gathered while the camera is not ours to move.
    pub fn discard_pending(&mut self) {
        self.drag = (0.0, 0.0);
        self.zoom = 0.0;
    }

    pub fn update_camera(&mut self, camera: &mut Camera) {
        let forward = camera.target - camera.eye;
        let forward_norm = forward.normalize();
        let forward_mag = forward.magnitude();

        if self.is_forward_pressed && forward_mag - self.speed > self.min_distance {
            camera.eye += forward_norm * self.speed;
        }
        if self.is_backward_pressed && forward_mag + self.speed < self.max_distance {
            camera.eye -= forward_norm * self.speed;
        }

        let rotation_angle = cgmath::Rad::from(cgmath::Deg(self.speed * 10.0));
        if self.is_right_pressed {
            let rotation_matrix = cgmath::Matrix3::from_axis_angle(camera.up, -rotation_angle);
            let relative_position = camera.eye - camera.target;
            camera.eye = camera.target + rotation_matrix * relative_position;
        }
        if self.is_left_pressed {
            let rotation_matrix = cgmath::Matrix3::from_axis_angle(camera.up, rotation_angle);
            let relative_position = camera.eye - camera.target;
            camera.eye = camera.target + rotation_matrix * relative_position;
        }

        let (dx, dy) = self.drag;
        if dx != 0.0 || dy != 0.0 {
            // dragging right turns the globe right, so the eye goes left
            let yaw = cgmath::Matrix3::from_axis_angle(camera.up, cgmath::Rad(-dx * DRAG_ROTATION));
            let mut relative_position = yaw * (camera.eye - camera.target);

            let right = relative_position.cross(camera.up);
            if right.magnitude2() > f32::EPSILON {
                let from_up = relative_position.angle(camera.up).0;
                let pitch = (dy * DRAG_ROTATION)
                    .clamp(from_up - (std::f32::consts::PI - POLE_MARGIN), from_up - POLE_MARGIN);
                let tilt = cgmath::Matrix3::from_axis_angle(right.normalize(), cgmath::Rad(pitch));
                relative_position = tilt * relative_position;
            }
            camera.eye = camera.target + relative_position;
        }

        if self.zoom != 0.0 {
            let relative_position = camera.eye - camera.target;
            let distance = (relative_position.magnitude() * (1.0 - WHEEL_ZOOM).powf(self.zoom))
                .clamp(self.min_distance, self.max_distance);
            camera.eye = camera.target + relative_position.normalize_to(distance);
        }

        self.discard_pending();
    }
}

// We need this for Rust to store our data correctly for the shaders
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    // cgmath matrices can't go through bytemuck directly
    pub view_proj_matrix: [[f32; 4]; 4],
    pub view_matrix: [[f32; 4]; 4],
    pub proj_matrix: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj_matrix: IDENTITY_MATRIX_4,
            view_matrix: IDENTITY_MATRIX_4,
            proj_matrix: IDENTITY_MATRIX_4,
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        let (view_proj_matrix, view_matrix, proj_matrix) = camera.build_view_projection_matrix();
        self.view_proj_matrix = view_proj_matrix.into();
        self.view_matrix = view_matrix.into();
        self.proj_matrix = proj_matrix.into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RigState {
    /// Nothing selected, the globe spins.
    Idle,
    /// Camera is pulled towards `target` every frame.
    Tracking { target: Point3<f64> },
}

/// Drives the camera towards a selected place.
///
/// The rig stays in `Tracking` after the camera has arrived; only
/// [`CameraRig::release`] brings it back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    state: RigState,
}

impl CameraRig {
    pub fn new() -> Self {
        Self {
            state: RigState::Idle,
        }
    }

    pub fn state(&self) -> RigState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, RigState::Tracking { .. })
    }

    pub fn target(&self) -> Option<Point3<f64>> {
        match self.state {
            RigState::Idle => None,
            RigState::Tracking { target } => Some(target),
        }
    }

    pub fn track(&mut self, target: Point3<f64>) {
        self.state = RigState::Tracking { target };
    }

    pub fn release(&mut self) {
        self.state = RigState::Idle;
    }

    /// Next camera position. Idle leaves the camera where it is.
    pub fn update(&self, current: Point3<f64>, elapsed: Duration) -> Point3<f64> {
        match self.state {
            RigState::Idle => current,
            RigState::Tracking { target } => tick(current, target, elapsed),
        }
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new()
    }
}

/// Fraction of the remaining distance to cover after `elapsed`.
///
/// Exactly [`TRACKING_STEP`] for one reference frame, compounded for longer
/// or shorter frames, and never above 1.
pub fn step_fraction(elapsed: Duration) -> f64 {
    let frames = elapsed.as_secs_f64() / REFERENCE_FRAME.as_secs_f64();
    (1.0 - (1.0 - TRACKING_STEP).powf(frames)).clamp(0.0, 1.0)
}

/// Moves `current` towards `target` by [`step_fraction`] of the gap.
pub fn tick(current: Point3<f64>, target: Point3<f64>, elapsed: Duration) -> Point3<f64> {
    let t = step_fraction(elapsed);
    Point3::from_vec(current.to_vec().lerp(target.to_vec(), t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cgmath::MetricSpace;

    fn test_camera() -> Camera {
        Camera {
            eye: Point3::new(0.0, 0.0, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: cgmath::Vector3::unit_y(),
            aspect: 1.0,
            fovy: 45.0,
            znear: 0.1,
            zfar: 1000.0,
        }
    }

    fn distance(camera: &Camera) -> f32 {
        (camera.eye - camera.target).magnitude()
    }

    #[test]
    fn drag_orbits_at_constant_distance() {
        let mut controller = CameraController::new(0.05, 2.5, 10.0);
        let mut camera = test_camera();

        controller.move_cursor(100.0, 100.0);
        controller.set_dragging(true);
        controller.move_cursor(160.0, 120.0);
        controller.update_camera(&mut camera);

        assert_abs_diff_eq!(distance(&camera), 5.0, epsilon = 1e-4);
        // dragging right swings the eye left, dragging down lifts it
        assert!(camera.eye.x < 0.0);
        assert!(camera.eye.y > 0.0);
    }

    #[test]
    fn cursor_motion_without_a_button_does_nothing() {
        let mut controller = CameraController::new(0.05, 2.5, 10.0);
        let mut camera = test_camera();

        controller.move_cursor(0.0, 0.0);
        controller.move_cursor(300.0, 300.0);
        controller.update_camera(&mut camera);

        assert_eq!(camera.eye, Point3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn drag_never_flips_over_a_pole() {
        let mut controller = CameraController::new(0.05, 2.5, 10.0);
        let mut camera = test_camera();

        controller.set_dragging(true);
        controller.move_cursor(0.0, 0.0);
        controller.move_cursor(0.0, 10_000.0);
        controller.update_camera(&mut camera);

        let from_up = (camera.eye - camera.target).angle(camera.up).0;
        assert!(from_up >= POLE_MARGIN - 1e-4, "eye {:?}", camera.eye);
        assert!(camera.eye.z > 0.0);
    }

    #[test]
    fn wheel_zoom_is_clamped() {
        let mut controller = CameraController::new(0.05, 2.5, 10.0);
        let mut camera = test_camera();

        controller.scroll(1.0);
        controller.update_camera(&mut camera);
        assert_abs_diff_eq!(distance(&camera), 4.5, epsilon = 1e-4);

        controller.scroll(100.0);
        controller.update_camera(&mut camera);
        assert_abs_diff_eq!(distance(&camera), 2.5, epsilon = 1e-4);

        controller.scroll(-100.0);
        controller.update_camera(&mut camera);
        assert_abs_diff_eq!(distance(&camera), 10.0, epsilon = 1e-4);
    }

    #[test]
    fn discarded_motion_is_not_applied_later() {
        let mut controller = CameraController::new(0.05, 2.5, 10.0);
        let mut camera = test_camera();

        controller.set_dragging(true);
        controller.move_cursor(0.0, 0.0);
        controller.move_cursor(80.0, 0.0);
        controller.scroll(3.0);
        controller.discard_pending();
        controller.update_camera(&mut camera);

        assert_eq!(camera.eye, Point3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn one_reference_frame_covers_ten_percent() {
        assert_abs_diff_eq!(step_fraction(REFERENCE_FRAME), 0.1, epsilon = 1e-3);
        let next = tick(Point3::new(0.0, 0.0, 5.0), Point3::new(0.0, 0.0, 4.0), REFERENCE_FRAME);
        assert_abs_diff_eq!(next.z, 4.9, epsilon = 1e-3);
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        let target = Point3::new(1.2, 3.1, -2.9);
        let mut current = Point3::new(0.0, 0.0, 5.0);
        let mut distance = current.distance(target);
        for _ in 0..200 {
            let next = tick(current, target, REFERENCE_FRAME);
            let next_distance = next.distance(target);
            assert!(next_distance < distance);
            // still on the segment between the previous position and the target
            assert_abs_diff_eq!(
                current.distance(next) + next_distance,
                distance,
                epsilon = 1e-9
            );
            current = next;
            distance = next_distance;
        }
        assert!(distance < 1e-6);
    }

    #[test]
    fn long_frames_never_overshoot() {
        let target = Point3::new(0.0, 4.5, 0.0);
        let next = tick(Point3::new(0.0, 0.0, 5.0), target, Duration::from_secs(60));
        assert!(next.distance(target) <= 1e-9);
        assert!(step_fraction(Duration::from_secs(3600)) <= 1.0);
    }

    #[test]
    fn zero_elapsed_does_not_move() {
        let current = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(tick(current, Point3::new(0.0, 0.0, 0.0), Duration::ZERO), current);
    }

    #[test]
    fn idle_rig_keeps_the_camera() {
        let rig = CameraRig::new();
        let eye = Point3::new(0.0, 0.0, 5.0);
        assert_eq!(rig.update(eye, REFERENCE_FRAME), eye);
        assert_eq!(rig.state(), RigState::Idle);
    }

    #[test]
    fn rig_stays_tracking_after_arrival() {
        let mut rig = CameraRig::new();
        let target = Point3::new(0.0, 4.5, 0.0);
        rig.track(target);
        let mut eye = Point3::new(0.0, 0.0, 5.0);
        for _ in 0..1000 {
            eye = rig.update(eye, REFERENCE_FRAME);
        }
        assert!(eye.distance(target) < 1e-9);
        assert!(rig.is_tracking());
        assert_eq!(rig.target(), Some(target));

        rig.release();
        assert_eq!(rig.state(), RigState::Idle);
        assert_eq!(rig.target(), None);
    }
}
