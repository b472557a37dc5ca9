//! `GET /geocode?q=` in front of the resolver.

use std::sync::Arc;

use axum::{
    extract::{Query as UrlQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::geocode::{GeocodeError, GeocodeResult, GeocodingProvider, Resolver};

/// Shared by every request. `resolver` is `None` when the server was
/// started without provider credentials.
pub struct AppState<P> {
    resolver: Option<Resolver<P>>,
}

impl<P> AppState<P> {
    pub fn new(resolver: Option<Resolver<P>>) -> Self {
        Self { resolver }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeocodeParams {
    q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError(GeocodeError);

impl From<GeocodeError> for ApiError {
    fn from(err: GeocodeError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            GeocodeError::Validation => StatusCode::BAD_REQUEST,
            GeocodeError::NotFound { .. } => StatusCode::NOT_FOUND,
            GeocodeError::Configuration | GeocodeError::Provider(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.user_message().to_owned(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub fn router<P>(state: Arc<AppState<P>>) -> Router
where
    P: GeocodingProvider + Send + Sync + 'static,
{
    Router::new()
        .route("/geocode", get(geocode::<P>))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn geocode<P>(
    State(state): State<Arc<AppState<P>>>,
    UrlQuery(params): UrlQuery<GeocodeParams>,
) -> Result<Json<GeocodeResult>, ApiError>
where
    P: GeocodingProvider + Send + Sync + 'static,
{
    let q = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or(GeocodeError::Validation)?;

    let Some(resolver) = state.resolver.as_ref() else {
        tracing::error!("geocode request refused: no OpenCage API key configured");
        return Err(GeocodeError::Configuration.into());
    };

    let result = resolver.resolve(&q).await?;
    Ok(Json(result))
}
