use std::future::Future;

use serde::Deserialize;

use super::{Candidate, GeocodingProvider, LookupRequest, ProviderError};

pub const OPENCAGE_URL: &str = "https://api.opencagedata.com/geocode/v1/json";

/// OpenCage forward geocoding over HTTPS.
#[derive(Clone)]
pub struct OpenCage {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl OpenCage {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, OPENCAGE_URL)
    }

    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl GeocodingProvider for OpenCage {
    fn forward(
        &self,
        request: &LookupRequest,
    ) -> impl Future<Output = Result<Vec<Candidate>, ProviderError>> + Send {
        let limit = request.limit.to_string();
        let call = self.client.get(&self.endpoint).query(&[
            ("q", request.query.as_str()),
            ("key", self.api_key.as_str()),
            ("language", request.language.as_str()),
            ("limit", limit.as_str()),
        ]);

        async move {
            let response = call
                .send()
                .await
                .map_err(|err| ProviderError::Transport(Box::new(err)))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|err| ProviderError::Transport(Box::new(err)))?;
            if !status.is_success() {
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            parse_forward_response(&body)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForwardResponse {
    #[serde(default)]
    results: Vec<ForwardResult>,
}

#[derive(Debug, Deserialize)]
struct ForwardResult {
    geometry: Geometry,
    formatted: String,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    lat: f64,
    lng: f64,
}

/// Reads the parts of an OpenCage `json` response the resolver needs.
pub fn parse_forward_response(body: &str) -> Result<Vec<Candidate>, ProviderError> {
    let response: ForwardResponse = serde_json::from_str(body).map_err(ProviderError::Decode)?;
    Ok(response
        .results
        .into_iter()
        .map(|r| Candidate {
            lat: r.geometry.lat,
            lng: r.geometry.lng,
            formatted: r.formatted,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        extract::{Query, State},
        http::StatusCode,
        routing::get,
        Router,
    };

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    const GOOD_KEY: &str = "good-key";

    async fn fake_opencage(
        State(seen): State<Seen>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, String) {
        let authorized = params.get("key").map(String::as_str) == Some(GOOD_KEY);
        seen.lock().unwrap().push(params);
        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                r#"{ "status": { "code": 401, "message": "invalid API key" } }"#.to_owned(),
            );
        }
        let body = r#"{
            "results": [
                {
                    "formatted": "大阪城, 大阪市中央区, 日本",
                    "geometry": { "lat": 34.6873, "lng": 135.5262 }
                }
            ],
            "status": { "code": 200, "message": "OK" }
        }"#;
        (StatusCode::OK, body.to_owned())
    }

    /// Serves a stand-in OpenCage on an ephemeral local port.
    async fn serve_fake_opencage() -> (String, Seen) {
        let seen = Seen::default();
        let app = Router::new()
            .route("/geocode/v1/json", get(fake_opencage))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/geocode/v1/json"), seen)
    }

    fn osaka_castle() -> LookupRequest {
        LookupRequest {
            query: "大阪城".to_owned(),
            language: "ja".to_owned(),
            limit: 1,
        }
    }

    #[tokio::test]
    async fn forward_sends_the_query_and_parses_the_answer() {
        let (url, seen) = serve_fake_opencage().await;
        let provider = OpenCage::with_endpoint(GOOD_KEY, url);

        let candidates = provider.forward(&osaka_castle()).await.unwrap();

        assert_eq!(
            candidates,
            vec![Candidate {
                lat: 34.6873,
                lng: 135.5262,
                formatted: "大阪城, 大阪市中央区, 日本".to_owned(),
            }]
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let params = &seen[0];
        assert_eq!(params["q"], "大阪城");
        assert_eq!(params["key"], GOOD_KEY);
        assert_eq!(params["language"], "ja");
        assert_eq!(params["limit"], "1");
    }

    #[tokio::test]
    async fn rejected_key_is_a_status_error() {
        let (url, seen) = serve_fake_opencage().await;
        let provider = OpenCage::with_endpoint("revoked-key", url);

        let err = provider.forward(&osaka_castle()).await.unwrap_err();

        match err {
            ProviderError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid API key"));
            }
            other => panic!("expected a status error, got {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn parses_ranked_results() {
        let body = r#"{
            "documentation": "https://opencagedata.com/api",
            "results": [
                {
                    "components": { "country": "日本", "_type": "railway" },
                    "confidence": 9,
                    "formatted": "東京駅, 丸の内一丁目, 千代田区, 東京都, 日本",
                    "geometry": { "lat": 35.6812362, "lng": 139.7671248 }
                }
            ],
            "status": { "code": 200, "message": "OK" },
            "total_results": 1
        }"#;

        let candidates = parse_forward_response(body).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lat, 35.6812362);
        assert_eq!(candidates[0].lng, 139.7671248);
        assert!(candidates[0].formatted.starts_with("東京駅"));
    }

    #[test]
    fn missing_results_mean_no_candidates() {
        let body = r#"{ "status": { "code": 200, "message": "OK" }, "total_results": 0 }"#;
        assert!(parse_forward_response(body).unwrap().is_empty());
        let body = r#"{ "results": [], "total_results": 0 }"#;
        assert!(parse_forward_response(body).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_forward_response("<html>bad gateway</html>"),
            Err(ProviderError::Decode(_))
        ));
    }
}
