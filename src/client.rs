//! Talks to the `/geocode` endpoint from the viewer.

use serde::Deserialize;
use thiserror::Error;

use crate::geocode::GeocodeResult;

/// Shown when the server answered with an error but no message.
pub const SEARCH_FAILED_MESSAGE: &str = "検索に失敗しました";
/// Shown when the server could not be reached or answered nonsense.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "予期せぬエラーが発生しました";

#[cfg(not(target_arch = "wasm32"))]
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("server answered {status}: {message}")]
    Server { status: u16, message: String },
    #[error("geocode request failed: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn user_message(&self) -> &str {
        match self {
            ClientError::Server { message, .. } => message,
            ClientError::Transport(_) => UNEXPECTED_ERROR_MESSAGE,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Turns a `/geocode` response into a result or a displayable error.
pub fn interpret_response(status: u16, body: &str) -> Result<GeocodeResult, ClientError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body)
            .map_err(|err| ClientError::Transport(format!("malformed geocode body: {err}")));
    }
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| SEARCH_FAILED_MESSAGE.to_owned());
    Err(ClientError::Server { status, message })
}

#[derive(Clone)]
pub struct GeocodeClient {
    base_url: String,
    #[cfg(not(target_arch = "wasm32"))]
    http: reqwest::Client,
}

impl GeocodeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            #[cfg(not(target_arch = "wasm32"))]
            http: reqwest::Client::new(),
        }
    }

    /// `GEOGLOBE_SERVER` or the local default.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("GEOGLOBE_SERVER").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_owned());
        Self::new(base_url)
    }

    /// Same origin as the page that loaded the bundle.
    #[cfg(target_arch = "wasm32")]
    pub fn from_env() -> Self {
        Self::new("")
    }

    pub fn endpoint(&self) -> String {
        format!("{}/geocode", self.base_url)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub async fn geocode(&self, query: &str) -> Result<GeocodeResult, ClientError> {
        let response = self
            .http
            .get(self.endpoint())
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        interpret_response(status, &body)
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn geocode(&self, query: &str) -> Result<GeocodeResult, ClientError> {
        use wasm_bindgen::{JsCast, JsValue};
        use wasm_bindgen_futures::JsFuture;
        use web_sys::{Request, RequestInit, RequestMode, Response};

        fn js_error(err: JsValue) -> ClientError {
            ClientError::Transport(format!("{err:?}"))
        }

        let encoded: String = js_sys::encode_uri_component(query).into();
        let url = format!("{}?q={}", self.endpoint(), encoded);

        let mut opts = RequestInit::new();
        opts.method("GET");
        opts.mode(RequestMode::Cors);
        let request = Request::new_with_str_and_init(&url, &opts).map_err(js_error)?;
        request
            .headers()
            .set("Accept", "application/json")
            .map_err(js_error)?;

        let window = web_sys::window().ok_or_else(|| ClientError::Transport("no window".into()))?;
        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_error)?
            .dyn_into()
            .map_err(js_error)?;
        let text = JsFuture::from(response.text().map_err(js_error)?)
            .await
            .map_err(js_error)?;
        interpret_response(response.status(), &text.as_string().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_becomes_a_result() {
        let result = interpret_response(
            200,
            r#"{"lat":48.8584,"lng":2.2945,"formatted":"エッフェル塔, パリ, フランス"}"#,
        )
        .unwrap();
        assert_eq!(result.lat, 48.8584);
        assert_eq!(result.lng, 2.2945);
        assert_eq!(result.formatted, "エッフェル塔, パリ, フランス");
    }

    #[test]
    fn server_message_is_passed_through() {
        let err = interpret_response(404, r#"{"error":"見つかりません"}"#).unwrap_err();
        assert_eq!(
            err,
            ClientError::Server {
                status: 404,
                message: "見つかりません".into()
            }
        );
        assert_eq!(err.user_message(), "見つかりません");
    }

    #[test]
    fn error_without_message_gets_the_generic_text() {
        let err = interpret_response(502, "Bad Gateway").unwrap_err();
        assert_eq!(err.user_message(), SEARCH_FAILED_MESSAGE);
    }

    #[test]
    fn broken_success_body_is_unexpected() {
        let err = interpret_response(200, "{}").unwrap_err();
        assert_eq!(err.user_message(), UNEXPECTED_ERROR_MESSAGE);
    }

    #[test]
    fn trailing_slash_is_dropped_from_the_base() {
        assert_eq!(
            GeocodeClient::new("http://localhost:3000/").endpoint(),
            "http://localhost:3000/geocode"
        );
    }
}
