//! Place-name lookup with a single country-hint retry.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
pub mod opencage;

/// User-facing message for a lookup that found nothing.
pub const NOT_FOUND_MESSAGE: &str =
    "検索結果が見つかりませんでした。住所をより詳しく入力してみてください。";
/// User-facing message for upstream failures. Details only go to the log.
pub const PROVIDER_FAILURE_MESSAGE: &str = "データの取得に失敗しました";
pub const MISSING_QUERY_MESSAGE: &str = "Missing query parameter \"q\"";
pub const CONFIGURATION_MESSAGE: &str = "Server configuration error: Missing API Key";

/// A search string that is known to be non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: &str) -> Result<Self, GeocodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(GeocodeError::Validation);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub formatted: String,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("query must not be empty")]
    Validation,
    #[error("no geocoding provider is configured")]
    Configuration,
    #[error("no results for {query:?}")]
    NotFound { query: String },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl GeocodeError {
    /// Text that is safe to show to the person searching.
    pub fn user_message(&self) -> &'static str {
        match self {
            GeocodeError::Validation => MISSING_QUERY_MESSAGE,
            GeocodeError::Configuration => CONFIGURATION_MESSAGE,
            GeocodeError::NotFound { .. } => NOT_FOUND_MESSAGE,
            GeocodeError::Provider(_) => PROVIDER_FAILURE_MESSAGE,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("geocoding request failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("geocoding provider answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unreadable geocoding response")]
    Decode(#[source] serde_json::Error),
}

/// One request to the upstream provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub query: String,
    pub language: String,
    pub limit: u32,
}

/// A ranked hit as returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub lat: f64,
    pub lng: f64,
    pub formatted: String,
}

impl From<Candidate> for GeocodeResult {
    fn from(candidate: Candidate) -> Self {
        Self {
            lat: candidate.lat,
            lng: candidate.lng,
            formatted: candidate.formatted,
        }
    }
}

/// Forward geocoding backend, highest ranked candidate first.
pub trait GeocodingProvider {
    fn forward(
        &self,
        request: &LookupRequest,
    ) -> impl Future<Output = Result<Vec<Candidate>, ProviderError>> + Send;
}

/// Country the service is tuned for: the response language and the names
/// that mark a query as already scoped to that country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleHint {
    pub language: String,
    pub native_name: String,
    pub latin_name: String,
}

impl LocaleHint {
    pub fn japan() -> Self {
        Self {
            language: "ja".to_owned(),
            native_name: "日本".to_owned(),
            latin_name: "Japan".to_owned(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn is_marked(&self, query: &str) -> bool {
        query.contains(&self.native_name) || query.contains(&self.latin_name)
    }

    pub fn append_to(&self, query: &str) -> String {
        format!("{query} {}", self.native_name)
    }
}

impl Default for LocaleHint {
    fn default() -> Self {
        Self::japan()
    }
}

/// Resolves free text to a single coordinate.
///
/// Asks the provider once; if nothing comes back and the query does not
/// name the country yet, asks exactly once more with the country appended.
pub struct Resolver<P> {
    provider: P,
    locale: LocaleHint,
}

impl<P> Resolver<P>
where
    P: GeocodingProvider,
{
    pub const RESULT_LIMIT: u32 = 1;

    pub fn new(provider: P, locale: LocaleHint) -> Self {
        Self { provider, locale }
    }

    pub fn locale(&self) -> &LocaleHint {
        &self.locale
    }

    pub async fn resolve(&self, raw: &str) -> Result<GeocodeResult, GeocodeError> {
        let query = Query::parse(raw)?;
        tracing::info!(%query, "searching");

        let mut candidates = self.lookup(query.as_str()).await?;
        tracing::info!(results = candidates.len(), "first attempt");

        if candidates.is_empty() && !self.locale.is_marked(query.as_str()) {
            let hinted = self.locale.append_to(query.as_str());
            tracing::info!(query = %hinted, "retrying with country suffix");
            candidates = self.lookup(&hinted).await?;
            tracing::info!(results = candidates.len(), "second attempt");
        }

        match candidates.into_iter().next() {
            Some(best) => Ok(best.into()),
            None => {
                tracing::info!(%query, "no results after retry");
                Err(GeocodeError::NotFound {
                    query: query.to_string(),
                })
            }
        }
    }

    async fn lookup(&self, query: &str) -> Result<Vec<Candidate>, ProviderError> {
        let request = LookupRequest {
            query: query.to_owned(),
            language: self.locale.language.clone(),
            limit: Self::RESULT_LIMIT,
        };
        self.provider.forward(&request).await.map_err(|err| {
            tracing::error!(error = ?err, "geocoding provider error");
            err
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    /// Replays canned answers and remembers what it was asked.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedProvider {
        answers: Arc<Mutex<VecDeque<Result<Vec<Candidate>, u16>>>>,
        pub(crate) requests: Arc<Mutex<Vec<LookupRequest>>>,
    }

    impl ScriptedProvider {
        pub(crate) fn answering(answers: Vec<Result<Vec<Candidate>, u16>>) -> Self {
            Self {
                answers: Arc::new(Mutex::new(answers.into())),
                requests: Arc::default(),
            }
        }

        pub(crate) fn queries(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.query.clone())
                .collect()
        }
    }

    impl GeocodingProvider for ScriptedProvider {
        fn forward(
            &self,
            request: &LookupRequest,
        ) -> impl Future<Output = Result<Vec<Candidate>, ProviderError>> + Send {
            self.requests.lock().unwrap().push(request.clone());
            let answer = self.answers.lock().unwrap().pop_front().unwrap_or(Ok(vec![]));
            async move {
                answer.map_err(|status| ProviderError::Status {
                    status,
                    body: "upstream said no".into(),
                })
            }
        }
    }

    pub(crate) fn tokyo_station() -> Candidate {
        Candidate {
            lat: 35.6812,
            lng: 139.7671,
            formatted: "東京駅, 丸の内一丁目, 千代田区, 東京都, 日本".into(),
        }
    }

    #[tokio::test]
    async fn first_hit_is_returned_without_retry() {
        let provider = ScriptedProvider::answering(vec![Ok(vec![tokyo_station()])]);
        let resolver = Resolver::new(provider.clone(), LocaleHint::japan());

        let result = resolver.resolve("東京駅").await.unwrap();

        assert!(result.formatted.contains("東京"));
        assert_eq!(result.lat, 35.6812);
        assert_eq!(result.lng, 139.7671);
        assert_eq!(provider.queries(), vec!["東京駅"]);
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].language, "ja");
        assert_eq!(requests[0].limit, 1);
    }

    #[tokio::test]
    async fn empty_results_retry_once_with_country_suffix() {
        let provider = ScriptedProvider::answering(vec![Ok(vec![]), Ok(vec![tokyo_station()])]);
        let resolver = Resolver::new(provider.clone(), LocaleHint::japan());

        let result = resolver.resolve("丸の内一丁目").await.unwrap();

        assert_eq!(result.formatted, tokyo_station().formatted);
        assert_eq!(provider.queries(), vec!["丸の内一丁目", "丸の内一丁目 日本"]);
    }

    #[tokio::test]
    async fn second_miss_is_not_found_and_stops() {
        let provider = ScriptedProvider::answering(vec![Ok(vec![]), Ok(vec![]), Ok(vec![])]);
        let resolver = Resolver::new(provider.clone(), LocaleHint::japan());

        let err = resolver.resolve("nowhere-at-all").await.unwrap_err();

        assert!(matches!(err, GeocodeError::NotFound { .. }));
        assert_eq!(err.user_message(), NOT_FOUND_MESSAGE);
        assert_eq!(provider.queries().len(), 2);
    }

    #[tokio::test]
    async fn queries_naming_the_country_never_retry() {
        for query in ["Osaka Japan", "大阪 日本"] {
            let provider = ScriptedProvider::answering(vec![Ok(vec![])]);
            let resolver = Resolver::new(provider.clone(), LocaleHint::japan());

            let err = resolver.resolve(query).await.unwrap_err();

            assert!(matches!(err, GeocodeError::NotFound { .. }));
            assert_eq!(provider.queries(), vec![query]);
        }
    }

    #[tokio::test]
    async fn blank_queries_never_reach_the_provider() {
        let provider = ScriptedProvider::answering(vec![Ok(vec![tokyo_station()])]);
        let resolver = Resolver::new(provider.clone(), LocaleHint::japan());

        for raw in ["", "   ", "\t\n"] {
            let err = resolver.resolve(raw).await.unwrap_err();
            assert!(matches!(err, GeocodeError::Validation));
        }
        assert!(provider.queries().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_is_distinct_from_not_found() {
        let provider = ScriptedProvider::answering(vec![Err(503)]);
        let resolver = Resolver::new(provider.clone(), LocaleHint::japan());

        let err = resolver.resolve("札幌").await.unwrap_err();

        assert!(matches!(
            err,
            GeocodeError::Provider(ProviderError::Status { status: 503, .. })
        ));
        assert_eq!(err.user_message(), PROVIDER_FAILURE_MESSAGE);
        assert_ne!(err.user_message(), NOT_FOUND_MESSAGE);
        // a failed first attempt is not retried
        assert_eq!(provider.queries(), vec!["札幌"]);
    }

    #[tokio::test]
    async fn failure_on_the_retry_is_a_provider_error() {
        let provider = ScriptedProvider::answering(vec![Ok(vec![]), Err(500)]);
        let resolver = Resolver::new(provider.clone(), LocaleHint::japan());

        let err = resolver.resolve("札幌").await.unwrap_err();

        assert!(matches!(err, GeocodeError::Provider(_)));
        assert_eq!(provider.queries(), vec!["札幌", "札幌 日本"]);
    }

    #[test]
    fn query_is_trimmed() {
        assert_eq!(Query::parse("  東京駅 ").unwrap().as_str(), "東京駅");
    }

    #[test]
    fn locale_marker_matches_either_script() {
        let locale = LocaleHint::japan();
        assert!(locale.is_marked("京都, Japan"));
        assert!(locale.is_marked("日本橋"));
        assert!(!locale.is_marked("Kyoto"));
        assert_eq!(locale.append_to("Kyoto"), "Kyoto 日本");
    }
}
