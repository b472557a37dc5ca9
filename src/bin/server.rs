#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use clap::Parser;
    use geoglobe::{
        api::{self, AppState},
        config::ServerConfig,
        geocode::{opencage::OpenCage, LocaleHint, Resolver},
    };
    use tower_http::{services::ServeDir, trace::TraceLayer};
    use tracing_subscriber::EnvFilter;

    dotenvy::dotenv().ok();
    let config = ServerConfig::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let resolver = match config.api_key() {
        Some(key) => Some(Resolver::new(
            OpenCage::new(key),
            LocaleHint::japan().with_language(config.language.clone()),
        )),
        None => {
            tracing::warn!("OPENCAGE_API_KEY is not set, /geocode will answer 500");
            None
        }
    };

    let mut app = api::router(Arc::new(AppState::new(resolver)));
    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "serving the web build");
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}
