//! Server settings, read from flags, the environment and `.env`.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "geoglobe-server", about = "Geocoding endpoint for the geoglobe viewer")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "GEOGLOBE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// OpenCage API key. Without it every lookup answers 500.
    #[arg(long, env = "OPENCAGE_API_KEY", hide_env_values = true)]
    pub opencage_api_key: Option<String>,

    /// Language requested from the geocoder.
    #[arg(long, env = "GEOCODE_LANGUAGE", default_value = "ja")]
    pub language: String,

    /// Directory with the web build, served for every path that is not an API route.
    #[arg(long, env = "GEOGLOBE_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// The key, unless it is missing or blank.
    pub fn api_key(&self) -> Option<&str> {
        self.opencage_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
