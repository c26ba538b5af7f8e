//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Dashboard push endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Credential appended to the connection handshake
    #[serde(default)]
    pub token: Option<String>,

    /// Delay between a detected disconnect and the next attempt
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

fn default_endpoint() -> String {
    "ws://localhost:8000/ws/dashboard/".to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    3000
}

/// Per-user config directory for this application
pub fn get_config_dir() -> PathBuf {
    directories::ProjectDirs::from("app", "reserva", "reserva-push")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        // Start with defaults
        .set_default("endpoint", default_endpoint())?
        .set_default("reconnect_interval_ms", 3000)?
        // Load from config file if it exists
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy())
                .required(false),
        )
        // Override with environment variables (RESERVA_ENDPOINT, RESERVA_TOKEN, etc.)
        .add_source(
            ::config::Environment::with_prefix("RESERVA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
