use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "config/depot.yaml";

/// Which backend holds the transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote REST service
    Http,
    /// Embedded sled store
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    /// Session token forwarded as a bearer credential
    pub api_token: Option<String>,
    pub request_timeout_ms: u64,
    pub backend: BackendKind,
    pub store_path: String,
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

/// Defaults, then the YAML file (optional), then `DEPOT_*` environment variables
pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("api_base_url", "http://localhost:8080/api")?
        .set_default("request_timeout_ms", 10_000_i64)?
        .set_default("backend", "http")?
        .set_default("store_path", "data/transfers.sled")?
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/depot_transfer.log")?
        // Add configuration from a file
        .add_source(File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some()))
        // Add configuration from environment variables
        .add_source(Environment::with_prefix("DEPOT").try_parsing(true))
        .build()?;

    s.try_deserialize()
}
