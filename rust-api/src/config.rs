//! Server configuration from environment variables

use std::path::PathBuf;
use thiserror::Error;

use crate::ergast::{ClientConfig, DEFAULT_BASE_URL};

/// Front-end origins allowed by default (Vite dev server)
pub const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime settings for the API server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            model_dir: PathBuf::from("models"),
            api_base: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `MODEL_DIR`, `RESULTS_API_BASE`,
    /// `REQUEST_TIMEOUT_SECS` and `CORS_ORIGINS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => parse_var("PORT", value)?,
            None => defaults.port,
        };
        let request_timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(value) => parse_var("REQUEST_TIMEOUT_SECS", value)?,
            None => defaults.request_timeout_secs,
        };
        let cors_origins = match var("CORS_ORIGINS") {
            Some(value) => parse_origins(&value)?,
            None => defaults.cors_origins,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port,
            model_dir: var("MODEL_DIR").map(PathBuf::from).unwrap_or(defaults.model_dir),
            api_base: var("RESULTS_API_BASE").unwrap_or(defaults.api_base),
            request_timeout_secs,
            cors_origins,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Results API client settings
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base.clone(),
            timeout_secs: self.request_timeout_secs,
            ..ClientConfig::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

/// Comma-separated list of exact origins (`scheme://host[:port]`). The
/// wildcard and anything with a path, query or credentials are rejected.
fn parse_origins(value: &str) -> Result<Vec<String>, ConfigError> {
    let mut origins = Vec::new();

    for origin in value.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        let valid = reqwest::Url::parse(origin).is_ok_and(|url| {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some()
                && url.origin().ascii_serialization() == origin.trim_end_matches('/')
        });
        if !valid {
            return Err(ConfigError::InvalidValue {
                name: "CORS_ORIGINS",
                value: value.to_string(),
            });
        }
        origins.push(origin.trim_end_matches('/').to_string());
    }

    Ok(origins)
}
