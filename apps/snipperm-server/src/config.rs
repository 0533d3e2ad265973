//! Server configuration from environment variables.
//!
//! ```bash
//! # External user directory (optional; omit to run without one)
//! DIRECTORY_ISSUER_URL=https://tenant.auth0.com
//! DIRECTORY_CLIENT_ID=...
//! DIRECTORY_CLIENT_SECRET=...
//! DIRECTORY_AUDIENCE=https://tenant.auth0.com/api/v2/
//! DIRECTORY_TIMEOUT_SECS=10
//! ```

use std::env;
use std::time::Duration;

use thiserror::Error;

use snipperm_directory::DirectoryConfig;

/// Server configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Directory connection; `None` runs the server without an external
    /// directory (lookups fail `NotFound`).
    pub directory: Option<DirectoryConfig>,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("invalid DIRECTORY_TIMEOUT_SECS: {0}")]
    InvalidTimeout(String),
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(name)),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables. The directory block is
    /// all-or-nothing: once the issuer URL is set, the credentials are
    /// required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let issuer_url = match env::var("DIRECTORY_ISSUER_URL") {
            Ok(v) if !v.is_empty() => v,
            _ => return Ok(Self { directory: None }),
        };

        let client_id = required("DIRECTORY_CLIENT_ID")?;
        let client_secret = required("DIRECTORY_CLIENT_SECRET")?;
        let audience = required("DIRECTORY_AUDIENCE")?;

        let timeout = match env::var("DIRECTORY_TIMEOUT_SECS") {
            Ok(v) => {
                let secs: u64 = v.parse().map_err(|_| ConfigError::InvalidTimeout(v))?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(10),
        };

        Ok(Self {
            directory: Some(DirectoryConfig {
                issuer_url,
                client_id,
                client_secret,
                audience,
                timeout,
            }),
        })
    }
}
