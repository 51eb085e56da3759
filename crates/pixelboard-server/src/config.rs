//! Environment-backed configuration.

use std::env;
use std::path::PathBuf;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// An environment variable has an unusable value.
    #[error("invalid value for {name}: {message}")]
    Invalid {
        name: &'static str,
        message: String,
    },
}

/// Server configuration.
///
/// | Variable | Meaning | Required |
/// |----------|---------|----------|
/// | `DATABASE_URL` | PostgreSQL store URL | yes |
/// | `REDIS_URL` | cache / broker URL | yes |
/// | `PORT` | HTTP listen port | yes |
/// | `RECAPTCHA_SECRET` | verifier credential | no (default empty) |
/// | `STATIC_DIR` | static asset root | no (default `static`) |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub recaptcha_secret: String,
    pub static_dir: PathBuf,
}

impl Config {
    /// Load the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or the
    /// port does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = require("DATABASE_URL")?;
        let redis_url = require("REDIS_URL")?;
        let port = require("PORT")?
            .parse()
            .map_err(|e| ConfigError::Invalid {
                name: "PORT",
                message: format!("expected a TCP port number: {e}"),
            })?;
        let recaptcha_secret = env::var("RECAPTCHA_SECRET").unwrap_or_default();
        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static"));

        Ok(Self {
            database_url,
            redis_url,
            port,
            recaptcha_secret,
            static_dir,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}
