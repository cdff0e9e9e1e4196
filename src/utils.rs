use std::{env, fmt, num::ParseIntError};

use thiserror::Error;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com/v1/responses";
const DEFAULT_PORT: u16 = 5020;
const DEFAULT_BODY_LIMIT_MB: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid non-negative integer, got {value:?}: {source}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        source: ParseIntError,
    },
}

/// Process configuration, read once at startup and handed to the handlers.
#[derive(Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub provider_url: String,
    pub port: u16,
    pub body_limit_bytes: usize,
}

impl Settings {
    /// The provider credential. An empty value counts as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let body_limit_bytes = match lookup("BODY_LIMIT_MB") {
            Some(value) => parse_number::<usize>("BODY_LIMIT_MB", value)?,
            None => DEFAULT_BODY_LIMIT_MB,
        }
        .saturating_mul(1024 * 1024);

        let port = match lookup("PORT") {
            Some(value) => parse_number::<u16>("PORT", value)?,
            None => DEFAULT_PORT,
        };

        let provider_url = lookup("OPENAI_API_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string());

        Ok(Settings {
            api_key: lookup("OPENAI_API_KEY"),
            provider_url,
            port,
            body_limit_bytes,
        })
    }
}

// keep the credential out of logs
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key().map(|_| "<redacted>"))
            .field("provider_url", &self.provider_url)
            .field("port", &self.port)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .finish()
    }
}

fn parse_number<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|source| ConfigError::InvalidNumber {
            name,
            value,
            source,
        })
}

/// Loads `.env` when present, then reads the settings from the environment.
pub fn get_env() -> Result<Settings, ConfigError> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            tracing::warn!("Ignoring unreadable .env file: {}", err);
        }
    }

    Settings::from_lookup(|name| env::var(name).ok())
}
