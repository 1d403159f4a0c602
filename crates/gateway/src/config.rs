use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid base URL {raw}: {source}")]
    InvalidBaseUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base URL {raw} must use http or https")]
    UnsupportedScheme { raw: String },

    #[error("invalid timeout {raw}: expected a positive number of seconds")]
    InvalidTimeout { raw: String },
}

/// Parses an exam service base URL. Only `http` and `https` are accepted.
///
/// # Errors
///
/// Returns `ConfigError::InvalidBaseUrl` for unparsable input and
/// `ConfigError::UnsupportedScheme` for any other scheme.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
        raw: trimmed.to_owned(),
        source,
    })?;
    // http(s) URLs always have a host and can take path segments
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
            raw: trimmed.to_owned(),
        });
    }
    Ok(url)
}

/// Parses a request timeout given in whole seconds.
///
/// # Errors
///
/// Returns `ConfigError::InvalidTimeout` unless `raw` is a positive integer.
pub fn parse_timeout_secs(raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidTimeout {
            raw: raw.to_owned(),
        })
}

/// Where the exam service lives and how long to wait for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Parse `base_url` and build a config with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`parse_base_url`].
    pub fn parse(base_url: &str) -> Result<Self, ConfigError> {
        parse_base_url(base_url).map(Self::new)
    }

    /// Reads `EXAM_API_BASE_URL` and `EXAM_API_TIMEOUT_SECS`, falling back to
    /// defaults when they are unset or blank.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            env::var("EXAM_API_BASE_URL").ok().as_deref(),
            env::var("EXAM_API_TIMEOUT_SECS").ok().as_deref(),
        )
    }

    fn from_values(base_url: Option<&str>, timeout: Option<&str>) -> Result<Self, ConfigError> {
        let base_url = base_url
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        let mut config = Self::parse(base_url)?;
        if let Some(raw) = timeout.filter(|value| !value.trim().is_empty()) {
            config.timeout = parse_timeout_secs(raw)?;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Appends `segments` to the base URL path, percent-encoding each one, so a
    /// segment can never introduce extra path components, a query or a fragment.
    #[must_use]
    pub fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
