//! Configuration for reaching the authority

use std::time::Duration;

use thiserror::Error;

/// Default request timeout for calls to the authority
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the authority's base URL
pub const BASE_URL_VAR: &str = "PASSAGE_API_BASE_URL";

/// Environment variable holding the request timeout in whole seconds
pub const TIMEOUT_VAR: &str = "PASSAGE_API_TIMEOUT_SECS";

/// An invalid or incomplete configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided
    #[error("{0} is required")]
    Missing(&'static str),
    /// A setting could not be parsed
    #[error("{name} is invalid: {reason}")]
    Invalid {
        /// The setting
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
    /// The HTTP client could not be constructed
    #[cfg(feature = "http")]
    #[error("unable to build HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Where the authority lives and how long to wait for it
///
/// Build with [`ApiConfig::new()`] and the `with_*` methods, or read the
/// `PASSAGE_API_*` variables with [`ApiConfig::from_env()`].
#[cfg(feature = "http")]
#[derive(Clone, Debug)]
pub struct ApiConfig {
    base_url: reqwest::Url,
    timeout: Duration,
    user_agent: String,
}

#[cfg(feature = "http")]
impl ApiConfig {
    /// Creates a configuration for the authority at `base_url`
    ///
    /// A trailing `/` is added to the path so that endpoint paths are
    /// appended rather than replacing the last segment.
    pub fn new(mut base_url: reqwest::Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("passage_tokens/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }

    /// Reads the configuration from the environment
    ///
    /// # Required env vars
    /// - `PASSAGE_API_BASE_URL`: base URL of the authority
    ///
    /// # Optional env vars
    /// - `PASSAGE_API_TIMEOUT_SECS`: request timeout in seconds (default 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(BASE_URL_VAR).ok_or(ConfigError::Missing(BASE_URL_VAR))?;
        let base_url = base_url.parse().map_err(|e| ConfigError::Invalid {
            name: BASE_URL_VAR,
            reason: format!("{}", e),
        })?;

        let mut config = Self::new(base_url);

        if let Some(secs) = lookup(TIMEOUT_VAR) {
            let secs: u64 = secs.trim().parse().map_err(|e| ConfigError::Invalid {
                name: TIMEOUT_VAR,
                reason: format!("{}", e),
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Overrides the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the user agent sent to the authority
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The authority's base URL
    pub fn base_url(&self) -> &reqwest::Url {
        &self.base_url
    }

    /// The request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
