//! Client configuration
//!
//! `Config` is supplied by direct construction. It derives `Deserialize` with
//! per-field defaults so a host application can embed a `[caldera]` table in
//! its own config file; this crate does no file or environment loading of its
//! own.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Hard per-request object limit of the Caldera bulk endpoint.
///
/// One call to `/users/track` accepts at most this many user-attribute
/// objects and this many event objects.
pub const MAX_BATCH_SIZE: usize = 75;

/// Caldera sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Caldera REST endpoint (e.g., `https://rest.caldera.example`)
    pub endpoint: String,

    /// API key for the app group, sent as a bearer credential
    pub api_key: String,

    /// Users and events per API call (max 75)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Flush a queue automatically once it reaches `batch_size`
    #[serde(default = "default_auto_flush")]
    pub auto_flush: bool,

    /// Must be true for API calls to actually be made. Use false for dry runs.
    #[serde(default = "default_send")]
    pub send: bool,

    /// Milliseconds to sleep after each delivered batch
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_auto_flush() -> bool {
    true
}

fn default_send() -> bool {
    true
}

fn default_pause_ms() -> u64 {
    100
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Create a configuration with the given endpoint and API key and
    /// defaults for everything else.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            batch_size: default_batch_size(),
            auto_flush: default_auto_flush(),
            send: default_send(),
            pause_ms: default_pause_ms(),
            timeout_secs: default_timeout(),
        }
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::Config("endpoint is required".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(Error::Config("api_key is required".to_string()));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        Ok(())
    }

    /// Pause between delivered batches
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = Config::new("https://rest.caldera.example", "cs-key");
        assert_eq!(config.batch_size, 75);
        assert!(config.auto_flush);
        assert!(config.send);
        assert_eq!(config.pause_ms, 100);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config::new("", "cs-key");
        assert!(config.validate().is_err());

        let config = Config::new("https://rest.caldera.example", "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_batch_size_bounds() {
        let mut config = Config::new("https://rest.caldera.example", "cs-key");

        config.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch_size = 76;
        assert!(config.validate().is_err());

        config.batch_size = 75;
        assert!(config.validate().is_ok());

        config.batch_size = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_embedded_config() {
        let toml = r#"
endpoint = "https://rest.caldera.example"
api_key = "cs-live-xxxxxxxx"
batch_size = 30
send = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint, "https://rest.caldera.example");
        assert_eq!(config.batch_size, 30);
        assert!(!config.send);
        // Unspecified fields take their defaults
        assert!(config.auto_flush);
        assert_eq!(config.pause_ms, 100);
    }

    #[test]
    fn test_pause_duration() {
        let mut config = Config::new("https://rest.caldera.example", "cs-key");
        config.pause_ms = 0;
        assert!(config.pause().is_zero());

        config.pause_ms = 250;
        assert_eq!(config.pause(), Duration::from_millis(250));
    }
}
