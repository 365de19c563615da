//! Records-API configuration loaded from the environment.

use crate::query::Credentials;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://www.anastopulos.ar/ingresar/api/rest.php";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

pub const ENV_API_KEY: &str = "RUKOVODITEL_API_KEY";
pub const ENV_USER: &str = "RUKOVODITEL_USER";
pub const ENV_PASSWORD: &str = "RUKOVODITEL_PASSWORD";
pub const ENV_API_URL: &str = "RUKOVODITEL_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "RUKOVODITEL_TIMEOUT_SECS";

/// Endpoint, timeout and credentials for the records API.
///
/// Missing credentials are not an error here: they are reported per call by
/// the query builder, so the agent can still start and explain the problem.
#[derive(Debug, Clone)]
pub struct RukovoditelConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub credentials: Credentials,
}

impl Default for RukovoditelConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            credentials: Credentials::default(),
        }
    }
}

impl RukovoditelConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = lookup(ENV_TIMEOUT_SECS)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self {
            api_url: lookup(ENV_API_URL)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout,
            credentials: Credentials {
                api_key: lookup(ENV_API_KEY),
                username: lookup(ENV_USER),
                password: lookup(ENV_PASSWORD),
            },
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = RukovoditelConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert!(config.credentials.api_key.is_none());
    }

    #[test]
    fn reads_credentials_and_overrides() {
        let config = RukovoditelConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "k"),
            (ENV_USER, "u"),
            (ENV_PASSWORD, "p"),
            (ENV_API_URL, "http://localhost:9000/api/rest.php"),
            (ENV_TIMEOUT_SECS, "3"),
        ]));
        assert_eq!(config.api_url, "http://localhost:9000/api/rest.php");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.credentials.username.as_deref(), Some("u"));
    }

    #[test]
    fn bad_timeout_falls_back_to_default() {
        for raw in ["0", "abc", ""] {
            let config =
                RukovoditelConfig::from_lookup(lookup_from(&[(ENV_TIMEOUT_SECS, raw)]));
            assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        }
    }
}
