//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Gmail REST endpoint for the authenticated user.
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Engine and ingestion settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Mail store database file.
    pub db_path: PathBuf,
    /// JSON rule document applied by `apply`.
    pub rules_path: PathBuf,
    /// Records dispatched concurrently within one rule. Actions for a
    /// single record always run in order.
    pub dispatch_concurrency: usize,
    /// Records written to the store per batch during `fetch`.
    pub fetch_batch: usize,
    /// Clear a non-empty store before `fetch` instead of refusing.
    pub replace_existing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/emails.db"),
            rules_path: PathBuf::from("rules.json"),
            dispatch_concurrency: 4,
            fetch_batch: 10,
            replace_existing: false,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("INBOX_RULES_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let rules_path = std::env::var("INBOX_RULES_RULES_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.rules_path);

        let dispatch_concurrency = parse_positive(
            "INBOX_RULES_DISPATCH_CONCURRENCY",
            defaults.dispatch_concurrency,
        )?;
        let fetch_batch = parse_positive("INBOX_RULES_FETCH_BATCH", defaults.fetch_batch)?;

        let replace_existing = match std::env::var("INBOX_RULES_REPLACE_EXISTING") {
            Ok(raw) => parse_bool("INBOX_RULES_REPLACE_EXISTING", &raw)?,
            Err(_) => defaults.replace_existing,
        };

        Ok(Self {
            db_path,
            rules_path,
            dispatch_concurrency,
            fetch_batch,
            replace_existing,
        })
    }
}

/// Gmail REST client settings.
#[derive(Debug, Clone)]
pub struct GmailConfig {
    pub api_base: String,
    /// OAuth access token. Obtaining and refreshing it happens elsewhere.
    pub access_token: SecretString,
    pub request_timeout: Duration,
}

impl GmailConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GMAIL_API_BASE.to_string(),
            access_token: SecretString::from(access_token.into()),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Build config from environment variables.
    /// Fails if `GMAIL_ACCESS_TOKEN` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("GMAIL_ACCESS_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("GMAIL_ACCESS_TOKEN".to_string()))?;

        let mut config = Self::new(token);
        if let Ok(base) = std::env::var("GMAIL_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(raw) = std::env::var("GMAIL_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "GMAIL_REQUEST_TIMEOUT_SECS".to_string(),
                message: format!("expected a number of seconds, got '{raw}'"),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn parse_positive(key: &str, default: usize) -> Result<usize, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a positive integer, got '{raw}'"),
        }),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected true/false, got '{raw}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.dispatch_concurrency, 4);
        assert_eq!(config.fetch_batch, 10);
        assert!(!config.replace_existing);
        assert_eq!(config.rules_path, PathBuf::from("rules.json"));
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("K", "TRUE").unwrap());
        assert!(parse_bool("K", "yes").unwrap());
        assert!(!parse_bool("K", "0").unwrap());
        assert!(matches!(
            parse_bool("K", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn parse_positive_rejects_zero_and_garbage() {
        // SAFETY: test-only env mutation on a key no other test touches.
        unsafe { std::env::set_var("INBOX_RULES_TEST_POSITIVE", "0") };
        assert!(parse_positive("INBOX_RULES_TEST_POSITIVE", 3).is_err());
        unsafe { std::env::set_var("INBOX_RULES_TEST_POSITIVE", "abc") };
        assert!(parse_positive("INBOX_RULES_TEST_POSITIVE", 3).is_err());
        unsafe { std::env::set_var("INBOX_RULES_TEST_POSITIVE", "8") };
        assert_eq!(parse_positive("INBOX_RULES_TEST_POSITIVE", 3).unwrap(), 8);
        unsafe { std::env::remove_var("INBOX_RULES_TEST_POSITIVE") };
        assert_eq!(parse_positive("INBOX_RULES_TEST_POSITIVE", 3).unwrap(), 3);
    }

    #[test]
    fn gmail_config_new_uses_default_base() {
        let config = GmailConfig::new("tok");
        assert_eq!(config.api_base, DEFAULT_GMAIL_API_BASE);
        assert_eq!(config.access_token.expose_secret(), "tok");
    }
}
