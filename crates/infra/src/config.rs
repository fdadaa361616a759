//! Configuration loading from environment variables.

use std::time::Duration;

use spendwise_analysis::PollPolicy;
pub use spendwise_observability::LogFormat;

pub const ENV_BACKEND_URL: &str = "SPENDWISE_BACKEND_URL";
pub const ENV_API_KEY: &str = "SPENDWISE_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "SPENDWISE_ACCESS_TOKEN";
pub const ENV_EXPENSES_TABLE: &str = "SPENDWISE_EXPENSES_TABLE";
pub const ENV_ANALYSIS_PATH: &str = "SPENDWISE_ANALYSIS_PATH";
pub const ENV_MAX_ATTEMPTS: &str = "SPENDWISE_MAX_ATTEMPTS";
pub const ENV_POLL_INTERVAL_MS: &str = "SPENDWISE_POLL_INTERVAL_MS";
pub const ENV_SUBMISSION_DELAY_MS: &str = "SPENDWISE_SUBMISSION_DELAY_MS";
pub const ENV_COMPLETE_FROM_ATTEMPT: &str = "SPENDWISE_COMPLETE_FROM_ATTEMPT";
pub const ENV_LOG_FORMAT: &str = "SPENDWISE_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL, without trailing slash
    pub base_url: String,
    /// Public API key sent as the `apikey` header
    pub api_key: String,
    /// User access token; falls back to the API key when absent
    pub access_token: Option<String>,
    pub expenses_table: String,
    /// Path of the analysis job endpoint, relative to `base_url`
    pub analysis_path: String,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
            expenses_table: "expenses".to_string(),
            analysis_path: "functions/v1/analysis-jobs".to_string(),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Token used for `Authorization: Bearer`.
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// `None` when no backend URL is configured (local/offline use).
    pub backend: Option<BackendConfig>,
    pub poll: PollPolicy,
    /// Poll index from which the local placeholder backend reports completion;
    /// `None` never completes.
    pub complete_from_attempt: Option<u32>,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: None,
            poll: PollPolicy::default(),
            complete_from_attempt: Some(1),
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` as the variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = var(ENV_BACKEND_URL) {
            let api_key = var(ENV_API_KEY).ok_or(ConfigError::Missing(ENV_API_KEY))?;
            let mut backend = BackendConfig::new(base_url, api_key);
            backend.access_token = var(ENV_ACCESS_TOKEN);
            if let Some(table) = var(ENV_EXPENSES_TABLE) {
                backend.expenses_table = table;
            }
            if let Some(path) = var(ENV_ANALYSIS_PATH) {
                backend.analysis_path = path.trim_matches('/').to_string();
            }
            config.backend = Some(backend);
        } else {
            tracing::debug!("{ENV_BACKEND_URL} not set; running without a remote backend");
        }

        if let Some(raw) = var(ENV_MAX_ATTEMPTS) {
            let attempts = parse_u64(ENV_MAX_ATTEMPTS, &raw)?;
            if attempts == 0 || attempts > u64::from(u32::MAX) {
                return Err(ConfigError::Invalid {
                    key: ENV_MAX_ATTEMPTS,
                    value: raw,
                    reason: "must be between 1 and 4294967295".to_string(),
                });
            }
            config.poll = config.poll.with_max_attempts(attempts as u32);
        }
        if let Some(raw) = var(ENV_POLL_INTERVAL_MS) {
            let ms = parse_u64(ENV_POLL_INTERVAL_MS, &raw)?;
            config.poll = config.poll.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(raw) = var(ENV_SUBMISSION_DELAY_MS) {
            let ms = parse_u64(ENV_SUBMISSION_DELAY_MS, &raw)?;
            config.poll = config.poll.with_submission_delay(Duration::from_millis(ms));
        }
        if let Some(raw) = var(ENV_COMPLETE_FROM_ATTEMPT) {
            config.complete_from_attempt = if raw.eq_ignore_ascii_case("never") {
                None
            } else {
                let attempt = parse_u64(ENV_COMPLETE_FROM_ATTEMPT, &raw)?;
                Some(u32::try_from(attempt).map_err(|e| ConfigError::Invalid {
                    key: ENV_COMPLETE_FROM_ATTEMPT,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?)
            };
        }
        if let Some(raw) = var(ENV_LOG_FORMAT) {
            config.log_format = raw.parse().map_err(|reason| ConfigError::Invalid {
                key: ENV_LOG_FORMAT,
                value: raw.clone(),
                reason,
            })?;
        }

        Ok(config)
    }

    /// Backend settings, or an error naming the missing variable.
    pub fn require_backend(&self) -> Result<&BackendConfig, ConfigError> {
        self.backend.as_ref().ok_or(ConfigError::Missing(ENV_BACKEND_URL))
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
