use std::time::Duration;

use crate::env::EnvSource;
use crate::error::ClientError;

/// Environment variables the client depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// File upload webhook.
    Upload,
    /// Combined submit/poll endpoint for extraction and classification.
    ColoracaoSimplificado,
    Username,
    Password,
    /// Basic-auth secret paired with the username.
    Token,
}

impl Endpoint {
    /// Validation order.
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Upload,
        Endpoint::ColoracaoSimplificado,
        Endpoint::Username,
        Endpoint::Password,
        Endpoint::Token,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Upload => "VITE_N8N_UPLOAD_URL",
            Self::ColoracaoSimplificado => "VITE_COLORACAO_SIMPLIFICADO_URL",
            Self::Username => "VITE_USERNAME",
            Self::Password => "VITE_PASSWORD",
            Self::Token => "VITE_TOKEN",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Upload => "Upload files via n8n workflow",
            Self::ColoracaoSimplificado => {
                "Submit image for simplified coloracao analysis and poll results"
            }
            Self::Username => "Application username for login",
            Self::Password => "Application password for login",
            Self::Token => "Basic-auth secret for API requests",
        }
    }

    pub fn required(self) -> bool {
        !matches!(self, Self::Upload)
    }
}

/// Poll loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Non-terminal replies tolerated before giving up.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub delay_increment: Duration,
    /// Retries that keep `initial_delay` before the increment kicks in.
    pub hold_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            initial_delay: Duration::from_millis(5_000),
            max_delay: Duration::from_millis(15_000),
            delay_increment: Duration::from_millis(5_000),
            hold_attempts: 6,
        }
    }
}

impl PollingConfig {
    /// Delay to use after retry number `attempt` (0-based) slept `current`.
    ///
    /// The delay holds for the first `hold_attempts` retries, then grows by
    /// `delay_increment` per retry, capped at `max_delay`.
    pub fn next_delay(&self, current: Duration, attempt: u32) -> Duration {
        if attempt >= self.hold_attempts {
            (current + self.delay_increment).min(self.max_delay)
        } else {
            current
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Bounds one whole submit + poll workflow.
    pub default: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(180),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub max_file_size: u64,
    /// Longest edge after compression, in pixels.
    pub max_dimension: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
    pub request_timeout: Duration,
    /// Interval between checks when the upload reply only carries a job id.
    pub url_poll_interval: Duration,
    pub url_poll_max_attempts: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            max_dimension: 1200,
            quality: 80,
            request_timeout: Duration::from_secs(60),
            url_poll_interval: Duration::from_secs(2),
            url_poll_max_attempts: 30,
        }
    }
}

/// Client tuning. Endpoint URLs are resolved per call through
/// [`api_url`] so a changed environment is picked up immediately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiConfig {
    pub timeouts: Timeouts,
    pub polling: PollingConfig,
    pub upload: UploadConfig,
}

impl ApiConfig {
    /// Defaults with optional environment overrides.
    ///
    /// | Env Var                             | Default  |
    /// |-------------------------------------|----------|
    /// | `COLORACAO_POLL_MAX_ATTEMPTS`       | `60`     |
    /// | `COLORACAO_POLL_INITIAL_DELAY_MS`   | `5000`   |
    /// | `COLORACAO_POLL_MAX_DELAY_MS`       | `15000`  |
    /// | `COLORACAO_POLL_DELAY_INCREMENT_MS` | `5000`   |
    /// | `COLORACAO_TIMEOUT_SECS`            | `180`    |
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ClientError> {
        let mut config = Self::default();

        if let Some(v) = parse_var::<u32>(env, "COLORACAO_POLL_MAX_ATTEMPTS")? {
            config.polling.max_attempts = v;
        }
        if let Some(v) = parse_var::<u64>(env, "COLORACAO_POLL_INITIAL_DELAY_MS")? {
            config.polling.initial_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64>(env, "COLORACAO_POLL_MAX_DELAY_MS")? {
            config.polling.max_delay = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64>(env, "COLORACAO_POLL_DELAY_INCREMENT_MS")? {
            config.polling.delay_increment = Duration::from_millis(v);
        }
        if let Some(v) = parse_var::<u64>(env, "COLORACAO_TIMEOUT_SECS")? {
            config.timeouts.default = Duration::from_secs(v);
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(env: &dyn EnvSource, key: &str) -> Result<Option<T>, ClientError> {
    match env.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientError::InvalidSetting {
                key: key.to_string(),
                value: raw,
            }),
    }
}

/// Outcome of [`validate_configuration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidation {
    pub valid: bool,
    /// `"<KEY> - <description>"` for each required variable that is unset.
    pub missing: Vec<String>,
}

/// Check every required variable is set.
pub fn validate_configuration(env: &dyn EnvSource) -> ConfigValidation {
    let missing: Vec<String> = Endpoint::ALL
        .iter()
        .filter(|e| e.required() && env.get(e.key()).is_none())
        .map(|e| format!("{} - {}", e.key(), e.description()))
        .collect();
    ConfigValidation {
        valid: missing.is_empty(),
        missing,
    }
}

/// URL (or value) configured for `endpoint`.
pub fn api_url(env: &dyn EnvSource, endpoint: Endpoint) -> Result<String, ClientError> {
    env.get(endpoint.key())
        .ok_or_else(|| ClientError::Config(endpoint.key().to_string()))
}
