use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5555";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_LOG_POLL_INTERVAL_MS: u64 = 3_000;
pub const CONFIG_SAVE_DEBOUNCE_MS: u64 = 500;

pub const DEFAULT_SOURCE_LANGUAGE: &str = "中文";
pub const DEFAULT_TARGET_LANGUAGE: &str = "英语";
pub const DEFAULT_TTS_MODEL: &str = "speech-2.5-hd-preview";
pub const DEFAULT_SPLIT_MODE: &str = "平衡模式";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Configuration not loaded yet")]
    NotLoaded,

    #[error(transparent)]
    Gateway(#[from] crate::gateway::GatewayError),
}

/// Client-local settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub poll_interval: Duration,
    pub log_poll_interval: Duration,
    pub save_debounce: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            accept_invalid_certs: false,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            log_poll_interval: Duration::from_millis(DEFAULT_LOG_POLL_INTERVAL_MS),
            save_debounce: Duration::from_millis(CONFIG_SAVE_DEBOUNCE_MS),
        }
    }
}

impl ClientSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let server_url = env::var("DESK_SERVER_URL")
            .ok()
            .map(|url| normalize_server_url(&url))
            .unwrap_or(defaults.server_url);

        let settings = Self {
            server_url,
            request_timeout: env_secs("DESK_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
            upload_timeout: env_secs("DESK_UPLOAD_TIMEOUT_SECS").unwrap_or(defaults.upload_timeout),
            accept_invalid_certs: env::var("DESK_ACCEPT_INVALID_CERTS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.accept_invalid_certs),
            poll_interval: env_millis("DESK_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            log_poll_interval: env_millis("DESK_LOG_POLL_INTERVAL_MS")
                .unwrap_or(defaults.log_poll_interval),
            save_debounce: defaults.save_debounce,
        };

        tracing::info!(
            "Client settings: server={}, request_timeout={}s, upload_timeout={}s",
            settings.server_url,
            settings.request_timeout.as_secs(),
            settings.upload_timeout.as_secs()
        );

        settings
    }

    pub fn with_server_url(mut self, url: &str) -> Self {
        self.server_url = normalize_server_url(url);
        self
    }
}

pub fn normalize_server_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_SERVER_URL.to_string()
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_secs(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_secs)
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .map(Duration::from_millis)
}

/// Translation parameters stored on the server (`/api/config`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_endpoint: String,
    pub group_id: String,
    pub api_key: String,
    pub source_language: String,
    pub target_language: String,
    pub llm_model: String,
    pub asr_model: String,
    pub tts_model: String,
    pub asr_split_mode: String,
    pub min_segment_duration: f64,
    pub max_segment_duration: f64,
    pub silence_threshold: f64,
    pub enable_voice_extraction: bool,
    pub supported_languages: Vec<String>,
    pub tts_models: Vec<String>,
    pub asr_split_modes: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_endpoint: String::new(),
            group_id: String::new(),
            api_key: String::new(),
            source_language: DEFAULT_SOURCE_LANGUAGE.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            llm_model: String::new(),
            asr_model: String::new(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            asr_split_mode: DEFAULT_SPLIT_MODE.to_string(),
            min_segment_duration: 1.5,
            max_segment_duration: 8.0,
            silence_threshold: 0.3,
            enable_voice_extraction: true,
            supported_languages: Vec::new(),
            tts_models: Vec::new(),
            asr_split_modes: Vec::new(),
        }
    }
}

/// Keys that hold option lists rather than user settings
const READ_ONLY_KEYS: [&str; 3] = ["supported_languages", "tts_models", "asr_split_modes"];

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_id.trim().is_empty() || self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "group_id and api_key must not be empty".to_string(),
            ));
        }

        if !self.supported_languages.is_empty()
            && !self.supported_languages.contains(&self.target_language)
        {
            return Err(ConfigError::Invalid(format!(
                "unsupported target language '{}'",
                self.target_language
            )));
        }

        if !self.tts_models.is_empty() && !self.tts_models.contains(&self.tts_model) {
            return Err(ConfigError::Invalid(format!(
                "unsupported TTS model '{}'",
                self.tts_model
            )));
        }

        if !self.asr_split_modes.is_empty() && !self.asr_split_modes.contains(&self.asr_split_mode)
        {
            return Err(ConfigError::Invalid(format!(
                "unsupported split mode '{}'",
                self.asr_split_mode
            )));
        }

        let (min, max) = (self.min_segment_duration, self.max_segment_duration);
        if !(1.0 <= min && min <= max && max <= 10.0) {
            return Err(ConfigError::Invalid(format!(
                "segment duration bounds {:.1}..{:.1} must satisfy 1.0 <= min <= max <= 10.0",
                min, max
            )));
        }

        Ok(())
    }

    /// Sets one user-facing field from CLI text. Numbers and booleans are
    /// parsed as JSON, anything else is taken as a string.
    pub fn set_field(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let key = key.trim();
        if READ_ONLY_KEYS.contains(&key) {
            return Err(ConfigError::Invalid(format!("'{}' is read-only", key)));
        }

        let mut object = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => return Err(ConfigError::Invalid("config is not an object".to_string())),
        };

        let current = object
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let value = match current {
            Value::String(_) => Value::String(raw.trim().to_string()),
            _ => serde_json::from_str(raw.trim())
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", key, e)))?,
        };
        object.insert(key.to_string(), value);

        *self = serde_json::from_value(Value::Object(object))
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", key, e)))?;
        Ok(())
    }

    /// Copy safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api_key = mask_api_key(&self.api_key);
        copy
    }
}

pub fn mask_api_key(api_key: &str) -> String {
    if api_key.is_empty() {
        return String::new();
    }
    if api_key.len() <= 10 || !api_key.is_char_boundary(6) {
        return "******".to_string();
    }

    let prefix = &api_key[..6];
    let suffix_start = api_key.len().saturating_sub(4);
    if !api_key.is_char_boundary(suffix_start) {
        return format!("{}********", prefix);
    }
    format!("{}********{}", prefix, &api_key[suffix_start..])
}
