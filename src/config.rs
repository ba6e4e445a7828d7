use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    highlight::schedule::ScheduleSettings,
    semantic::{index::GroupLimits, DEFAULT_CHUNK_SIZE, DEFAULT_THRESHOLD, MAX_CONTENT_LENGTH},
    storage::{self, StorageManager},
};

const CONFIG_KEY: &str = "config.yaml";

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8585";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid utf8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("config is malformed: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Remote index service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Never contact the remote service
    #[serde(default)]
    pub local_only: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for the availability probe
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            local_only: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            health_timeout_secs: DEFAULT_HEALTH_TIMEOUT_SECS,
        }
    }
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_health_timeout_secs() -> u64 {
    DEFAULT_HEALTH_TIMEOUT_SECS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Extracted page text is cut at this many characters
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// URLs containing any of these fragments are never captured
    #[serde(default = "default_excluded_domains")]
    pub excluded_domains: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_content_chars: MAX_CONTENT_LENGTH,
            excluded_domains: default_excluded_domains(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_content_chars() -> usize {
    MAX_CONTENT_LENGTH
}

fn default_excluded_domains() -> Vec<String> {
    [
        "mail.google.com",
        "web.whatsapp.com",
        "accounts.google.com",
        "login.",
        "signin.",
        "auth.",
        "localhost:8000",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Local-mode similarity threshold (exclusive)
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Neighbours requested from the remote index
    #[serde(default = "default_remote_k")]
    pub remote_k: usize,

    #[serde(default = "default_max_matches")]
    pub max_matches: usize,

    #[serde(default = "default_max_groups")]
    pub max_groups: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            remote_k: default_remote_k(),
            max_matches: default_max_matches(),
            max_groups: default_max_groups(),
        }
    }
}

impl SearchConfig {
    pub fn limits(&self) -> GroupLimits {
        GroupLimits {
            max_matches: self.max_matches,
            max_groups: self.max_groups,
        }
    }
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_remote_k() -> usize {
    50
}

fn default_max_matches() -> usize {
    GroupLimits::default().max_matches
}

fn default_max_groups() -> usize {
    GroupLimits::default().max_groups
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HighlightConfig {
    /// Generic words ignored by snippet highlighting
    #[serde(default = "default_stoplist")]
    pub stoplist: Vec<String>,

    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,

    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,

    #[serde(default = "default_send_retry_ms")]
    pub send_retry_ms: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            stoplist: default_stoplist(),
            load_timeout_ms: default_load_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            ready_poll_ms: default_ready_poll_ms(),
            send_attempts: default_send_attempts(),
            send_retry_ms: default_send_retry_ms(),
        }
    }
}

impl HighlightConfig {
    pub fn schedule(&self) -> ScheduleSettings {
        ScheduleSettings {
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            ready_timeout: Duration::from_millis(self.ready_timeout_ms),
            ready_poll_interval: Duration::from_millis(self.ready_poll_ms),
            send_attempts: self.send_attempts,
            send_retry_delay: Duration::from_millis(self.send_retry_ms),
        }
    }
}

/// Only words of at least five characters are ever matched.
fn default_stoplist() -> Vec<String> {
    ["india", "women", "national", "cricket"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_load_timeout_ms() -> u64 {
    20_000
}

fn default_settle_delay_ms() -> u64 {
    1_000
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_ready_poll_ms() -> u64 {
    500
}

fn default_send_attempts() -> u32 {
    3
}

fn default_send_retry_ms() -> u64 {
    500
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.backend.url).is_err() {
            return Err(invalid("backend.url", format!("not a url: {}", self.backend.url)));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(invalid("backend.request_timeout_secs", "must be greater than 0"));
        }

        if self.backend.health_timeout_secs == 0 {
            return Err(invalid("backend.health_timeout_secs", "must be greater than 0"));
        }

        if self.capture.chunk_size == 0 {
            return Err(invalid("capture.chunk_size", "must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.search.threshold) {
            return Err(invalid(
                "search.threshold",
                format!("must be between 0.0 and 1.0, got {}", self.search.threshold),
            ));
        }

        if self.search.max_groups == 0 || self.search.max_matches == 0 || self.search.remote_k == 0 {
            return Err(invalid("search", "limits must be greater than 0"));
        }

        if self.highlight.send_attempts == 0 {
            return Err(invalid("highlight.send_attempts", "must be greater than 0"));
        }

        if self.highlight.ready_poll_ms == 0 {
            return Err(invalid("highlight.ready_poll_ms", "must be greater than 0"));
        }

        if self.server.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(invalid(
                "server.listen",
                format!("not a socket address: {}", self.server.listen),
            ));
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if absent.
    pub fn load_with(base_path: &str) -> Result<Self, ConfigError> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_KEY) {
            store.write(CONFIG_KEY, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = String::from_utf8(store.read(CONFIG_KEY)?)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_string();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            log::info!("upgrading {CONFIG_KEY} in {base_path}");
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_KEY, config_str.as_bytes())?;
        Ok(())
    }

    #[cfg(test)]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}
