use serde::{Deserialize, Serialize};

/// External classifier settings. Everything is passed in explicitly; nothing
/// is read from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Cached single-loop opinions; 0 disables the cache.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_batch_size() -> usize {
    50
}
fn default_cache_size() -> usize {
    256
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_timeout_ms(),
            batch_size: default_batch_size(),
            cache_size: default_cache_size(),
            model: None,
            endpoint: None,
            api_key: None,
        }
    }
}

impl ClassifierConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }
}
