/*!
 * Buffers Configuration
 *
 * Process-wide defaults for allocation retries, brute force and the locator
 * mapping directory. Loaded from the environment once, or from JSON.
 */

use super::errors::{BufferError, BufferResult};
use super::limits::{
    DEFAULT_MAPPING_DIR, DEFAULT_RETRY_COUNT, ENV_BRUTE_FORCE, ENV_MAPPING_DIR, ENV_RETRY_COUNT,
};
use super::sync::SpinConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::warn;

/// Buffers configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffersConfig {
    /// Full free-region rescans before an allocation gives up
    pub retry_count: u32,
    /// Fall back to a stride scan when no free region works (Windows only)
    pub brute_force: bool,
    /// Backoff tuning for header and item spin flags
    pub spin: SpinConfig,
    /// Directory of the file-backed locator mappings (unix only)
    pub mapping_dir: PathBuf,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            brute_force: true,
            spin: SpinConfig::default(),
            mapping_dir: PathBuf::from(DEFAULT_MAPPING_DIR),
        }
    }
}

static GLOBAL_CONFIG: LazyLock<BuffersConfig> = LazyLock::new(|| {
    BuffersConfig::from_env().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring invalid buffers configuration, using defaults");
        BuffersConfig::default()
    })
});

impl BuffersConfig {
    /// Process-wide configuration, read from the environment on first use
    pub fn global() -> &'static BuffersConfig {
        &GLOBAL_CONFIG
    }

    /// Defaults overridden by `NEARBY_BUFFERS_*` environment variables
    pub fn from_env() -> BufferResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_json_str(json: &str) -> BufferResult<Self> {
        serde_json::from_str(json).map_err(|e| BufferError::Configuration(e.to_string()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BufferResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_RETRY_COUNT) {
            config.retry_count = raw.trim().parse().map_err(|_| {
                BufferError::Configuration(format!("{ENV_RETRY_COUNT}={raw} is not a count"))
            })?;
        }

        if let Some(raw) = lookup(ENV_BRUTE_FORCE) {
            config.brute_force = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(BufferError::Configuration(format!(
                        "{ENV_BRUTE_FORCE}={raw} is not a boolean"
                    )))
                }
            };
        }

        if let Some(raw) = lookup(ENV_MAPPING_DIR) {
            if raw.trim().is_empty() {
                return Err(BufferError::Configuration(format!(
                    "{ENV_MAPPING_DIR} must not be empty"
                )));
            }
            config.mapping_dir = PathBuf::from(raw);
        }

        Ok(config)
    }
}
