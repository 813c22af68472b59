/*!
 * Spin Configuration
 *
 * Tuning for the in-memory spin flags guarding locator headers and items
 */

use crate::core::limits::{DEFAULT_BACKOFF_LIMIT, DEFAULT_MAX_SPINS};
use serde::{Deserialize, Serialize};

/// Spin lock backoff configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinConfig {
    /// Backoff rounds before a waiter yields its time slice between attempts
    pub max_spins: u32,
    /// Maximum `spin_loop` hints issued per round
    pub backoff_limit: u32,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            max_spins: DEFAULT_MAX_SPINS,
            backoff_limit: DEFAULT_BACKOFF_LIMIT,
        }
    }
}

impl SpinConfig {
    /// Configuration for contended locks held only for a few instructions
    pub const fn low_latency() -> Self {
        Self {
            max_spins: 512,
            backoff_limit: 1024,
        }
    }

    /// Configuration that yields almost immediately
    pub const fn cooperative() -> Self {
        Self {
            max_spins: 4,
            backoff_limit: 16,
        }
    }
}
