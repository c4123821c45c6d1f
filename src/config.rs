//! Configuration for the replay merge.
//!
//! Configuration is passed to [`ReplayMerge::new()`](crate::ReplayMerge::new)
//! and can be constructed programmatically or deserialized from YAML/JSON.
//! Loading it from disk is the caller's business.
//!
//! # Quick Start
//!
//! ```rust
//! use replay_merge::config::{MergeConfig, MergeParams};
//!
//! let config = MergeConfig {
//!     merge_progress_timeout_ms: 10_000,
//!     ..Default::default()
//! };
//! let params = MergeParams::new(
//!     "aeron:udp?endpoint=localhost:0",
//!     "aeron:udp?endpoint=localhost:40457",
//!     "aeron:udp?endpoint=localhost:40456|control=localhost:40455",
//!     7,
//!     0,
//! );
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! MergeConfig
//! ├── merge_progress_timeout_ms: u64   # Stall timeout
//! ├── policy: MergePolicy              # Live-join thresholds
//! │   ├── live_add_max_window
//! │   ├── replay_remove_threshold
//! │   └── min_overlap_transports
//! └── idle: IdleConfig                 # Async driver backoff
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! merge_progress_timeout_ms: 5000
//! policy:
//!   live_add_max_window: 33554432
//!   replay_remove_threshold: 0
//! idle:
//!   max_spins: 10
//!   initial_idle_ms: 1
//!   max_idle_ms: 100
//! ```

use crate::error::{MergeError, Result};
use crate::merge::MergePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// MergeConfig: tunables shared by every merge
// ═══════════════════════════════════════════════════════════════════════════════

/// Tunables for a replay merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Abort the merge if no progress is observed for this long (ms).
    #[serde(default = "default_merge_progress_timeout_ms")]
    pub merge_progress_timeout_ms: u64,

    /// Live-join thresholds.
    #[serde(default)]
    pub policy: MergePolicy,

    /// Idle strategy for the async driver.
    #[serde(default)]
    pub idle: IdleConfig,
}

/// Replay and live must both feed the image before replay is dropped.
const MIN_OVERLAP_TRANSPORTS: usize = 2;

fn default_merge_progress_timeout_ms() -> u64 {
    5000 // 5 seconds
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_progress_timeout_ms: default_merge_progress_timeout_ms(),
            policy: MergePolicy::default(),
            idle: IdleConfig::default(),
        }
    }
}

impl MergeConfig {
    /// Create a config for testing: short timeout, small merge window.
    pub fn for_testing() -> Self {
        Self {
            merge_progress_timeout_ms: 1000,
            policy: MergePolicy {
                live_add_max_window: 1024 * 1024,
                ..MergePolicy::default()
            },
            idle: IdleConfig {
                max_spins: 0,
                initial_idle_ms: 1,
                max_idle_ms: 1,
                backoff_factor: 1.0,
            },
        }
    }

    /// The stall timeout as a Duration.
    pub fn merge_progress_timeout(&self) -> Duration {
        Duration::from_millis(self.merge_progress_timeout_ms)
    }

    /// Reject values the merge cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.merge_progress_timeout_ms == 0 {
            return Err(MergeError::Configuration(
                "merge_progress_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.policy.live_add_max_window < 0 {
            return Err(MergeError::Configuration(format!(
                "live_add_max_window must not be negative: {}",
                self.policy.live_add_max_window
            )));
        }
        if self.policy.replay_remove_threshold < 0 {
            return Err(MergeError::Configuration(format!(
                "replay_remove_threshold must not be negative: {}",
                self.policy.replay_remove_threshold
            )));
        }
        if self.policy.min_overlap_transports < MIN_OVERLAP_TRANSPORTS {
            return Err(MergeError::Configuration(format!(
                "min_overlap_transports must be at least {MIN_OVERLAP_TRANSPORTS}: {}",
                self.policy.min_overlap_transports
            )));
        }
        self.idle.validate()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MergeParams: what to merge
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-merge parameters: which recording, from where, over which channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeParams {
    /// Channel the archive replays to. `linger=0|eos=false` are added.
    pub replay_channel: String,

    /// Destination added to the subscription for the replay path.
    pub replay_destination: String,

    /// Destination added to the subscription for the live path.
    pub live_destination: String,

    /// Recording to replay.
    pub recording_id: i64,

    /// Position in the recording to start replaying from.
    #[serde(default)]
    pub start_position: i64,
}

impl MergeParams {
    pub fn new(
        replay_channel: impl Into<String>,
        replay_destination: impl Into<String>,
        live_destination: impl Into<String>,
        recording_id: i64,
        start_position: i64,
    ) -> Self {
        Self {
            replay_channel: replay_channel.into(),
            replay_destination: replay_destination.into(),
            live_destination: live_destination.into(),
            recording_id,
            start_position,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IdleConfig: duty-cycle backoff for the async driver
// ═══════════════════════════════════════════════════════════════════════════════

/// Backoff applied by the async driver when a duty cycle did no work.
///
/// After `max_spins` idle cycles that only yield, the driver sleeps, starting
/// at `initial_idle_ms` and multiplying by `backoff_factor` up to `max_idle_ms`.
/// Any work resets the backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleConfig {
    #[serde(default = "default_max_spins")]
    pub max_spins: u32,

    #[serde(default = "default_initial_idle_ms")]
    pub initial_idle_ms: u64,

    #[serde(default = "default_max_idle_ms")]
    pub max_idle_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_spins() -> u32 {
    10
}

fn default_initial_idle_ms() -> u64 {
    1
}

fn default_max_idle_ms() -> u64 {
    100
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            max_spins: default_max_spins(),
            initial_idle_ms: default_initial_idle_ms(),
            max_idle_ms: default_max_idle_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl IdleConfig {
    /// Reject a backoff schedule the driver cannot follow.
    pub fn validate(&self) -> Result<()> {
        if self.initial_idle_ms > self.max_idle_ms {
            return Err(MergeError::Configuration(format!(
                "initial_idle_ms ({}) exceeds max_idle_ms ({})",
                self.initial_idle_ms, self.max_idle_ms
            )));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(MergeError::Configuration(format!(
                "backoff_factor must be finite and >= 1.0: {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}
