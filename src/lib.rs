//! # Replay Merge
//!
//! Joins a subscriber to an in-progress stream whose backlog is longer than the
//! live transport retains: replay the recording from the archive, catch up,
//! then move onto the live stream with no gap and no duplicate delivery.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                               ReplayMerge                                │
//! │                                                                          │
//! │  ┌────────────────┐   request/poll   ┌──────────────────────────────┐    │
//! │  │ State machine  │◄────────────────►│ ArchiveClient (control sess.)│    │
//! │  │ + MergePolicy  │  (one in flight) │ position / replay / stop     │    │
//! │  └────────────────┘                  └──────────────────────────────┘    │
//! │         │                                                                │
//! │         │ add/remove destination, image position                         │
//! │         ▼                                                                │
//! │  ┌───────────────────────────────────────────┐   ┌───────────────────┐   │
//! │  │ Subscription (manual multi-destination)   │   │ ProgressTracker   │   │
//! │  │  replay destination ─┐                    │   │ (stall timeout)   │   │
//! │  │  live destination  ──┴──► Image           │   └───────────────────┘   │
//! │  └───────────────────────────────────────────┘                           │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Duty Cycle
//!
//! The caller drives [`ReplayMerge::do_work()`] from its own loop; nothing
//! blocks and no threads are spawned. Each call returns units of work done so
//! the caller can idle. [`driver::drive_to_merged`] is a ready-made tokio loop.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replay_merge::{MergeConfig, MergeParams, ReplayMerge};
//!
//! let config = MergeConfig::default();
//! let params = MergeParams::new(replay_channel, replay_destination, live_destination, recording_id, 0);
//! let mut merge = ReplayMerge::new(&mut subscription, &mut archive, params, &config, now_ms())?;
//!
//! while !merge.is_merged() {
//!     let fragments = merge.poll(now_ms(), |buffer| consume(buffer), 10)?;
//!     // idle if fragments == 0 ...
//! }
//! ```

pub mod archive;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod merge;
pub mod metrics;
pub mod progress;
pub mod transport;

// Re-exports for convenience
pub use archive::{ArchiveClient, ControlResponse, ReplayRequest, ResponseCode, NULL_POSITION};
pub use config::{IdleConfig, MergeConfig, MergeParams};
pub use driver::{drive_to_merged, BackoffIdle, DriveOutcome};
pub use error::{MergeError, Result};
pub use merge::{LiveJoinDecision, MergePolicy, MergeState, ReplayMerge};
pub use transport::{Image, Subscription, TransportError};
