// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Merge state types.
//!
//! # State Transitions
//!
//! ```text
//! GetRecordingPosition ──→ Replay ──→ Catchup ──→ AttemptLiveJoin ──→ StopReplay ──→ Merged
//!                                        ↑               │                              │
//!                                        └───────────────┘                              │
//!                                     (target advanced)                                 │
//!                                                                                       ↓
//!            (any state) ─────────────────── close() ─────────────────────────────→ Closed
//! ```
//!
//! # State Descriptions
//!
//! - **GetRecordingPosition**: Asking the archive where the recording ends (or stopped).
//! - **Replay**: Asking the archive to replay from the start position.
//! - **Catchup**: Replay image is consuming the backlog up to the last known target.
//! - **AttemptLiveJoin**: Caught up; re-querying the target and applying the merge policy.
//! - **StopReplay**: Live path confirmed, replay destination removed; stopping the replay session.
//! - **Merged**: Consumer is on the live path only.
//! - **Closed**: Torn down. Terminal.

/// State of a replay merge.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeState {
    /// Querying the recording (or stop) position to learn the first target.
    GetRecordingPosition,

    /// Requesting an unbounded replay from the start position.
    Replay,

    /// Replay session active, waiting for the image to reach the target.
    Catchup,

    /// Caught up with the last known target; deciding whether to join live.
    AttemptLiveJoin,

    /// Replay destination removed; stop-replay pending submission.
    StopReplay,

    /// Merge complete. The image is now fed by the live destination.
    Merged,

    /// Torn down.
    ///
    /// Reached exactly once, from any state, through
    /// [`close()`](super::ReplayMerge::close).
    Closed,
}

impl MergeState {
    /// Whether the merge is still working towards `Merged`.
    ///
    /// Stall supervision only applies to active states.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Merged | Self::Closed)
    }

    /// Numeric encoding for the state gauge.
    pub fn as_gauge_value(self) -> f64 {
        match self {
            Self::GetRecordingPosition => 0.0,
            Self::Replay => 1.0,
            Self::Catchup => 2.0,
            Self::AttemptLiveJoin => 3.0,
            Self::StopReplay => 4.0,
            Self::Merged => 5.0,
            Self::Closed => 6.0,
        }
    }
}

impl std::fmt::Display for MergeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeState::GetRecordingPosition => write!(f, "GET_RECORDING_POSITION"),
            MergeState::Replay => write!(f, "REPLAY"),
            MergeState::Catchup => write!(f, "CATCHUP"),
            MergeState::AttemptLiveJoin => write!(f, "ATTEMPT_LIVE_JOIN"),
            MergeState::StopReplay => write!(f, "STOP_REPLAY"),
            MergeState::Merged => write!(f, "MERGED"),
            MergeState::Closed => write!(f, "CLOSED"),
        }
    }
}
