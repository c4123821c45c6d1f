// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replay merge.
//!
//! Every fault is fatal to the merge that raised it. Nothing is retried
//! internally: the only "retry" is re-submitting a request on the next duty
//! cycle after the archive declined it for back pressure, and that is not an
//! error at all.
//!
//! # Error Categories
//!
//! | Error Type | Raised by | Description |
//! |------------|-----------|-------------|
//! | `Configuration` | `ReplayMerge::new` | Invalid construction input (e.g. wrong control mode) |
//! | `Protocol` | `do_work` | Archive answered our correlation id with an error code |
//! | `Stall` | `do_work`, `check_progress` | No progress within the merge progress timeout |
//! | `Transport` | `do_work` | Replay image closed unexpectedly, or a destination change failed |
//!
//! Teardown after a fault is the caller's job: call
//! [`ReplayMerge::close()`](crate::ReplayMerge::close) (or drop the merge).

use crate::bridge::RequestKind;
use crate::merge::MergeState;
use thiserror::Error;

/// Result type alias for replay merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Errors that abort a replay merge.
///
/// Each variant carries enough context (state, correlation id, remote error)
/// to tell which leg of the merge failed.
#[derive(Error, Debug)]
pub enum MergeError {
    /// Invalid construction input.
    ///
    /// Detected once, before any destination is touched. Not retryable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The archive rejected one of our requests.
    ///
    /// `code` is the remote error code, `request` names the leg
    /// (position query, replay start, ...).
    #[error("Archive error ({request}, correlation_id={correlation_id}, code={code}): {message}")]
    Protocol {
        request: RequestKind,
        correlation_id: i64,
        code: i32,
        message: String,
    },

    /// No observable progress within the configured timeout.
    #[error("Replay merge no progress: state={state}, timeout_ms={timeout_ms}")]
    Stall { state: MergeState, timeout_ms: u64 },

    /// The transport failed underneath the merge.
    #[error("Transport error ({state}): {message}")]
    Transport { state: MergeState, message: String },
}

impl MergeError {
    /// Create a protocol error for an error-coded archive response.
    pub fn protocol(
        request: RequestKind,
        correlation_id: i64,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::Protocol {
            request,
            correlation_id,
            code,
            message: message.into(),
        }
    }

    /// Create a transport error raised while in `state`.
    pub fn transport(state: MergeState, message: impl Into<String>) -> Self {
        Self::Transport {
            state,
            message: message.into(),
        }
    }

    /// Short label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Protocol { .. } => "protocol",
            Self::Stall { .. } => "stall",
            Self::Transport { .. } => "transport",
        }
    }

    /// The merge state the fault was raised in, when known.
    pub fn state(&self) -> Option<MergeState> {
        match self {
            Self::Stall { state, .. } | Self::Transport { state, .. } => Some(*state),
            Self::Configuration(_) | Self::Protocol { .. } => None,
        }
    }

    /// Remote error code carried by a protocol error.
    pub fn error_code(&self) -> Option<i32> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_formatting() {
        let err = MergeError::protocol(RequestKind::Replay, 17, 5, "unknown recording");
        let msg = err.to_string();
        assert!(msg.contains("Archive error"));
        assert!(msg.contains("correlation_id=17"));
        assert!(msg.contains("code=5"));
        assert!(msg.contains("unknown recording"));
        assert!(msg.contains("replay"));
        assert_eq!(err.error_code(), Some(5));
        assert_eq!(err.kind(), "protocol");
        assert_eq!(err.state(), None);
    }

    #[test]
    fn test_stall_error_names_state() {
        let err = MergeError::Stall {
            state: MergeState::Catchup,
            timeout_ms: 5000,
        };
        assert!(err.to_string().contains("CATCHUP"));
        assert!(err.to_string().contains("5000"));
        assert_eq!(err.state(), Some(MergeState::Catchup));
        assert_eq!(err.kind(), "stall");
        assert_eq!(err.error_code(), None);
    }

    #[test]
    fn test_transport_error() {
        let err = MergeError::transport(MergeState::AttemptLiveJoin, "image closed");
        assert!(err.to_string().contains("ATTEMPT_LIVE_JOIN"));
        assert!(err.to_string().contains("image closed"));
        assert_eq!(err.kind(), "transport");
        assert_eq!(err.state(), Some(MergeState::AttemptLiveJoin));
    }

    #[test]
    fn test_configuration_error() {
        let err = MergeError::Configuration("control-mode must be manual".to_string());
        assert!(err.to_string().starts_with("Configuration error"));
        assert_eq!(err.kind(), "configuration");
    }
}
