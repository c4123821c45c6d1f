// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Archive control client integration trait.
//!
//! Defines what the merge needs from an established archive control session:
//! non-blocking request submission (position queries, replay start/stop) and
//! non-blocking polling of control responses. Wire encoding and the control
//! transport live behind this trait.
//!
//! Every `request_*` method returns whether the request was *accepted* for
//! sending. `false` means the outbound buffer was full; nothing was sent and the
//! caller retries on a later duty cycle.
//!
//! # Example
//!
//! ```rust,no_run
//! use replay_merge::archive::{ArchiveClient, ControlResponse, ReplayRequest};
//!
//! struct MyArchive { next_id: i64 }
//!
//! impl ArchiveClient for MyArchive {
//!     fn control_session_id(&self) -> i64 { 1 }
//!     fn next_correlation_id(&mut self) -> i64 { self.next_id += 1; self.next_id }
//!     fn request_recording_position(&mut self, _: i64, _: i64, _: i64) -> bool { true }
//!     fn request_stop_position(&mut self, _: i64, _: i64, _: i64) -> bool { true }
//!     fn request_replay(&mut self, _: &ReplayRequest, _: i64, _: i64) -> bool { true }
//!     fn request_stop_replay(&mut self, _: i64, _: i64, _: i64) -> bool { true }
//!     fn poll_response(&mut self) -> Option<ControlResponse> { None }
//!     fn is_closed(&self) -> bool { false }
//! }
//! ```

/// Position reported by the archive when a recording is still live and has
/// no stop position yet.
pub const NULL_POSITION: i64 = -1;

/// Replay length meaning "follow the recording, no bound".
pub const REPLAY_LENGTH_UNBOUNDED: i64 = i64::MAX;

/// Convert a wire position into a known position.
pub fn known_position(position: i64) -> Option<i64> {
    (position != NULL_POSITION).then_some(position)
}

/// Outcome code of a control response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    /// Request succeeded; `relevant_id` carries the result.
    Ok,
    /// Request failed; `relevant_id` carries the error code.
    Error,
}

impl ResponseCode {
    /// Check if this response reports a failure.
    pub fn is_error(self) -> bool {
        matches!(self, ResponseCode::Error)
    }
}

/// A fully assembled control response from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    /// Control session the response belongs to.
    pub control_session_id: i64,
    /// Correlation id of the request being answered.
    pub correlation_id: i64,
    /// Result value: a position, a replay session id, or an error code.
    pub relevant_id: i64,
    /// Outcome code.
    pub code: ResponseCode,
    /// Error detail (empty on success).
    pub error_message: String,
}

impl ControlResponse {
    /// A successful response carrying `relevant_id`.
    pub fn ok(control_session_id: i64, correlation_id: i64, relevant_id: i64) -> Self {
        Self {
            control_session_id,
            correlation_id,
            relevant_id,
            code: ResponseCode::Ok,
            error_message: String::new(),
        }
    }

    /// An error response carrying the remote error `code`.
    pub fn error(
        control_session_id: i64,
        correlation_id: i64,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            control_session_id,
            correlation_id,
            relevant_id: i64::from(code),
            code: ResponseCode::Error,
            error_message: message.into(),
        }
    }
}

/// Parameters of a replay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
    pub recording_id: i64,
    /// Position to start replaying from.
    pub position: i64,
    /// Bytes to replay; [`REPLAY_LENGTH_UNBOUNDED`] follows a live recording.
    pub length: i64,
    /// Replay channel URI, already carrying `linger` and `eos` parameters.
    pub channel: String,
    pub stream_id: i32,
}

/// Trait defining what we need from the archive control session.
///
/// Implementations must never block.
pub trait ArchiveClient {
    /// Identity of the established control session.
    fn control_session_id(&self) -> i64;

    /// Issue a fresh correlation id.
    fn next_correlation_id(&mut self) -> i64;

    /// Ask for the current recorded position of an active recording.
    ///
    /// The response carries [`NULL_POSITION`] if the recording is not active.
    fn request_recording_position(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool;

    /// Ask for the stop position of a recording.
    fn request_stop_position(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool;

    /// Start a replay. The response carries the replay session id.
    fn request_replay(
        &mut self,
        request: &ReplayRequest,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool;

    /// Stop a replay session.
    fn request_stop_replay(
        &mut self,
        replay_session_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool;

    /// Poll the control response stream once.
    ///
    /// Returns a response only once it has fully arrived. Responses for other
    /// sessions or correlation ids may be returned; the merge drops them.
    ///
    /// A returned response is consumed. Clients whose control session is
    /// shared with other requesters must demultiplex by correlation id before
    /// handing responses to a merge.
    fn poll_response(&mut self) -> Option<ControlResponse>;

    /// Whether the underlying client has been closed.
    ///
    /// Teardown skips all cleanup when this is `true`.
    fn is_closed(&self) -> bool;
}

/// Callers that keep ownership of their client lend it to the merge.
impl<T: ArchiveClient + ?Sized> ArchiveClient for &mut T {
    fn control_session_id(&self) -> i64 {
        (**self).control_session_id()
    }

    fn next_correlation_id(&mut self) -> i64 {
        (**self).next_correlation_id()
    }

    fn request_recording_position(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool {
        (**self).request_recording_position(recording_id, correlation_id, control_session_id)
    }

    fn request_stop_position(
        &mut self,
        recording_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool {
        (**self).request_stop_position(recording_id, correlation_id, control_session_id)
    }

    fn request_replay(
        &mut self,
        request: &ReplayRequest,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool {
        (**self).request_replay(request, correlation_id, control_session_id)
    }

    fn request_stop_replay(
        &mut self,
        replay_session_id: i64,
        correlation_id: i64,
        control_session_id: i64,
    ) -> bool {
        (**self).request_stop_replay(replay_session_id, correlation_id, control_session_id)
    }

    fn poll_response(&mut self) -> Option<ControlResponse> {
        (**self).poll_response()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
