// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Correlation-keyed request/response bridge.
//!
//! The merge keeps at most one request outstanding. A [`PendingRequest`]
//! records its correlation id and which leg it belongs to; [`poll_for_response`]
//! polls the archive once and hands back the response only when it matches
//! both our control session and that correlation id.

use crate::archive::{ArchiveClient, ControlResponse};
use crate::error::{MergeError, Result};
use std::fmt;
use tracing::trace;

/// Which archive request a correlation id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    RecordingPosition,
    StopPosition,
    Replay,
    StopReplay,
}

impl RequestKind {
    /// Label used in metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::RecordingPosition => "recording_position",
            RequestKind::StopPosition => "stop_position",
            RequestKind::Replay => "replay",
            RequestKind::StopReplay => "stop_replay",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub correlation_id: i64,
    pub kind: RequestKind,
}

/// Poll once for the response to `pending`.
///
/// Returns `Ok(None)` when nothing arrived or the response belongs to another
/// session or correlation id. Such a response is consumed and dropped.
/// An error-coded response for `pending` is a [`MergeError::Protocol`].
pub fn poll_for_response<A: ArchiveClient + ?Sized>(
    archive: &mut A,
    pending: &PendingRequest,
) -> Result<Option<ControlResponse>> {
    let Some(response) = archive.poll_response() else {
        return Ok(None);
    };

    if response.control_session_id != archive.control_session_id()
        || response.correlation_id != pending.correlation_id
    {
        trace!(
            correlation_id = response.correlation_id,
            control_session_id = response.control_session_id,
            expected = pending.correlation_id,
            "Skipping unrelated control response"
        );
        return Ok(None);
    }

    if response.code.is_error() {
        return Err(MergeError::protocol(
            pending.kind,
            pending.correlation_id,
            response.relevant_id as i32,
            response.error_message,
        ));
    }

    Ok(Some(response))
}
