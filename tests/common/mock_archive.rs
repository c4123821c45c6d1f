// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mock ArchiveClient for testing.
//!
//! Records every request for assertions and lets tests script responses.
//! Clones share state, so a test keeps one handle while the merge owns another.

use replay_merge::archive::{ArchiveClient, ControlResponse, ReplayRequest};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

pub const CONTROL_SESSION_ID: i64 = 77;

/// A recorded archive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveCall {
    RecordingPosition { recording_id: i64, correlation_id: i64 },
    StopPosition { recording_id: i64, correlation_id: i64 },
    Replay { request: ReplayRequest, correlation_id: i64 },
    StopReplay { replay_session_id: i64, correlation_id: i64 },
}

impl ArchiveCall {
    pub fn correlation_id(&self) -> i64 {
        match self {
            ArchiveCall::RecordingPosition { correlation_id, .. }
            | ArchiveCall::StopPosition { correlation_id, .. }
            | ArchiveCall::Replay { correlation_id, .. }
            | ArchiveCall::StopReplay { correlation_id, .. } => *correlation_id,
        }
    }

    /// Whether the merge waits for a response to this request.
    pub fn expects_response(&self) -> bool {
        !matches!(self, ArchiveCall::StopReplay { .. })
    }
}

#[derive(Default)]
struct ArchiveState {
    next_correlation_id: i64,
    /// Reject this many submissions before accepting again.
    back_pressure: usize,
    calls: Vec<ArchiveCall>,
    rejected: usize,
    responses: VecDeque<ControlResponse>,
    answered: HashSet<i64>,
    /// Answers sent automatically, in order, as requests are accepted.
    scripted: VecDeque<i64>,
    closed: bool,
}

/// Mock implementation of ArchiveClient that records all calls.
///
/// # Example
/// ```rust,ignore
/// let archive = MockArchive::new();
/// let merge = ReplayMerge::new(subscription, archive.clone(), ...)?;
///
/// merge.do_work(0)?;                 // sends recording position request
/// archive.respond_ok(1000);          // answer it
/// merge.do_work(1)?;                 // consumes the answer
/// ```
#[derive(Clone, Default)]
pub struct MockArchive {
    state: Rc<RefCell<ArchiveState>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Answer the most recent request with success.
    pub fn respond_ok(&self, relevant_id: i64) {
        let correlation_id = self.last_call().expect("no request to answer").correlation_id();
        self.push_response(ControlResponse::ok(CONTROL_SESSION_ID, correlation_id, relevant_id));
    }

    /// Answer the most recent request with an error code.
    pub fn respond_error(&self, code: i32, message: &str) {
        let correlation_id = self.last_call().expect("no request to answer").correlation_id();
        self.push_response(ControlResponse::error(CONTROL_SESSION_ID, correlation_id, code, message));
    }

    /// Queue an arbitrary response (e.g. for another session).
    pub fn push_response(&self, response: ControlResponse) {
        let mut state = self.state.borrow_mut();
        if response.control_session_id == CONTROL_SESSION_ID {
            state.answered.insert(response.correlation_id);
        }
        state.responses.push_back(response);
    }

    /// Answer the next requests automatically with these relevant ids.
    pub fn script_responses(&self, relevant_ids: &[i64]) {
        self.state.borrow_mut().scripted.extend(relevant_ids.iter().copied());
    }

    /// Reject the next `n` submissions as back pressured.
    pub fn back_pressure(&self, n: usize) {
        self.state.borrow_mut().back_pressure = n;
    }

    /// Mark the client closed.
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn calls(&self) -> Vec<ArchiveCall> {
        self.state.borrow().calls.clone()
    }

    pub fn last_call(&self) -> Option<ArchiveCall> {
        self.state.borrow().calls.last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.state.borrow().rejected
    }

    pub fn stop_replay_calls(&self) -> Vec<ArchiveCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ArchiveCall::StopReplay { .. }))
            .collect()
    }

    /// Requests the merge is waiting on that have not been answered.
    pub fn unanswered_requests(&self) -> usize {
        let state = self.state.borrow();
        state
            .calls
            .iter()
            .filter(|c| c.expects_response() && !state.answered.contains(&c.correlation_id()))
            .count()
    }

    fn submit(&self, call: ArchiveCall) -> bool {
        let mut state = self.state.borrow_mut();
        if state.back_pressure > 0 {
            state.back_pressure -= 1;
            state.rejected += 1;
            return false;
        }
        if call.expects_response() {
            if let Some(relevant_id) = state.scripted.pop_front() {
                let correlation_id = call.correlation_id();
                state.answered.insert(correlation_id);
                state
                    .responses
                    .push_back(ControlResponse::ok(CONTROL_SESSION_ID, correlation_id, relevant_id));
            }
        }
        state.calls.push(call);
        true
    }
}

impl ArchiveClient for MockArchive {
    fn control_session_id(&self) -> i64 {
        CONTROL_SESSION_ID
    }

    fn next_correlation_id(&mut self) -> i64 {
        let mut state = self.state.borrow_mut();
        state.next_correlation_id += 1;
        state.next_correlation_id
    }

    fn request_recording_position(&mut self, recording_id: i64, correlation_id: i64, _: i64) -> bool {
        self.submit(ArchiveCall::RecordingPosition { recording_id, correlation_id })
    }

    fn request_stop_position(&mut self, recording_id: i64, correlation_id: i64, _: i64) -> bool {
        self.submit(ArchiveCall::StopPosition { recording_id, correlation_id })
    }

    fn request_replay(&mut self, request: &ReplayRequest, correlation_id: i64, _: i64) -> bool {
        self.submit(ArchiveCall::Replay {
            request: request.clone(),
            correlation_id,
        })
    }

    fn request_stop_replay(&mut self, replay_session_id: i64, correlation_id: i64, _: i64) -> bool {
        self.submit(ArchiveCall::StopReplay {
            replay_session_id,
            correlation_id,
        })
    }

    fn poll_response(&mut self) -> Option<ControlResponse> {
        self.state.borrow_mut().responses.pop_front()
    }

    fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}
