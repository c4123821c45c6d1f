// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replay merge state machine.
//!
//! Starts a subscription on an archive replay of a recording and moves it onto
//! the live stream once the replay has caught up, without gaps or duplicates:
//!
//! 1. Learn the recording's current (or stop) position: the first target.
//! 2. Start an unbounded replay from the start position onto the replay destination.
//! 3. Catch the replay image up to the target.
//! 4. Re-query the target. When the image is within the merge window, add the
//!    live destination; both paths now feed the same image.
//! 5. Once live overlaps replay at the target, remove the replay destination
//!    and stop the replay session.
//!
//! # Duty Cycle
//!
//! [`ReplayMerge::do_work()`] never blocks. Each call submits at most one
//! archive request or polls for one response, and returns the units of work
//! done (0, 1 or 2) so the caller can pick an idle strategy. At most one
//! request is outstanding at any time.
//!
//! # Ownership
//!
//! The subscription and archive client are handed over at construction. A
//! caller that keeps using them elsewhere passes `&mut` borrows, which ties the
//! merge's lifetime to theirs.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut merge = ReplayMerge::new(&mut subscription, &mut archive, params, &config, clock.now_ms())?;
//!
//! while !merge.is_merged() {
//!     let work = merge.poll(clock.now_ms(), |fragment| handle(fragment), 10)?;
//!     idle.idle(work).await;
//! }
//! ```

mod policy;
mod state;

pub use policy::{LiveJoinDecision, MergePolicy};
pub use state::MergeState;

use crate::archive::{known_position, ArchiveClient, ReplayRequest, REPLAY_LENGTH_UNBOUNDED};
use crate::bridge::{self, PendingRequest, RequestKind};
use crate::channel::{self, ChannelUri, CONTROL_MODE_PARAM};
use crate::config::{MergeConfig, MergeParams};
use crate::error::{MergeError, Result};
use crate::metrics;
use crate::progress::ProgressTracker;
use crate::transport::{Image, Subscription};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Replays a recording and merges onto its live stream.
///
/// See module docs for the sequence. Torn down by [`close()`](Self::close),
/// which also runs on drop.
pub struct ReplayMerge<S: Subscription, A: ArchiveClient> {
    subscription: S,
    archive: A,
    policy: MergePolicy,

    /// Replay channel with `linger=0|eos=false` applied.
    replay_channel: String,
    replay_destination: String,
    live_destination: String,
    recording_id: i64,
    start_position: i64,

    state: MergeState,
    /// Latest known recording (or stop) position.
    next_target_position: Option<i64>,
    /// Image position at the last observed advance.
    position_of_last_progress: Option<i64>,
    pending: Option<PendingRequest>,
    replay_session_id: Option<i64>,
    is_replay_active: bool,
    is_live_added: bool,
    image: Option<S::Image>,

    progress: ProgressTracker,
    started_at_ms: i64,
}

impl<S: Subscription, A: ArchiveClient> ReplayMerge<S, A> {
    /// Create a merge and add the replay destination to the subscription.
    ///
    /// Fails with [`MergeError::Configuration`], without touching the
    /// subscription, if the config is invalid, a channel does not parse, or the
    /// subscription channel is not `control-mode=manual`.
    pub fn new(
        mut subscription: S,
        archive: A,
        params: MergeParams,
        config: &MergeConfig,
        now_ms: i64,
    ) -> Result<Self> {
        config.validate()?;

        let subscription_channel = ChannelUri::parse(subscription.channel())?;
        if !subscription_channel.is_manual_control_mode() {
            return Err(MergeError::Configuration(format!(
                "subscription channel must be manual control mode: mode={}",
                subscription_channel.get(CONTROL_MODE_PARAM).unwrap_or("")
            )));
        }

        let replay_channel = channel::replay_channel(&params.replay_channel)?;

        subscription
            .add_destination(&params.replay_destination)
            .map_err(|e| MergeError::transport(MergeState::GetRecordingPosition, e.to_string()))?;

        debug!(
            recording_id = params.recording_id,
            start_position = params.start_position,
            replay_destination = %params.replay_destination,
            "Replay merge created"
        );
        metrics::set_merge_state(params.recording_id, MergeState::GetRecordingPosition);

        Ok(Self {
            subscription,
            archive,
            policy: config.policy.clone(),
            replay_channel,
            replay_destination: params.replay_destination,
            live_destination: params.live_destination,
            recording_id: params.recording_id,
            start_position: params.start_position,
            state: MergeState::GetRecordingPosition,
            next_target_position: None,
            position_of_last_progress: None,
            pending: None,
            replay_session_id: None,
            is_replay_active: false,
            is_live_added: false,
            image: None,
            progress: ProgressTracker::new(config.merge_progress_timeout_ms, now_ms),
            started_at_ms: now_ms,
        })
    }

    // =========================================================================
    // Duty cycle
    // =========================================================================

    /// Advance the merge by at most one protocol step.
    ///
    /// Returns the units of work performed. While the merge is active the stall
    /// check runs after the step.
    pub fn do_work(&mut self, now_ms: i64) -> Result<usize> {
        let result = self.step(now_ms).and_then(|work_count| {
            if self.state.is_active() {
                self.check_progress(now_ms)?;
            }
            Ok(work_count)
        });

        if let Err(ref e) = result {
            error!(
                recording_id = self.recording_id,
                state = %self.state,
                error = %e,
                "Replay merge failed"
            );
            metrics::record_fault(e.kind());
        }

        result
    }

    /// Run [`do_work()`](Self::do_work), then poll the image for fragments.
    ///
    /// Returns fragments read; 0 until the replay image is bound.
    pub fn poll<F>(&mut self, now_ms: i64, handler: F, fragment_limit: usize) -> Result<usize>
    where
        F: FnMut(&[u8]),
    {
        self.do_work(now_ms)?;
        Ok(match self.image.as_mut() {
            Some(image) => image.poll(handler, fragment_limit),
            None => 0,
        })
    }

    /// Raise [`MergeError::Stall`] if nothing progressed within the timeout.
    pub fn check_progress(&self, now_ms: i64) -> Result<()> {
        if self.progress.has_stalled(now_ms) {
            return Err(MergeError::Stall {
                state: self.state,
                timeout_ms: self.progress.timeout_ms(),
            });
        }
        Ok(())
    }

    fn step(&mut self, now_ms: i64) -> Result<usize> {
        match self.state {
            MergeState::GetRecordingPosition => self.get_recording_position(now_ms),
            MergeState::Replay => self.replay(now_ms),
            MergeState::Catchup => self.catchup(now_ms),
            MergeState::AttemptLiveJoin => self.attempt_live_join(now_ms),
            MergeState::StopReplay => Ok(self.stop_replay(now_ms)),
            MergeState::Merged | MergeState::Closed => Ok(0),
        }
    }

    fn get_recording_position(&mut self, now_ms: i64) -> Result<usize> {
        let mut work_count = 0;

        match self.pending {
            None => {
                if self.request(RequestKind::RecordingPosition, now_ms) {
                    work_count += 1;
                }
            }
            Some(pending) => {
                if let Some(response) = bridge::poll_for_response(&mut self.archive, &pending)? {
                    self.pending = None;

                    match known_position(response.relevant_id) {
                        Some(position) => {
                            debug!(recording_id = self.recording_id, target = position, "Target position known");
                            self.next_target_position = Some(position);
                            self.transition(MergeState::Replay, now_ms);
                        }
                        None => {
                            // Not recording any more: fall back to where it stopped.
                            if self.request(RequestKind::StopPosition, now_ms) {
                                work_count += 1;
                            }
                        }
                    }

                    work_count += 1;
                }
            }
        }

        Ok(work_count)
    }

    fn replay(&mut self, now_ms: i64) -> Result<usize> {
        let mut work_count = 0;

        match self.pending {
            None => {
                if self.request(RequestKind::Replay, now_ms) {
                    work_count += 1;
                }
            }
            Some(pending) => {
                if let Some(response) = bridge::poll_for_response(&mut self.archive, &pending)? {
                    self.pending = None;
                    self.replay_session_id = Some(response.relevant_id);
                    self.is_replay_active = true;
                    debug!(
                        recording_id = self.recording_id,
                        replay_session_id = response.relevant_id,
                        "Replay started"
                    );
                    self.transition(MergeState::Catchup, now_ms);
                    work_count += 1;
                }
            }
        }

        Ok(work_count)
    }

    fn catchup(&mut self, now_ms: i64) -> Result<usize> {
        let mut work_count = 0;

        if self.image.is_none() && self.subscription.is_connected() {
            // The transport sees the low 32 bits of the replay session id.
            let image = self
                .replay_session_id
                .and_then(|id| self.subscription.image_by_session_id(id as i32));

            if let Some(image) = image {
                debug!(
                    recording_id = self.recording_id,
                    session_id = image.session_id(),
                    position = image.position(),
                    "Replay image bound"
                );
                self.position_of_last_progress = Some(image.position());
                self.progress.mark(now_ms);
                self.image = Some(image);
            }
        }

        let (position, is_closed) = match &self.image {
            Some(image) => (image.position(), image.is_closed()),
            None => return Ok(work_count),
        };

        if let Some(target) = self.next_target_position {
            metrics::record_catchup_lag(self.recording_id, target - position);
        }

        if self.next_target_position.is_some_and(|target| position >= target) {
            self.transition(MergeState::AttemptLiveJoin, now_ms);
            work_count += 1;
        } else if is_closed {
            return Err(MergeError::transport(self.state, "replay image closed unexpectedly"));
        } else if self.position_of_last_progress.map_or(true, |last| position > last) {
            self.position_of_last_progress = Some(position);
            self.progress.mark(now_ms);
        }

        Ok(work_count)
    }

    fn attempt_live_join(&mut self, now_ms: i64) -> Result<usize> {
        let mut work_count = 0;

        if self.image.as_ref().is_some_and(|image| image.is_closed()) {
            return Err(MergeError::transport(self.state, "replay image closed unexpectedly"));
        }

        match self.pending {
            None => {
                if self.request(RequestKind::RecordingPosition, now_ms) {
                    work_count += 1;
                }
            }
            Some(pending) => {
                if let Some(response) = bridge::poll_for_response(&mut self.archive, &pending)? {
                    self.pending = None;

                    match known_position(response.relevant_id) {
                        None => {
                            self.request(RequestKind::RecordingPosition, now_ms);
                        }
                        Some(target) => {
                            self.next_target_position = Some(target);
                            let next_state = self.apply_live_join_policy(target, now_ms)?;
                            self.transition(next_state, now_ms);
                        }
                    }

                    work_count += 1;
                }
            }
        }

        Ok(work_count)
    }

    fn apply_live_join_policy(&mut self, target: i64, now_ms: i64) -> Result<MergeState> {
        let Some(image) = &self.image else {
            return Ok(MergeState::Catchup);
        };
        let position = image.position();
        let decision = self.policy.decide(self.is_live_added, target, image);

        match decision {
            LiveJoinDecision::AddLiveDestination => {
                self.subscription
                    .add_destination(&self.live_destination)
                    .map_err(|e| MergeError::transport(self.state, e.to_string()))?;
                self.is_live_added = true;
                self.progress.mark(now_ms);
                info!(
                    recording_id = self.recording_id,
                    position,
                    target,
                    live_destination = %self.live_destination,
                    "Live destination added"
                );
                metrics::record_live_added(self.recording_id);
                Ok(MergeState::Catchup)
            }
            LiveJoinDecision::StopReplay => {
                self.subscription
                    .remove_destination(&self.replay_destination)
                    .map_err(|e| MergeError::transport(self.state, e.to_string()))?;
                self.progress.mark(now_ms);
                info!(
                    recording_id = self.recording_id,
                    position,
                    target,
                    replay_destination = %self.replay_destination,
                    "Replay destination removed"
                );
                metrics::record_replay_removed(self.recording_id);
                Ok(MergeState::StopReplay)
            }
            LiveJoinDecision::KeepCatchingUp => Ok(MergeState::Catchup),
        }
    }

    fn stop_replay(&mut self, now_ms: i64) -> usize {
        if self.send_request(RequestKind::StopReplay).is_none() {
            return 0;
        }

        self.is_replay_active = false;
        self.transition(MergeState::Merged, now_ms);

        let elapsed_ms = now_ms.saturating_sub(self.started_at_ms).max(0) as u64;
        info!(recording_id = self.recording_id, elapsed_ms, "Replay merged onto live stream");
        metrics::record_merge_complete(self.recording_id, Duration::from_millis(elapsed_ms));
        1
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Submit a request and track it as the outstanding one.
    fn request(&mut self, kind: RequestKind, now_ms: i64) -> bool {
        debug_assert!(self.pending.is_none(), "request already outstanding");

        match self.send_request(kind) {
            Some(correlation_id) => {
                self.pending = Some(PendingRequest { correlation_id, kind });
                self.progress.mark(now_ms);
                true
            }
            None => false,
        }
    }

    /// Submit a request without tracking a response.
    ///
    /// Returns the correlation id if the archive accepted it.
    fn send_request(&mut self, kind: RequestKind) -> Option<i64> {
        let correlation_id = self.archive.next_correlation_id();
        let control_session_id = self.archive.control_session_id();

        let accepted = match kind {
            RequestKind::RecordingPosition => {
                self.archive
                    .request_recording_position(self.recording_id, correlation_id, control_session_id)
            }
            RequestKind::StopPosition => {
                self.archive
                    .request_stop_position(self.recording_id, correlation_id, control_session_id)
            }
            RequestKind::Replay => {
                let request = ReplayRequest {
                    recording_id: self.recording_id,
                    position: self.start_position,
                    length: REPLAY_LENGTH_UNBOUNDED,
                    channel: self.replay_channel.clone(),
                    stream_id: self.subscription.stream_id(),
                };
                self.archive.request_replay(&request, correlation_id, control_session_id)
            }
            RequestKind::StopReplay => match self.replay_session_id {
                Some(replay_session_id) => {
                    self.archive
                        .request_stop_replay(replay_session_id, correlation_id, control_session_id)
                }
                None => false,
            },
        };

        metrics::record_request(kind, accepted);

        if accepted {
            debug!(recording_id = self.recording_id, request = %kind, correlation_id, "Archive request sent");
            Some(correlation_id)
        } else {
            debug!(recording_id = self.recording_id, request = %kind, "Archive request back pressured, will retry");
            None
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    fn transition(&mut self, next: MergeState, now_ms: i64) {
        self.set_state(next);
        self.progress.mark(now_ms);
    }

    fn set_state(&mut self, next: MergeState) {
        if next == self.state {
            return;
        }
        debug!(recording_id = self.recording_id, from = %self.state, to = %next, "Replay merge state change");
        metrics::record_state_transition(self.state, next);
        metrics::set_merge_state(self.recording_id, next);
        self.state = next;
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Tear the merge down. Idempotent; never fails.
    ///
    /// Unless the archive client is already closed: removes the replay
    /// destination if it is still attached and stops an active replay session
    /// (fire and forget). Always ends in [`MergeState::Closed`].
    pub fn close(&mut self) {
        if self.state == MergeState::Closed {
            return;
        }

        if self.archive.is_closed() {
            debug!(recording_id = self.recording_id, "Archive client already closed, skipping cleanup");
        } else {
            if !matches!(self.state, MergeState::Merged | MergeState::StopReplay) {
                if let Err(e) = self.subscription.remove_destination(&self.replay_destination) {
                    warn!(
                        recording_id = self.recording_id,
                        error = %e,
                        "Failed to remove replay destination during close"
                    );
                }
            }

            if self.is_replay_active {
                self.is_replay_active = false;
                if self.send_request(RequestKind::StopReplay).is_none() {
                    warn!(
                        recording_id = self.recording_id,
                        replay_session_id = ?self.replay_session_id,
                        "Stop replay not accepted during close"
                    );
                }
            }
        }

        self.pending = None;
        self.set_state(MergeState::Closed);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current state.
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Whether the merge has completed onto the live stream.
    pub fn is_merged(&self) -> bool {
        self.state == MergeState::Merged
    }

    pub fn is_closed(&self) -> bool {
        self.state == MergeState::Closed
    }

    /// Whether the live destination has been added.
    pub fn is_live_added(&self) -> bool {
        self.is_live_added
    }

    /// Whether a replay session is believed to be running.
    pub fn is_replay_active(&self) -> bool {
        self.is_replay_active
    }

    /// The bound image, once the replay session has connected.
    pub fn image(&self) -> Option<&S::Image> {
        self.image.as_ref()
    }

    pub fn replay_session_id(&self) -> Option<i64> {
        self.replay_session_id
    }

    pub fn next_target_position(&self) -> Option<i64> {
        self.next_target_position
    }

    /// Correlation id of the outstanding request, if any.
    pub fn active_correlation_id(&self) -> Option<i64> {
        self.pending.map(|p| p.correlation_id)
    }

    pub fn recording_id(&self) -> i64 {
        self.recording_id
    }

    pub fn time_of_last_progress_ms(&self) -> i64 {
        self.progress.time_of_last_progress_ms()
    }

    pub fn subscription(&self) -> &S {
        &self.subscription
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }
}

impl<S: Subscription, A: ArchiveClient> Drop for ReplayMerge<S, A> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: Subscription, A: ArchiveClient> std::fmt::Debug for ReplayMerge<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayMerge")
            .field("recording_id", &self.recording_id)
            .field("state", &self.state)
            .field("next_target_position", &self.next_target_position)
            .field("replay_session_id", &self.replay_session_id)
            .field("is_live_added", &self.is_live_added)
            .field("active_correlation_id", &self.active_correlation_id())
            .finish()
    }
}
