//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Merge state and transitions
//! - Archive request submission and back pressure
//! - Catchup lag
//! - Faults by kind
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replay_merge_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration)
//!
//! Without an installed recorder every call is a no-op.

use crate::bridge::RequestKind;
use crate::merge::MergeState;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Gauge for the current merge state (see [`MergeState::as_gauge_value`]).
pub fn set_merge_state(recording_id: i64, state: MergeState) {
    gauge!("replay_merge_state", "recording_id" => recording_id.to_string()).set(state.as_gauge_value());
}

/// Record a state transition.
pub fn record_state_transition(from: MergeState, to: MergeState) {
    counter!(
        "replay_merge_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record an archive request submission attempt.
pub fn record_request(kind: RequestKind, accepted: bool) {
    let outcome = if accepted { "accepted" } else { "back_pressured" };
    counter!(
        "replay_merge_requests_total",
        "request" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Gauge for how far the replay image trails the target position (bytes).
pub fn record_catchup_lag(recording_id: i64, lag: i64) {
    gauge!("replay_merge_catchup_lag_bytes", "recording_id" => recording_id.to_string()).set(lag.max(0) as f64);
}

/// Record the live destination being added.
pub fn record_live_added(recording_id: i64) {
    counter!("replay_merge_live_added_total", "recording_id" => recording_id.to_string()).increment(1);
}

/// Record the replay destination being removed.
pub fn record_replay_removed(recording_id: i64) {
    counter!("replay_merge_replay_removed_total", "recording_id" => recording_id.to_string()).increment(1);
}

/// Record a completed merge and how long it took.
pub fn record_merge_complete(recording_id: i64, duration: Duration) {
    counter!("replay_merge_completed_total", "recording_id" => recording_id.to_string()).increment(1);
    histogram!("replay_merge_duration_seconds").record(duration.as_secs_f64());
}

/// Record a fault by kind.
pub fn record_fault(kind: &'static str) {
    counter!("replay_merge_faults_total", "kind" => kind).increment(1);
}
