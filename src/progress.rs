// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Stall supervision.
//!
//! Tracks the time of the last observed progress. There is no background
//! timer: the check runs when the caller drives the merge, so detection is only
//! as prompt as the caller's duty cycle.

/// Time-of-last-progress tracker.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    timeout_ms: u64,
    time_of_last_progress_ms: i64,
}

impl ProgressTracker {
    /// Start tracking at `now_ms`.
    pub fn new(timeout_ms: u64, now_ms: i64) -> Self {
        Self {
            timeout_ms,
            time_of_last_progress_ms: now_ms,
        }
    }

    /// Record progress at `now_ms`.
    pub fn mark(&mut self, now_ms: i64) {
        self.time_of_last_progress_ms = now_ms;
    }

    /// Milliseconds since the last progress (0 if the clock went backwards).
    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        now_ms.saturating_sub(self.time_of_last_progress_ms).max(0) as u64
    }

    /// Whether more than the timeout has passed without progress.
    pub fn has_stalled(&self, now_ms: i64) -> bool {
        self.elapsed_ms(now_ms) > self.timeout_ms
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn time_of_last_progress_ms(&self) -> i64 {
        self.time_of_last_progress_ms
    }
}
