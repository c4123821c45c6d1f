// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Async duty-cycle driver.
//!
//! [`ReplayMerge`] itself never blocks and owns no thread. For callers on a
//! tokio runtime, [`drive_to_merged`] runs the duty cycle until the merge
//! completes, backing off with [`BackoffIdle`] when a cycle does no work.
//!
//! # Backoff Schedule (defaults)
//!
//! ```text
//! Idle cycle   Action
//! ----------   ------
//! 1..=10       yield to the runtime
//! 11           sleep 1ms
//! 12           sleep 2ms
//! 13           sleep 4ms
//! ...
//! 18+          sleep 100ms (cap)
//! ```
//!
//! Any cycle that does work resets the schedule.
//!
//! # Graceful Shutdown
//!
//! The driver watches a `watch::Receiver<bool>` shutdown signal. On shutdown,
//! and on any fault, the merge is closed before the driver returns.

use crate::archive::ArchiveClient;
use crate::config::IdleConfig;
use crate::error::Result;
use crate::merge::ReplayMerge;
use crate::transport::Subscription;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};

/// How [`drive_to_merged`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The merge reached `Merged`.
    Merged,
    /// Shutdown was signalled; the merge has been closed.
    Shutdown,
}

/// Spin-then-sleep idle strategy with exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffIdle {
    config: IdleConfig,
    idle_cycles: u32,
    current_delay: Duration,
}

impl BackoffIdle {
    pub fn new(config: IdleConfig) -> Self {
        let current_delay = Duration::from_millis(config.initial_idle_ms);
        Self {
            config,
            idle_cycles: 0,
            current_delay,
        }
    }

    /// Forget accumulated backoff.
    pub fn reset(&mut self) {
        self.idle_cycles = 0;
        self.current_delay = Duration::from_millis(self.config.initial_idle_ms);
    }

    /// Delay for the next idle cycle, or `None` to just yield.
    ///
    /// A growth step that does not fit a `Duration` saturates at `max_idle_ms`.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.idle_cycles < self.config.max_spins {
            self.idle_cycles += 1;
            return None;
        }

        let delay = self.current_delay;
        let max = Duration::from_millis(self.config.max_idle_ms);
        self.current_delay = Duration::try_from_secs_f64(delay.as_secs_f64() * self.config.backoff_factor)
            .unwrap_or(max)
            .min(max);
        Some(delay.min(max))
    }

    /// Idle after a duty cycle that performed `work_count` units of work.
    pub async fn idle(&mut self, work_count: usize) {
        if work_count > 0 {
            self.reset();
            return;
        }

        match self.next_delay() {
            None => tokio::task::yield_now().await,
            Some(delay) => tokio::time::sleep(delay).await,
        }
    }
}

/// Drive `merge` until it is merged, fails, or shutdown is signalled.
///
/// `idle_config` is validated first; an invalid one closes the merge and
/// returns [`MergeError::Configuration`](crate::MergeError::Configuration).
///
/// `clock` supplies the monotonic time in milliseconds passed to
/// [`ReplayMerge::do_work`]. On error or shutdown the merge is closed before
/// returning; on success it is left in `Merged` so the caller can keep polling
/// the live image.
pub async fn drive_to_merged<S, A, C>(
    merge: &mut ReplayMerge<S, A>,
    mut clock: C,
    idle_config: IdleConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<DriveOutcome>
where
    S: Subscription,
    A: ArchiveClient,
    C: FnMut() -> i64,
{
    let span = info_span!("replay_merge", recording_id = merge.recording_id());

    async move {
        if let Err(e) = idle_config.validate() {
            warn!(error = %e, "Invalid idle config, closing replay merge");
            merge.close();
            return Err(e);
        }
        let mut idle = BackoffIdle::new(idle_config);

        loop {
            if *shutdown_rx.borrow() {
                info!(state = %merge.state(), "Shutdown signal received, closing replay merge");
                merge.close();
                return Ok(DriveOutcome::Shutdown);
            }

            let work_count = match merge.do_work(clock()) {
                Ok(work_count) => work_count,
                Err(e) => {
                    warn!(kind = e.kind(), "Closing replay merge after fault");
                    merge.close();
                    return Err(e);
                }
            };

            if merge.is_merged() {
                info!("Replay merge complete");
                return Ok(DriveOutcome::Merged);
            }

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can ask us to stop any more.
                        info!("Shutdown channel closed, closing replay merge");
                        merge.close();
                        return Ok(DriveOutcome::Shutdown);
                    }
                }
                _ = idle.idle(work_count) => {}
            }
        }
    }
    .instrument(span)
    .await
}
