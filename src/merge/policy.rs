// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Live-join policy.
//!
//! Evaluated each time a fresh target position arrives in
//! `AttemptLiveJoin`, against the replay image's position at that moment:
//!
//! 1. **Add live**: the image is within the merge window of the target, so the
//!    live path can be joined without the live stream running ahead of what
//!    the image can still buffer. The window is a quarter of the term buffer,
//!    capped at `live_add_max_window`.
//! 2. **Stop replay**: live was already added, the image is within
//!    `replay_remove_threshold` of the target, and at least two transports
//!    feed the image (live overlaps replay).
//! 3. Otherwise keep catching up towards the new target.

use crate::transport::Image;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating the policy once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveJoinDecision {
    AddLiveDestination,
    StopReplay,
    KeepCatchingUp,
}

/// Merge window and overlap thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Upper bound on the gap (bytes) at which the live destination is added.
    #[serde(default = "default_live_add_max_window")]
    pub live_add_max_window: i64,

    /// Gap (bytes) at or below which replay may be stopped once live overlaps.
    #[serde(default)]
    pub replay_remove_threshold: i64,

    /// Transports that must feed the image before replay is dropped.
    ///
    /// At least 2, enforced by [`MergeConfig::validate`](crate::MergeConfig::validate).
    #[serde(default = "default_min_overlap_transports")]
    pub min_overlap_transports: usize,
}

fn default_live_add_max_window() -> i64 {
    32 * 1024 * 1024 // 32 MiB
}

fn default_min_overlap_transports() -> usize {
    2
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            live_add_max_window: default_live_add_max_window(),
            replay_remove_threshold: 0,
            min_overlap_transports: default_min_overlap_transports(),
        }
    }
}

impl MergePolicy {
    /// Merge window for an image with the given term buffer length.
    pub fn live_add_window(&self, term_buffer_length: i64) -> i64 {
        (term_buffer_length >> 2).min(self.live_add_max_window)
    }

    pub fn should_add_live_destination(
        &self,
        is_live_added: bool,
        target_position: i64,
        position: i64,
        term_buffer_length: i64,
    ) -> bool {
        !is_live_added
            && target_position.saturating_sub(position) <= self.live_add_window(term_buffer_length)
    }

    pub fn should_stop_and_remove_replay(
        &self,
        is_live_added: bool,
        target_position: i64,
        position: i64,
        active_transport_count: usize,
    ) -> bool {
        is_live_added
            && target_position.saturating_sub(position) <= self.replay_remove_threshold
            && active_transport_count >= self.min_overlap_transports
    }

    /// Evaluate the policy against `image`.
    pub fn decide<I: Image + ?Sized>(
        &self,
        is_live_added: bool,
        target_position: i64,
        image: &I,
    ) -> LiveJoinDecision {
        let position = image.position();

        if self.should_add_live_destination(
            is_live_added,
            target_position,
            position,
            image.term_buffer_length(),
        ) {
            LiveJoinDecision::AddLiveDestination
        } else if self.should_stop_and_remove_replay(
            is_live_added,
            target_position,
            position,
            image.active_transport_count(),
        ) {
            LiveJoinDecision::StopReplay
        } else {
            LiveJoinDecision::KeepCatchingUp
        }
    }
}
