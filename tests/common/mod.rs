//! Shared test utilities for scenario, property and driver tests.
//!
//! This module provides:
//! - Mock ArchiveClient recording requests and scripting responses
//! - Mock Subscription/Image recording destination changes
//! - Helpers to walk a merge up to a given state

#![allow(dead_code)]

pub mod mock_archive;
pub mod mock_transport;

pub use mock_archive::*;
pub use mock_transport::*;

use replay_merge::{MergeConfig, MergeParams, MergeState, ReplayMerge};

pub const RECORDING_ID: i64 = 7;
pub const REPLAY_CHANNEL: &str = "aeron:udp?endpoint=localhost:40457";
pub const REPLAY_DESTINATION: &str = "aeron:udp?endpoint=localhost:40457";
pub const LIVE_DESTINATION: &str = "aeron:udp?endpoint=localhost:40456|control=localhost:40455";

pub type TestMerge = ReplayMerge<MockSubscription, MockArchive>;

pub fn params(start_position: i64) -> MergeParams {
    MergeParams::new(REPLAY_CHANNEL, REPLAY_DESTINATION, LIVE_DESTINATION, RECORDING_ID, start_position)
}

/// Create a merge at `now_ms` with the testing config.
pub fn new_merge(subscription: &MockSubscription, archive: &MockArchive, now_ms: i64) -> TestMerge {
    ReplayMerge::new(
        subscription.clone(),
        archive.clone(),
        params(0),
        &MergeConfig::for_testing(),
        now_ms,
    )
    .expect("merge construction")
}

/// Walk a fresh merge to `Catchup` with the given first target and replay
/// session, connect the replay image at position 0 and bind it.
pub fn walk_to_catchup(
    merge: &mut TestMerge,
    subscription: &MockSubscription,
    archive: &MockArchive,
    target: i64,
    replay_session_id: i64,
    now_ms: i64,
) -> MockImage {
    assert_eq!(merge.do_work(now_ms).unwrap(), 1);
    archive.respond_ok(target);
    assert_eq!(merge.do_work(now_ms).unwrap(), 1);
    assert_eq!(merge.state(), MergeState::Replay);

    assert_eq!(merge.do_work(now_ms).unwrap(), 1);
    archive.respond_ok(replay_session_id);
    assert_eq!(merge.do_work(now_ms).unwrap(), 1);
    assert_eq!(merge.state(), MergeState::Catchup);

    let image = subscription.connect_image(replay_session_id as i32, 0);
    merge.do_work(now_ms).unwrap();
    assert!(merge.image().is_some());
    image
}

/// Answer an `AttemptLiveJoin` position query with `target`.
pub fn answer_live_join(merge: &mut TestMerge, archive: &MockArchive, target: i64, now_ms: i64) {
    assert_eq!(merge.state(), MergeState::AttemptLiveJoin);
    assert_eq!(merge.do_work(now_ms).unwrap(), 1);
    archive.respond_ok(target);
    assert_eq!(merge.do_work(now_ms).unwrap(), 1);
}
