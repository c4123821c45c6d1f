// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fuzz target for the live-join thresholds.
//!
//! Arbitrary (including negative and extreme) positions must not overflow,
//! and the two decisions must never both fire.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replay_merge::MergePolicy;

fuzz_target!(|data: (i64, i64, i64, i64, u8, bool)| {
    let (target, position, term_length, max_window, transports, is_live_added) = data;
    let policy = MergePolicy {
        live_add_max_window: max_window,
        ..MergePolicy::default()
    };

    let window = policy.live_add_window(term_length);
    assert!(window <= max_window);

    let add = policy.should_add_live_destination(is_live_added, target, position, term_length);
    let stop = policy.should_stop_and_remove_replay(is_live_added, target, position, transports as usize);
    assert!(!(add && stop));
    if is_live_added {
        assert!(!add);
    } else {
        assert!(!stop);
    }
});
