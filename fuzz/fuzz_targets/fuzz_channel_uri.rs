// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fuzz target for channel URI parsing.
//!
//! Parsing arbitrary input must never panic, and anything that parses must
//! re-parse from its own rendering to the same URI.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replay_merge::channel::{replay_channel, ChannelUri, EOS_PARAM, LINGER_PARAM};

fuzz_target!(|data: &str| {
    let Ok(uri) = ChannelUri::parse(data) else {
        return;
    };

    let rendered = uri.to_string();
    let reparsed = ChannelUri::parse(&rendered).expect("rendered URI must parse");
    assert_eq!(reparsed.to_string(), rendered);
    assert_eq!(reparsed.is_manual_control_mode(), uri.is_manual_control_mode());

    let replay = replay_channel(data).expect("parsed URI must build a replay channel");
    let replay = ChannelUri::parse(&replay).expect("replay channel must parse");
    assert_eq!(replay.get(LINGER_PARAM), Some("0"));
    assert_eq!(replay.get(EOS_PARAM), Some("false"));
});
