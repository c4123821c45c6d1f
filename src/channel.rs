// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Minimal channel URI handling.
//!
//! Only what the merge needs: read `control-mode` off the subscription channel
//! and set `linger`/`eos` on the replay channel. Format:
//!
//! ```text
//! [aeron-spy:]aeron:<media>[?key=value|key=value...]
//! ```

use crate::error::{MergeError, Result};
use std::fmt;

const SCHEME: &str = "aeron";
const SPY_PREFIX: &str = "aeron-spy:";

/// Multi-destination control mode parameter.
pub const CONTROL_MODE_PARAM: &str = "control-mode";
/// Manual multi-destination control.
pub const CONTROL_MODE_MANUAL: &str = "manual";
/// Linger timeout parameter.
pub const LINGER_PARAM: &str = "linger";
/// End-of-stream marker parameter.
pub const EOS_PARAM: &str = "eos";

/// A parsed channel URI. Parameter order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUri {
    spy: bool,
    media: String,
    params: Vec<(String, String)>,
}

impl ChannelUri {
    /// Parse a channel URI.
    pub fn parse(uri: &str) -> Result<Self> {
        let (spy, rest) = match uri.strip_prefix(SPY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, uri),
        };

        let rest = rest
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| MergeError::Configuration(format!("channel must start with '{SCHEME}:': {uri}")))?;

        let (media, query) = match rest.split_once('?') {
            Some((media, query)) => (media, Some(query)),
            None => (rest, None),
        };

        if media.is_empty() {
            return Err(MergeError::Configuration(format!("channel has no media: {uri}")));
        }

        let mut params = Vec::new();
        if let Some(query) = query {
            for pair in query.split('|').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    MergeError::Configuration(format!("malformed channel parameter '{pair}': {uri}"))
                })?;
                if key.is_empty() {
                    return Err(MergeError::Configuration(format!("empty channel parameter key: {uri}")));
                }
                params.push((key.to_string(), value.to_string()));
            }
        }

        Ok(Self {
            spy,
            media: media.to_string(),
            params,
        })
    }

    /// Transport media (e.g. `udp`, `ipc`).
    pub fn media(&self) -> &str {
        &self.media
    }

    /// Look up a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a parameter, replacing any existing value.
    pub fn put(&mut self, key: &str, value: &str) {
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.params.push((key.to_string(), value.to_string())),
        }
    }

    /// Whether the channel declares manual multi-destination control.
    pub fn is_manual_control_mode(&self) -> bool {
        self.get(CONTROL_MODE_PARAM) == Some(CONTROL_MODE_MANUAL)
    }
}

impl fmt::Display for ChannelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spy {
            f.write_str(SPY_PREFIX)?;
        }
        write!(f, "{SCHEME}:{}", self.media)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '|' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// Build the replay channel: no linger, no end-of-stream marker, so the
/// replay can be dropped mid-stream without the image seeing an end.
pub fn replay_channel(base: &str) -> Result<String> {
    let mut uri = ChannelUri::parse(base)?;
    uri.put(LINGER_PARAM, "0");
    uri.put(EOS_PARAM, "false");
    Ok(uri.to_string())
}
