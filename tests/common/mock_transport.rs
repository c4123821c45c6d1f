// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mock Subscription and Image for testing.
//!
//! Records destination changes and lets tests move image positions, connect
//! the live path, or close the image.

use replay_merge::transport::{Image, Subscription, TransportError};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

pub const MANUAL_CHANNEL: &str = "aeron:udp?control-mode=manual";
pub const STREAM_ID: i32 = 1001;
pub const TERM_LENGTH: i64 = 64 * 1024;

/// A recorded destination change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationOp {
    Add(String),
    Remove(String),
}

struct ImageState {
    session_id: i32,
    position: i64,
    closed: bool,
    term_buffer_length: i64,
    active_transports: usize,
    fragments: VecDeque<Vec<u8>>,
}

/// Shared-state image handle.
#[derive(Clone)]
pub struct MockImage {
    state: Rc<RefCell<ImageState>>,
}

impl MockImage {
    pub fn new(session_id: i32, position: i64) -> Self {
        Self {
            state: Rc::new(RefCell::new(ImageState {
                session_id,
                position,
                closed: false,
                term_buffer_length: TERM_LENGTH,
                active_transports: 1,
                fragments: VecDeque::new(),
            })),
        }
    }

    pub fn set_position(&self, position: i64) {
        self.state.borrow_mut().position = position;
    }

    pub fn set_closed(&self) {
        self.state.borrow_mut().closed = true;
    }

    pub fn set_active_transports(&self, count: usize) {
        self.state.borrow_mut().active_transports = count;
    }

    /// Queue a fragment; its length advances the position when polled.
    pub fn push_fragment(&self, fragment: &[u8]) {
        self.state.borrow_mut().fragments.push_back(fragment.to_vec());
    }
}

impl Image for MockImage {
    fn session_id(&self) -> i32 {
        self.state.borrow().session_id
    }

    fn position(&self) -> i64 {
        self.state.borrow().position
    }

    fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    fn term_buffer_length(&self) -> i64 {
        self.state.borrow().term_buffer_length
    }

    fn active_transport_count(&self) -> usize {
        self.state.borrow().active_transports
    }

    fn poll<F: FnMut(&[u8])>(&mut self, mut handler: F, fragment_limit: usize) -> usize {
        let mut read = 0;
        while read < fragment_limit {
            let fragment = self.state.borrow_mut().fragments.pop_front();
            let Some(fragment) = fragment else { break };
            handler(&fragment);
            self.state.borrow_mut().position += fragment.len() as i64;
            read += 1;
        }
        read
    }
}

struct SubscriptionState {
    destinations: Vec<String>,
    ops: Vec<DestinationOp>,
    connected: bool,
    images: HashMap<i32, MockImage>,
    fail_destination_ops: bool,
}

/// Shared-state subscription handle.
#[derive(Clone)]
pub struct MockSubscription {
    channel: Rc<str>,
    state: Rc<RefCell<SubscriptionState>>,
}

impl MockSubscription {
    pub fn new(channel: &str) -> Self {
        Self {
            channel: Rc::from(channel),
            state: Rc::new(RefCell::new(SubscriptionState {
                destinations: Vec::new(),
                ops: Vec::new(),
                connected: false,
                images: HashMap::new(),
                fail_destination_ops: false,
            })),
        }
    }

    pub fn manual() -> Self {
        Self::new(MANUAL_CHANNEL)
    }

    /// Connect an image for `session_id` starting at `position`.
    pub fn connect_image(&self, session_id: i32, position: i64) -> MockImage {
        let image = MockImage::new(session_id, position);
        let mut state = self.state.borrow_mut();
        state.images.insert(session_id, image.clone());
        state.connected = true;
        image
    }

    pub fn fail_destination_ops(&self) {
        self.state.borrow_mut().fail_destination_ops = true;
    }

    pub fn destinations(&self) -> Vec<String> {
        self.state.borrow().destinations.clone()
    }

    pub fn ops(&self) -> Vec<DestinationOp> {
        self.state.borrow().ops.clone()
    }

    pub fn remove_count(&self, endpoint: &str) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, DestinationOp::Remove(e) if e == endpoint))
            .count()
    }
}

impl Subscription for MockSubscription {
    type Image = MockImage;

    fn channel(&self) -> &str {
        &self.channel
    }

    fn stream_id(&self) -> i32 {
        STREAM_ID
    }

    fn add_destination(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(DestinationOp::Add(endpoint.to_string()));
        if state.fail_destination_ops {
            return Err(TransportError(format!("cannot add {endpoint}")));
        }
        state.destinations.push(endpoint.to_string());
        Ok(())
    }

    fn remove_destination(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.ops.push(DestinationOp::Remove(endpoint.to_string()));
        if state.fail_destination_ops {
            return Err(TransportError(format!("cannot remove {endpoint}")));
        }
        state.destinations.retain(|d| d != endpoint);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn image_by_session_id(&self, session_id: i32) -> Option<MockImage> {
        self.state.borrow().images.get(&session_id).cloned()
    }
}
