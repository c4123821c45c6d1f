// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Live transport integration traits.
//!
//! The merge drives a multi-destination subscription: the replay destination
//! and the live destination are added to and removed from one subscription
//! while it is active, and both paths feed the same [`Image`] (same session id)
//! once the live path is joined. Connection management and flow control stay
//! with the transport.

use thiserror::Error;

/// Failure reported by the transport when changing destinations.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// A handle to one active data source bound to a subscription.
///
/// The merge holds images as non-owning handles: the transport owns the
/// underlying log buffers and may close the image at any time.
pub trait Image {
    /// Session id the image is bound to.
    fn session_id(&self) -> i32;

    /// Current consumed position.
    fn position(&self) -> i64;

    /// Whether the source has gone away.
    fn is_closed(&self) -> bool;

    /// Term buffer length of the image's log, used to size the merge window.
    fn term_buffer_length(&self) -> i64;

    /// Number of transports currently feeding this image.
    ///
    /// Two or more means the live path overlaps the replay path.
    fn active_transport_count(&self) -> usize;

    /// Deliver up to `fragment_limit` fragments to `handler`.
    ///
    /// Returns the number of fragments read.
    fn poll<F>(&mut self, handler: F, fragment_limit: usize) -> usize
    where
        F: FnMut(&[u8]);
}

/// A subscription whose channel uses manual multi-destination control.
pub trait Subscription {
    /// Image handle type produced by this subscription.
    type Image: Image;

    /// Channel URI the subscription was created with.
    fn channel(&self) -> &str;

    /// Stream id the subscription receives.
    fn stream_id(&self) -> i32;

    /// Add a destination endpoint to the subscription.
    fn add_destination(&mut self, endpoint: &str) -> Result<(), TransportError>;

    /// Remove a destination endpoint from the subscription.
    fn remove_destination(&mut self, endpoint: &str) -> Result<(), TransportError>;

    /// Whether any image is connected.
    fn is_connected(&self) -> bool;

    /// Look up the image for a session id.
    fn image_by_session_id(&self, session_id: i32) -> Option<Self::Image>;
}

/// Callers that keep ownership of their subscription lend it to the merge.
impl<T: Subscription + ?Sized> Subscription for &mut T {
    type Image = T::Image;

    fn channel(&self) -> &str {
        (**self).channel()
    }

    fn stream_id(&self) -> i32 {
        (**self).stream_id()
    }

    fn add_destination(&mut self, endpoint: &str) -> Result<(), TransportError> {
        (**self).add_destination(endpoint)
    }

    fn remove_destination(&mut self, endpoint: &str) -> Result<(), TransportError> {
        (**self).remove_destination(endpoint)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn image_by_session_id(&self, session_id: i32) -> Option<Self::Image> {
        (**self).image_by_session_id(session_id)
    }
}
