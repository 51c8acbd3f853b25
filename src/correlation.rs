//! Stream-id correlation between decoded requests and outbound replies.
//!
//! Applications reply to requests in the order they were received, without
//! tracking which SPDY stream each request came from. [`StreamIdCorrelator`]
//! remembers the stream id of every decoded message in a FIFO and stamps it
//! back onto the matching outbound message. Reset streams are removed from
//! the queue wherever they sit.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::{
    frame::StreamId,
    message::{FullMessage, InboundMessage, MessageHead, SpilledMessage},
};

/// Access and mutate the stream id carried by a message.
pub trait CorrelatableMessage {
    /// Stream id recorded on this message, if any.
    fn stream_id(&self) -> Option<StreamId>;

    /// Set or clear the stream id.
    fn set_stream_id(&mut self, stream_id: Option<StreamId>);
}

impl CorrelatableMessage for MessageHead {
    fn stream_id(&self) -> Option<StreamId> { MessageHead::stream_id(self) }

    fn set_stream_id(&mut self, stream_id: Option<StreamId>) {
        MessageHead::set_stream_id(self, stream_id);
    }
}

impl CorrelatableMessage for FullMessage {
    fn stream_id(&self) -> Option<StreamId> { self.head.stream_id() }

    fn set_stream_id(&mut self, stream_id: Option<StreamId>) { self.head.set_stream_id(stream_id); }
}

impl CorrelatableMessage for SpilledMessage {
    fn stream_id(&self) -> Option<StreamId> { self.head().stream_id() }

    fn set_stream_id(&mut self, stream_id: Option<StreamId>) {
        self.head_mut().set_stream_id(stream_id);
    }
}

impl CorrelatableMessage for InboundMessage {
    fn stream_id(&self) -> Option<StreamId> { self.head().stream_id() }

    fn set_stream_id(&mut self, stream_id: Option<StreamId>) {
        self.head_mut().set_stream_id(stream_id);
    }
}

/// FIFO of stream ids awaiting a reply on one connection.
///
/// Each decoded message pushes one entry: its stream id, or `None` when it
/// carried none. Each outbound message pops one entry. A reset removes the
/// first entry for its stream so later replies stay aligned.
///
/// # Examples
///
/// ```
/// use spillframe::{
///     correlation::{CorrelatableMessage, StreamIdCorrelator},
///     frame::StreamId,
///     message::{MessageHead, ResponseHead},
/// };
///
/// let mut correlator = StreamIdCorrelator::new();
/// let mut inbound = MessageHead::from(ResponseHead::new(http::StatusCode::OK, http::Version::HTTP_11));
/// inbound.set_stream_id(Some(StreamId(3)));
/// correlator.observe_inbound(&inbound);
///
/// let mut reply = MessageHead::from(ResponseHead::new(http::StatusCode::OK, http::Version::HTTP_11));
/// correlator.stamp_outbound(&mut reply);
/// assert_eq!(CorrelatableMessage::stream_id(&reply), Some(StreamId(3)));
/// ```
#[derive(Debug, Default)]
pub struct StreamIdCorrelator {
    pending: VecDeque<Option<StreamId>>,
}

impl StreamIdCorrelator {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Record a decoded message.
    pub fn observe_inbound<M: CorrelatableMessage + ?Sized>(&mut self, message: &M) {
        let stream_id = message.stream_id();
        trace!(?stream_id, pending = self.pending.len(), "stream id queued");
        self.pending.push_back(stream_id);
    }

    /// Forget `stream_id` after the peer reset it.
    ///
    /// Returns `true` if an entry was removed. Unknown ids are ignored.
    pub fn observe_reset(&mut self, stream_id: StreamId) -> bool {
        let Some(index) = self.pending.iter().position(|id| *id == Some(stream_id)) else {
            return false;
        };
        self.pending.remove(index);
        debug!(%stream_id, "reset stream dropped from correlation queue");
        true
    }

    /// Pop the oldest entry and stamp it onto `message`.
    ///
    /// A message that already names a stream keeps it. With an empty queue
    /// the message passes through untouched. Returns the popped entry.
    pub fn stamp_outbound<M: CorrelatableMessage + ?Sized>(
        &mut self,
        message: &mut M,
    ) -> Option<StreamId> {
        let Some(popped) = self.pending.pop_front() else {
            trace!("correlation queue empty, message passed through");
            return None;
        };
        if let Some(stream_id) = popped
            && message.stream_id().is_none()
        {
            message.set_stream_id(Some(stream_id));
        }
        popped
    }

    /// Number of decoded messages still awaiting a reply.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.pending.len() }

    /// Drop every pending entry.
    pub fn clear(&mut self) { self.pending.clear(); }
}
