//! Per-stream reconstruction state.

use std::collections::{HashMap, hash_map::Entry};

use bytes::BytesMut;
use log::warn;

use crate::{frame::StreamId, message::MessageHead, spill::BodySpill};

/// Where the body of a stream is accumulating.
#[derive(Debug)]
pub(crate) enum StreamBody {
    /// No data has arrived and no spill was prepared.
    Unset,
    Memory(BytesMut),
    /// Written to disk, bounded by the length the head declared.
    Disk { spill: BodySpill, declared: u64 },
}

/// A message whose head has been received but whose body has not finished.
#[derive(Debug)]
pub(crate) struct StreamState {
    pub(crate) head: MessageHead,
    pub(crate) body: StreamBody,
    /// A trailing `HEADERS` frame was truncated and its fields dropped.
    pub(crate) truncated_headers: bool,
    /// A progress listener is following this in-memory body.
    pub(crate) observed: bool,
}

impl StreamState {
    pub(crate) fn new(head: MessageHead, body: StreamBody) -> Self {
        Self {
            head,
            body,
            truncated_headers: false,
            observed: false,
        }
    }
}

/// Connection-scoped map from stream id to [`StreamState`].
///
/// Dropping a state drops its [`BodySpill`], which closes the handle and
/// deletes the partial file, so removal is all the cleanup a stream needs.
#[derive(Debug, Default)]
pub(crate) struct StreamTable {
    streams: HashMap<StreamId, StreamState>,
}

impl StreamTable {
    /// Store the state for `stream_id`, replacing a stale entry if the peer
    /// reused a live id.
    pub(crate) fn insert(&mut self, stream_id: StreamId, state: StreamState) {
        match self.streams.entry(stream_id) {
            Entry::Occupied(mut entry) => {
                warn!("stream opened twice, discarding earlier state: stream_id={stream_id}");
                entry.insert(state);
            }
            Entry::Vacant(entry) => {
                entry.insert(state);
            }
        }
    }

    pub(crate) fn get_mut(&mut self, stream_id: StreamId) -> Option<&mut StreamState> {
        self.streams.get_mut(&stream_id)
    }

    pub(crate) fn remove(&mut self, stream_id: StreamId) -> Option<StreamState> {
        self.streams.remove(&stream_id)
    }

    /// Drop every stream. Returns how many were in flight.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.streams.len();
        self.streams.clear();
        count
    }

    pub(crate) fn len(&self) -> usize { self.streams.len() }
}
