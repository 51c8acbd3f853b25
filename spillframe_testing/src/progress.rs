//! A [`ProgressListener`] that remembers what it was told.

use std::sync::{Mutex, MutexGuard};

use spillframe::{message::RequestHead, spill::ProgressListener};

/// One notification received by [`RecordingProgress`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { uri: String },
    Bytes(u64),
    Finished,
}

#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, Vec<ProgressEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> { self.lock().clone() }

    /// Sum of all byte notifications.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.lock()
            .iter()
            .map(|event| match event {
                ProgressEvent::Bytes(count) => *count,
                _ => 0,
            })
            .sum()
    }
}

impl ProgressListener for RecordingProgress {
    fn upload_started(&self, request: &RequestHead) {
        self.lock().push(ProgressEvent::Started {
            uri: request.uri.clone(),
        });
    }

    fn bytes_written(&self, count: u64) { self.lock().push(ProgressEvent::Bytes(count)); }

    fn upload_finished(&self) { self.lock().push(ProgressEvent::Finished); }
}
