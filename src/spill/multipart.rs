//! Disk spilling for plain HTTP multipart uploads.
//!
//! [`MultipartSpiller`] sits after an HTTP/1.x parser. Requests that are not
//! multipart pass through untouched. Multipart requests whose declared
//! length fits the memory threshold also pass through, piece by piece.
//! Larger ones are swallowed: their content goes to a temporary file and a
//! single [`SpilledMessage`] is emitted once the last piece arrives.

use std::{mem, sync::Arc};

use log::{debug, info, warn};

use super::{BodySpill, ProgressListener, SpillError, TempStore};
use crate::{
    message::{HttpContent, HttpPiece, RequestHead, SpilledMessage},
    metrics,
};

/// Output of [`MultipartSpiller::decode`].
#[derive(Debug)]
pub enum SpillOutput {
    /// A piece forwarded unchanged.
    Piece(HttpPiece),
    /// A complete request whose body is on disk.
    Spilled(SpilledMessage),
}

enum BodyState {
    /// No multipart body in progress; content passes through.
    Idle,
    /// A multipart body below the threshold is passing through.
    Buffered,
    /// A multipart body is being written to disk.
    Spilling { head: RequestHead, spill: BodySpill },
}

/// Plain-path body accumulator for one connection.
///
/// # Examples
///
/// ```no_run
/// use spillframe::{
///     message::{HttpContent, HttpPiece, RequestHead},
///     spill::{MultipartSpiller, SpillOutput, TempStore},
/// };
///
/// let mut spiller = MultipartSpiller::new(TempStore::new("/var/tmp/uploads"), 1024);
/// let mut head = RequestHead::new(http::Method::POST, "/upload", http::Version::HTTP_11);
/// head.headers.add("Content-Type", "multipart/form-data; boundary=x");
/// head.headers.add("Content-Length", "4096");
///
/// let mut out = Vec::new();
/// spiller.decode(HttpPiece::Request(head), &mut out)?;
/// spiller.decode(HttpPiece::Content(HttpContent::last(vec![0u8; 4096])), &mut out)?;
/// assert!(matches!(out.as_slice(), [SpillOutput::Spilled(_)]));
/// # Ok::<(), spillframe::spill::SpillError>(())
/// ```
pub struct MultipartSpiller {
    store: TempStore,
    threshold: u64,
    listener: Option<Arc<dyn ProgressListener>>,
    state: BodyState,
}

impl MultipartSpiller {
    /// Spill multipart bodies declared larger than `threshold` bytes.
    #[must_use]
    pub fn new(store: TempStore, threshold: u64) -> Self {
        Self {
            store,
            threshold,
            listener: None,
            state: BodyState::Idle,
        }
    }

    /// Attach an observer notified for every multipart body.
    #[must_use]
    pub fn with_progress_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Whether a body is currently being written to disk.
    #[must_use]
    pub fn is_spilling(&self) -> bool { matches!(self.state, BodyState::Spilling { .. }) }

    /// Feed one parsed piece, appending whatever should travel downstream.
    ///
    /// # Errors
    ///
    /// Returns a [`SpillError`] if the temporary file cannot be created or
    /// written. The body in progress is abandoned and its file removed; the
    /// spiller is ready for the next request.
    pub fn decode(&mut self, piece: HttpPiece, out: &mut Vec<SpillOutput>) -> Result<(), SpillError> {
        match piece {
            HttpPiece::Request(head) => self.start_body(head, out),
            HttpPiece::Content(content) => self.accept_content(content, out),
        }
    }

    /// Abandon any body in progress, deleting its partial file.
    pub fn close(&mut self) {
        if let BodyState::Spilling { head, .. } = mem::replace(&mut self.state, BodyState::Idle) {
            debug!("abandoned spilled body on close: uri={}", head.uri);
        }
    }

    fn start_body(&mut self, head: RequestHead, out: &mut Vec<SpillOutput>) -> Result<(), SpillError> {
        if let BodyState::Spilling { head: previous, .. } =
            mem::replace(&mut self.state, BodyState::Idle)
        {
            warn!(
                "request arrived before previous spilled body completed: uri={}",
                previous.uri
            );
        }

        if !head.is_multipart() {
            out.push(SpillOutput::Piece(HttpPiece::Request(head)));
            return Ok(());
        }

        let spill_to_disk = head
            .content_length()
            .is_some_and(|declared| declared > self.threshold);
        if spill_to_disk {
            let spill = BodySpill::create(&self.store, &head, self.listener.clone())?;
            info!(
                "spilling multipart body to disk: uri={}, path={}",
                head.uri,
                spill.path().display()
            );
            metrics::inc_spilled_bodies();
            self.state = BodyState::Spilling { head, spill };
        } else {
            if let Some(listener) = &self.listener {
                listener.upload_started(&head);
            }
            self.state = BodyState::Buffered;
            out.push(SpillOutput::Piece(HttpPiece::Request(head)));
        }
        Ok(())
    }

    fn accept_content(
        &mut self,
        content: HttpContent,
        out: &mut Vec<SpillOutput>,
    ) -> Result<(), SpillError> {
        let last = content.is_last();
        match mem::replace(&mut self.state, BodyState::Idle) {
            BodyState::Idle => out.push(SpillOutput::Piece(HttpPiece::Content(content))),
            BodyState::Buffered => {
                if let Some(listener) = &self.listener {
                    listener.bytes_written(content.len() as u64);
                    if last {
                        listener.upload_finished();
                    }
                }
                if !last {
                    self.state = BodyState::Buffered;
                }
                out.push(SpillOutput::Piece(HttpPiece::Content(content)));
            }
            BodyState::Spilling { head, mut spill } => {
                spill.write(content.data())?;
                metrics::add_spilled_bytes(content.len() as u64);
                drop(content);
                if last {
                    let file = spill.finish()?;
                    out.push(SpillOutput::Spilled(SpilledMessage::new(head, file)));
                } else {
                    self.state = BodyState::Spilling { head, spill };
                }
            }
        }
        Ok(())
    }
}
