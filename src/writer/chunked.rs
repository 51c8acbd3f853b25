//! Flow-controlled drain of queued payloads.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::{
    ChunkSource,
    OutboundSink,
    Payload,
    WriteError,
    WriteHandle,
    pending::{Completion, PendingWrite},
};
use crate::{message::HttpContent, metrics};

/// What to do with the current item after one drain step.
enum Step<T> {
    /// The item completed; move to the next one.
    Next,
    /// A chunk was written and more remain.
    Continue(PendingWrite<T>),
    /// The source has nothing ready; stop until resumed.
    Suspend(PendingWrite<T>),
}

/// Queues outbound payloads and writes them while the sink is writable.
///
/// Items are written strictly in the order they were enqueued. A chunked
/// payload stays current until its source is exhausted, so later items wait
/// behind it. Nothing is written from [`enqueue`](Self::enqueue); the
/// queue drains on [`flush`](Self::flush), when writability returns, on
/// [`resume_transfer`](Self::resume_transfer) or when the connection goes
/// inactive, which fails everything still pending.
///
/// Chunks are handed to the sink as [`HttpContent`], the final one as
/// [`HttpContent::Last`].
pub struct ChunkedWriter<S: OutboundSink> {
    sink: S,
    queue: VecDeque<PendingWrite<S::Item>>,
    current: Option<PendingWrite<S::Item>>,
}

impl<S> ChunkedWriter<S>
where
    S: OutboundSink,
    S::Item: From<HttpContent>,
{
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            queue: VecDeque::new(),
            current: None,
        }
    }

    #[must_use]
    pub fn sink(&self) -> &S { &self.sink }

    pub fn sink_mut(&mut self) -> &mut S { &mut self.sink }

    /// Consume the writer, returning the sink. Pending items fail as closed.
    pub fn into_sink(mut self) -> S {
        self.discard(&WriteError::Closed);
        self.sink
    }

    /// Queue `payload` behind everything already pending.
    pub fn enqueue(&mut self, payload: Payload<S::Item>) -> WriteHandle {
        let (completion, handle) = Completion::new();
        self.push(PendingWrite {
            payload,
            completion,
        });
        handle
    }

    pub(crate) fn push(&mut self, pending: PendingWrite<S::Item>) { self.queue.push_back(pending); }

    /// Items not yet completed, including a suspended transfer.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.queue.len() + usize::from(self.current.is_some()) }

    /// Drain if the sink is writable, or discard if it is inactive.
    pub fn flush(&mut self) {
        if self.sink.is_writable() || !self.sink.is_active() {
            self.drain();
        }
    }

    /// React to a change in the sink's writability.
    pub fn writability_changed(&mut self) {
        if self.sink.is_writable() {
            self.drain();
        }
    }

    /// The connection went away: fail everything pending.
    pub fn connection_inactive(&mut self) { self.drain(); }

    /// Continue a suspended transfer.
    pub fn resume_transfer(&mut self) { self.drain(); }

    /// Fail every pending item as closed.
    pub fn close(&mut self) { self.discard(&WriteError::Closed); }

    fn drain(&mut self) {
        if !self.sink.is_active() {
            self.discard(&WriteError::Closed);
            return;
        }
        while self.sink.is_writable() {
            let Some(pending) = self.current.take().or_else(|| self.queue.pop_front()) else {
                break;
            };
            match self.write_step(pending) {
                Step::Next => {}
                Step::Continue(pending) => self.current = Some(pending),
                Step::Suspend(pending) => {
                    self.current = Some(pending);
                    break;
                }
            }
            if let Err(e) = self.sink.flush() {
                warn!(error = %e, "sink flush failed");
            }
            if !self.sink.is_active() {
                self.discard(&WriteError::Closed);
                return;
            }
        }
    }

    fn write_step(&mut self, pending: PendingWrite<S::Item>) -> Step<S::Item> {
        let PendingWrite {
            payload,
            completion,
        } = pending;
        match payload {
            Payload::Item(item) => {
                match self.sink.write(item) {
                    Ok(()) => completion.succeed(),
                    Err(e) => completion.fail(WriteError::sink_failed(e)),
                }
                Step::Next
            }
            Payload::Chunks(source) => self.write_chunk(source, completion),
        }
    }

    fn write_chunk(
        &mut self,
        mut source: Box<dyn ChunkSource>,
        mut completion: Completion,
    ) -> Step<S::Item> {
        let pulled = source
            .next_chunk()
            .and_then(|chunk| Ok((chunk, source.is_end_of_input()?)));
        let (chunk, end_of_input) = match pulled {
            Ok(pulled) => pulled,
            Err(e) => {
                warn!(error = %e, "chunk source failed");
                completion.fail(WriteError::source_failed(e));
                close_source(source);
                return Step::Next;
            }
        };
        if chunk.is_none() && !end_of_input {
            return Step::Suspend(PendingWrite {
                payload: Payload::Chunks(source),
                completion,
            });
        }

        let data = chunk.unwrap_or_default();
        let amount = data.len() as u64;
        let content = if end_of_input {
            HttpContent::last(data)
        } else {
            HttpContent::Chunk(data)
        };
        if let Err(e) = self.sink.write(S::Item::from(content)) {
            completion.fail(WriteError::sink_failed(e));
            close_source(source);
            return Step::Next;
        }
        completion.progress(amount);
        if end_of_input {
            completion.succeed();
            close_source(source);
            Step::Next
        } else {
            Step::Continue(PendingWrite {
                payload: Payload::Chunks(source),
                completion,
            })
        }
    }

    fn discard(&mut self, cause: &WriteError) {
        let mut failed = 0usize;
        while let Some(PendingWrite {
            payload,
            completion,
        }) = self.current.take().or_else(|| self.queue.pop_front())
        {
            match payload {
                Payload::Item(_) => {
                    completion.fail(cause.clone());
                    failed += 1;
                }
                Payload::Chunks(mut source) => {
                    match source.is_end_of_input() {
                        Ok(true) => completion.succeed(),
                        Ok(false) => {
                            completion.fail(cause.clone());
                            failed += 1;
                        }
                        Err(e) => {
                            warn!(error = %e, "chunk source end-of-input check failed");
                            completion.fail(WriteError::source_failed(e));
                            failed += 1;
                        }
                    }
                    close_source(source);
                }
            }
        }
        if failed > 0 {
            debug!(failed, %cause, "pending writes discarded");
            for _ in 0..failed {
                metrics::inc_writes_aborted();
            }
        }
    }
}

fn close_source(mut source: Box<dyn ChunkSource>) {
    if let Err(e) = source.close() {
        warn!(error = %e, "failed to close chunk source");
    }
}

impl<S> std::fmt::Debug for ChunkedWriter<S>
where
    S: OutboundSink + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedWriter")
            .field("sink", &self.sink)
            .field("queued", &self.queue.len())
            .field("suspended", &self.current.is_some())
            .finish()
    }
}
