//! Lazy producers of body chunks.

use std::{
    fmt,
    fs::File,
    io::{self, Read},
    num::NonZeroUsize,
    path::Path,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
};

use bytes::Bytes;
use futures::{
    Stream,
    task::{self as futures_task, ArcWake},
};

use super::driver::ResumeHandle;

/// A body produced one chunk at a time.
///
/// The writer pulls chunks only while the sink is writable. A source that
/// has nothing ready returns `Ok(None)` without reaching its end; the
/// writer then suspends the transfer until
/// [`ResumeHandle::resume_transfer`] is called.
pub trait ChunkSource: Send {
    /// Produce the next chunk, or `None` if nothing is ready yet.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the underlying data cannot be read. The
    /// writer fails the transfer and closes the source.
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>>;

    /// Whether every chunk has been produced.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the state of the source cannot be determined.
    fn is_end_of_input(&mut self) -> io::Result<bool>;

    /// Release any resources held by the source.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if releasing fails; the writer logs it.
    fn close(&mut self) -> io::Result<()> { Ok(()) }
}

/// Slices an in-memory buffer into chunks of at most `chunk_size` bytes.
#[derive(Debug)]
pub struct BytesChunkSource {
    data: Bytes,
    chunk_size: NonZeroUsize,
}

impl BytesChunkSource {
    #[must_use]
    pub fn new(data: impl Into<Bytes>, chunk_size: NonZeroUsize) -> Self {
        Self {
            data: data.into(),
            chunk_size,
        }
    }
}

impl ChunkSource for BytesChunkSource {
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.data.is_empty() {
            return Ok(None);
        }
        let len = self.data.len().min(self.chunk_size.get());
        Ok(Some(self.data.split_to(len)))
    }

    fn is_end_of_input(&mut self) -> io::Result<bool> { Ok(self.data.is_empty()) }
}

/// Reads a file from start to end in fixed-size chunks.
///
/// The length is taken when the file is opened; bytes appended later are
/// not sent.
#[derive(Debug)]
pub struct FileChunkSource {
    file: Option<File>,
    chunk_size: NonZeroUsize,
    remaining: u64,
}

impl FileChunkSource {
    /// Open `path` for chunked reading.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or inspected.
    pub fn open(path: impl AsRef<Path>, chunk_size: NonZeroUsize) -> io::Result<Self> {
        let file = File::open(path)?;
        let remaining = file.metadata()?.len();
        Ok(Self {
            file: Some(file),
            chunk_size,
            remaining,
        })
    }
}

impl ChunkSource for FileChunkSource {
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::other("file chunk source already closed"));
        };
        let chunk = self.chunk_size.get();
        let len = usize::try_from(self.remaining).map_or(chunk, |remaining| remaining.min(chunk));
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        self.remaining -= len as u64;
        Ok(Some(Bytes::from(buf)))
    }

    fn is_end_of_input(&mut self) -> io::Result<bool> { Ok(self.remaining == 0) }

    fn close(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }
}

/// Wakes the writer when a pending stream has more data.
struct ResumeOnWake(ResumeHandle);

impl ArcWake for ResumeOnWake {
    fn wake_by_ref(arc_self: &Arc<Self>) { arc_self.0.resume_transfer(); }
}

/// Adapts a [`Stream`] of chunks to [`ChunkSource`].
///
/// The stream is polled without blocking. When it is pending, its waker
/// resumes the writer through the supplied [`ResumeHandle`], so transfers
/// restart as soon as the producer has data.
pub struct StreamChunkSource<S> {
    stream: S,
    done: bool,
    waker: Waker,
}

impl<S> StreamChunkSource<S>
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
{
    #[must_use]
    pub fn new(stream: S, resume: ResumeHandle) -> Self {
        Self {
            stream,
            done: false,
            waker: futures_task::waker(Arc::new(ResumeOnWake(resume))),
        }
    }
}

impl<S> ChunkSource for StreamChunkSource<S>
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
{
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }
        let mut cx = Context::from_waker(&self.waker);
        match Pin::new(&mut self.stream).poll_next(&mut cx) {
            Poll::Ready(Some(chunk)) => chunk.map(Some),
            Poll::Ready(None) => {
                self.done = true;
                Ok(None)
            }
            Poll::Pending => Ok(None),
        }
    }

    fn is_end_of_input(&mut self) -> io::Result<bool> { Ok(self.done) }
}

impl<S> fmt::Debug for StreamChunkSource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamChunkSource")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
