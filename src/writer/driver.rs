//! Async task owning a [`ChunkedWriter`].
//!
//! The writer is not thread-safe. [`WriterDriver::run`] owns it on a single
//! task and applies commands from [`WriterHandle`]s and resume requests
//! from [`ResumeHandle`]s in the order they arrive, so producers on any
//! thread can feed one connection.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{
    ChunkedWriter,
    OutboundSink,
    Payload,
    WriteError,
    WriteHandle,
    pending::{Completion, PendingWrite},
};
use crate::message::HttpContent;

enum Command<T> {
    Write(PendingWrite<T>),
    Flush,
    WritabilityChanged,
    ConnectionInactive,
}

/// Requests that a suspended transfer continue.
///
/// Cheap to clone and safe to use from any thread. Requests made while one
/// is already pending are coalesced.
#[derive(Clone, Debug)]
pub struct ResumeHandle {
    tx: mpsc::Sender<()>,
}

impl ResumeHandle {
    /// Ask the driver to pull from suspended chunk sources again.
    pub fn resume_transfer(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => trace!("resume ignored: writer stopped"),
        }
    }
}

/// Producer side of a [`WriterDriver`].
pub struct WriterHandle<T> {
    commands: mpsc::Sender<Command<T>>,
    resume: ResumeHandle,
}

impl<T> Clone for WriterHandle<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            resume: self.resume.clone(),
        }
    }
}

impl<T> WriterHandle<T> {
    /// Queue `payload` without flushing.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Closed`] if the driver has stopped.
    pub async fn write(&self, payload: Payload<T>) -> Result<WriteHandle, WriteError> {
        let (completion, handle) = Completion::new();
        self.send(Command::Write(PendingWrite {
            payload,
            completion,
        }))
        .await?;
        Ok(handle)
    }

    /// Queue `payload` and flush.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Closed`] if the driver has stopped.
    pub async fn write_and_flush(&self, payload: Payload<T>) -> Result<WriteHandle, WriteError> {
        let handle = self.write(payload).await?;
        self.flush().await?;
        Ok(handle)
    }

    /// Drain the queue if the sink is writable.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Closed`] if the driver has stopped.
    pub async fn flush(&self) -> Result<(), WriteError> { self.send(Command::Flush).await }

    /// Tell the driver the sink's writability may have changed.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Closed`] if the driver has stopped.
    pub async fn writability_changed(&self) -> Result<(), WriteError> {
        self.send(Command::WritabilityChanged).await
    }

    /// Tell the driver the connection is gone.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Closed`] if the driver has stopped.
    pub async fn connection_inactive(&self) -> Result<(), WriteError> {
        self.send(Command::ConnectionInactive).await
    }

    #[must_use]
    pub fn resume_handle(&self) -> ResumeHandle { self.resume.clone() }

    async fn send(&self, command: Command<T>) -> Result<(), WriteError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WriteError::Closed)
    }
}

/// Runs a [`ChunkedWriter`] on its own task.
///
/// # Examples
///
/// ```no_run
/// use std::io;
///
/// use spillframe::{
///     message::HttpContent,
///     writer::{OutboundSink, Payload, WriterDriver},
/// };
/// use tokio_util::sync::CancellationToken;
///
/// struct Stdout;
///
/// impl OutboundSink for Stdout {
///     type Item = HttpContent;
///     fn is_writable(&self) -> bool { true }
///     fn is_active(&self) -> bool { true }
///     fn write(&mut self, item: HttpContent) -> io::Result<()> {
///         println!("{} bytes", item.len());
///         Ok(())
///     }
/// }
///
/// # async fn demo() -> Result<(), spillframe::writer::WriteError> {
/// let (driver, handle) = WriterDriver::new(Stdout, 16, CancellationToken::new());
/// tokio::spawn(driver.run());
/// let done = handle
///     .write_and_flush(Payload::Item(HttpContent::last(&b"hi"[..])))
///     .await?;
/// done.wait().await?;
/// # Ok(())
/// # }
/// ```
pub struct WriterDriver<S: OutboundSink> {
    writer: ChunkedWriter<S>,
    commands: mpsc::Receiver<Command<S::Item>>,
    resume: mpsc::Receiver<()>,
    shutdown: CancellationToken,
}

impl<S> WriterDriver<S>
where
    S: OutboundSink,
    S::Item: From<HttpContent>,
{
    /// Create a driver for `sink` accepting up to `capacity` queued commands.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(sink: S, capacity: usize, shutdown: CancellationToken) -> (Self, WriterHandle<S::Item>) {
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (resume_tx, resume_rx) = mpsc::channel(1);
        (
            Self {
                writer: ChunkedWriter::new(sink),
                commands: command_rx,
                resume: resume_rx,
                shutdown,
            },
            WriterHandle {
                commands: command_tx,
                resume: ResumeHandle { tx: resume_tx },
            },
        )
    }

    /// Apply commands until every handle is dropped or `shutdown` fires.
    ///
    /// Anything still pending then fails with [`WriteError::Closed`]. The
    /// sink is returned to the caller.
    pub async fn run(mut self) -> S {
        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },

                Some(()) = self.resume.recv() => self.writer.resume_transfer(),
            }
        }
        debug!(pending = self.writer.pending_len(), "writer driver stopping");
        self.writer.into_sink()
    }

    fn apply(&mut self, command: Command<S::Item>) {
        match command {
            Command::Write(pending) => self.writer.push(pending),
            Command::Flush => self.writer.flush(),
            Command::WritabilityChanged => self.writer.writability_changed(),
            Command::ConnectionInactive => self.writer.connection_inactive(),
        }
    }
}
