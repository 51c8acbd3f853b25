//! A [`ChunkSource`] fed by the test while the writer owns it.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use spillframe::writer::ChunkSource;

#[derive(Debug)]
enum Step {
    Chunk(Bytes),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    finished: bool,
    closed: bool,
    pulls: usize,
}

/// Chunk source driven from the outside.
///
/// Chunks queued with [`push`](Self::push) are produced in order. With the
/// queue empty the source reports nothing ready until
/// [`finish`](Self::finish) marks the end of input. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct ScriptedChunkSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedChunkSource {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// A finished source producing `chunks`.
    #[must_use]
    pub fn finished<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let source = Self::new();
        for chunk in chunks {
            source.push(chunk);
        }
        source.finish();
        source
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn push(&self, chunk: impl Into<Bytes>) { self.lock().steps.push_back(Step::Chunk(chunk.into())); }

    /// Fail the pull that reaches this point of the script.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock().steps.push_back(Step::Fail(message.into()));
    }

    /// No more chunks will be pushed.
    pub fn finish(&self) { self.lock().finished = true; }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.lock().closed }

    /// How many times the writer asked for a chunk.
    #[must_use]
    pub fn pulls(&self) -> usize { self.lock().pulls }
}

impl ChunkSource for ScriptedChunkSource {
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let mut script = self.lock();
        script.pulls += 1;
        match script.steps.pop_front() {
            Some(Step::Chunk(data)) => Ok(Some(data)),
            Some(Step::Fail(message)) => Err(io::Error::other(message)),
            None => Ok(None),
        }
    }

    fn is_end_of_input(&mut self) -> io::Result<bool> {
        let script = self.lock();
        Ok(script.finished && script.steps.is_empty())
    }

    fn close(&mut self) -> io::Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}
