//! An [`OutboundSink`] whose flow control is scripted by the test.

use std::{
    io,
    sync::{Arc, Mutex, MutexGuard},
};

use spillframe::writer::OutboundSink;

#[derive(Debug)]
struct State<T> {
    items: Vec<T>,
    writable: bool,
    active: bool,
    budget: Option<usize>,
    fail_next: bool,
    flushes: usize,
}

/// Records every item written and reports the writability and activity the
/// test asks for.
///
/// Clones share state, so a test can keep one clone for assertions while
/// the writer owns another.
#[derive(Debug)]
pub struct RecordingSink<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for RecordingSink<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self { Self::new() }
}

impl<T> RecordingSink<T> {
    /// A writable, active sink with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                items: Vec::new(),
                writable: true,
                active: true,
                budget: None,
                fail_next: false,
                flushes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_writable(&self, writable: bool) { self.lock().writable = writable; }

    pub fn set_active(&self, active: bool) { self.lock().active = active; }

    /// Become unwritable after `writes` more items. `None` lifts the limit.
    pub fn set_budget(&self, writes: Option<usize>) { self.lock().budget = writes; }

    /// Reject the next write with a broken pipe error.
    pub fn fail_next_write(&self) { self.lock().fail_next = true; }

    /// Number of successful writes so far.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().items.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    #[must_use]
    pub fn flushes(&self) -> usize { self.lock().flushes }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<T> { std::mem::take(&mut self.lock().items) }
}

impl<T: Clone> RecordingSink<T> {
    /// Copy of everything recorded so far.
    #[must_use]
    pub fn items(&self) -> Vec<T> { self.lock().items.clone() }
}

impl<T> OutboundSink for RecordingSink<T> {
    type Item = T;

    fn is_writable(&self) -> bool {
        let state = self.lock();
        state.writable && state.budget != Some(0)
    }

    fn is_active(&self) -> bool { self.lock().active }

    fn write(&mut self, item: T) -> io::Result<()> {
        let mut state = self.lock();
        if std::mem::take(&mut state.fail_next) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
        }
        state.items.push(item);
        if let Some(budget) = state.budget.as_mut() {
            *budget = budget.saturating_sub(1);
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }
}
