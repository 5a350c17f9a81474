use std::sync::{Arc, Mutex, PoisonError};

/// Append-only collection shared by concurrent loader tasks.
///
/// Items come out in whatever order the tasks finished; callers impose
/// their own order afterwards.
#[derive(Debug)]
pub struct AppendSink<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for AppendSink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for AppendSink<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> AppendSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        // A panicking writer cannot leave a half-pushed Vec behind.
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything appended so far.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
