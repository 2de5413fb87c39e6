/// Pending descriptor writes, applied in one batch at bind time
///
/// `push` may be called from any thread; `flush` runs on the thread recording
/// commands. The lock is held while the batch is applied so that a write
/// pushed concurrently lands in the next batch, never half in this one.

use std::sync::Mutex;
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct DescriptorWriteBatch<W> {
    pending: Mutex<Vec<W>>,
}

impl<W> Default for DescriptorWriteBatch<W> {
    fn default() -> Self {
        Self { pending: Mutex::new(Vec::new()) }
    }
}

impl<W> DescriptorWriteBatch<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage one write
    pub fn push(&self, write: W) -> Result<()> {
        self.pending
            .lock()
            .map_err(|_| Error::BackendError("Descriptor write batch lock poisoned".to_string()))?
            .push(write);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map_or(0, |p| p.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand every staged write to `apply` in a single call, then clear the batch
    ///
    /// `apply` is not called when nothing is staged. Returns the number of
    /// writes applied. On error the writes stay staged.
    pub fn flush(&self, apply: impl FnOnce(&[W]) -> Result<()>) -> Result<usize> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| Error::BackendError("Descriptor write batch lock poisoned".to_string()))?;
        if pending.is_empty() {
            return Ok(0);
        }
        apply(&pending)?;
        let count = pending.len();
        pending.clear();
        Ok(count)
    }
}

#[cfg(test)]
#[path = "descriptor_batch_tests.rs"]
mod tests;
