/// Fixed-size rings indexed by a wrapping cursor

use crate::error::{Error, Result};

/// Wrapping index into a ring of `len` slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor {
    index: usize,
    len: usize,
}

impl RingCursor {
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(Error::PreconditionFailed("Ring length must be at least 1".to_string()));
        }
        Ok(Self { index: 0, len })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Move to the next slot and return its index
    pub fn advance(&mut self) -> usize {
        self.index = (self.index + 1) % self.len;
        self.index
    }
}

/// Ring of per-frame items (uniform buffers, per-frame scratch)
#[derive(Debug)]
pub struct FrameRing<T> {
    items: Vec<T>,
    cursor: RingCursor,
}

impl<T> FrameRing<T> {
    pub fn new(items: Vec<T>) -> Result<Self> {
        let cursor = RingCursor::new(items.len())?;
        Ok(Self { items, cursor })
    }

    /// Build `count` items with `make(index)`
    pub fn try_from_fn(count: usize, make: impl FnMut(usize) -> Result<T>) -> Result<Self> {
        let items = (0..count).map(make).collect::<Result<Vec<T>>>()?;
        Self::new(items)
    }

    pub fn current(&self) -> &T {
        &self.items[self.cursor.index()]
    }

    pub fn current_mut(&mut self) -> &mut T {
        &mut self.items[self.cursor.index()]
    }

    pub fn index(&self) -> usize {
        self.cursor.index()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move to the next item, wrapping to the first after the last
    pub fn advance(&mut self) -> &T {
        let index = self.cursor.advance();
        &self.items[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
