//! Reusable backing storage for [`crate::formatting::SpanBuilder`].

use std::cell::RefCell;

/// Default number of buffers a pool keeps for reuse.
pub const DEFAULT_RETAINED: usize = 16;

/// A bounded set of returned buffers.
///
/// The pool is owned by whoever formats names (one per analyzer) and shared by reference
/// with the builders it feeds, so it uses interior mutability instead of locks. Buffers
/// beyond the retention bound are simply dropped.
#[derive(Debug)]
pub struct BufferPool<T> {
    buffers: RefCell<Vec<Vec<T>>>,
    max_retained: usize,
}

impl<T> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED)
    }
}

impl<T> BufferPool<T> {
    /// Create a pool keeping at most `max_retained` buffers.
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        BufferPool {
            buffers: RefCell::new(Vec::new()),
            max_retained,
        }
    }

    /// Take an empty buffer with at least `min_capacity` capacity.
    pub fn rent(&self, min_capacity: usize) -> Vec<T> {
        let mut buffers = self.buffers.borrow_mut();

        let fitting = buffers
            .iter()
            .position(|buffer| buffer.capacity() >= min_capacity);

        match fitting {
            Some(index) => buffers.swap_remove(index),
            None => match buffers.pop() {
                Some(mut buffer) => {
                    buffer.reserve(min_capacity);
                    buffer
                }
                None => Vec::with_capacity(min_capacity),
            },
        }
    }

    /// Hand a buffer back for reuse. Its contents are discarded.
    pub fn give_back(&self, mut buffer: Vec<T>) {
        let mut buffers = self.buffers.borrow_mut();
        if buffers.len() < self.max_retained && buffer.capacity() > 0 {
            buffer.clear();
            buffers.push(buffer);
        }
    }

    /// Number of buffers currently retained.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.buffers.borrow().len()
    }
}
