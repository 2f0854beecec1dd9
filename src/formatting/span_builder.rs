//! Append-only builder over `Copy` elements with caller-supplied or pooled storage.
//!
//! A builder starts on a caller-provided slice (typically a stack array) or on a buffer
//! rented from a [`BufferPool`]. When it runs out of room it moves to a larger rented buffer
//! of `max(needed, 2 * capacity)` elements, hands the previous rented buffer back and keeps
//! going. Finalizing consumes the builder, so storage can never be touched after release.

use crate::formatting::BufferPool;

const DEFAULT_CAPACITY: usize = 16;

enum Storage<'a, T> {
    Borrowed(&'a mut [T]),
    Rented(Vec<T>),
}

/// Growable append-only buffer.
///
/// # Examples
///
/// ```rust
/// use layoutscope::formatting::{BufferPool, SpanBuilder};
///
/// let pool = BufferPool::default();
/// let mut stack = [0u8; 4];
/// let mut builder = SpanBuilder::from_slice(&mut stack, Some(&pool));
/// builder.append_slice(b"Point");
/// builder.append(b'*');
/// assert_eq!(builder.into_string(), "Point*");
/// ```
pub struct SpanBuilder<'a, T: Copy + Default> {
    storage: Storage<'a, T>,
    len: usize,
    pool: Option<&'a BufferPool<T>>,
}

impl<'a, T: Copy + Default> SpanBuilder<'a, T> {
    /// Start on caller-supplied storage; `pool` feeds growth beyond it.
    pub fn from_slice(initial: &'a mut [T], pool: Option<&'a BufferPool<T>>) -> Self {
        SpanBuilder {
            storage: Storage::Borrowed(initial),
            len: 0,
            pool,
        }
    }

    /// Start on a buffer rented from `pool`.
    pub fn with_pool(pool: &'a BufferPool<T>, capacity: usize) -> Self {
        let mut buffer = pool.rent(capacity.max(1));
        let capacity = buffer.capacity();
        buffer.resize(capacity, T::default());

        SpanBuilder {
            storage: Storage::Rented(buffer),
            len: 0,
            pool: Some(pool),
        }
    }

    /// Start on a freshly allocated buffer.
    #[must_use]
    pub fn new() -> Self {
        SpanBuilder {
            storage: Storage::Rented(vec![T::default(); DEFAULT_CAPACITY]),
            len: 0,
            pool: None,
        }
    }

    /// Number of appended elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements the current storage can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Borrowed(slice) => slice.len(),
            Storage::Rented(buffer) => buffer.len(),
        }
    }

    /// The appended elements.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match &self.storage {
            Storage::Borrowed(slice) => &slice[..self.len],
            Storage::Rented(buffer) => &buffer[..self.len],
        }
    }

    fn as_mut_storage(&mut self) -> &mut [T] {
        match &mut self.storage {
            Storage::Borrowed(slice) => slice,
            Storage::Rented(buffer) => buffer.as_mut_slice(),
        }
    }

    /// The most recently appended element.
    pub fn last_mut(&mut self) -> Option<&mut T> {
        let len = self.len;
        if len == 0 {
            return None;
        }
        self.as_mut_storage().get_mut(len - 1)
    }

    /// Append one element.
    pub fn append(&mut self, value: T) {
        self.reserve(1);
        let len = self.len;
        self.as_mut_storage()[len] = value;
        self.len += 1;
    }

    /// Append a run of elements.
    pub fn append_slice(&mut self, values: &[T]) {
        self.reserve(values.len());
        let len = self.len;
        self.as_mut_storage()[len..len + values.len()].copy_from_slice(values);
        self.len += values.len();
    }

    fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        let capacity = self.capacity();
        if needed <= capacity {
            return;
        }

        let new_capacity = needed.max(capacity * 2);
        let mut grown = match self.pool {
            Some(pool) => pool.rent(new_capacity),
            None => Vec::with_capacity(new_capacity),
        };
        grown.extend_from_slice(self.as_slice());
        let target = grown.capacity().max(new_capacity);
        grown.resize(target, T::default());

        let previous = std::mem::replace(&mut self.storage, Storage::Rented(grown));
        if let (Storage::Rented(old), Some(pool)) = (previous, self.pool) {
            pool.give_back(old);
        }
    }

    /// Copy the contents out and release the storage.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        let result = self.as_slice().to_vec();
        self.release();
        result
    }

    fn release(self) {
        if let (Storage::Rented(buffer), Some(pool)) = (self.storage, self.pool) {
            pool.give_back(buffer);
        }
    }
}

impl<T: Copy + Default> Default for SpanBuilder<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanBuilder<'_, u8> {
    /// Append UTF-8 text.
    pub fn append_str(&mut self, text: &str) {
        self.append_slice(text.as_bytes());
    }

    /// Finalize into a `String`, releasing the storage.
    ///
    /// Invalid UTF-8 (only possible through raw byte appends) is replaced, never panics.
    #[must_use]
    pub fn into_string(self) -> String {
        let result = String::from_utf8_lossy(self.as_slice()).into_owned();
        self.release();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_on_caller_storage() {
        let mut stack = [0u32; 8];
        let mut builder = SpanBuilder::from_slice(&mut stack, None);
        builder.append_slice(&[1, 2, 3]);
        builder.append(4);
        assert_eq!(builder.capacity(), 8);
        assert_eq!(builder.into_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn grows_by_doubling() {
        let pool = BufferPool::new(4);
        let mut stack = [0u8; 4];
        let mut builder = SpanBuilder::from_slice(&mut stack, Some(&pool));
        builder.append_str("abcd");
        assert_eq!(builder.capacity(), 4);

        builder.append(b'e');
        assert!(builder.capacity() >= 8);

        // A large append jumps straight to the needed size
        builder.append_slice(&[b'x'; 40]);
        assert!(builder.capacity() >= 45);
        assert_eq!(builder.len(), 45);

        // The intermediate rented buffer went back to the pool
        assert_eq!(pool.retained(), 1);

        let text = builder.into_string();
        assert!(text.starts_with("abcde"));
        assert_eq!(text.len(), 45);
        assert_eq!(pool.retained(), 2);
    }

    #[test]
    fn pooled_storage_is_reused() {
        let pool = BufferPool::new(4);
        let mut builder = SpanBuilder::with_pool(&pool, 32);
        builder.append_str("Dictionary");
        assert_eq!(builder.into_string(), "Dictionary");
        assert_eq!(pool.retained(), 1);

        let builder: SpanBuilder<'_, u8> = SpanBuilder::with_pool(&pool, 8);
        assert_eq!(pool.retained(), 0);
        assert!(builder.is_empty());
        assert!(builder.capacity() >= 32);
    }

    #[test]
    fn last_element() {
        let mut builder = SpanBuilder::new();
        assert!(builder.last_mut().is_none());
        builder.append(1u16);
        builder.append(2u16);
        if let Some(last) = builder.last_mut() {
            *last = 7;
        }
        assert_eq!(builder.as_slice(), &[1, 7]);
    }
}
