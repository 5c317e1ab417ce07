//! Reusable buffers keyed by capacity class.
//!
//! A [`BufferPool`] keeps one stack of returned buffers per power-of-two
//! capacity class. [`BufferPool::rent`] pops a buffer of the smallest class
//! that fits, so steady-state query execution does not allocate.
//!
//! Not thread-safe; owned by the query that issues the work.

/// Stack-based buffer reuse keyed by capacity class.
#[derive(Debug)]
pub struct BufferPool<T> {
    stacks: Vec<Vec<Vec<T>>>,
}

impl<T> Default for BufferPool<T> {
    fn default() -> Self {
        Self { stacks: Vec::new() }
    }
}

#[inline]
fn class_of(capacity: usize) -> usize {
    capacity.max(1).next_power_of_two().trailing_zeros() as usize
}

impl<T> BufferPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty buffer with capacity of at least `min_capacity`.
    pub fn rent(&mut self, min_capacity: usize) -> Vec<T> {
        let class = class_of(min_capacity);
        if let Some(buffer) = self.stacks.get_mut(class).and_then(Vec::pop) {
            return buffer;
        }
        Vec::with_capacity(1 << class)
    }

    /// Returns a buffer for reuse. Its contents are dropped.
    pub fn give_back(&mut self, mut buffer: Vec<T>) {
        buffer.clear();
        if buffer.capacity() == 0 {
            return;
        }
        // Largest class the buffer fully covers.
        let class = (usize::BITS - 1 - buffer.capacity().leading_zeros()) as usize;
        if self.stacks.len() <= class {
            self.stacks.resize_with(class + 1, Vec::new);
        }
        self.stacks[class].push(buffer);
    }

    /// Number of buffers waiting for reuse.
    pub fn pooled(&self) -> usize {
        self.stacks.iter().map(Vec::len).sum()
    }
}
