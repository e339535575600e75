//! Fixed-capacity FIFO buffer that evicts its oldest element when full.
//!
//! Used two ways by the engine: as a sliding display window (read with
//! [`RingBuffer::to_ordered_vec`]) and as a block window that fills, is
//! consumed whole with [`RingBuffer::drain`], and starts over empty.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: NonZeroUsize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Append `value`, evicting the oldest element first if at capacity.
    pub fn push(&mut self, value: T) {
        if self.items.len() == self.capacity.get() {
            self.items.pop_front();
        }
        self.items.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity.get()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Remove and return every element, oldest first. The buffer is empty afterwards.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the contents, oldest first, without consuming them.
    pub fn to_ordered_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
