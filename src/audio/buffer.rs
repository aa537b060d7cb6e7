//! Bounded sliding window over the most recent samples.
//!
//! The wake spotter and the streaming recognizer both decode "the last N
//! seconds" of audio; this window keeps exactly that and drops older samples
//! as new ones arrive.

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity FIFO that evicts the oldest samples on overflow.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `data`, evicting from the front to stay within capacity.
    pub fn push_slice(&mut self, data: &[T]) {
        // Only the tail of an oversized slice can survive.
        let data = &data[data.len().saturating_sub(self.capacity)..];
        let overflow = (self.items.len() + data.len()).saturating_sub(self.capacity);
        self.items.drain(..overflow);
        self.items.extend(data.iter().copied());
    }

    /// Chronological copy of the contents; the buffer is left untouched.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().copied().collect()
    }

    /// Chronological contents, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Seconds of audio held, assuming mono at `sample_rate`.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.items.len() as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
