use thiserror::Error;

/// Returned when consuming from a queue with no recorded entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dequeue from an empty queue")]
pub struct EmptyQueue;

/// FIFO queue backed by a reusable buffer
///
/// Consumed entries are skipped with a head offset instead of being shifted
/// out. The buffer is compacted once everything has been consumed, or when it
/// is about to grow while a consumed prefix could be reclaimed instead, so a
/// queue cycled through many enqueue/dequeue rounds keeps a bounded footprint.
#[derive(Debug, Clone)]
pub struct FifoQueue<T> {
    head: usize,
    data: Vec<T>,
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self {
            head: 0,
            data: Vec::new(),
        }
    }
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently queued
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add an entry at the back of the queue
    pub fn enqueue(&mut self, item: T) {
        if self.data.len() == self.data.capacity() && self.head > 0 {
            self.data.drain(..self.head);
            self.head = 0;
        }
        self.data.push(item);
    }

    /// Remove and return the oldest entry
    pub fn dequeue(&mut self) -> Result<T, EmptyQueue>
    where
        T: Copy,
    {
        let item = *self.data.get(self.head).ok_or(EmptyQueue)?;
        self.head += 1;

        if self.is_empty() {
            self.reset();
        }

        Ok(item)
    }

    /// Current entries, oldest first
    pub fn as_slice(&self) -> &[T] {
        &self.data[self.head..]
    }

    /// Clear the queue, keeping its allocation for reuse
    pub fn reset(&mut self) {
        self.head = 0;
        self.data.clear();
    }
}
