//! Bounded receive queue with tail drop.
//!
//! Capacity is a packet count. Alongside the count the queue keeps a byte
//! amount computed by a size function, which is what a track reports as
//! its available amount. When full, the newest arrival is refused; queued
//! packets are never evicted.
//!
//! `peek` and `pop` each take the lock once. A `peek` on one thread followed
//! by a `pop` on another is not guaranteed to see the same message; a
//! single consumer thread always does.

use std::collections::VecDeque;

use parking_lot::Mutex;
use sluice_core::Message;

/// Bytes a message counts against the queue.
pub type SizeFn = fn(&Message) -> usize;

struct Inner {
    queue: VecDeque<Message>,
    amount: usize,
}

pub struct RecvQueue {
    inner: Mutex<Inner>,
    limit: usize,
    size_fn: SizeFn,
}

impl RecvQueue {
    /// Queue holding at most `limit` messages, sized by [`Message::size`].
    pub fn new(limit: usize) -> Self {
        Self::with_size_fn(limit, Message::size)
    }

    pub fn with_size_fn(limit: usize, size_fn: SizeFn) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(limit.min(1024)),
                amount: 0,
            }),
            limit,
            size_fn,
        }
    }

    /// Append a message unless the queue is full.
    ///
    /// Returns the new length, or hands the message back when it was dropped.
    pub fn try_push(&self, message: Message) -> Result<usize, Message> {
        let mut inner = self.inner.lock();
        if inner.queue.len() >= self.limit {
            return Err(message);
        }
        inner.amount += (self.size_fn)(&message);
        inner.queue.push_back(message);
        Ok(inner.queue.len())
    }

    /// Remove and return the oldest message.
    pub fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock();
        let message = inner.queue.pop_front()?;
        inner.amount -= (self.size_fn)(&message);
        Some(message)
    }

    /// Oldest message, left in place.
    pub fn peek(&self) -> Option<Message> {
        self.inner.lock().queue.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().queue.len() >= self.limit
    }

    /// Sum of the size function over queued messages.
    pub fn amount(&self) -> usize {
        self.inner.lock().amount
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.queue.clear();
        inner.amount = 0;
    }
}
