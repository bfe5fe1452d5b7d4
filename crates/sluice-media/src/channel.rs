//! Channel surface shared by anything that buffers messages for a consumer.
//!
//! Each event has a single callback slot. Setting a slot replaces the
//! previous callback; triggering an empty slot does nothing. Callbacks run
//! on the thread that triggered them, with no channel lock held.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sluice_core::Message;

/// Poll-style consumer interface. None of these calls block.
pub trait Channel {
    /// Remove and return the oldest buffered message.
    fn receive(&self) -> Option<Message>;

    /// Oldest buffered message, left in place.
    fn peek(&self) -> Option<Message>;

    /// Bytes currently buffered.
    fn available_amount(&self) -> usize;

    fn events(&self) -> &ChannelEvents;
}

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

struct Slot<A>(RwLock<Option<Callback<A>>>);

impl<A> Default for Slot<A> {
    fn default() -> Self {
        Self(RwLock::new(None))
    }
}

impl<A> Slot<A> {
    fn set(&self, callback: Callback<A>) {
        *self.0.write() = Some(callback);
    }

    fn clear(&self) {
        *self.0.write() = None;
    }

    fn call(&self, arg: A) {
        let callback = self.0.read().clone();
        if let Some(callback) = callback {
            callback(arg);
        }
    }
}

/// Open/closed/error/available/buffered-amount-low notifications.
#[derive(Default)]
pub struct ChannelEvents {
    open: Slot<()>,
    closed: Slot<()>,
    error: Slot<String>,
    available: Slot<usize>,
    buffered_amount_low: Slot<()>,

    buffered_amount: AtomicUsize,
    buffered_amount_low_threshold: AtomicUsize,
}

impl ChannelEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(&self, f: impl Fn() + Send + Sync + 'static) {
        self.open.set(Arc::new(move |()| f()));
    }

    pub fn on_closed(&self, f: impl Fn() + Send + Sync + 'static) {
        self.closed.set(Arc::new(move |()| f()));
    }

    pub fn on_error(&self, f: impl Fn(String) + Send + Sync + 'static) {
        self.error.set(Arc::new(f));
    }

    /// Called with the number of queued messages after each arrival.
    pub fn on_available(&self, f: impl Fn(usize) + Send + Sync + 'static) {
        self.available.set(Arc::new(f));
    }

    pub fn on_buffered_amount_low(&self, f: impl Fn() + Send + Sync + 'static) {
        self.buffered_amount_low.set(Arc::new(move |()| f()));
    }

    pub fn trigger_open(&self) {
        self.open.call(());
    }

    pub fn trigger_closed(&self) {
        self.closed.call(());
    }

    pub fn trigger_error(&self, error: impl Into<String>) {
        self.error.call(error.into());
    }

    pub fn trigger_available(&self, count: usize) {
        self.available.call(count);
    }

    /// Record the sender-side buffered amount.
    ///
    /// Fires the low callback when the amount crosses from above the
    /// threshold to at or below it.
    pub fn trigger_buffered_amount(&self, amount: usize) {
        let previous = self.buffered_amount.swap(amount, Ordering::AcqRel);
        let threshold = self.buffered_amount_low_threshold.load(Ordering::Acquire);
        if previous > threshold && amount <= threshold {
            self.buffered_amount_low.call(());
        }
    }

    pub fn buffered_amount(&self) -> usize {
        self.buffered_amount.load(Ordering::Acquire)
    }

    pub fn set_buffered_amount_low_threshold(&self, amount: usize) {
        self.buffered_amount_low_threshold.store(amount, Ordering::Release);
    }

    pub fn buffered_amount_low_threshold(&self) -> usize {
        self.buffered_amount_low_threshold.load(Ordering::Acquire)
    }

    /// Drop every registered callback.
    pub fn reset_callbacks(&self) {
        self.open.clear();
        self.closed.clear();
        self.error.clear();
        self.available.clear();
        self.buffered_amount_low.clear();
    }
}
