//! Track — the boundary between a handler chain and the transport.
//!
//! A track enforces its direction policy on both paths, runs packets through
//! its RTCP handler, buffers received packets in a bounded tail-drop queue,
//! and marks outgoing packets with a DSCP value before handing them to the
//! transport.
//!
//! Locking: description, handler and transport live behind one reader/writer
//! lock. The receive queue synchronizes itself, and the closed flag is a
//! bare atomic, so a close racing an in-flight send or receive may let that
//! one call through. Neither the lock nor the queue is held while a handler
//! or transport runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use sluice_core::config::TrackConfig;
use sluice_core::{ChainError, MediaHandler, Message, MAX_MESSAGE_SIZE};

use crate::channel::{Channel, ChannelEvents};
use crate::counters::TrackCounters;
use crate::description::{Direction, MediaDescription};
use crate::qos::dscp_for;
use crate::queue::RecvQueue;
use crate::transport::MediaTransport;

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("track is closed")]
    Closed,
    #[error("track has no live transport")]
    TransportUnavailable,
    #[error("media description mid {got:?} does not match track mid {expected:?}")]
    MidMismatch { expected: String, got: String },
    #[error("handler chain failed: {0}")]
    Chain(#[from] ChainError),
}

struct TrackState {
    description: MediaDescription,
    handler: Option<Arc<dyn MediaHandler>>,
    transport: Option<Weak<dyn MediaTransport>>,
}

pub struct Track {
    this: Weak<Track>,
    state: RwLock<TrackState>,
    recv_queue: RecvQueue,
    closed: AtomicBool,
    events: ChannelEvents,
    counters: Arc<TrackCounters>,
    config: TrackConfig,
}

impl Track {
    pub fn new(
        description: MediaDescription,
        config: &TrackConfig,
        counters: Arc<TrackCounters>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RwLock::new(TrackState {
                description,
                handler: None,
                transport: None,
            }),
            recv_queue: RecvQueue::new(config.recv_queue_limit),
            closed: AtomicBool::new(false),
            events: ChannelEvents::new(),
            counters,
            config: config.clone(),
        })
    }

    // ── Description ───────────────────────────────────────────────────────────

    pub fn mid(&self) -> String {
        self.state.read().description.mid.clone()
    }

    pub fn description(&self) -> MediaDescription {
        self.state.read().description.clone()
    }

    pub fn direction(&self) -> Direction {
        self.state.read().description.direction
    }

    /// Replace the description. The mid must not change.
    pub fn set_description(&self, description: MediaDescription) -> Result<(), TrackError> {
        let mut state = self.state.write();
        if description.mid != state.description.mid {
            return Err(TrackError::MidMismatch {
                expected: state.description.mid.clone(),
                got: description.mid,
            });
        }
        state.description = description;
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Attach the transport and announce the track as open.
    pub fn open(&self, transport: Arc<dyn MediaTransport>) {
        self.state.write().transport = Some(Arc::downgrade(&transport));
        tracing::debug!(mid = %self.mid(), "track open");
        self.events.trigger_open();
    }

    /// Close the track. Idempotent; only the first call fires `on_closed`.
    pub fn close(&self) {
        let was_closed = self.closed.swap(true, Ordering::AcqRel);
        if !was_closed {
            tracing::debug!(mid = %self.mid(), "track closed");
            self.events.trigger_closed();
        }

        let handler = {
            let mut state = self.state.write();
            state.transport = None;
            state.handler.take()
        };
        // Dropped outside the lock: tearing down a chain may log.
        drop(handler);
        self.events.reset_callbacks();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Not closed, and the transport is still alive.
    pub fn is_open(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state
            .read()
            .transport
            .as_ref()
            .is_some_and(|t| t.strong_count() > 0)
    }

    pub fn max_message_size(&self) -> usize {
        MAX_MESSAGE_SIZE
    }

    pub fn events(&self) -> &ChannelEvents {
        &self.events
    }

    pub fn counters(&self) -> &Arc<TrackCounters> {
        &self.counters
    }

    // ── Handler ───────────────────────────────────────────────────────────────

    /// Install (or with `None`, remove) the RTCP handler.
    ///
    /// The handler's synthesized responses are wired to this track's
    /// [`outgoing`](Self::outgoing), so they reach the transport.
    pub fn set_rtcp_handler(&self, handler: Option<Arc<dyn MediaHandler>>) {
        let mut state = self.state.write();
        if let Some(handler) = &handler {
            let track = self.this.clone();
            handler.on_outgoing(Arc::new(move |message| {
                let Some(track) = track.upgrade() else {
                    return false;
                };
                match track.outgoing(message) {
                    Ok(sent) => sent,
                    Err(e) => {
                        tracing::debug!(error = %e, "send in handler chain failed");
                        false
                    }
                }
            }));
        }
        state.handler = handler;
    }

    pub fn rtcp_handler(&self) -> Option<Arc<dyn MediaHandler>> {
        self.state.read().handler.clone()
    }

    /// Ask the handler chain for a keyframe. False without a capable stage.
    pub fn request_keyframe(&self) -> bool {
        self.rtcp_handler()
            .map(|handler| handler.request_keyframe())
            .unwrap_or(false)
    }

    // ── Send path ─────────────────────────────────────────────────────────────

    /// Send a message from the application.
    ///
    /// `Ok(false)` means the message was refused: the direction forbids
    /// sending, the handler dropped it, or the transport reported failure.
    pub fn send(&self, message: Message) -> Result<bool, TrackError> {
        if self.is_closed() {
            return Err(TrackError::Closed);
        }

        let (direction, handler) = {
            let state = self.state.read();
            (state.description.direction, state.handler.clone())
        };
        if !direction.can_send() {
            self.counters.record_bad_direction();
            tracing::debug!(%direction, "send refused by track direction");
            return Ok(false);
        }

        let message = match handler {
            Some(handler) => match handler.outgoing(message)? {
                Some(message) => message,
                None => return Ok(false),
            },
            None => message,
        };

        self.outgoing(message)
    }

    /// Send raw bytes as a binary message.
    pub fn send_binary(&self, payload: impl Into<bytes::Bytes>) -> Result<bool, TrackError> {
        self.send(Message::binary(payload))
    }

    /// Mark a message and hand it to the transport, bypassing the handler.
    pub fn outgoing(&self, mut message: Message) -> Result<bool, TrackError> {
        if self.is_closed() {
            return Err(TrackError::Closed);
        }

        let transport = {
            let state = self.state.read();
            let transport = state
                .transport
                .as_ref()
                .and_then(Weak::upgrade)
                .ok_or(TrackError::TransportUnavailable)?;
            message.dscp = dscp_for(&state.description.media_type, &self.config);
            transport
        };

        Ok(transport.send_media(message))
    }

    // ── Receive path ──────────────────────────────────────────────────────────

    /// Deliver a message arriving from the transport.
    ///
    /// Refused media, handler drops and queue overflow are absorbed here and
    /// only show up in the counters.
    pub fn incoming(&self, message: Message) {
        if self.is_closed() {
            tracing::trace!("incoming message on closed track ignored");
            return;
        }

        let (direction, handler) = {
            let state = self.state.read();
            (state.description.direction, state.handler.clone())
        };
        // RTCP flows both ways even on a one-directional track.
        if !direction.can_receive() && !message.is_control() {
            self.counters.record_bad_direction();
            tracing::debug!(%direction, "incoming media refused by track direction");
            return;
        }

        let message = match handler {
            Some(handler) => match handler.incoming(message) {
                Some(message) => message,
                None => return,
            },
            None => message,
        };

        match self.recv_queue.try_push(message) {
            Ok(len) => self.events.trigger_available(len),
            Err(dropped) => {
                self.counters.record_queue_full();
                tracing::debug!(
                    size = dropped.payload.len(),
                    limit = self.recv_queue.limit(),
                    "receive queue full, dropping newest message"
                );
            }
        }
    }
}

impl Channel for Track {
    fn receive(&self) -> Option<Message> {
        self.recv_queue.pop()
    }

    fn peek(&self) -> Option<Message> {
        self.recv_queue.peek()
    }

    fn available_amount(&self) -> usize {
        self.recv_queue.amount()
    }

    fn events(&self) -> &ChannelEvents {
        &self.events
    }
}

impl Drop for Track {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            self.close();
        }
    }
}
