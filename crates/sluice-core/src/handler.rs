//! Chain root — the handler a track holds.
//!
//! A handler is the outward-facing entry and exit of a chain. The track
//! passes every packet through it, and the chain's synthesized responses
//! leave through the callback registered with [`MediaHandler::on_outgoing`].

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::chain::{ChainElement, ChainError, MediaProcessor};
use crate::message::{Message, MessageKind};
use crate::product::{MessagesProduct, OutgoingProduct};

/// Delivers one message toward the network. Returns false on failure.
pub type OutgoingCallback = Arc<dyn Fn(Message) -> bool + Send + Sync>;

/// Whole-chain operations, as seen by a track.
pub trait MediaHandler: Send + Sync {
    /// Process a message arriving from the network.
    ///
    /// `None` means the chain consumed or dropped it.
    fn incoming(&self, message: Message) -> Option<Message>;

    /// Process a message the application wants to send.
    ///
    /// `Ok(None)` means the chain dropped it. Extra packets the chain
    /// produced have already gone out through the outgoing callback.
    fn outgoing(&self, message: Message) -> Result<Option<Message>, ChainError>;

    /// Register where synthesized responses go.
    fn on_outgoing(&self, callback: OutgoingCallback);

    /// Ask the chain for a full frame. False if no stage can do it.
    fn request_keyframe(&self) -> bool {
        false
    }
}

/// Handler backed by a chain of [`ChainElement`]s.
pub struct ChainableHandler {
    root: Arc<ChainElement>,
    leaf: Mutex<Arc<ChainElement>>,
    // Traversal is serialized here. Reentrant so a transport that loops a
    // response straight back into this handler on the same thread does not
    // deadlock.
    inout: ReentrantMutex<()>,
    callback: RwLock<Option<OutgoingCallback>>,
}

impl ChainableHandler {
    /// Start a chain whose network-side end is `root`.
    pub fn new(root: impl MediaProcessor + 'static) -> Self {
        Self::with_root(ChainElement::new(root))
    }

    pub fn with_root(root: Arc<ChainElement>) -> Self {
        Self {
            leaf: Mutex::new(root.clone()),
            root,
            inout: ReentrantMutex::new(()),
            callback: RwLock::new(None),
        }
    }

    /// Append an element on the application side of the chain.
    pub fn add_to_chain(&self, element: Arc<ChainElement>) -> Result<(), ChainError> {
        let mut leaf = self.leaf.lock();
        *leaf = leaf.chain_with(element)?;
        Ok(())
    }

    pub fn root(&self) -> Arc<ChainElement> {
        self.root.clone()
    }

    pub fn leaf(&self) -> Arc<ChainElement> {
        self.leaf.lock().clone()
    }

    fn send(&self, message: Message) -> bool {
        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => callback(message),
            None => {
                tracing::debug!(kind = ?message.kind, "no outgoing callback, message discarded");
                false
            }
        }
    }

    /// Send every packet of a product: control first, then the batch.
    fn send_product(&self, product: OutgoingProduct) -> bool {
        let mut result = true;
        if let Some(control) = product.control {
            if !self.send(control) {
                tracing::error!("failed to send control message");
                result = false;
            }
        }
        if let Some(messages) = product.messages {
            for (i, packet) in messages.iter().enumerate() {
                if !self.send(Message::binary(packet.clone())) {
                    tracing::error!(index = i + 1, total = messages.len(), "failed to send message");
                    result = false;
                }
            }
        }
        result
    }

    fn handle_incoming_binary(&self, message: Message) -> Option<Message> {
        let messages = self.root.processor().split(message);
        let send = |product: OutgoingProduct| self.send_product(product);
        let incoming = self.root.form_incoming_binary(messages, &send)?;
        self.root.processor().reduce(incoming)
    }

    fn handle_incoming_control(&self, message: Message) -> Option<Message> {
        let send = |product: OutgoingProduct| self.send_product(product);
        self.root.form_incoming_control(message, &send)
    }

    fn handle_outgoing_binary(&self, message: Message) -> Result<Option<Message>, ChainError> {
        let product = OutgoingProduct::messages(MessagesProduct::single(message.payload));
        let Some(outgoing) = self.leaf().form_outgoing_binary(product)? else {
            return Ok(None);
        };

        let Some((last, rest)) = outgoing.messages.as_deref().and_then(|m| m.split_last()) else {
            // Nothing binary left: the control packet becomes the result, so
            // the caller sees the transport's verdict on it.
            return Ok(outgoing.control);
        };

        if let Some(control) = outgoing.control {
            if !self.send(control) {
                tracing::error!("failed to send control message");
            }
        }
        for (i, packet) in rest.iter().enumerate() {
            if !self.send(Message::binary(packet.clone())) {
                tracing::error!(index = i + 1, total = rest.len() + 1, "failed to send message");
            }
        }
        Ok(Some(Message::binary(last.clone())))
    }
}

impl MediaHandler for ChainableHandler {
    fn incoming(&self, message: Message) -> Option<Message> {
        let _guard = self.inout.lock();
        match message.kind {
            MessageKind::Binary => self.handle_incoming_binary(message),
            MessageKind::Control => self.handle_incoming_control(message),
            MessageKind::String | MessageKind::Reset => Some(message),
        }
    }

    fn outgoing(&self, message: Message) -> Result<Option<Message>, ChainError> {
        let _guard = self.inout.lock();
        match message.kind {
            MessageKind::Binary => self.handle_outgoing_binary(message),
            MessageKind::Control => Ok(self.leaf().form_outgoing_control(message)),
            MessageKind::String | MessageKind::Reset => Ok(Some(message)),
        }
    }

    fn on_outgoing(&self, callback: OutgoingCallback) {
        *self.callback.write() = Some(callback);
    }

    fn request_keyframe(&self) -> bool {
        let _guard = self.inout.lock();
        let send = |product: OutgoingProduct| self.send_product(product);
        self.leaf().request_keyframe(&send)
    }
}

impl Drop for ChainableHandler {
    fn drop(&mut self) {
        self.leaf.get_mut().recursive_remove_chain();
    }
}
