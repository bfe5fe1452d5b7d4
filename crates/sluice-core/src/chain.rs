//! Chain of media processing stages.
//!
//! A chain is a finite doubly-linked list of [`ChainElement`]s. The end
//! closest to the network is the *root* (most downstream); the end closest
//! to the application is the *leaf* (most upstream).
//!
//!   application ── leaf ── … ── root ── network
//!
//! Incoming traffic enters at the root and walks upstream. Outgoing traffic
//! enters at the leaf and walks downstream. Every element owns a strong
//! handle to its downstream neighbor and a weak handle to its upstream one,
//! so holding the leaf keeps the whole chain alive and there are no
//! reference cycles.
//!
//! Chain topology is not synchronized against packet processing. Build the
//! chain before traffic flows and tear it down after it stops; the owning
//! handler serializes traversal.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::message::Message;
use crate::product::{
    IncomingControlProduct, IncomingProduct, MessagesProduct, OutgoingProduct, Sender,
};

// ── Processing hooks ──────────────────────────────────────────────────────────

/// Transformation hooks of one chain stage.
///
/// Every hook defaults to identity pass-through. Packetizers, depacketizers
/// and RTCP responders override only the hooks their role needs.
pub trait MediaProcessor: Send + Sync {
    /// Name used in log fields.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Rewrite, drop (`incoming: None`) or answer an incoming control packet.
    fn process_incoming_control(&self, message: Message) -> IncomingControlProduct {
        IncomingControlProduct::pass(message)
    }

    /// Rewrite or drop (`None`) an outgoing control packet.
    fn process_outgoing_control(&self, message: Message) -> Option<Message> {
        Some(message)
    }

    /// Rewrite, drop or answer an incoming batch of binary packets.
    fn process_incoming_binary(&self, messages: MessagesProduct) -> IncomingProduct {
        IncomingProduct::pass(messages)
    }

    /// Rewrite, split or drop (`None`) an outgoing batch.
    ///
    /// A control packet present on input must still be present on output.
    ///
    /// Responses a stage produces from its own incoming hooks or from
    /// `request_keyframe` are not fed back through this hook on the same
    /// stage; only the stages downstream of it see them. A stage that must
    /// observe its own responses (to record them, say) has to do so where
    /// it builds them.
    fn process_outgoing_binary(&self, product: OutgoingProduct) -> Option<OutgoingProduct> {
        Some(product)
    }

    /// Ask this stage to get a full frame produced.
    ///
    /// `None` means the stage cannot help. `Some` accepts the request; the
    /// product (possibly empty) is routed toward the network as a response.
    fn request_keyframe(&self) -> Option<OutgoingProduct> {
        None
    }

    /// Break an incoming message into a batch. Only called on the root.
    fn split(&self, message: Message) -> MessagesProduct {
        MessagesProduct::single(message.payload)
    }

    /// Collapse a batch that reached the top of the chain into one message.
    /// Only called on the root.
    fn reduce(&self, messages: MessagesProduct) -> Option<Message> {
        messages.first().cloned().map(Message::binary)
    }
}

/// Stage that changes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl MediaProcessor for PassThrough {
    fn name(&self) -> &str {
        "pass-through"
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("element {0} is already linked into a chain")]
    AlreadyLinked(String),
    #[error("element {0} cannot be chained with itself")]
    SelfLink(String),
    #[error("element {0} removed the control message of an outgoing product")]
    ControlDropped(String),
}

// ── Element ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Links {
    upstream: Weak<ChainElement>,
    downstream: Option<Arc<ChainElement>>,
}

/// One node of a processing chain.
pub struct ChainElement {
    processor: Box<dyn MediaProcessor>,
    links: Mutex<Links>,
}

impl std::fmt::Debug for ChainElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainElement")
            .field("processor", &self.processor.name())
            .field("has_upstream", &self.upstream().is_some())
            .field("has_downstream", &self.downstream().is_some())
            .finish()
    }
}

impl ChainElement {
    /// Create a detached element.
    pub fn new(processor: impl MediaProcessor + 'static) -> Arc<Self> {
        Self::from_boxed(Box::new(processor))
    }

    pub fn from_boxed(processor: Box<dyn MediaProcessor>) -> Arc<Self> {
        Arc::new(Self {
            processor,
            links: Mutex::new(Links::default()),
        })
    }

    pub fn processor(&self) -> &dyn MediaProcessor {
        self.processor.as_ref()
    }

    pub fn name(&self) -> &str {
        self.processor.name()
    }

    /// Neighbor away from the network, if it is still alive.
    pub fn upstream(&self) -> Option<Arc<ChainElement>> {
        self.links.lock().upstream.upgrade()
    }

    /// Neighbor toward the network.
    pub fn downstream(&self) -> Option<Arc<ChainElement>> {
        self.links.lock().downstream.clone()
    }

    pub fn is_linked(&self) -> bool {
        let links = self.links.lock();
        links.downstream.is_some() || links.upstream.strong_count() > 0
    }

    /// Link `other` as this element's upstream neighbor.
    ///
    /// Returns `other` so chains compose fluently:
    /// `root.chain_with(a)?.chain_with(b)?`. `other` must be detached and
    /// this element must not already have an upstream neighbor; together
    /// these make it impossible for a node to end up downstream of itself.
    pub fn chain_with(
        self: &Arc<Self>,
        other: Arc<ChainElement>,
    ) -> Result<Arc<ChainElement>, ChainError> {
        if Arc::ptr_eq(self, &other) {
            return Err(ChainError::SelfLink(self.name().to_string()));
        }
        if self.upstream().is_some() {
            return Err(ChainError::AlreadyLinked(self.name().to_string()));
        }
        if other.is_linked() {
            return Err(ChainError::AlreadyLinked(other.name().to_string()));
        }

        self.links.lock().upstream = Arc::downgrade(&other);
        other.links.lock().downstream = Some(self.clone());
        tracing::trace!(
            downstream = self.name(),
            upstream = other.name(),
            "elements chained"
        );
        Ok(other)
    }

    /// Excise this element, joining its former neighbors to each other.
    pub fn remove_from_chain(&self) {
        let (upstream, downstream) = {
            let mut links = self.links.lock();
            let upstream = std::mem::take(&mut links.upstream).upgrade();
            (upstream, links.downstream.take())
        };

        if let Some(up) = &upstream {
            up.links.lock().downstream = downstream.clone();
        }
        if let Some(down) = &downstream {
            down.links.lock().upstream = upstream.as_ref().map(Arc::downgrade).unwrap_or_default();
        }
    }

    /// Detach this element and everything downstream of it.
    ///
    /// Elements upstream of this one stay linked to each other; the nearest
    /// one simply loses its downstream neighbor.
    pub fn recursive_remove_chain(self: &Arc<Self>) {
        if let Some(up) = self.upstream() {
            up.links.lock().downstream = None;
        }

        let mut current = Some(self.clone());
        while let Some(node) = current {
            let mut links = node.links.lock();
            links.upstream = Weak::new();
            current = links.downstream.take();
        }
    }

    // ── Incoming (root → leaf) ────────────────────────────────────────────────

    /// Drive one control packet upstream starting at this element.
    ///
    /// Responses are handed to `send` as each stage produces them, before the
    /// packet moves on. Returns `None` if any stage dropped the packet.
    pub fn form_incoming_control(
        self: &Arc<Self>,
        message: Message,
        send: Sender<'_>,
    ) -> Option<Message> {
        let mut node = self.clone();
        let mut message = message;
        loop {
            let product = node.processor.process_incoming_control(message);
            node.send_response(product.outgoing, send);

            let Some(next) = product.incoming else {
                tracing::trace!(element = node.name(), "incoming control dropped");
                return None;
            };
            message = next;

            match node.upstream() {
                Some(up) => node = up,
                None => return Some(message),
            }
        }
    }

    /// Drive a batch of binary packets upstream starting at this element.
    pub fn form_incoming_binary(
        self: &Arc<Self>,
        messages: MessagesProduct,
        send: Sender<'_>,
    ) -> Option<MessagesProduct> {
        let mut node = self.clone();
        let mut messages = messages;
        loop {
            let product = node.processor.process_incoming_binary(messages);
            node.send_response(product.outgoing, send);

            let Some(next) = product.incoming else {
                tracing::trace!(element = node.name(), "incoming batch dropped");
                return None;
            };
            messages = next;

            match node.upstream() {
                Some(up) => node = up,
                None => return Some(messages),
            }
        }
    }

    // ── Outgoing (leaf → root) ────────────────────────────────────────────────

    /// Drive one control packet downstream starting at this element.
    pub fn form_outgoing_control(self: &Arc<Self>, message: Message) -> Option<Message> {
        let mut node = self.clone();
        let mut message = message;
        loop {
            let Some(next) = node.processor.process_outgoing_control(message) else {
                tracing::trace!(element = node.name(), "outgoing control dropped");
                return None;
            };
            message = next;

            match node.downstream() {
                Some(down) => node = down,
                None => return Some(message),
            }
        }
    }

    /// Drive an outgoing product downstream starting at this element.
    ///
    /// `Ok(None)` means a stage dropped it. A stage that strips the control
    /// packet it was given breaks the chain contract and fails the call.
    pub fn form_outgoing_binary(
        self: &Arc<Self>,
        product: OutgoingProduct,
    ) -> Result<Option<OutgoingProduct>, ChainError> {
        let mut node = self.clone();
        let mut product = product;
        loop {
            let had_control = product.control.is_some();
            let Some(next) = node.processor.process_outgoing_binary(product) else {
                tracing::trace!(element = node.name(), "outgoing batch dropped");
                return Ok(None);
            };
            if had_control && next.control.is_none() {
                return Err(ChainError::ControlDropped(node.name().to_string()));
            }
            product = next;

            match node.downstream() {
                Some(down) => node = down,
                None => return Ok(Some(product)),
            }
        }
    }

    // ── Responses ─────────────────────────────────────────────────────────────

    /// Run a response generated at this element through the outgoing hooks
    /// of every element downstream of it.
    ///
    /// The generating element is not re-applied: its response is already in
    /// the shape it wants on the wire.
    pub fn process_outgoing_response(
        &self,
        response: OutgoingProduct,
    ) -> Result<Option<OutgoingProduct>, ChainError> {
        let Some(down) = self.downstream() else {
            return Ok(Some(response));
        };

        if response.messages.is_some() {
            return down.form_outgoing_binary(response);
        }
        match response.control {
            Some(control) => Ok(down.form_outgoing_control(control).map(OutgoingProduct::control)),
            None => Ok(Some(OutgoingProduct::default())),
        }
    }

    fn send_response(&self, outgoing: Option<OutgoingProduct>, send: Sender<'_>) {
        let Some(response) = outgoing.filter(|r| !r.is_empty()) else {
            return;
        };

        match self.process_outgoing_response(response) {
            Ok(Some(product)) => {
                if !send(product) {
                    tracing::debug!(element = self.name(), "response send failed");
                }
            }
            Ok(None) => tracing::debug!(element = self.name(), "response dropped by chain"),
            Err(e) => tracing::error!(
                element = self.name(),
                error = %e,
                "response rejected by chain"
            ),
        }
    }

    // ── Keyframes ─────────────────────────────────────────────────────────────

    /// Walk downstream from this element asking for a keyframe.
    ///
    /// Stops at the first stage that accepts. Returns false if none can.
    pub fn request_keyframe(self: &Arc<Self>, send: Sender<'_>) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if let Some(request) = node.processor.request_keyframe() {
                tracing::debug!(element = node.name(), "keyframe request accepted");
                node.send_response(Some(request), send);
                return true;
            }
            current = node.downstream();
        }
        false
    }
}
