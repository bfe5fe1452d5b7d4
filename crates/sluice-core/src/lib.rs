//! sluice-core — message model, message products, and the media handler chain.
//! The track layer in sluice-media builds on this crate.

pub mod chain;
pub mod config;
pub mod handler;
pub mod message;
pub mod product;

pub use chain::{ChainElement, ChainError, MediaProcessor, PassThrough};
pub use config::SluiceConfig;
pub use handler::{ChainableHandler, MediaHandler, OutgoingCallback};
pub use message::{Message, MessageKind, MAX_MESSAGE_SIZE};
pub use product::{
    IncomingControlProduct, IncomingProduct, MessagesProduct, OutgoingProduct, Sender,
};
