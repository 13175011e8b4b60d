//! Protocol types: the wire shapes exchanged between peers.
//!
//! This module defines the request [`Message`] taxonomy, the [`WireValue`]
//! envelope used for every payload and response, and the [`MessageId`]
//! used to correlate the two.
mod message;
mod message_id;
mod wire;

pub use message::{Message, Operation, Packet, Path};
pub use message_id::MessageId;
pub use wire::{WireKind, WireValue, THROW_HANDLER};
