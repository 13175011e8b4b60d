//! Endpoint implementations.
//!
//! Concrete endpoints for the domain-level [`Endpoint`](crate::Endpoint)
//! trait. Only the in-memory channel ships with the crate; real transports
//! (worker ports, sockets, pipes) implement the trait themselves.

mod memory;

pub use memory::MessageChannel;
