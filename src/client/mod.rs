// src/client/mod.rs
//! Caller side: remote handles and the pending-request table.
//!
//! A [`RemoteHandle`] is a path on the remote root plus the peer that
//! reaches it. Building paths is local; only the terminal operations send
//! a message and wait for the response correlated to it.

mod pending;
mod remote_handle;

pub(crate) use pending::{Completion, InboundResponse, PendingRequests};
pub use remote_handle::RemoteHandle;
