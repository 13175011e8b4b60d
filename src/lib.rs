//! Transparent proxies across a message channel.
//!
//! One side exposes a value graph on an [`Endpoint`]; the other side wraps
//! the opposite end and gets a [`RemoteHandle`] on it. Reading, writing,
//! calling and constructing through the handle turns into GET, SET, APPLY
//! and CONSTRUCT messages, correlated with their responses by message id.
//! Objects and functions passed either way are served behind fresh
//! channels, so callbacks and nested proxies work in both directions.
//!
//! Errors raised by the callee travel back as tagged responses and surface
//! as [`ProxyError::RemoteThrow`]; they never take the channel down.
//!

// Import all sub modules once...
mod client;
mod codec;
mod domain;
mod error;
mod macros;
mod peer;
mod peer_builder;
mod protocol;
mod proxy_config;
mod resolver;
mod server;
mod sync;
mod timeout;
mod transport;
mod value;

#[allow(unused_imports)]
pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::RemoteHandle;
pub use peer::Peer;
pub use peer_builder::PeerBuilder;
pub use server::{ExportId, ExportTable};

pub use proxy_config::{ProxyConfig, ReleasePolicy};
pub use timeout::with_timeout;

pub use error::{ProxyError, Result};

pub use codec::{
    // ---
    decode,
    encode,
    encode_thrown,
    DecodeContext,
    EncodeContext,
    ErrorHandler,
    HandlerRegistry,
    PortHandler,
    ProxyHandler,
    TransferHandler,
    TransferRef,
    ERROR_HANDLER,
    PORT_HANDLER,
    PROXY_HANDLER,
};
pub use protocol::{Message, MessageId, Operation, Packet, Path, WireKind, WireValue, THROW_HANDLER};
pub use resolver::{GraphResolver, PathResolver, Resolved};
pub use value::{CallResult, ErrorValue, Function, Object, ThrownValue, Value};

pub use transport::MessageChannel;

// --- public re-exports
pub use domain::{
    //
    Endpoint,
    EndpointBase,
    EndpointPtr,
    Envelope,
    SubscriptionHandle,
};

/// Serve `root` on `endpoint` with the default configuration.
///
/// The root stays alive until the other side releases it or the endpoint
/// closes. Must be called within a tokio runtime.
///
/// # Example
///
/// ```
/// use peerlink::{expose, wrap, MessageChannel, Value};
/// use serde_json::json;
///
/// # async fn example() -> peerlink::Result<()> {
/// let (a, b) = MessageChannel::new().into_ports();
/// expose(Value::from(json!({"user": {"name": "Ada"}})), b)?;
///
/// let name: String = wrap(a)?.prop("user").prop("name").get_as().await?;
/// assert_eq!(name, "Ada");
/// # Ok(())
/// # }
/// ```
pub fn expose(root: impl Into<Value>, endpoint: EndpointPtr) -> Result<Peer> {
    PeerBuilder::new(endpoint).expose(root).build()
}

/// Wrap `endpoint` and return a handle on the other side's root.
///
/// Uses the default configuration; see [`PeerBuilder`] for the rest. Must
/// be called within a tokio runtime.
pub fn wrap(endpoint: EndpointPtr) -> Result<RemoteHandle> {
    Ok(PeerBuilder::new(endpoint).build()?.remote())
}
