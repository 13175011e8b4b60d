// src/domain/endpoint.rs

//! Endpoint domain abstractions.
//!
//! An endpoint is one end of a bidirectional channel between two peers:
//! a worker port, an iframe window, a pipe to another process. The protocol
//! layer only *uses* endpoints; whoever created one owns it.
//!
//! The endpoint is responsible only for delivering envelopes, each carrying
//! an opaque JSON payload plus a list of transferred endpoints. Correlation,
//! dispatch and handle lifecycle live above it.
//!
//! The in-memory implementation lives under `src/transport/`.
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::Result;

/// Shared base state for endpoint implementations.
///
/// Concrete endpoints embed this as a field named `base` so the default
/// [`Endpoint`] methods can delegate to it.
#[derive(Debug, Clone)]
pub struct EndpointBase {
    /// Identifier used in logs.
    pub endpoint_id: String,
}

impl EndpointBase {
    /// Create a new EndpointBase.
    pub fn new(endpoint_id: impl Into<String>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
        }
    }
}

/// The unit of delivery between two endpoints.
///
/// `payload` is a serialized [`Message`](crate::Message) or
/// [`WireValue`](crate::WireValue). `transfer` lists endpoints whose
/// ownership moves to the receiver along with this envelope; HANDLER
/// wire values refer to them by index.
#[derive(Clone)]
pub struct Envelope {
    // ---
    /// Serialized JSON payload.
    pub payload: Bytes,

    /// Endpoints transferred with this envelope.
    pub transfer: Vec<EndpointPtr>,
}

impl Envelope {
    // ---
    /// Create an envelope that transfers nothing.
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            transfer: Vec::new(),
        }
    }

    /// Create an envelope that transfers `transfer` to the receiver.
    pub fn with_transfer(payload: Bytes, transfer: Vec<EndpointPtr>) -> Self {
        Self { payload, transfer }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("payload", &String::from_utf8_lossy(&self.payload))
            .field("transfer", &self.transfer.len())
            .finish()
    }
}

/// Handle returned from a successful subscription.
///
/// This is the `addEventListener` half of an endpoint. Dropping the handle
/// removes the listener.
pub struct SubscriptionHandle {
    // ---
    /// Receiver channel for envelopes delivered to this endpoint.
    pub inbox: mpsc::UnboundedReceiver<Envelope>,
}

/// Endpoint abstraction.
///
/// Implementations must ensure that:
/// - `post_message()` never waits on the receiving peer.
/// - Envelopes posted before the receiving end is started are held and
///   delivered once `start()` has been called.
/// - After `close()`, posting fails with
///   [`ProxyError::EndpointClosed`](crate::ProxyError::EndpointClosed) and
///   every subscription's inbox ends.
///
/// No assumption is made about ordering between distinct envelopes.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat its methods as
/// normal `async fn`s.
#[async_trait::async_trait]
pub trait Endpoint: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &EndpointBase;

    /// Returns the identifier of this endpoint.
    fn endpoint_id(&self) -> &str {
        &self.base().endpoint_id
    }

    /// Send an envelope to the other end.
    async fn post_message(&self, env: Envelope) -> Result<()>;

    /// Register a listener and return a handle for receiving envelopes.
    async fn subscribe(&self) -> Result<SubscriptionHandle>;

    /// Begin delivering queued and future envelopes to listeners.
    ///
    /// Endpoints that deliver immediately need not override this.
    fn start(&self) {}

    /// Close the channel and release any associated resources.
    async fn close(&self) -> Result<()>;
}

/// Shared endpoint pointer.
///
/// `.clone()` is cheap and every clone refers to the same channel end.
pub type EndpointPtr = Arc<dyn Endpoint>;
