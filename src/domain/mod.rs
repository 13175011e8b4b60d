//! Domain layer public interface.
//!
//! Defines the endpoint abstraction the protocol layer runs on. Nothing
//! here knows about messages, handles, or correlation; endpoints deliver
//! opaque envelopes between two peers.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod endpoint;

pub use endpoint::{
    //
    Endpoint,
    EndpointBase,
    EndpointPtr,
    Envelope,
    SubscriptionHandle,
};
