use thiserror::Error;

use crate::{MessageId, ThrownValue};

/// Errors that can occur while proxying operations across an endpoint.
///
/// Every per-operation failure rejects only that operation. None of these
/// variants terminate the endpoint or the peer.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The value has no RAW representation and no transfer handler claims it.
    #[error("unserializable value: {0}")]
    UnserializableValue(String),

    /// A HANDLER wire value named a handler this side does not know.
    ///
    /// Usually means the two peers were built with different handler sets.
    #[error("no transfer handler registered under \"{0}\"")]
    UnknownHandler(String),

    /// The name is reserved and cannot be registered as a transfer handler.
    #[error("\"{0}\" is a reserved handler name")]
    ReservedHandler(String),

    /// The callee's operation raised; carries what it threw.
    #[error("remote threw {0}")]
    RemoteThrow(ThrownValue),

    /// A response arrived for an id that is unknown or already settled.
    #[error("unexpected response for message id {0}")]
    UnexpectedResponse(MessageId),

    /// A path did not resolve against the callee's object graph.
    ///
    /// Raised on the callee side; the caller observes it as a
    /// [`ProxyError::RemoteThrow`].
    #[error("cannot resolve path [{}]: {reason}", path.join(", "))]
    PathResolution { path: Vec<String>, reason: String },

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Well-formed JSON that is not a usable message or wire value.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The endpoint was closed before the operation could complete.
    #[error("endpoint closed")]
    EndpointClosed,

    /// The remote handle was released and can no longer be used.
    #[error("proxy has been released and is not usable")]
    Released,

    /// A caller-side deadline elapsed before the response arrived.
    #[error("request timed out")]
    Timeout,

    /// Peers run their receive loops on tokio and must be started inside
    /// a runtime.
    #[error("no tokio runtime is running")]
    NoRuntime,
}

impl ProxyError {
    // ---
    pub(crate) fn path(path: &[String], reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.to_vec(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;
