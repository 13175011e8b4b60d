//! Peer builder.
//!
//! Fluent configuration for a [`Peer`]: what it exposes, which handlers
//! and resolver it uses, and how its handles are released.

use std::sync::Arc;
use std::time::Duration;

use crate::peer::PeerContext;
use crate::{
    // ---
    log_info,
    EndpointPtr,
    ExportTable,
    GraphResolver,
    HandlerRegistry,
    PathResolver,
    Peer,
    ProxyConfig,
    ProxyError,
    ReleasePolicy,
    Result,
    Value,
};

/// Builder for [`Peer`] instances.
///
/// # Examples
///
/// ## Exposing a root
/// ```
/// use peerlink::{MessageChannel, Object, PeerBuilder, Value};
///
/// # async fn example() -> peerlink::Result<()> {
/// let (_a, b) = MessageChannel::new().into_ports();
///
/// let server = PeerBuilder::new(b)
///     .name("worker")
///     .expose(Value::from(Object::new().with("version", 3)))
///     .build()?;
/// assert!(server.is_exposing());
/// # Ok(())
/// # }
/// ```
///
/// ## Caller with a deadline and drop-driven release
/// ```
/// use peerlink::{MessageChannel, PeerBuilder, ReleasePolicy};
/// use std::time::Duration;
///
/// # async fn example() -> peerlink::Result<()> {
/// let (a, _b) = MessageChannel::new().into_ports();
///
/// let remote = PeerBuilder::new(a)
///     .release_policy(ReleasePolicy::OnDrop)
///     .request_timeout(Duration::from_secs(2))
///     .build()?
///     .remote();
/// # let _ = remote;
/// # Ok(())
/// # }
/// ```
pub struct PeerBuilder {
    // ---
    endpoint: EndpointPtr,
    root: Option<Value>,
    config: ProxyConfig,
    handlers: Option<HandlerRegistry>,
    resolver: Option<Arc<dyn PathResolver>>,
    exports: Option<ExportTable>,
}

impl PeerBuilder {
    /// Start configuring a peer on `endpoint`.
    pub fn new(endpoint: EndpointPtr) -> Self {
        // ---
        Self {
            endpoint,
            root: None,
            config: ProxyConfig::default(),
            handlers: None,
            resolver: None,
            exports: None,
        }
    }

    /// Name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Serve `root` to the other side.
    pub fn expose(mut self, root: impl Into<Value>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Replace the transfer handlers.
    ///
    /// Default: [`HandlerRegistry::default()`].
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Replace the path resolver.
    ///
    /// Default: [`GraphResolver`].
    pub fn resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Default: [`ReleasePolicy::Explicit`].
    pub fn release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.config.release_policy = policy;
        self
    }

    /// Bound each wait for a response.
    ///
    /// Default: no timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an export table with other peers.
    ///
    /// Useful when one side serves several endpoints and wants a single
    /// view of what it keeps alive.
    pub fn exports(mut self, exports: ExportTable) -> Self {
        self.exports = Some(exports);
        self
    }

    /// Build the peer (consumes self) and start its receive loop.
    ///
    /// An exposed root is held in the export table until the other side
    /// releases it or the endpoint closes.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::NoRuntime`] when called outside a tokio
    /// runtime.
    pub fn build(self) -> Result<Peer> {
        // ---
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ProxyError::NoRuntime);
        }

        let context = PeerContext {
            handlers: Arc::new(self.handlers.unwrap_or_default()),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(GraphResolver)),
            exports: self.exports.unwrap_or_default(),
            config: self.config,
        };

        let peer = match self.root {
            Some(root) => context.serve(root, self.endpoint),
            None => Peer::spawn(context, self.endpoint, None, None),
        };

        log_info!(
            "{}: peer started on {} (exposing: {})",
            peer.name(),
            peer.endpoint_id(),
            peer.is_exposing()
        );
        Ok(peer)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::MessageChannel;

    #[test]
    fn test_build_outside_runtime_fails() {
        // ---
        let (a, _b) = MessageChannel::new().into_ports();
        let built = PeerBuilder::new(a).expose(Value::from(1)).build();
        assert!(matches!(built, Err(ProxyError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_build_inside_runtime() {
        // ---
        let (a, _b) = MessageChannel::new().into_ports();
        let peer = PeerBuilder::new(a).name("caller").build().unwrap();
        assert_eq!(peer.name(), "caller");
        assert!(!peer.is_exposing());
    }
}
