//! Peer configuration.
//!
//! Plain data shared by a peer and every peer it spawns for proxied
//! values. Nothing here knows about a particular endpoint.

use std::time::Duration;

/// When a materialized remote handle tells the other side it is done.
///
/// The protocol leaves this open; both behaviors are found in practice and
/// the choice bounds how long the other side keeps the target alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// RELEASE is sent only by [`RemoteHandle::release`](crate::RemoteHandle::release).
    ///
    /// Targets of handles that are dropped without it live as long as the
    /// channel.
    #[default]
    Explicit,

    /// RELEASE is also posted when the last clone of a handle is dropped.
    ///
    /// Requires a tokio runtime at drop time; outside one the drop is
    /// logged and nothing is sent.
    OnDrop,
}

/// Peer configuration.
///
/// # Example
///
/// ```
/// use peerlink::{ProxyConfig, ReleasePolicy};
/// use std::time::Duration;
///
/// let config = ProxyConfig::named("ui-thread")
///     .with_release_policy(ReleasePolicy::OnDrop)
///     .with_request_timeout(Duration::from_secs(5));
/// assert_eq!(config.release_policy, ReleasePolicy::OnDrop);
/// ```
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    // ---
    /// Name used in logs.
    pub name: String,

    /// When materialized handles send RELEASE.
    pub release_policy: ReleasePolicy,

    /// How long a caller waits for each response.
    ///
    /// The protocol has no timeout of its own. When set, a request that
    /// outlives it fails with [`ProxyError::Timeout`](crate::ProxyError::Timeout);
    /// the request still completes on the other side and its late response
    /// is discarded.
    ///
    /// Default: none (wait forever)
    pub request_timeout: Option<Duration>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::named("peer")
    }
}

impl ProxyConfig {
    // ---
    /// Default configuration under the given log name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            release_policy: ReleasePolicy::default(),
            request_timeout: None,
        }
    }

    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}
