//! Caller-side deadlines.
//!
//! The protocol has no cancellation message. A deadline only stops the
//! caller from waiting: the request still runs to completion on the other
//! side and its response is dropped when it arrives.

use std::future::Future;
use std::time::Duration;

use tokio::time;

use crate::{ProxyError, Result};

/// Await `fut` for at most `duration`.
///
/// # Errors
///
/// Returns [`ProxyError::Timeout`] if the deadline passes first, otherwise
/// whatever `fut` returns.
///
/// # Example
///
/// ```
/// use peerlink::{with_timeout, wrap, MessageChannel};
/// use std::time::Duration;
///
/// # async fn example() -> peerlink::Result<()> {
/// let (a, _b) = MessageChannel::new().into_ports();
/// let remote = wrap(a)?;
///
/// // Nobody listens on `_b`, so this never gets an answer.
/// let outcome = with_timeout(Duration::from_millis(10), remote.prop("x").get()).await;
/// assert!(matches!(outcome, Err(peerlink::ProxyError::Timeout)));
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    time::timeout(duration, fut)
        .await
        .map_err(|_| ProxyError::Timeout)?
}
