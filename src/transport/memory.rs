//! In-memory endpoint implementation.
//!
//! A [`MessageChannel`] is a pair of entangled ports living in one process.
//! Whatever one port posts is delivered to the listeners of the other. It is
//! used for tests, for peers sharing a runtime, and by the protocol layer
//! itself whenever a value must be served on a fresh channel (proxied
//! objects and `ENDPOINT` requests).
//!
//! ## Reference Semantics
//!
//! - Envelopes posted to a port that has not been started are queued and
//!   flushed, in order, when `start()` is called.
//! - Delivery never waits on the receiver; inboxes are unbounded.
//! - Closing either port closes the channel: queued envelopes are
//!   discarded, every inbox on both ends ends, and later posts fail with
//!   [`ProxyError::EndpointClosed`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::sync::lock_ignore_poison;
#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    Endpoint,
    EndpointBase,
    EndpointPtr,
    Envelope,
    ProxyError,
    Result,
    SubscriptionHandle,
};

static NEXT_CHANNEL: AtomicU64 = AtomicU64::new(0);

/// Receiving side of one port.
#[derive(Default)]
struct PortInbox {
    listeners: Vec<mpsc::UnboundedSender<Envelope>>,
    queue: VecDeque<Envelope>,
    started: bool,
}

impl PortInbox {
    // ---
    fn deliver(&mut self, env: Envelope) {
        if self.started && !self.listeners.is_empty() {
            // A closed sender means its SubscriptionHandle was dropped.
            self.listeners.retain(|tx| tx.send(env.clone()).is_ok());
            if !self.listeners.is_empty() {
                return;
            }
        }
        self.queue.push_back(env);
    }

    fn flush(&mut self) {
        if !self.started || self.listeners.is_empty() {
            return;
        }
        while let Some(env) = self.queue.pop_front() {
            self.listeners.retain(|tx| tx.send(env.clone()).is_ok());
            if self.listeners.is_empty() {
                // Nobody left to hear it; keep it for the next listener.
                self.queue.push_front(env);
                return;
            }
        }
    }

    fn shut(&mut self) {
        self.listeners.clear();
        self.queue.clear();
    }
}

/// One end of a [`MessageChannel`].
struct MemoryPort {
    // ---
    base: EndpointBase,
    inbound: Arc<Mutex<PortInbox>>,
    outbound: Arc<Mutex<PortInbox>>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Endpoint for MemoryPort {
    // ---
    fn base(&self) -> &EndpointBase {
        &self.base
    }

    async fn post_message(&self, env: Envelope) -> Result<()> {
        // ---
        if self.closed.load(Ordering::Acquire) {
            log_debug!("{}: post on closed channel", self.endpoint_id());
            return Err(ProxyError::EndpointClosed);
        }

        lock_ignore_poison(&self.outbound).deliver(env);
        Ok(())
    }

    /// Register a listener.
    ///
    /// Nothing is delivered to it until the port has been started.
    async fn subscribe(&self) -> Result<SubscriptionHandle> {
        // ---
        if self.closed.load(Ordering::Acquire) {
            return Err(ProxyError::EndpointClosed);
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut inbox = lock_ignore_poison(&self.inbound);
        inbox.listeners.push(tx);
        inbox.flush();

        Ok(SubscriptionHandle { inbox: rx })
    }

    fn start(&self) {
        // ---
        let mut inbox = lock_ignore_poison(&self.inbound);
        inbox.started = true;
        inbox.flush();
    }

    async fn close(&self) -> Result<()> {
        // ---
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        log_debug!("{}: closing channel", self.endpoint_id());

        lock_ignore_poison(&self.inbound).shut();
        lock_ignore_poison(&self.outbound).shut();
        Ok(())
    }
}

/// A pair of entangled in-memory endpoints.
///
/// # Example
///
/// ```
/// # use peerlink::{Endpoint, Envelope, MessageChannel};
/// # use bytes::Bytes;
/// # async fn example() -> peerlink::Result<()> {
/// let channel = MessageChannel::new();
///
/// let mut sub = channel.port2.subscribe().await?;
/// channel.port2.start();
///
/// channel.port1.post_message(Envelope::new(Bytes::from_static(b"{}"))).await?;
/// let received = sub.inbox.recv().await;
/// assert!(received.is_some());
/// # Ok(())
/// # }
/// ```
pub struct MessageChannel {
    pub port1: EndpointPtr,
    pub port2: EndpointPtr,
}

impl MessageChannel {
    /// Create a new channel with two fresh ports.
    pub fn new() -> Self {
        // ---
        let n = NEXT_CHANNEL.fetch_add(1, Ordering::Relaxed);

        let a = Arc::new(Mutex::new(PortInbox::default()));
        let b = Arc::new(Mutex::new(PortInbox::default()));
        let closed = Arc::new(AtomicBool::new(false));

        let port1 = MemoryPort {
            base: EndpointBase::new(format!("mem-{n}.1")),
            inbound: a.clone(),
            outbound: b.clone(),
            closed: closed.clone(),
        };
        let port2 = MemoryPort {
            base: EndpointBase::new(format!("mem-{n}.2")),
            inbound: b,
            outbound: a,
            closed,
        };

        Self {
            port1: Arc::new(port1),
            port2: Arc::new(port2),
        }
    }

    /// Split the channel into its two ports.
    pub fn into_ports(self) -> (EndpointPtr, EndpointPtr) {
        (self.port1, self.port2)
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use bytes::Bytes;

    fn env(text: &'static str) -> Envelope {
        Envelope::new(Bytes::from_static(text.as_bytes()))
    }

    #[tokio::test]
    async fn test_queued_until_started() {
        // ---
        let (a, b) = MessageChannel::new().into_ports();

        a.post_message(env("one")).await.unwrap();
        let mut sub = b.subscribe().await.unwrap();
        a.post_message(env("two")).await.unwrap();

        assert!(sub.inbox.try_recv().is_err());

        b.start();
        assert_eq!(sub.inbox.recv().await.unwrap().payload, "one");
        assert_eq!(sub.inbox.recv().await.unwrap().payload, "two");
    }

    #[tokio::test]
    async fn test_close_ends_both_sides() {
        // ---
        let (a, b) = MessageChannel::new().into_ports();
        let mut sub_a = a.subscribe().await.unwrap();
        let mut sub_b = b.subscribe().await.unwrap();
        a.start();
        b.start();

        b.close().await.unwrap();

        assert!(sub_a.inbox.recv().await.is_none());
        assert!(sub_b.inbox.recv().await.is_none());
        assert!(matches!(
            a.post_message(env("late")).await,
            Err(ProxyError::EndpointClosed)
        ));
    }

    #[tokio::test]
    async fn test_dropped_listener_keeps_message_for_next() {
        // ---
        let (a, b) = MessageChannel::new().into_ports();
        b.start();

        let first = b.subscribe().await.unwrap();
        drop(first);

        a.post_message(env("kept")).await.unwrap();

        let mut second = b.subscribe().await.unwrap();
        assert_eq!(second.inbox.recv().await.unwrap().payload, "kept");
    }
}
