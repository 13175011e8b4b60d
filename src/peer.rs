//! One side of an endpoint.
//!
//! A [`Peer`] owns a single endpoint and runs its receive loop. It plays
//! both roles over the same channel:
//!
//! - callee: requests are dispatched against the exposed root, if any
//! - caller: responses are matched to pending requests by message id
//!
//! Inbound data is told apart by its `type` field (see [`Packet`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;
use tokio::time;

use crate::client::{Completion, InboundResponse, PendingRequests};
use crate::codec::{self, DecodeContext};
use crate::server::{self, ExportId, ExportTable};
use crate::sync::lock_ignore_poison;
#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    log_error,
    log_warn,
    Endpoint,
    EndpointPtr,
    Envelope,
    GraphResolver,
    HandlerRegistry,
    Message,
    MessageId,
    Operation,
    Packet,
    PathResolver,
    ProxyConfig,
    ProxyError,
    ReleasePolicy,
    RemoteHandle,
    Result,
    Value,
    WireValue,
};

/// Everything a peer shares with the peers it spawns for proxied values.
#[derive(Clone)]
pub(crate) struct PeerContext {
    // ---
    pub(crate) handlers: Arc<HandlerRegistry>,
    pub(crate) resolver: Arc<dyn PathResolver>,
    pub(crate) exports: ExportTable,
    pub(crate) config: ProxyConfig,
}

impl Default for PeerContext {
    fn default() -> Self {
        Self {
            handlers: Arc::new(HandlerRegistry::default()),
            resolver: Arc::new(GraphResolver),
            exports: ExportTable::default(),
            config: ProxyConfig::default(),
        }
    }
}

impl PeerContext {
    // ---
    /// Serve `root` on `endpoint` and keep it alive until released.
    pub(crate) fn serve(&self, root: Value, endpoint: EndpointPtr) -> Peer {
        // ---
        let id = ExportId::generate();
        let peer = Peer::spawn(self.clone(), endpoint, Some(root), Some(id.clone()));
        self.exports.insert(id, peer.clone());
        peer
    }

    /// Wrap an endpoint received from the other side.
    pub(crate) fn wrap_materialized(&self, endpoint: EndpointPtr) -> RemoteHandle {
        RemoteHandle::root(Peer::spawn(self.clone(), endpoint, None, None))
    }
}

/// One side of an endpoint: serves an optional root, issues requests.
///
/// Cheap to clone (internally `Arc`-backed). Build one with
/// [`PeerBuilder`](crate::PeerBuilder), [`expose`](crate::expose) or
/// [`wrap`](crate::wrap).
#[derive(Clone)]
pub struct Peer {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    endpoint: EndpointPtr,
    context: PeerContext,

    /// Root served to the other side.
    root: Option<Value>,

    /// Entry in the export table keeping this peer alive.
    export_id: Option<ExportId>,

    pending: Mutex<PendingRequests>,
    released: AtomicBool,

    rx_task: Mutex<Option<JoinHandle<()>>>,
}

impl Peer {
    // ---
    /// Start a peer on `endpoint`.
    ///
    /// The receive loop holds only a weak reference, so the peer lives as
    /// long as its handles (or its export table entry).
    pub(crate) fn spawn(
        context: PeerContext,
        endpoint: EndpointPtr,
        root: Option<Value>,
        export_id: Option<ExportId>,
    ) -> Self {
        // ---
        let inner = Arc::new(Inner {
            endpoint: endpoint.clone(),
            context,
            root,
            export_id,
            pending: Mutex::new(PendingRequests::new()),
            released: AtomicBool::new(false),
            rx_task: Mutex::new(None),
        });

        let task = tokio::spawn(Self::receive_loop(endpoint, Arc::downgrade(&inner)));
        *lock_ignore_poison(&inner.rx_task) = Some(task);

        Self { inner }
    }

    async fn receive_loop(endpoint: EndpointPtr, weak: Weak<Inner>) {
        // ---
        let endpoint_id = endpoint.endpoint_id().to_string();

        let mut handle = match endpoint.subscribe().await {
            Ok(h) => h,
            Err(_err) => {
                log_error!("{endpoint_id}: failed to subscribe: {_err}");
                return;
            }
        };
        endpoint.start();

        log_debug!("{endpoint_id}: receive loop started");

        while let Some(env) = handle.inbox.recv().await {
            match weak.upgrade() {
                Some(inner) => Peer { inner }.handle_envelope(env),
                // Peer was dropped, exit loop
                None => break,
            }
        }

        log_debug!("{endpoint_id}: receive loop stopped");

        if let Some(inner) = weak.upgrade() {
            Peer { inner }.on_disconnect();
        }
    }

    fn handle_envelope(&self, env: Envelope) {
        // ---
        let packet = match Packet::from_slice(&env.payload) {
            Ok(packet) => packet,
            Err(err) => {
                log_warn!("{}: dropping malformed payload: {err}", self.endpoint_id());
                return;
            }
        };

        match packet {
            Packet::Request(message) => {
                let peer = self.clone();
                tokio::spawn(async move {
                    peer.serve_request(message, env.transfer).await;
                });
            }
            Packet::Response(wire) => {
                if let Err(err) = self.handle_response(wire, env.transfer) {
                    log_warn!("{}: {err}", self.endpoint_id());
                }
            }
        }
    }

    async fn serve_request(&self, message: Message, transfer: Vec<EndpointPtr>) {
        // ---
        let kind = message.op.kind();
        let answer = message.id.is_some();

        let reply = server::dispatch(
            &self.inner.context,
            self.inner.root.as_ref(),
            message,
            transfer,
        )
        .await;

        if answer {
            match reply.wire.to_bytes() {
                Ok(payload) => {
                    let env = Envelope::with_transfer(payload, reply.transfer);
                    if let Err(_err) = self.inner.endpoint.post_message(env).await {
                        log_debug!("{}: could not post {kind} reply: {_err}", self.endpoint_id());
                    }
                }
                Err(_err) => log_error!("{}: failed to encode {kind} reply: {_err}", self.endpoint_id()),
            }
        }

        if reply.release {
            self.retire().await;
        }
    }

    /// Internal hook used by the receive loop to settle pending requests.
    fn handle_response(&self, wire: WireValue, transfer: Vec<EndpointPtr>) -> Result<()> {
        // ---
        let Some(id) = wire.id.clone() else {
            log_debug!("{}: ignoring response without id", self.endpoint_id());
            return Ok(());
        };

        let completion = {
            let mut pending = lock_ignore_poison(&self.inner.pending);
            pending.complete(&id, InboundResponse { wire, transfer })
        };

        match completion {
            Completion::Delivered => Ok(()),
            Completion::Abandoned => {
                log_debug!("{}: response arrived after request abandoned (id: {id})", self.endpoint_id());
                Ok(())
            }
            Completion::Unknown => Err(ProxyError::UnexpectedResponse(id)),
        }
    }

    /// Send `op` and decode the correlated response.
    ///
    /// A thrown outcome comes back as [`ProxyError::RemoteThrow`]. If the
    /// response cannot be decoded, whatever it carried is released.
    pub(crate) async fn request(&self, op: Operation, transfer: Vec<EndpointPtr>) -> Result<Value> {
        // ---
        self.ensure_live()?;
        let response = self.exchange(op, transfer).await?;

        let mut ctx = DecodeContext::new(&self.inner.context, response.transfer);
        let decoded = codec::decode(response.wire, &mut ctx);
        if decoded.is_ok() {
            ctx.keep();
        }
        ctx.finish().await;
        decoded
    }

    async fn exchange(&self, op: Operation, transfer: Vec<EndpointPtr>) -> Result<InboundResponse> {
        // ---
        let id = MessageId::generate();
        let payload = Message {
            id: Some(id.clone()),
            op,
        }
        .to_bytes()?;

        let rx = lock_ignore_poison(&self.inner.pending).register(id.clone());
        let mut guard = PendingGuard {
            inner: &self.inner,
            id: &id,
            armed: true,
        };

        if let Err(err) = self
            .inner
            .endpoint
            .post_message(Envelope::with_transfer(payload, transfer))
            .await
        {
            lock_ignore_poison(&self.inner.pending).remove(&id);
            guard.armed = false;
            return Err(err);
        }

        let received = match self.inner.context.config.request_timeout {
            Some(limit) => time::timeout(limit, rx)
                .await
                .map_err(|_| ProxyError::Timeout)?,
            None => rx.await,
        };
        guard.armed = false;

        received.map_err(|_| {
            if self.is_released() {
                ProxyError::Released
            } else {
                ProxyError::EndpointClosed
            }
        })
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            Err(ProxyError::Released)
        } else {
            Ok(())
        }
    }

    /// Caller-side release; the RELEASE message goes out at most once.
    pub(crate) async fn release(&self, path: &[String]) -> Result<()> {
        // ---
        if self.inner.released.swap(true, Ordering::AcqRel) {
            log_debug!("{}: already released", self.endpoint_id());
            return Ok(());
        }

        let op = Operation::Release {
            path: path.to_vec(),
        };
        let outcome = match self.exchange(op, Vec::new()).await {
            Ok(_) | Err(ProxyError::EndpointClosed) | Err(ProxyError::Released) => Ok(()),
            Err(err) => Err(err),
        };

        self.shutdown().await;
        outcome
    }

    /// Callee-side release: drop the export entry and stop serving.
    async fn retire(&self) {
        // ---
        if let Some(id) = &self.inner.export_id {
            match self.inner.context.exports.remove(id) {
                Some(_) => log_debug!("{}: export {id} released", self.endpoint_id()),
                None => log_debug!("{}: export {id} already released", self.endpoint_id()),
            }
        }
        self.shutdown().await;
    }

    /// The endpoint went away without a RELEASE.
    fn on_disconnect(&self) {
        // ---
        if let Some(id) = &self.inner.export_id {
            if self.inner.context.exports.remove(id).is_some() {
                log_debug!("{}: export {id} dropped, endpoint closed", self.endpoint_id());
            }
        }
        lock_ignore_poison(&self.inner.pending).clear();
    }

    async fn shutdown(&self) {
        // ---
        self.inner.released.store(true, Ordering::Release);
        lock_ignore_poison(&self.inner.pending).clear();

        if let Err(_err) = self.inner.endpoint.close().await {
            log_debug!("{}: close failed: {_err}", self.endpoint_id());
        }
    }

    /// Stop serving and close the endpoint without telling the other side.
    ///
    /// Pending requests fail with [`ProxyError::Released`].
    pub async fn close(&self) {
        // ---
        if let Some(id) = &self.inner.export_id {
            self.inner.context.exports.remove(id);
        }
        self.shutdown().await;
    }

    /// Handle on the other side's root.
    pub fn remote(&self) -> RemoteHandle {
        RemoteHandle::root(self.clone())
    }

    /// Name used in logs, from [`ProxyConfig::name`].
    pub fn name(&self) -> &str {
        &self.inner.context.config.name
    }

    pub fn endpoint_id(&self) -> &str {
        self.inner.endpoint.endpoint_id()
    }

    /// True when this peer serves a root to the other side.
    pub fn is_exposing(&self) -> bool {
        self.inner.root.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Export table shared by this peer and every peer it spawned.
    pub fn exports(&self) -> &ExportTable {
        &self.inner.context.exports
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.inner.context.config
    }

    /// Number of requests waiting for a response.
    pub fn pending_requests(&self) -> usize {
        lock_ignore_poison(&self.inner.pending).len()
    }

    pub(crate) fn context(&self) -> &PeerContext {
        &self.inner.context
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("name", &self.name())
            .field("endpoint", &self.endpoint_id())
            .field("exposing", &self.is_exposing())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Marks a request abandoned if its caller stops waiting.
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: &'a MessageId,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock_ignore_poison(&self.inner.pending).abandon(self.id);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // ---
        let task = match self.rx_task.get_mut() {
            Ok(task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.abort();
        }

        let released = *self.released.get_mut();
        if released
            || self.root.is_some()
            || self.context.config.release_policy != ReleasePolicy::OnDrop
        {
            return;
        }

        let endpoint = self.endpoint.clone();
        let message = Message::request(Operation::Release { path: Vec::new() });

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    match message.to_bytes() {
                        Ok(payload) => {
                            if let Err(_err) = endpoint.post_message(Envelope::new(payload)).await {
                                log_debug!("{}: RELEASE on drop not delivered: {_err}", endpoint.endpoint_id());
                            }
                        }
                        Err(_err) => log_error!("failed to encode RELEASE: {_err}"),
                    }
                });
            }
            Err(_) => {
                log_warn!("{}: dropped outside a runtime, RELEASE not sent", self.endpoint.endpoint_id());
            }
        }
    }
}
