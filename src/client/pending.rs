use std::collections::{HashMap, HashSet};

use tokio::sync::oneshot;

use crate::{EndpointPtr, MessageId, WireValue};

/// A response as it came off the endpoint, not yet decoded.
pub(crate) struct InboundResponse {
    pub wire: WireValue,
    pub transfer: Vec<EndpointPtr>,
}

/// What happened to an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    /// Handed to the waiting caller.
    Delivered,

    /// The caller stopped waiting (timeout or cancellation).
    Abandoned,

    /// No request with this id is outstanding.
    Unknown,
}

/// Tracks requests waiting for responses.
///
/// Maps message ids to oneshot channels. When a response arrives, the
/// channel delivers it to the waiting future. Ids whose caller gave up are
/// remembered until their late response shows up, so it can be told apart
/// from a response nobody ever asked for.
pub(crate) struct PendingRequests {
    // ---
    requests: HashMap<MessageId, oneshot::Sender<InboundResponse>>,
    abandoned: HashSet<MessageId>,
}

impl PendingRequests {
    // ---

    pub fn new() -> Self {
        // ---
        Self {
            requests: HashMap::new(),
            abandoned: HashSet::new(),
        }
    }

    /// Register a new pending request.
    ///
    /// Returns a receiver that will be notified when the response arrives.
    pub fn register(&mut self, id: MessageId) -> oneshot::Receiver<InboundResponse> {
        // ---
        let (tx, rx) = oneshot::channel();
        self.requests.insert(id, tx);
        rx
    }

    /// Complete a pending request with its response.
    pub fn complete(&mut self, id: &MessageId, response: InboundResponse) -> Completion {
        // ---
        if let Some(tx) = self.requests.remove(id) {
            match tx.send(response) {
                Ok(()) => Completion::Delivered,
                Err(_) => Completion::Abandoned,
            }
        } else if self.abandoned.remove(id) {
            Completion::Abandoned
        } else {
            Completion::Unknown
        }
    }

    /// Remove a pending request without delivering a response.
    ///
    /// Used when the request never made it onto the endpoint.
    pub fn remove(&mut self, id: &MessageId) -> bool {
        // ---
        self.requests.remove(id).is_some()
    }

    /// Stop waiting for `id`, expecting its response may still arrive.
    pub fn abandon(&mut self, id: &MessageId) {
        // ---
        if self.requests.remove(id).is_some() {
            self.abandoned.insert(id.clone());
        }
    }

    /// Drop every outstanding request; their receivers observe a closed
    /// channel.
    pub fn clear(&mut self) {
        // ---
        self.requests.clear();
        self.abandoned.clear();
    }

    /// Number of requests still waiting for a response.
    pub fn len(&self) -> usize {
        // ---
        self.requests.len()
    }
}
