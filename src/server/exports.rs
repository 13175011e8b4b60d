use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::sync::lock_ignore_poison;
use crate::Peer;

/// Opaque, stable identifier of one exported value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportId(String);

impl ExportId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Values this side keeps alive on behalf of remote handles.
///
/// Every exposed value is held here, by the peer serving it, until the
/// remote side releases it. Shared by every peer derived from the same
/// builder, so `len()` counts all live exports of one logical side.
#[derive(Clone, Default)]
pub struct ExportTable {
    entries: Arc<Mutex<HashMap<ExportId, Peer>>>,
}

impl ExportTable {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, id: ExportId, peer: Peer) {
        lock_ignore_poison(&self.entries).insert(id, peer);
    }

    /// Drop the strong reference held for `id`.
    ///
    /// Returns `None` if it was already removed, which makes repeated
    /// releases harmless.
    pub(crate) fn remove(&self, id: &ExportId) -> Option<Peer> {
        lock_ignore_poison(&self.entries).remove(id)
    }

    pub fn contains(&self, id: &ExportId) -> bool {
        lock_ignore_poison(&self.entries).contains_key(id)
    }

    pub fn ids(&self) -> Vec<ExportId> {
        lock_ignore_poison(&self.entries).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportTable")
            .field("len", &self.len())
            .finish()
    }
}
