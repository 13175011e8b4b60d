use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::sync::lock_ignore_poison;
use crate::Value;

/// A shared, mutable property bag.
///
/// Objects are reference values: clones share the same properties, so a
/// SET arriving from a remote peer is visible through every clone.
#[derive(Clone, Default)]
pub struct Object {
    props: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl Object {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        lock_ignore_poison(&self.props).get(key).cloned()
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        lock_ignore_poison(&self.props).insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        lock_ignore_poison(&self.props).remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        lock_ignore_poison(&self.props).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        lock_ignore_poison(&self.props).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.props).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` with the property map locked.
    ///
    /// Used for in-place writes into structured data stored on the object.
    pub(crate) fn with_props<R>(&self, f: impl FnOnce(&mut BTreeMap<String, Value>) -> R) -> R {
        f(&mut lock_ignore_poison(&self.props))
    }

    /// True when both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.props, &other.props)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_properties() {
        // ---
        let a = Object::new().with("n", 1);
        let b = a.clone();
        b.set("n", 2);

        assert_eq!(a.get("n").unwrap().as_raw(), Some(&json!(2)));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Object::new()));
    }

    #[test]
    fn test_keys_are_sorted() {
        // ---
        let o = Object::new().with("b", 1).with("a", 2);
        assert_eq!(o.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(o.len(), 2);
        assert!(o.remove("a").is_some());
        assert!(!o.contains_key("a"));
    }
}
