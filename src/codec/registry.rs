use std::fmt;
use std::sync::Arc;

use super::handlers::{ErrorHandler, PortHandler, ProxyHandler};
use super::TransferHandler;
use crate::{ProxyError, Result, Value, THROW_HANDLER};

/// Name of the handler serving objects and functions behind a proxy.
pub const PROXY_HANDLER: &str = "proxy";

/// Name of the handler transferring endpoints.
pub const PORT_HANDLER: &str = "port";

/// Name of the handler carrying returned (not thrown) error objects.
pub const ERROR_HANDLER: &str = "error";

/// Ordered set of named transfer handlers.
///
/// Encoding consults handlers in registration order and uses the first one
/// that claims the value. Decoding looks the handler up by name.
///
/// The default registry holds, in order: `proxy`, `port`, `error`. The
/// name `throw` is reserved for thrown outcomes, which are encoded and
/// decoded without consulting the registry.
///
/// # Example
///
/// ```
/// use peerlink::{HandlerRegistry, ErrorHandler, ERROR_HANDLER};
///
/// let registry = HandlerRegistry::empty().with(ERROR_HANDLER, ErrorHandler)?;
/// assert_eq!(registry.names(), vec![ERROR_HANDLER]);
/// # Ok::<(), peerlink::ProxyError>(())
/// ```
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Vec<(String, Arc<dyn TransferHandler>)>,
}

impl HandlerRegistry {
    // ---
    /// A registry with no handlers at all.
    ///
    /// Structured data and thrown outcomes still make the trip.
    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register `handler` under `name`.
    ///
    /// A handler already registered under `name` is replaced in place,
    /// keeping its position; otherwise the handler is appended. Returns the
    /// replaced handler, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ReservedHandler`] for the name `throw`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl TransferHandler + 'static,
    ) -> Result<Option<Arc<dyn TransferHandler>>> {
        // ---
        let name = name.into();
        if name == THROW_HANDLER {
            return Err(ProxyError::ReservedHandler(name));
        }
        let handler: Arc<dyn TransferHandler> = Arc::new(handler);

        match self.handlers.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Ok(Some(std::mem::replace(slot, handler))),
            None => {
                self.handlers.push((name, handler));
                Ok(None)
            }
        }
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ReservedHandler`] for the name `throw`.
    pub fn with(mut self, name: impl Into<String>, handler: impl TransferHandler + 'static) -> Result<Self> {
        self.register(name, handler)?;
        Ok(self)
    }

    /// Remove the handler registered under `name`.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(n, _)| n != name);
        self.handlers.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TransferHandler>> {
        self.handlers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, handler)| handler)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Handler names in consultation order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// First handler claiming `value`.
    pub(crate) fn find(&self, value: &Value) -> Option<(&str, &Arc<dyn TransferHandler>)> {
        self.handlers
            .iter()
            .find(|(_, handler)| handler.can_handle(value))
            .map(|(n, handler)| (n.as_str(), handler))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let handlers: Vec<(String, Arc<dyn TransferHandler>)> = vec![
            (PROXY_HANDLER.to_string(), Arc::new(ProxyHandler)),
            (PORT_HANDLER.to_string(), Arc::new(PortHandler)),
            (ERROR_HANDLER.to_string(), Arc::new(ErrorHandler)),
        ];
        Self { handlers }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::codec::{DecodeContext, EncodeContext};
    use crate::{ErrorValue, Result};

    /// Claims error values and flattens them to their message.
    struct MessageOnly;

    impl TransferHandler for MessageOnly {
        fn can_handle(&self, value: &Value) -> bool {
            matches!(value, Value::Error(_))
        }

        fn serialize(&self, value: Value, _ctx: &mut EncodeContext<'_>) -> Result<serde_json::Value> {
            match value {
                Value::Error(err) => Ok(serde_json::Value::String(err.message)),
                _ => Ok(serde_json::Value::Null),
            }
        }

        fn deserialize(&self, wire: serde_json::Value, _ctx: &mut DecodeContext<'_>) -> Result<Value> {
            Ok(Value::from(ErrorValue::new(wire.as_str().unwrap_or_default())))
        }
    }

    #[test]
    fn test_default_order() {
        // ---
        let registry = HandlerRegistry::default();
        assert_eq!(registry.names(), vec![PROXY_HANDLER, PORT_HANDLER, ERROR_HANDLER]);
    }

    #[test]
    fn test_register_replaces_in_place() {
        // ---
        let mut registry = HandlerRegistry::default();
        let replaced = registry.register(ERROR_HANDLER, MessageOnly).unwrap();
        assert!(replaced.is_some());
        assert_eq!(registry.names()[2], ERROR_HANDLER);
        assert_eq!(registry.names().len(), 3);
    }

    #[test]
    fn test_throw_name_is_reserved() {
        // ---
        let mut registry = HandlerRegistry::empty();
        assert!(matches!(
            registry.register(THROW_HANDLER, MessageOnly),
            Err(ProxyError::ReservedHandler(name)) if name == THROW_HANDLER
        ));
        assert!(registry.names().is_empty());
        assert!(HandlerRegistry::empty().with(THROW_HANDLER, ErrorHandler).is_err());
    }

    #[test]
    fn test_first_match_wins() {
        // ---
        let registry = HandlerRegistry::empty()
            .with("first", MessageOnly)
            .and_then(|r| r.with(ERROR_HANDLER, ErrorHandler))
            .unwrap();
        let value = Value::from(ErrorValue::new("x"));
        assert_eq!(registry.find(&value).map(|(name, _)| name), Some("first"));
        assert!(registry.find(&Value::from(1)).is_none());
    }

    #[test]
    fn test_unregister() {
        // ---
        let mut registry = HandlerRegistry::default();
        assert!(registry.unregister(PORT_HANDLER));
        assert!(!registry.unregister(PORT_HANDLER));
        assert!(!registry.contains(PORT_HANDLER));
    }
}
