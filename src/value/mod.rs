//! In-process values: what application code reads, writes, and exposes.
//!
//! A [`Value`] is either structured data that can cross the boundary as is
//! (`Raw`) or something that needs a transfer handler: error objects,
//! shared objects and functions (served behind a proxy), endpoints
//! (transferred), and remote handles.

mod function;
mod object;
mod thrown;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Endpoint, EndpointPtr, ProxyError, RemoteHandle, Result};

pub(crate) use function::BoxFuture;
pub use function::{CallResult, Function};
pub use object::Object;
pub use thrown::{ErrorValue, ThrownValue};

/// A value on this side of the boundary.
#[derive(Clone)]
pub enum Value {
    /// Structured data, sent as `RAW`. `Null` stands in for `undefined`.
    Raw(serde_json::Value),

    /// An error object that is returned or passed, not thrown.
    Error(ErrorValue),

    /// A shared property bag, served to the other side behind a proxy.
    Object(Object),

    /// A callable, served to the other side behind a proxy.
    Function(Function),

    /// One end of a channel, transferred to the receiver.
    Port(EndpointPtr),

    /// A handle on a value living on another peer.
    Proxy(RemoteHandle),
}

impl Value {
    // ---
    /// The absence of a value.
    pub fn undefined() -> Self {
        Value::Raw(serde_json::Value::Null)
    }

    /// Serialize `data` into a structured value.
    pub fn raw<T: Serialize>(data: &T) -> Result<Self> {
        Ok(Value::Raw(serde_json::to_value(data)?))
    }

    /// Short name of the variant, for messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Raw(_) => "structured value",
            Value::Error(_) => "error",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Port(_) => "endpoint",
            Value::Proxy(_) => "remote handle",
        }
    }

    /// True when the value can travel as `RAW` without a handler.
    pub fn is_natively_transmissible(&self) -> bool {
        matches!(self, Value::Raw(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Raw(serde_json::Value::Null))
    }

    pub fn as_raw(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Raw(v) => Some(v),
            _ => None,
        }
    }

    /// Deserialize a structured value into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::UnserializableValue`] if the value is not
    /// structured data, and [`ProxyError::Serialization`] if it does not
    /// match `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Value::Raw(v) => Ok(serde_json::from_value(v)?),
            other => Err(ProxyError::UnserializableValue(format!(
                "expected a structured value, found {}",
                other.kind()
            ))),
        }
    }

    pub fn into_proxy(self) -> Option<RemoteHandle> {
        match self {
            Value::Proxy(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn into_port(self) -> Option<EndpointPtr> {
        match self {
            Value::Port(port) => Some(port),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::undefined()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Raw(v) => f.debug_tuple("Raw").field(v).finish(),
            Value::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Value::Object(o) => o.fmt(f),
            Value::Function(func) => func.fmt(f),
            Value::Port(port) => f.debug_tuple("Port").field(&port.endpoint_id()).finish(),
            Value::Proxy(handle) => handle.fmt(f),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Raw(v)
    }
}

macro_rules! raw_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Raw(serde_json::Value::from(v))
                }
            }
        )*
    };
}

raw_from!(bool, i32, i64, u32, u64, f64, String, &str);

impl From<ErrorValue> for Value {
    fn from(e: ErrorValue) -> Self {
        Value::Error(e)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<EndpointPtr> for Value {
    fn from(port: EndpointPtr) -> Self {
        Value::Port(port)
    }
}

impl From<RemoteHandle> for Value {
    fn from(handle: RemoteHandle) -> Self {
        Value::Proxy(handle)
    }
}
