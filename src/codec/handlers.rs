//! Built-in transfer handlers.

use super::{DecodeContext, EncodeContext, TransferHandler, TransferRef};
use crate::{ErrorValue, ProxyError, Result, Value};

/// Serves objects and functions behind a proxy.
///
/// The value is exposed on a fresh in-memory channel and the other end is
/// transferred. The receiver gets a [`RemoteHandle`](crate::RemoteHandle).
#[derive(Debug, Default, Clone, Copy)]
pub struct ProxyHandler;

impl TransferHandler for ProxyHandler {
    // ---
    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Object(_) | Value::Function(_))
    }

    fn serialize(&self, value: Value, ctx: &mut EncodeContext<'_>) -> Result<serde_json::Value> {
        Ok(TransferRef::to_json(ctx.serve(value)))
    }

    fn deserialize(&self, wire: serde_json::Value, ctx: &mut DecodeContext<'_>) -> Result<Value> {
        let index = TransferRef::from_json(wire)?;
        Ok(Value::Proxy(ctx.wrap(index)?))
    }
}

/// Moves endpoints to the receiver.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortHandler;

impl TransferHandler for PortHandler {
    // ---
    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Port(_))
    }

    fn serialize(&self, value: Value, ctx: &mut EncodeContext<'_>) -> Result<serde_json::Value> {
        match value {
            Value::Port(endpoint) => Ok(TransferRef::to_json(ctx.transfer(endpoint))),
            other => Err(unexpected("port", &other)),
        }
    }

    fn deserialize(&self, wire: serde_json::Value, ctx: &mut DecodeContext<'_>) -> Result<Value> {
        let index = TransferRef::from_json(wire)?;
        Ok(Value::Port(ctx.take_transfer(index)?))
    }
}

/// Carries error objects that are returned or passed as arguments.
///
/// Wire value: `{ name, message, stack? }`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorHandler;

impl TransferHandler for ErrorHandler {
    // ---
    fn can_handle(&self, value: &Value) -> bool {
        matches!(value, Value::Error(_))
    }

    fn serialize(&self, value: Value, _ctx: &mut EncodeContext<'_>) -> Result<serde_json::Value> {
        match value {
            Value::Error(err) => Ok(serde_json::to_value(err)?),
            other => Err(unexpected("error", &other)),
        }
    }

    fn deserialize(&self, wire: serde_json::Value, _ctx: &mut DecodeContext<'_>) -> Result<Value> {
        let err: ErrorValue = serde_json::from_value(wire)?;
        Ok(Value::Error(err))
    }
}

fn unexpected(handler: &str, value: &Value) -> ProxyError {
    ProxyError::UnserializableValue(format!(
        "the {handler} handler cannot serialize a {}",
        value.kind()
    ))
}
