// src/server/mod.rs
//! Callee side: executing inbound requests against the exposed root.
//!
//! [`dispatch`] never fails. Whatever goes wrong while walking the path,
//! decoding arguments, running the target or encoding its result is
//! turned into a thrown outcome and sent back under the request's id.
//!
//! Decoded arguments that never reach their target are settled before the
//! reply goes out: proxies are released and transferred ports closed.

mod exports;

pub use exports::{ExportId, ExportTable};

use crate::codec::{self, DecodeContext, EncodeContext};
use crate::peer::PeerContext;
#[allow(unused_imports)]
use crate::{
    // ---
    log_debug,
    log_warn,
    CallResult,
    EndpointPtr,
    Message,
    MessageChannel,
    Operation,
    ProxyError,
    Result,
    ThrownValue,
    Value,
    WireValue,
};

/// Thrown back when a request reaches a peer that exposes nothing.
pub(crate) const NOTHING_EXPOSED: &str = "no object exposed on this endpoint";

/// The response to one request.
pub(crate) struct Reply {
    // ---
    pub wire: WireValue,
    pub transfer: Vec<EndpointPtr>,

    /// The request was a RELEASE of this peer's root.
    pub release: bool,
}

/// Execute `message` against `root` and build the response.
pub(crate) async fn dispatch(
    context: &PeerContext,
    root: Option<&Value>,
    message: Message,
    transfer: Vec<EndpointPtr>,
) -> Reply {
    // ---
    let Message { id, op } = message;
    let kind = op.kind();
    let release = matches!(op, Operation::Release { .. }) && root.is_some();

    let mut decoder = DecodeContext::new(context, transfer);
    let outcome = match root {
        Some(root) => execute(context, root, op, &mut decoder).await,
        None if matches!(op, Operation::Release { .. }) => Ok(Value::undefined()),
        None => Err(ThrownValue::error(NOTHING_EXPOSED)),
    };
    decoder.finish().await;

    let (wire, transfer) = match outcome {
        Ok(value) => {
            let mut encoder = EncodeContext::new(context);
            match codec::encode(value, &mut encoder) {
                Ok(wire) => (wire, encoder.into_transfer()),
                Err(err) => {
                    log_warn!("{kind}: result could not be encoded: {err}");
                    encoder.abandon().await;
                    (codec::encode_thrown(&ThrownValue::from(&err)), Vec::new())
                }
            }
        }
        Err(thrown) => {
            log_debug!("{kind}: threw {thrown}");
            (codec::encode_thrown(&thrown), Vec::new())
        }
    };

    Reply {
        wire: wire.with_id(id),
        transfer,
        release,
    }
}

async fn execute(
    context: &PeerContext,
    root: &Value,
    op: Operation,
    decoder: &mut DecodeContext<'_>,
) -> CallResult {
    // ---
    let resolver = &context.resolver;

    match op {
        Operation::Get { path } => Ok(resolver.resolve(root, &path)?.value),

        Operation::Set { path, value } => {
            let value = codec::decode(value, decoder)?;
            resolver.assign(root, &path, value)?;
            decoder.keep();
            Ok(Value::from(true))
        }

        Operation::Apply {
            path,
            argument_list,
        } => {
            let args = decode_all(argument_list, decoder)?;
            let target = resolver.resolve(root, &path)?;
            match target.value {
                Value::Function(func) => {
                    decoder.keep();
                    func.call(target.parent, args).await
                }
                // A function handed over by the other side: call it there.
                Value::Proxy(handle) => Ok(forwarded(handle.apply(args).await, decoder)?),
                _ => Err(ThrownValue::type_error(format!(
                    "{} is not a function",
                    describe(&path)
                ))),
            }
        }

        Operation::Construct {
            path,
            argument_list,
        } => {
            let args = decode_all(argument_list, decoder)?;
            let target = resolver.resolve(root, &path)?;
            match target.value {
                Value::Function(func) if func.is_constructible() => {
                    decoder.keep();
                    func.construct(args).await
                }
                Value::Proxy(handle) => Ok(forwarded(handle.construct(args).await, decoder)?),
                _ => Err(ThrownValue::type_error(format!(
                    "{} is not a constructor",
                    describe(&path)
                ))),
            }
        }

        Operation::Endpoint { path } => {
            let target = resolver.resolve(root, &path)?.value;
            let (local, remote) = MessageChannel::new().into_ports();
            let _served = context.serve(target, local);
            log_debug!("ENDPOINT {}: serving on {}", describe(&path), _served.endpoint_id());
            Ok(Value::Port(remote))
        }

        // The peer retires itself once the acknowledgement is out.
        Operation::Release { .. } => Ok(Value::undefined()),
    }
}

/// Arguments forwarded to a proxy were delivered unless they failed to
/// encode.
fn forwarded(outcome: Result<Value>, decoder: &mut DecodeContext<'_>) -> Result<Value> {
    if !matches!(outcome, Err(ProxyError::UnserializableValue(_))) {
        decoder.keep();
    }
    outcome
}

fn decode_all(wires: Vec<crate::WireValue>, decoder: &mut DecodeContext<'_>) -> Result<Vec<Value>> {
    wires
        .into_iter()
        .map(|wire| codec::decode(wire, decoder))
        .collect()
}

fn describe(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}
