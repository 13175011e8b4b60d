use std::fmt;

use serde::de::DeserializeOwned;

use crate::codec::{self, EncodeContext};
use crate::{
    // ---
    EndpointPtr,
    Operation,
    Path,
    Peer,
    ProxyError,
    Result,
    Value,
    WireValue,
};

/// A handle on a value living on the other side of an endpoint.
///
/// Handles are immutable: [`prop`](Self::prop) and [`index`](Self::index)
/// return a new handle with one more path segment and never touch the
/// endpoint. The async methods are the terminal operations; each sends
/// one message and resolves with the correlated response.
///
/// Every handle derived from the same materialized handle shares its
/// peer, so [`release`](Self::release) on any of them releases all.
///
/// # Example
///
/// ```
/// use peerlink::{expose, wrap, Function, MessageChannel, Object, ThrownValue, Value};
///
/// # async fn example() -> peerlink::Result<()> {
/// let (a, b) = MessageChannel::new().into_ports();
///
/// let api = Object::new().with(
///     "math",
///     Object::new().with(
///         "add",
///         Function::new(|args: Vec<Value>| async move {
///             let sum: i64 = args.iter().filter_map(|v| v.as_raw()?.as_i64()).sum();
///             Ok::<_, ThrownValue>(Value::from(sum))
///         }),
///     ),
/// );
/// let _server = expose(Value::from(api), b)?;
///
/// let remote = wrap(a)?;
/// let add = remote.prop("math").prop("add"); // no traffic yet
/// let sum: i64 = add.call(vec![Value::from(2), Value::from(3)]).await?;
/// assert_eq!(sum, 5);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RemoteHandle {
    // ---
    peer: Peer,
    path: Path,
}

impl RemoteHandle {
    // ---
    pub(crate) fn root(peer: Peer) -> Self {
        Self {
            peer,
            path: Vec::new(),
        }
    }

    /// Handle on property `key` of this handle's target.
    pub fn prop(&self, key: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(key.into());
        Self {
            peer: self.peer.clone(),
            path,
        }
    }

    /// Handle on element `index` of this handle's target.
    pub fn index(&self, index: usize) -> Self {
        self.prop(index.to_string())
    }

    /// Path of this handle relative to the remote root.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// The peer this handle talks through.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn is_released(&self) -> bool {
        self.peer.is_released()
    }

    /// Read the value at this path.
    ///
    /// Objects and functions come back as [`Value::Proxy`].
    ///
    /// # Errors
    ///
    /// - [`ProxyError::RemoteThrow`] if the path does not resolve
    /// - [`ProxyError::Released`] after [`release`](Self::release)
    /// - [`ProxyError::UnknownHandler`] if the result uses a handler this
    ///   side does not know
    pub async fn get(&self) -> Result<Value> {
        let op = Operation::Get {
            path: self.path.clone(),
        };
        self.peer.request(op, Vec::new()).await
    }

    /// Read the value at this path as `T`.
    pub async fn get_as<T: DeserializeOwned>(&self) -> Result<T> {
        self.get().await?.into_typed()
    }

    /// Write `value` at this path.
    pub async fn set(&self, value: impl Into<Value>) -> Result<()> {
        // ---
        let (mut wires, transfer) = self.encode_all(vec![value.into()]).await?;
        let value = wires.pop().ok_or_else(|| {
            ProxyError::InvalidMessage("SET encoded no value".to_string())
        })?;

        let op = Operation::Set {
            path: self.path.clone(),
            value,
        };
        self.peer.request(op, transfer).await?;
        Ok(())
    }

    /// Call the function at this path, with `this` bound to its parent.
    pub async fn apply(&self, args: Vec<Value>) -> Result<Value> {
        // ---
        let (argument_list, transfer) = self.encode_all(args).await?;
        let op = Operation::Apply {
            path: self.path.clone(),
            argument_list,
        };
        self.peer.request(op, transfer).await
    }

    /// Call the function at this path and convert the result to `T`.
    pub async fn call<T: DeserializeOwned>(&self, args: Vec<Value>) -> Result<T> {
        self.apply(args).await?.into_typed()
    }

    /// Call the function at this path as a constructor.
    pub async fn construct(&self, args: Vec<Value>) -> Result<Value> {
        // ---
        let (argument_list, transfer) = self.encode_all(args).await?;
        let op = Operation::Construct {
            path: self.path.clone(),
            argument_list,
        };
        self.peer.request(op, transfer).await
    }

    /// Open an independent channel whose root is this handle's target.
    ///
    /// The returned endpoint can be handed to [`wrap`](crate::wrap) or
    /// transferred to a third party.
    pub async fn endpoint(&self) -> Result<EndpointPtr> {
        // ---
        let op = Operation::Endpoint {
            path: self.path.clone(),
        };
        let value = self.peer.request(op, Vec::new()).await?;

        value.into_port().ok_or_else(|| {
            ProxyError::InvalidMessage("ENDPOINT response did not carry an endpoint".to_string())
        })
    }

    /// Tell the other side this handle is no longer needed.
    ///
    /// Sent at most once per materialized handle; later calls, on this or
    /// any derived handle, return `Ok(())` without traffic. Requests still
    /// waiting fail with [`ProxyError::Released`], as does every later
    /// operation.
    pub async fn release(&self) -> Result<()> {
        self.peer.release(&self.path).await
    }

    async fn encode_all(&self, values: Vec<Value>) -> Result<(Vec<WireValue>, Vec<EndpointPtr>)> {
        // ---
        self.peer.ensure_live()?;

        let mut ctx = EncodeContext::new(self.peer.context());
        let mut wires = Vec::with_capacity(values.len());

        for value in values {
            match codec::encode(value, &mut ctx) {
                Ok(wire) => wires.push(wire),
                Err(err) => {
                    ctx.abandon().await;
                    return Err(err);
                }
            }
        }

        Ok((wires, ctx.into_transfer()))
    }
}

impl fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("peer", &self.peer.name())
            .field("endpoint", &self.peer.endpoint_id())
            .field("path", &self.path)
            .finish()
    }
}
