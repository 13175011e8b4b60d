use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{MessageId, ProxyError, Result, WireValue};

/// Ordered property names, applied left to right from an exposed root.
///
/// An empty path denotes the root itself. Array indices are written as
/// decimal strings.
pub type Path = Vec<String>;

/// An operation request sent from caller to callee.
///
/// Wire shape: the operation's fields flattened next to an optional `id`,
/// discriminated by `type`:
///
/// ```text
/// { id?, type: "GET",       path }
/// { id?, type: "SET",       path, value }
/// { id?, type: "APPLY",     path, argumentList }
/// { id?, type: "CONSTRUCT", path, argumentList }
/// { id?, type: "ENDPOINT",  path? }
/// { id?, type: "RELEASE",   path? }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    #[serde(flatten)]
    pub op: Operation,
}

/// The six operations a remote handle can perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Operation {
    /// Read the property at `path`.
    Get { path: Path },

    /// Write `value` to the property at `path`.
    Set { path: Path, value: WireValue },

    /// Call the function at `path`, with `this` bound to its parent.
    Apply {
        path: Path,
        #[serde(rename = "argumentList")]
        argument_list: Vec<WireValue>,
    },

    /// Call the function at `path` as a constructor.
    Construct {
        path: Path,
        #[serde(rename = "argumentList")]
        argument_list: Vec<WireValue>,
    },

    /// Open a fresh channel whose root is the value at `path`.
    Endpoint {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Path,
    },

    /// The caller no longer needs this channel's target.
    Release {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Path,
    },
}

impl Operation {
    // ---
    /// Wire name of the operation, as found in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Get { .. } => "GET",
            Operation::Set { .. } => "SET",
            Operation::Apply { .. } => "APPLY",
            Operation::Construct { .. } => "CONSTRUCT",
            Operation::Endpoint { .. } => "ENDPOINT",
            Operation::Release { .. } => "RELEASE",
        }
    }

    /// The target path of the operation.
    pub fn path(&self) -> &[String] {
        match self {
            Operation::Get { path }
            | Operation::Set { path, .. }
            | Operation::Apply { path, .. }
            | Operation::Construct { path, .. }
            | Operation::Endpoint { path }
            | Operation::Release { path } => path,
        }
    }
}

impl Message {
    // ---
    /// Build a request for `op` tagged with a freshly generated id.
    pub fn request(op: Operation) -> Self {
        Self {
            id: Some(MessageId::generate()),
            op,
        }
    }

    pub(crate) fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// Anything that can legitimately arrive on an endpoint.
///
/// Requests and responses share one channel; the `type` field tells them
/// apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Request(Message),
    Response(WireValue),
}

impl Packet {
    // ---
    /// Parse an inbound payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Serialization`] for invalid JSON or fields of
    /// the wrong shape, and [`ProxyError::InvalidMessage`] when `type` is
    /// missing or unknown.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        // ---
        let json: serde_json::Value = serde_json::from_slice(payload)?;

        let kind = json
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ProxyError::InvalidMessage("missing \"type\" field".into()))?;

        match kind {
            "GET" | "SET" | "APPLY" | "CONSTRUCT" | "ENDPOINT" | "RELEASE" => {
                Ok(Packet::Request(serde_json::from_value(json)?))
            }
            "RAW" | "HANDLER" => Ok(Packet::Response(serde_json::from_value(json)?)),
            other => Err(ProxyError::InvalidMessage(format!(
                "unknown message type \"{other}\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn path(segments: &[&str]) -> Path {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_shape() {
        // ---
        let msg = Message {
            id: Some(MessageId::from("a1")),
            op: Operation::Get {
                path: path(&["user", "name"]),
            },
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"id": "a1", "type": "GET", "path": ["user", "name"]})
        );
    }

    #[test]
    fn test_apply_shape_uses_argument_list() {
        // ---
        let msg = Message {
            id: None,
            op: Operation::Apply {
                path: path(&["add"]),
                argument_list: vec![WireValue::raw(json!(2)), WireValue::raw(json!(3))],
            },
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "APPLY",
                "path": ["add"],
                "argumentList": [{"type": "RAW", "value": 2}, {"type": "RAW", "value": 3}]
            })
        );
    }

    #[test]
    fn test_endpoint_and_release_omit_empty_path() {
        // ---
        let release = Message {
            id: None,
            op: Operation::Release { path: Vec::new() },
        };
        assert_eq!(
            serde_json::to_value(&release).unwrap(),
            json!({"type": "RELEASE"})
        );

        let parsed: Message = serde_json::from_value(json!({"id": "9", "type": "ENDPOINT"})).unwrap();
        assert_eq!(parsed.op, Operation::Endpoint { path: Vec::new() });
    }

    #[test]
    fn test_set_parses_nested_wire_value() {
        // ---
        let parsed: Message = serde_json::from_value(json!({
            "id": "s",
            "type": "SET",
            "path": ["count"],
            "value": {"type": "RAW", "value": 4}
        }))
        .unwrap();

        assert_eq!(parsed.op.kind(), "SET");
        assert_eq!(parsed.op.path(), ["count".to_string()]);
        match parsed.op {
            Operation::Set { value, .. } => assert_eq!(value, WireValue::raw(json!(4))),
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn test_request_attaches_fresh_id() {
        // ---
        let a = Message::request(Operation::Get { path: Vec::new() });
        let b = Message::request(Operation::Get { path: Vec::new() });
        assert!(a.id.is_some());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_packet_demux() {
        // ---
        let request = br#"{"id":"1","type":"GET","path":[]}"#;
        assert!(matches!(Packet::from_slice(request), Ok(Packet::Request(_))));

        let response = br#"{"id":"1","type":"RAW","value":5}"#;
        assert!(matches!(Packet::from_slice(response), Ok(Packet::Response(_))));

        let unknown = br#"{"type":"PING"}"#;
        assert!(matches!(
            Packet::from_slice(unknown),
            Err(ProxyError::InvalidMessage(_))
        ));

        let untyped = br#"{"value":1}"#;
        assert!(matches!(
            Packet::from_slice(untyped),
            Err(ProxyError::InvalidMessage(_))
        ));

        assert!(matches!(
            Packet::from_slice(b"not json"),
            Err(ProxyError::Serialization(_))
        ));
    }
}
