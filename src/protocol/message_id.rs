use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier matching one outstanding request to its response.
///
/// Ids are carried *in-band*: on the request [`Message`](crate::Message) and
/// on the [`WireValue`](crate::WireValue) that answers it. The endpoint never
/// looks at them. Generated ids are UUID v4 strings, but any string a remote
/// peer chooses is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh id, unique among this peer's outstanding requests.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_generate_unique() {
        // ---
        let id1 = MessageId::generate();
        let id2 = MessageId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_serializes_as_bare_string() {
        // ---
        let id = MessageId::from("42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
    }
}
