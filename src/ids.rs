//! Opaque string identifiers with type tags.
//!
//! Each id wraps a `String`; uniqueness is enforced by the owning registry
//! (`ToolId` in a `Toolkit`, `NodeId`/`EdgeId` in a `GraphAgent`), not by the
//! type itself.

use std::fmt;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wraps any string-like value as this id type.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrows the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(ToolId, "Identifies a tool within a Toolkit's registry.");
string_id!(NodeId, "Identifies a node within a GraphAgent.");
string_id!(EdgeId, "Identifies an edge within a GraphAgent.");
string_id!(UserId, "Identifies the end user driving a run.");
string_id!(ConversationId, "Identifies a conversation/thread.");
string_id!(AgentId, "Identifies an agent instance (ReAct or Graph).");
