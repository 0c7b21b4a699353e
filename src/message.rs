//! The unit of exchange for all four call shapes.

use serde::{Deserialize, Serialize};

/// A text payload carried by every request and response.
///
/// Value semantics: a `Message` is immutable once constructed and owned by
/// whoever holds it; sending a message transfers a copy of its contents onto
/// the wire, never shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The payload text.
    pub text: String,
}

impl Message {
    /// Create a message from anything string-like.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
