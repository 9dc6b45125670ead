//! Session identifier.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Names one conversation history. Fresh ids are UUID v7 so they sort by
/// creation time; ids read back from a saved session are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A new time-ordered id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// The id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_differ_and_sort_by_creation() {
        let first = SessionId::new();
        let second = SessionId::new();
        assert_ne!(first, second);
        assert!(first <= second);
    }

    #[test]
    fn serializes_as_a_bare_string() {
        let id = SessionId::from("sess-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""sess-1""#);
        assert_eq!(serde_json::from_str::<SessionId>(r#""sess-1""#).unwrap(), id);
        assert_eq!(id.to_string(), "sess-1");
    }
}
