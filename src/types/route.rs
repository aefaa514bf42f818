//! Route identity

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque identifier scoping one rover path's recorded and replayed history.
///
/// Consoles send route ids either as JSON strings or as numbers; both forms
/// collapse to the same textual identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rendering used in stored path and photo file names.
    ///
    /// Form-urlencoded, so it never contains a path separator and two
    /// distinct routes never share a key.
    pub fn file_key(&self) -> String {
        url::form_urlencoded::byte_serialize(self.0.as_bytes()).collect()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RouteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for RouteId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for RouteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRouteId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl From<RawRouteId> for RouteId {
    fn from(raw: RawRouteId) -> Self {
        match raw {
            RawRouteId::Text(s) => RouteId(s),
            RawRouteId::Unsigned(n) => RouteId(n.to_string()),
            RawRouteId::Signed(n) => RouteId(n.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for RouteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawRouteId::deserialize(deserializer).map(RouteId::from)
    }
}

/// Deserialize an optional route id, treating `null` and blank strings as absent.
pub(crate) fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<RouteId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawRouteId>::deserialize(deserializer)?;
    Ok(raw.map(RouteId::from).filter(|id| !id.0.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_textual_ids_are_equal() {
        let from_number: RouteId = serde_json::from_str("42").unwrap();
        let from_text: RouteId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_number, from_text);
        assert_eq!(serde_json::to_string(&from_number).unwrap(), "\"42\"");
    }

    #[test]
    fn file_key_escapes_separators_without_collisions() {
        assert_eq!(RouteId::from("../etc/passwd").file_key(), "..%2Fetc%2Fpasswd");
        assert_eq!(RouteId::from("field-7_b").file_key(), "field-7_b");
        assert_ne!(RouteId::from("a/b").file_key(), RouteId::from("a_b").file_key());
        assert_ne!(RouteId::from("a b").file_key(), RouteId::from("a+b").file_key());
    }
}
