// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Identifiers for experimental subjects and preparations.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// An identifier that is either an integer or a free-form string.
///
/// Equality and hashing use the underlying value, so `Identifier::Int(7)`
/// equals `Identifier::Str("7".into())`. Prefer [`Identifier::parse`] or the
/// `From` impls, which normalize integer-looking strings to `Int`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Integer identifier
    Int(i64),
    /// String identifier
    Str(String),
}

impl Identifier {
    /// Parse an identifier, using the integer form when the text is one.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(n) => Identifier::Int(n),
            Err(_) => Identifier::Str(text.to_string()),
        }
    }

    /// Normalized form used for comparison.
    fn canonical(&self) -> Identifier {
        match self {
            Identifier::Int(n) => Identifier::Int(*n),
            Identifier::Str(s) => Identifier::parse(s),
        }
    }

    /// Convert from a JSON scalar.
    ///
    /// Returns `None` for values that are neither integers nor strings.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Identifier::Int),
            serde_json::Value::String(s) => Some(Identifier::parse(s)),
            _ => None,
        }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        match (self.canonical(), other.canonical()) {
            (Identifier::Int(a), Identifier::Int(b)) => a == b,
            (Identifier::Str(a), Identifier::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.canonical() {
            Identifier::Int(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Identifier::Str(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Int(n) => write!(f, "{n}"),
            Identifier::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(n: i64) -> Self {
        Identifier::Int(n)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::parse(s)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_representation() {
        assert_eq!(Identifier::Int(12), Identifier::Str("12".to_string()));
        assert_eq!(Identifier::from("12"), Identifier::from(12));
        assert_ne!(Identifier::from("A12"), Identifier::from(12));
    }

    #[test]
    fn test_parse_normalizes() {
        assert!(matches!(Identifier::parse("42"), Identifier::Int(42)));
        assert!(matches!(Identifier::parse("m-42"), Identifier::Str(ref s) if s == "m-42"));
    }

    #[test]
    fn test_hash_consistent_with_eq() {
        let mut set = HashSet::new();
        set.insert(Identifier::Int(3));
        assert!(set.contains(&Identifier::Str("3".to_string())));
    }

    #[test]
    fn test_serialize_untagged() {
        assert_eq!(serde_json::to_string(&Identifier::Int(5)).unwrap(), "5");
        assert_eq!(
            serde_json::to_string(&Identifier::from("slice-b")).unwrap(),
            "\"slice-b\""
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(
            Identifier::from_json(&serde_json::json!(9)),
            Some(Identifier::Int(9))
        );
        assert_eq!(
            Identifier::from_json(&serde_json::json!("9")),
            Some(Identifier::Int(9))
        );
        assert_eq!(Identifier::from_json(&serde_json::json!(1.5)), None);
    }
}
