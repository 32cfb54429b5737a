//! Node Identifiers
//!
//! Every node in a NodeDex repository is addressed by a [`NodeIdentifier`]:
//! a non-negative integer id, an optional 4-digit "temporary" code marking an
//! uncommitted node, and an optional alias naming another repository.
//!
//! # Canonical path form
//!
//! - `42` - committed local node
//! - `42-0815` - temporary (uncommitted) local node
//! - `notes/42` or `notes/42-0815` - node living in the repository aliased `notes`
//!
//! # Ordering
//!
//! Identifiers order by `(id, code, alias)`, never by their string form, so
//! `9` sorts before `10` in every index.

use crate::models::ValidationError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Number of digits in a temporary node code
const CODE_LEN: usize = 4;

/// Address of a single node, serialized as its canonical path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeIdentifier {
    /// Numeric node id (`0` is the reserved landing node)
    pub id: u64,

    /// Temporary code (`Some("0815")`) for uncommitted nodes
    pub code: Option<String>,

    /// Repository alias for cross-repository references
    pub alias: Option<String>,
}

impl NodeIdentifier {
    /// Identifier of a committed local node
    pub fn new(id: u64) -> Self {
        Self {
            id,
            code: None,
            alias: None,
        }
    }

    /// The reserved zero node
    pub fn zero() -> Self {
        Self::new(0)
    }

    /// Attach a temporary code, validating its shape
    pub fn with_code(mut self, code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        validate_code(&code)?;
        self.code = Some(code);
        Ok(self)
    }

    /// Attach a repository alias, validating its shape
    pub fn with_alias(mut self, alias: impl Into<String>) -> Result<Self, ValidationError> {
        let alias = alias.into();
        validate_alias(&alias)?;
        self.alias = Some(alias);
        Ok(self)
    }

    /// True for the reserved local node `0`
    pub fn is_zero(&self) -> bool {
        self.id == 0 && self.code.is_none() && self.alias.is_none()
    }

    /// True when the node carries a temporary code
    pub fn is_temporary(&self) -> bool {
        self.code.is_some()
    }

    /// True when the node lives in this repository
    pub fn is_local(&self) -> bool {
        self.alias.is_none()
    }

    /// Canonical path form (`alias/id-code`)
    pub fn path(&self) -> String {
        self.to_string()
    }
}

fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidId(format!(
            "temporary code must be {} digits, got '{}'",
            CODE_LEN, code
        )))
    }
}

fn validate_alias(alias: &str) -> Result<(), ValidationError> {
    if alias.is_empty() || alias.contains('/') || alias.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidId(format!(
            "invalid repository alias '{}'",
            alias
        )));
    }
    Ok(())
}

impl FromStr for NodeIdentifier {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (alias, local) = match raw.split_once('/') {
            Some((alias, local)) => (Some(alias), local),
            None => (None, raw),
        };

        let (digits, code) = match local.split_once('-') {
            Some((digits, code)) => (digits, Some(code)),
            None => (local, None),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidId(format!(
                "'{}' is not a node path",
                raw
            )));
        }
        let id = digits
            .parse::<u64>()
            .map_err(|e| ValidationError::InvalidId(format!("'{}': {}", raw, e)))?;

        let mut identifier = NodeIdentifier::new(id);
        if let Some(code) = code {
            identifier = identifier.with_code(code)?;
        }
        if let Some(alias) = alias {
            identifier = identifier.with_alias(alias)?;
        }
        Ok(identifier)
    }
}

impl TryFrom<String> for NodeIdentifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeIdentifier> for String {
    fn from(value: NodeIdentifier) -> Self {
        value.to_string()
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.alias {
            write!(f, "{}/", alias)?;
        }
        write!(f, "{}", self.id)?;
        if let Some(code) = &self.code {
            write!(f, "-{}", code)?;
        }
        Ok(())
    }
}

impl Ord for NodeIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.code.cmp(&other.code))
            .then_with(|| self.alias.cmp(&other.alias))
    }
}

impl PartialOrd for NodeIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> NodeIdentifier {
        raw.parse().unwrap()
    }

    #[test]
    fn test_parse_canonical_forms() {
        assert_eq!(id("42"), NodeIdentifier::new(42));
        assert_eq!(id("42-0815").code.as_deref(), Some("0815"));

        let aliased = id("notes/7-1234");
        assert_eq!(aliased.alias.as_deref(), Some("notes"));
        assert_eq!(aliased.id, 7);
        assert_eq!(aliased.code.as_deref(), Some("1234"));
        assert!(!aliased.is_local());
    }

    #[test]
    fn test_display_round_trips() {
        for raw in ["0", "12", "12-0001", "zk/3", "zk/3-9999"] {
            assert_eq!(id(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_rejects_malformed_paths() {
        for raw in ["", "abc", "-1", "+3", "12-12", "12-abcd", "/3", "a/b/3", "12-12345", "1 2"] {
            assert!(raw.parse::<NodeIdentifier>().is_err(), "accepted '{}'", raw);
        }
    }

    #[test]
    fn test_ordering_is_numeric_not_lexicographic() {
        let mut ids = vec![id("10"), id("9"), id("9-0002"), id("b/9"), id("9-0001"), id("a/9")];
        ids.sort();
        let paths: Vec<String> = ids.iter().map(|i| i.path()).collect();
        assert_eq!(paths, vec!["9", "a/9", "b/9", "9-0001", "9-0002", "10"]);
    }

    #[test]
    fn test_zero_node() {
        assert!(NodeIdentifier::zero().is_zero());
        assert!(!id("0-0001").is_zero());
        assert!(!id("other/0").is_zero());
    }

    #[test]
    fn test_serde_uses_path_string() {
        let json = serde_json::to_string(&id("zk/5-0042")).unwrap();
        assert_eq!(json, "\"zk/5-0042\"");
        let back: NodeIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id("zk/5-0042"));
        assert!(serde_json::from_str::<NodeIdentifier>("\"nope\"").is_err());
    }
}
