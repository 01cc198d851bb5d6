//! Identifier parsing and validation (component C1, identifier half).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IdResult, InvalidId};

/// One valid byte in an identifier component: `[A-Za-z0-9._-]`.
fn is_component_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-'
}

fn validate_component(index: usize, component: &str) -> IdResult<()> {
    if component.is_empty() {
        return Err(InvalidId::EmptyComponent { index });
    }
    if !component.bytes().all(is_component_byte) {
        return Err(InvalidId::InvalidCharacter {
            index,
            component: component.to_string(),
        });
    }
    Ok(())
}

/// A validated, slash-separated secret identifier.
///
/// Equality and the canonical string form are byte-exact: `Id` never
/// normalizes its input beyond the validation in [`Id::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

impl Id {
    /// Parse and validate an identifier.
    ///
    /// Fails on empty input, any invalid byte, or an empty component
    /// (leading `/`, trailing `/`, or `//`).
    pub fn parse(s: impl Into<String>) -> IdResult<Self> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidId::Empty);
        }
        for (index, component) in s.split('/').enumerate() {
            validate_component(index, component)?;
        }
        Ok(Self(s))
    }

    /// Re-validate an already-constructed `Id`. Always succeeds; exists
    /// for parity with [`crate::Pattern::is_valid`] on trusted-input
    /// paths where a caller wants an explicit `Result`.
    pub fn is_valid(&self) -> IdResult<()> {
        Self::parse(self.0.clone()).map(|_| ())
    }

    /// The components of this identifier, in order.
    #[must_use]
    pub fn components(&self) -> Vec<&str> {
        self.0.split('/').collect()
    }

    /// Borrow the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Id {
    type Error = InvalidId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for Id {
    type Error = InvalidId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`Id::parse`], matching spec.md's `parse_id(s)`.
pub fn parse_id(s: impl Into<String>) -> IdResult<Id> {
    Id::parse(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_identifiers() {
        assert!(parse_id("db/password").is_ok());
        assert!(parse_id("a").is_ok());
        assert!(parse_id("a.b-c_d/e.f").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(parse_id(""), Err(InvalidId::Empty));
    }

    #[test]
    fn rejects_leading_trailing_adjacent_slashes() {
        assert!(matches!(
            parse_id("/foo"),
            Err(InvalidId::EmptyComponent { index: 0 })
        ));
        assert!(matches!(
            parse_id("foo/"),
            Err(InvalidId::EmptyComponent { .. })
        ));
        assert!(matches!(
            parse_id("a//b"),
            Err(InvalidId::EmptyComponent { index: 1 })
        ));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(matches!(
            parse_id("foo/bar baz"),
            Err(InvalidId::InvalidCharacter { .. })
        ));
        assert!(matches!(
            parse_id("foo/*"),
            Err(InvalidId::InvalidCharacter { .. })
        ));
    }

    /// Identifier parse idempotence (spec.md §8): for every accepted
    /// string `s`, `parse_id(s).to_string() == s`.
    #[test]
    fn parse_idempotence() {
        for s in ["a", "a/b/c", "db/password", "x.y-z_9/Q"] {
            let id = parse_id(s).unwrap();
            assert_eq!(id.to_string(), s);
            let reparsed = parse_id(id.to_string()).unwrap();
            assert_eq!(id, reparsed);
        }
    }

    #[test]
    fn serde_round_trip() {
        let id = parse_id("db/password").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"db/password\"");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn serde_rejects_invalid() {
        let err: Result<Id, _> = serde_json::from_str("\"/bad\"");
        assert!(err.is_err());
    }
}
