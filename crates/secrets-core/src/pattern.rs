//! Pattern parsing, validation, and matching (component C1, pattern half).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{InvalidPattern, PatternResult};
use crate::id::Id;

/// One component of a parsed [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PComponent {
    Literal(String),
    Star,
    DoubleStar,
}

fn is_component_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-'
}

fn parse_component(index: usize, raw: &str) -> PatternResult<PComponent> {
    if raw.is_empty() {
        return Err(InvalidPattern::EmptyComponent { index });
    }
    if raw.bytes().all(|b| b == b'*') {
        return match raw.len() {
            1 => Ok(PComponent::Star),
            2 => Ok(PComponent::DoubleStar),
            _ => Err(InvalidPattern::InvalidComponent {
                index,
                component: raw.to_string(),
            }),
        };
    }
    if raw.contains('*') || !raw.bytes().all(is_component_byte) {
        return Err(InvalidPattern::InvalidComponent {
            index,
            component: raw.to_string(),
        });
    }
    Ok(PComponent::Literal(raw.to_string()))
}

/// A validated glob pattern over slash-separated identifier components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern {
    raw: String,
    components: Vec<PComponent>,
}

impl Pattern {
    /// Parse and validate a pattern string.
    pub fn parse(s: impl Into<String>) -> PatternResult<Self> {
        let raw = s.into();
        if raw.is_empty() {
            return Err(InvalidPattern::Empty);
        }
        let mut components = Vec::new();
        for (index, part) in raw.split('/').enumerate() {
            components.push(parse_component(index, part)?);
        }
        Ok(Self { raw, components })
    }

    /// Re-validate an already-constructed `Pattern`.
    pub fn is_valid(&self) -> PatternResult<()> {
        Self::parse(self.raw.clone()).map(|_| ())
    }

    /// Borrow the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this pattern matches the given identifier.
    #[must_use]
    pub fn matches(&self, id: &Id) -> bool {
        let id_components: Vec<&str> = id.components();
        match_components(&self.components, &id_components)
    }
}

fn match_components(pattern: &[PComponent], id: &[&str]) -> bool {
    match pattern.split_first() {
        None => id.is_empty(),
        Some((PComponent::DoubleStar, rest)) => {
            // Greedy: try every split point of the remaining id, including
            // consuming zero components.
            (0..=id.len()).any(|take| match_components(rest, &id[take..]))
        },
        Some((PComponent::Star, rest)) => match id.split_first() {
            None => false,
            Some((_, id_rest)) => match_components(rest, id_rest),
        },
        Some((PComponent::Literal(lit), rest)) => match id.split_first() {
            Some((head, id_rest)) if head == lit => match_components(rest, id_rest),
            _ => false,
        },
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Pattern {
    type Error = InvalidPattern;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for Pattern {
    type Error = InvalidPattern;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Pattern> for String {
    fn from(p: Pattern) -> Self {
        p.raw
    }
}

/// Shorthand for [`Pattern::parse`], matching spec.md's `parse_pattern(s)`.
pub fn parse_pattern(s: impl Into<String>) -> PatternResult<Pattern> {
    Pattern::parse(s)
}

/// Shorthand for `pattern.matches(id)`, matching spec.md's `match(pattern, id)`.
#[must_use]
pub fn matches(pattern: &Pattern, id: &Id) -> bool {
    pattern.matches(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::parse_id;

    fn m(pattern: &str, id: &str) -> bool {
        parse_pattern(pattern).unwrap().matches(&parse_id(id).unwrap())
    }

    #[test]
    fn double_star_matches_everything() {
        for id in ["a", "a/b", "a/b/c/d", "x.y-z_9/Q"] {
            assert!(m("**", id), "** should match {id}");
        }
    }

    #[test]
    fn double_star_at_end() {
        assert!(m("foo/**", "foo"));
        assert!(m("foo/**", "foo/bar"));
        assert!(m("foo/**", "foo/bar/baz"));
        assert!(!m("foo/**", "food"));
    }

    #[test]
    fn double_star_in_middle() {
        assert!(m("a/**/b", "a/b"));
        assert!(m("a/**/b", "a/c/b"));
        assert!(m("a/**/b", "a/c/d/e/b"));
        assert!(!m("a/**/b", "a/c"));
    }

    #[test]
    fn single_star_matches_exactly_one_component() {
        assert!(m("foo/*", "foo/x"));
        assert!(!m("foo/*", "foo"));
        assert!(!m("foo/*", "foo/x/y"));
        assert!(!m("a/*/b", "a/x/y/b"));
        assert!(m("a/*/b", "a/x/b"));
    }

    #[test]
    fn literal_components_byte_match() {
        assert!(m("foo/bar", "foo/bar"));
        assert!(!m("foo/bar", "foo/baz"));
    }

    #[test]
    fn invalid_patterns() {
        assert!(matches!(parse_pattern("a*a"), Err(InvalidPattern::InvalidComponent { .. })));
        assert!(matches!(
            parse_pattern("/foo"),
            Err(InvalidPattern::EmptyComponent { index: 0 })
        ));
        assert_eq!(parse_pattern(""), Err(InvalidPattern::Empty));
        assert!(matches!(
            parse_pattern("foo/"),
            Err(InvalidPattern::EmptyComponent { .. })
        ));
        assert!(matches!(
            parse_pattern("a//b"),
            Err(InvalidPattern::EmptyComponent { index: 1 })
        ));
        assert!(matches!(
            parse_pattern("a/***"),
            Err(InvalidPattern::InvalidComponent { .. })
        ));
    }

    /// Pattern identity (spec.md §8): for every accepted id `x`,
    /// treating it as a pattern, `match(x, x) == true`.
    #[test]
    fn pattern_identity() {
        for s in ["a", "a/b/c", "db/password"] {
            assert!(m(s, s));
        }
    }

    /// Matching is stable under re-parsing.
    #[test]
    fn stable_under_reparse() {
        let p = parse_pattern("a/**/b").unwrap();
        let reparsed = parse_pattern(p.to_string()).unwrap();
        let id = parse_id("a/x/b").unwrap();
        assert_eq!(p.matches(&id), reparsed.matches(&id));
    }
}
