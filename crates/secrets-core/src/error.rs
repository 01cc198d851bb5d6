//! Error taxonomy shared by the identifier/pattern algebra and the
//! envelope/request model.
//!
//! Other crates in the workspace (`secrets-host`, `secrets-resolver`, ...)
//! define their own error enums for transport- and lifecycle-level
//! failures and convert into/around these via `From` impls, rather than
//! growing this enum to cover every concern in the system.

use thiserror::Error;

/// Why a string failed to parse as an [`crate::Id`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidId {
    /// The input was empty.
    #[error("identifier is empty")]
    Empty,
    /// A component contained a byte outside `[A-Za-z0-9._-]`.
    #[error("identifier component {index} contains an invalid character: {component:?}")]
    InvalidCharacter {
        /// Zero-based component index.
        index: usize,
        /// The offending component.
        component: String,
    },
    /// Two separators were adjacent, or the identifier started/ended with one.
    #[error("identifier has an empty component at index {index}")]
    EmptyComponent {
        /// Zero-based component index.
        index: usize,
    },
}

/// Why a string failed to parse as a [`crate::Pattern`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidPattern {
    /// The input was empty.
    #[error("pattern is empty")]
    Empty,
    /// A component mixed wildcard and literal characters, or used more
    /// than two asterisks.
    #[error("pattern component {index} is not a valid literal or wildcard: {component:?}")]
    InvalidComponent {
        /// Zero-based component index.
        index: usize,
        /// The offending component.
        component: String,
    },
    /// Two separators were adjacent, or the pattern started/ended with one.
    #[error("pattern has an empty component at index {index}")]
    EmptyComponent {
        /// Zero-based component index.
        index: usize,
    },
}

/// Result alias for [`InvalidId`].
pub type IdResult<T> = Result<T, InvalidId>;
/// Result alias for [`InvalidPattern`].
pub type PatternResult<T> = Result<T, InvalidPattern>;
