//! `secrets-core` — Identifier/pattern algebra and the envelope/request
//! value types shared by every other crate in the secrets resolution
//! engine.
//!
//! This crate does no I/O and pulls in no async runtime: everything here
//! is pure parsing, validation, and matching, plus a handful of plain
//! value types. All routing, authorization, and storage backends built
//! on top of this engine are keyed on the [`Id`]/[`Pattern`] algebra
//! defined here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
pub mod error;
pub mod id;
pub mod pattern;
pub mod prelude;
pub mod request;

pub use envelope::Envelope;
pub use error::{IdResult, InvalidId, InvalidPattern, PatternResult};
pub use id::{Id, parse_id};
pub use pattern::{Pattern, matches, parse_pattern};
pub use request::Request;
