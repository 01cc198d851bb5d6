//! Convenience re-exports for downstream crates.

pub use crate::envelope::Envelope;
pub use crate::error::{IdResult, InvalidId, InvalidPattern, PatternResult};
pub use crate::id::{Id, parse_id};
pub use crate::pattern::{Pattern, matches, parse_pattern};
pub use crate::request::Request;
