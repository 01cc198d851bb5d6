//! Convenience re-exports for downstream crates.

pub use crate::error::ResolveError;
pub use crate::resolver::{Resolver, ResolverEngine};
pub use crate::restricted::RestrictedResolver;
