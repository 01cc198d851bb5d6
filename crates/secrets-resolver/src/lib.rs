//! `secrets-resolver` — routes requests across a [`secrets_host::Registry`]
//! (C9) and the restricted allow-list front stage (C10).

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod prelude;
pub mod resolver;
pub mod restricted;

pub use error::ResolveError;
pub use resolver::{Resolver, ResolverEngine};
pub use restricted::RestrictedResolver;
