//! Resolver engine (component C9): route a request across the
//! registry, aggregate errors, stamp envelopes.

use std::sync::Arc;

use async_trait::async_trait;
use secrets_core::{Envelope, Request};
use secrets_host::{HostError, JoinedError, Registry};
use tokio_util::sync::CancellationToken;

use crate::error::ResolveError;

/// Common interface both the plain engine and the restricted wrapper
/// implement, so the wrapper can compose over any resolver.
///
/// Every implementation always returns a populated envelope; the
/// accompanying `Option` is `Some` iff resolution failed (spec.md
/// §4.12). Callers choose whether to propagate the error or just use
/// the envelope.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `request`, respecting `cancel` for the underlying RPCs.
    async fn get_secret(&self, request: &Request, cancel: &CancellationToken) -> (Envelope, Option<ResolveError>);
}

/// The unrestricted resolver: routes across every registered plugin.
pub struct ResolverEngine {
    registry: Arc<Registry>,
}

impl ResolverEngine {
    /// Build a resolver over `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Resolver for ResolverEngine {
    async fn get_secret(&self, request: &Request, cancel: &CancellationToken) -> (Envelope, Option<ResolveError>) {
        let mut errs: Vec<HostError> = Vec::new();

        // Registry iteration is name-ascending, so among overlapping
        // patterns the lexicographically smallest plugin name wins
        // (spec.md §4.9's tie-break rule).
        for runtime in self.registry.get_all() {
            if let Some(pin) = &request.provider {
                if pin != &runtime.data().name {
                    continue;
                }
            }
            if !runtime.data().pattern.matches(&request.id) {
                continue;
            }

            let (envelope, err) = runtime.get_secret(request, cancel).await;
            match err {
                None => return (envelope, None),
                Some(err) => {
                    tracing::debug!(plugin = %runtime.data().name, id = %request.id, error = %err, "plugin declined request");
                    errs.push(err);
                },
            }
        }

        let resolve_err = if errs.is_empty() {
            ResolveError::NotFound(format!("secret {} not available", request.id))
        } else {
            ResolveError::Host(HostError::Joined(JoinedError::new(errs).expect("checked non-empty above")))
        };
        (Envelope::error_for(request, &resolve_err), Some(resolve_err))
    }
}

/// Any shared resolver is itself a resolver, so embedders can hand out
/// `Arc<ResolverEngine>` (or `Arc<RestrictedResolver<_>>`) without a
/// wrapper newtype.
#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    async fn get_secret(&self, request: &Request, cancel: &CancellationToken) -> (Envelope, Option<ResolveError>) {
        (**self).get_secret(request, cancel).await
    }
}
