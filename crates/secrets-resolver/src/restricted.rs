//! Restricted resolver (component C10): a front-stage allow-list filter
//! for identifiers that may be asked for during a session.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use secrets_core::{Envelope, Id, Request};
use tokio_util::sync::CancellationToken;

use crate::error::ResolveError;
use crate::resolver::Resolver;

/// Wraps any [`Resolver`] with a mutable allow-list of identifiers,
/// intended for projecting a subset of secrets into a sandboxed
/// consumer.
pub struct RestrictedResolver<R> {
    inner: R,
    allowed: Mutex<HashSet<Id>>,
}

impl<R: Resolver> RestrictedResolver<R> {
    /// Wrap `inner` with an initially-empty allow-list.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            allowed: Mutex::new(HashSet::new()),
        }
    }

    /// Merge `ids` into the allow-list. Safe to call from any task
    /// concurrently with in-flight `get_secret` calls.
    pub fn allow(&self, ids: impl IntoIterator<Item = Id>) {
        self.allowed.lock().unwrap().extend(ids);
    }

    /// Whether `id` is currently allowed.
    #[must_use]
    pub fn is_allowed(&self, id: &Id) -> bool {
        self.allowed.lock().unwrap().contains(id)
    }
}

#[async_trait]
impl<R: Resolver> Resolver for RestrictedResolver<R> {
    async fn get_secret(&self, request: &Request, cancel: &CancellationToken) -> (Envelope, Option<ResolveError>) {
        if !self.is_allowed(&request.id) {
            let err = ResolveError::AccessDenied(request.id.to_string());
            return (Envelope::error_for(request, &err), Some(err));
        }
        self.inner.get_secret(request, cancel).await
    }
}
