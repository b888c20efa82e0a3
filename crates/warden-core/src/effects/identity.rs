//! Identity provider effect interface

use crate::identity::{IdentityAssertion, ReturnContext};
use crate::WardenResult;
use async_trait::async_trait;

/// OAuth-style identity provider.
///
/// Sign-in is a redirect round trip: the workflow asks for a consent URL,
/// the user leaves, and control comes back with a [`ReturnContext`].
#[async_trait]
pub trait IdentityEffects: Send + Sync {
    /// Consent URL that will send the user back to `redirect_uri`.
    async fn sign_in_url(&self, redirect_uri: &str) -> WardenResult<String>;

    /// Exchange the redirect parameters for an assertion.
    ///
    /// Returns `Ok(None)` when the provider has nothing to offer for this
    /// context (expired or unknown code).
    async fn authenticate(&self, context: &ReturnContext)
        -> WardenResult<Option<IdentityAssertion>>;
}
