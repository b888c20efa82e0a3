//! Identity and signer types.
//!
//! An [`IdentityAssertion`] proves the user completed an OAuth-style sign-in.
//! It is exchanged for a [`SignerIdentity`] held by the key network, and each
//! signing request is gated by a short-lived [`SessionSignature`].

use crate::{WardenError, WardenResult};
use alloy_primitives::{keccak256, Address, Bytes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Query parameter set by the identity provider when it redirects back.
pub const PROVIDER_PARAM: &str = "provider";

/// Length of an uncompressed secp256k1 public key.
pub const UNCOMPRESSED_KEY_LEN: usize = 65;

/// Opaque proof that the end user authenticated with an identity provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssertion {
    /// Provider that issued the assertion (e.g. `google`)
    pub provider: String,
    /// Stable subject identifier at the provider
    pub subject: String,
    /// Access token presented to the key network
    pub access_token: String,
}

impl fmt::Debug for IdentityAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityAssertion")
            .field("provider", &self.provider)
            .field("subject", &self.subject)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Parameters observed when control returns from the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnContext {
    params: BTreeMap<String, String>,
}

impl ReturnContext {
    /// Context for a visit that did not come back from a redirect.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from explicit query parameters.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse the query string of a callback URL.
    ///
    /// A URL without a query yields an empty context.
    pub fn from_url(url: &str) -> WardenResult<Self> {
        let query = match url.split_once('?') {
            Some((_, rest)) => rest.split('#').next().unwrap_or_default(),
            None => return Ok(Self::empty()),
        };
        let params: BTreeMap<String, String> = serde_urlencoded::from_str(query)
            .map_err(|e| WardenError::invalid(format!("malformed callback query: {e}")))?;
        Ok(Self { params })
    }

    /// Provider marker, present only after returning from the provider.
    pub fn provider(&self) -> Option<&str> {
        self.get(PROVIDER_PARAM)
    }

    /// Look up a query parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Whether this context carries the provider marker.
    pub fn has_returned_from_provider(&self) -> bool {
        self.provider().is_some_and(|p| !p.is_empty())
    }
}

/// A key-network key bound to an identity assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
    /// Uncompressed secp256k1 public key (`0x04 || x || y`)
    pub public_key: Bytes,
    /// Opaque token identifier assigned at mint time
    pub token_id: String,
}

impl SignerIdentity {
    /// Create a signer identity.
    pub fn new(public_key: impl Into<Bytes>, token_id: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            token_id: token_id.into(),
        }
    }

    /// Whether the public key is a well-formed uncompressed key.
    pub fn is_usable(&self) -> bool {
        self.public_key.len() == UNCOMPRESSED_KEY_LEN && self.public_key[0] == 0x04
    }

    /// Ethereum address controlled by this key.
    pub fn address(&self) -> WardenResult<Address> {
        if !self.is_usable() {
            return Err(WardenError::mint_failed(format!(
                "public key for token {} is not an uncompressed secp256k1 key",
                self.token_id
            )));
        }
        let hash = keccak256(&self.public_key[1..]);
        Ok(Address::from_slice(&hash[12..]))
    }
}

/// Scope requested when asking the key network for a session signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Human-readable statement shown in the delegation
    pub statement: String,
    /// Resource the session may act on (`*` for any key)
    pub resource: String,
    /// Ability granted over the resource
    pub ability: SessionAbility,
    /// Expiration as unix milliseconds
    pub expires_at_ms: u64,
    /// Chain id the delegation is bound to
    pub chain_id: u64,
}

/// Abilities a session signature can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionAbility {
    /// Sign arbitrary digests with the key
    KeySigning,
}

/// Time-bounded authorization to sign with a key-network key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSignature {
    /// Opaque delegation payload returned by the network
    pub delegation: Bytes,
    /// Public key the session is scoped to
    pub public_key: Bytes,
    /// Expiration as unix milliseconds
    pub expires_at_ms: u64,
}

impl SessionSignature {
    /// Whether the session is still valid at `now_ms`.
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_context_detects_provider_marker() {
        let ctx = ReturnContext::from_url(
            "http://localhost:5173/?provider=google&access_token=abc#frag",
        )
        .unwrap();
        assert_eq!(ctx.provider(), Some("google"));
        assert_eq!(ctx.get("access_token"), Some("abc"));
        assert!(ctx.has_returned_from_provider());

        let fresh = ReturnContext::from_url("http://localhost:5173/").unwrap();
        assert!(!fresh.has_returned_from_provider());
    }

    #[test]
    fn empty_provider_value_is_not_a_return() {
        let ctx = ReturnContext::from_params([("provider", "")]);
        assert!(!ctx.has_returned_from_provider());
    }

    #[test]
    fn signer_address_matches_keccak_of_key_body() {
        let mut key = vec![0x04];
        key.extend_from_slice(&[7u8; 64]);
        let identity = SignerIdentity::new(key.clone(), "1");
        let expected = Address::from_slice(&keccak256(&key[1..])[12..]);
        assert_eq!(identity.address().unwrap(), expected);
    }

    #[test]
    fn malformed_key_is_unusable() {
        let identity = SignerIdentity::new(vec![0x02; 33], "2");
        assert!(!identity.is_usable());
        assert!(matches!(
            identity.address(),
            Err(WardenError::MintFailed { .. })
        ));
    }

    #[test]
    fn assertion_debug_hides_token() {
        let assertion = IdentityAssertion {
            provider: "google".into(),
            subject: "user-1".into(),
            access_token: "secret-token".into(),
        };
        assert!(!format!("{assertion:?}").contains("secret-token"));
    }
}
