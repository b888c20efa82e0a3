//! Guardian signer backed by a key-network key.
//!
//! Every signature request obtains a fresh session signature first. The
//! network re-checks the identity assertion each time, so a signer built once
//! keeps working for the life of the process without caching delegations.

use crate::effects::SignerEffects;
use std::sync::Arc;
use warden_core::eip712::{Eip712Domain, SafeOperation};
use warden_core::{
    Address, Bytes, IdentityAssertion, SessionAbility, SessionRequest, SessionSignature,
    SignerIdentity, WardenError, WardenResult, B256,
};

/// Chain the session delegation is bound to. Independent of the chain the
/// signatures are used on.
pub const SESSION_CHAIN_ID: u64 = 1;

/// Resource pattern granting signing over any key the assertion controls.
pub const SESSION_RESOURCE: &str = "*";

const SESSION_STATEMENT: &str = "Authorize guardian signing for social recovery";

/// Length of a recoverable ECDSA signature (`r || s || v`).
pub const SIGNATURE_LEN: usize = 65;

/// Signs digests and `SafeOp` typed data with the guardian's key-network key.
pub struct GuardianSigner<E: SignerEffects> {
    effects: Arc<E>,
    assertion: IdentityAssertion,
    identity: SignerIdentity,
    address: Address,
    session_lifetime_ms: u64,
}

impl<E: SignerEffects> Clone for GuardianSigner<E> {
    fn clone(&self) -> Self {
        Self {
            effects: Arc::clone(&self.effects),
            assertion: self.assertion.clone(),
            identity: self.identity.clone(),
            address: self.address,
            session_lifetime_ms: self.session_lifetime_ms,
        }
    }
}

impl<E: SignerEffects> std::fmt::Debug for GuardianSigner<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardianSigner")
            .field("address", &self.address)
            .field("token_id", &self.identity.token_id)
            .finish_non_exhaustive()
    }
}

impl<E: SignerEffects> GuardianSigner<E> {
    /// Build a signer for `identity`. Fails with `MintFailed` if the key is
    /// not an uncompressed secp256k1 key.
    pub fn new(
        effects: Arc<E>,
        assertion: IdentityAssertion,
        identity: SignerIdentity,
        session_lifetime_secs: u64,
    ) -> WardenResult<Self> {
        let address = identity.address()?;
        Ok(Self {
            effects,
            assertion,
            identity,
            address,
            session_lifetime_ms: session_lifetime_secs.saturating_mul(1000),
        })
    }

    /// Address the signer's signatures recover to.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn identity(&self) -> &SignerIdentity {
        &self.identity
    }

    /// Request a session signature valid for the configured lifetime.
    pub async fn authorize(&self) -> WardenResult<SessionSignature> {
        let now = self.effects.now_ms().await;
        let request = SessionRequest {
            statement: SESSION_STATEMENT.to_string(),
            resource: SESSION_RESOURCE.to_string(),
            ability: SessionAbility::KeySigning,
            expires_at_ms: now.saturating_add(self.session_lifetime_ms),
            chain_id: SESSION_CHAIN_ID,
        };
        let session = self
            .effects
            .issue_session_signature(&self.assertion, &self.identity.public_key, &request)
            .await?;
        if !session.is_valid_at(now) {
            return Err(WardenError::external(
                "key network returned an already expired session signature",
            ));
        }
        tracing::debug!(
            signer = %self.address,
            expires_at_ms = session.expires_at_ms,
            "session signature issued"
        );
        Ok(session)
    }

    /// Sign a raw 32-byte digest.
    pub async fn sign_digest(&self, digest: B256) -> WardenResult<Bytes> {
        let session = self.authorize().await?;
        let signature = self
            .effects
            .sign_digest(&session, &self.identity.public_key, digest)
            .await?;
        if signature.len() != SIGNATURE_LEN {
            return Err(WardenError::external(format!(
                "key network returned a {}-byte signature, expected {SIGNATURE_LEN}",
                signature.len()
            )));
        }
        Ok(signature)
    }

    /// Sign the `SafeOp` typed-data hash under `domain`.
    pub async fn sign_safe_operation(
        &self,
        operation: &SafeOperation,
        domain: &Eip712Domain,
    ) -> WardenResult<Bytes> {
        self.sign_digest(operation.signing_hash(domain)).await
    }
}

