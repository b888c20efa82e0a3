//! Key network effect interface
//!
//! The key network holds threshold-shared secp256k1 keys bound to identity
//! assertions. Every signature needs a session signature, which the network
//! only issues after re-checking the assertion.

use crate::identity::{IdentityAssertion, SessionRequest, SessionSignature, SignerIdentity};
use crate::WardenResult;
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;

/// Result of a mint request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    /// Token id of the minted key, if the relay reported one
    pub token_id: Option<String>,
}

#[async_trait]
pub trait KeyNetworkEffects: Send + Sync {
    /// Signer identities already bound to the assertion, in network order.
    async fn fetch_signer_identities(
        &self,
        assertion: &IdentityAssertion,
    ) -> WardenResult<Vec<SignerIdentity>>;

    /// Mint a new key bound to the assertion through the relay.
    async fn mint_signer_identity(
        &self,
        assertion: &IdentityAssertion,
        relay_api_key: &str,
    ) -> WardenResult<MintReceipt>;

    /// Issue a session signature scoped to `public_key`.
    async fn issue_session_signature(
        &self,
        assertion: &IdentityAssertion,
        public_key: &Bytes,
        request: &SessionRequest,
    ) -> WardenResult<SessionSignature>;

    /// Sign a 32-byte digest under a session signature.
    ///
    /// Returns a 65-byte `r || s || v` signature.
    async fn sign_digest(
        &self,
        session: &SessionSignature,
        public_key: &Bytes,
        digest: B256,
    ) -> WardenResult<Bytes>;
}
