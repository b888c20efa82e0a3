//! Log of every effect call the simulator receives.

use alloy_primitives::{Address, B256};
use warden_core::{MetaTransaction, UserOperation};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallRecord {
    SignInUrl,
    Authenticate,
    FetchSignerIdentities,
    MintSignerIdentity,
    IssueSessionSignature { expires_at_ms: u64, chain_id: u64 },
    SignDigest { digest: B256 },
    DeriveAccount { address: Address },
    CreateUserOperation {
        sender: Address,
        transactions: Vec<MetaTransaction>,
    },
    SponsorUserOperation { sender: Address },
    SignWithOwnerKeys { sender: Address, chain_id: u64 },
    SendUserOperation { operation: UserOperation },
    UserOperationReceipt { user_op_hash: B256 },
    IsGuardian { account: Address, guardian: Address },
    Guardians { account: Address },
}

impl CallRecord {
    /// Short name for ordering assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignInUrl => "sign_in_url",
            Self::Authenticate => "authenticate",
            Self::FetchSignerIdentities => "fetch_signer_identities",
            Self::MintSignerIdentity => "mint_signer_identity",
            Self::IssueSessionSignature { .. } => "issue_session_signature",
            Self::SignDigest { .. } => "sign_digest",
            Self::DeriveAccount { .. } => "derive_account",
            Self::CreateUserOperation { .. } => "create_user_operation",
            Self::SponsorUserOperation { .. } => "sponsor_user_operation",
            Self::SignWithOwnerKeys { .. } => "sign_with_owner_keys",
            Self::SendUserOperation { .. } => "send_user_operation",
            Self::UserOperationReceipt { .. } => "user_operation_receipt",
            Self::IsGuardian { .. } => "is_guardian",
            Self::Guardians { .. } => "guardians",
        }
    }

    /// Whether the call reached the identity provider or key network.
    pub fn is_identity_or_key_network(&self) -> bool {
        matches!(
            self,
            Self::SignInUrl
                | Self::Authenticate
                | Self::FetchSignerIdentities
                | Self::MintSignerIdentity
        )
    }
}
