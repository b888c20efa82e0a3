//! # Warden Core - Types, Errors and Effect Interfaces
//!
//! Foundation crate for the Warden guardian recovery workflow.
//!
//! ## Purpose
//!
//! - Domain types: identity assertions, signer identities, smart account
//!   references, meta-transactions, ERC-4337 user operations and receipts
//! - Calldata for the social recovery module ([`abi`])
//! - The EIP-712 `SafeOp` view verified by the Safe 4337 module ([`eip712`])
//! - Configuration with TOML and `WARDEN_*` environment overrides
//! - Effect traits for every external collaborator ([`effects`])
//!
//! ## What Does NOT Belong Here
//!
//! - Workflow sequencing (belongs in `warden-recovery`)
//! - Effect handler implementations (the simulator lives in `warden-simulator`)
//! - Console rendering (belongs in `warden-cli`)

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// ABI calldata for module and account calls
pub mod abi;

/// Smart account, batch and user operation types
pub mod account;

/// Configuration loading and validation-at-use
pub mod config;

/// Effect traits for external collaborators
pub mod effects;

/// EIP-712 typed data for Safe operations
pub mod eip712;

/// Unified error type
pub mod errors;

/// Identity and signer types
pub mod identity;

pub use errors::{WardenError, WardenResult};

pub use abi::{ModuleCall, SocialRecoveryCalls};
pub use account::{
    ChainEndpoints, InclusionReceipt, MetaTransaction, PaymasterEndpoints, SmartAccountRef,
    UserOperation,
};
pub use config::{OwnerKey, WardenConfig};
pub use eip712::{Eip712Domain, SafeOperation, ValidityWindow};
pub use identity::{
    IdentityAssertion, ReturnContext, SessionAbility, SessionRequest, SessionSignature,
    SignerIdentity,
};

// Re-export the primitive types used across the public API
pub use alloy_primitives::{Address, Bytes, B256, U256};
