//! # Warden Simulator - Deterministic Collaborator Handlers
//!
//! One [`SimulatedNetwork`] implements every effect trait from
//! `warden-core`: identity provider, key network, smart account client,
//! bundler, paymaster, recovery module and clock. It is what the console
//! shell runs against and what the workflow tests drive.
//!
//! ## Behavior
//!
//! - Keys and signatures are keccak stand-ins for secp256k1 that only the
//!   simulator can verify ([`keys`])
//! - The bundler enforces nonce, sponsorship and `SafeOp` signature checks,
//!   so a signature made before sponsorship is rejected
//! - Batches execute atomically against an in-memory Safe and social
//!   recovery module with a grace period ([`chain`])
//! - Time only moves through [`SimulatedNetwork::advance`] and effect sleeps
//!
//! ## Testing Hooks
//!
//! - [`Faults`] injects provider, mint, paymaster and inclusion failures
//! - [`CallRecord`] logs every effect call in order

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod account;
pub mod chain;
pub mod clock;
pub mod faults;
pub mod fixtures;
pub mod identity;
pub mod key_network;
pub mod keys;
pub mod module;
pub mod network;
pub mod paymaster;
pub mod record;

pub use faults::{Faults, MintFault};
pub use fixtures::{fill_sandbox_defaults, sandbox_config};
pub use network::{Contracts, SimulatedNetwork, MAX_RECORDED_CALLS, SIM_CHAIN_ID};
pub use record::CallRecord;
