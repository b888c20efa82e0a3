//! Effect trait definitions for external collaborators.
//!
//! Each trait stands in for one SDK the workflow delegates to. This module
//! defines **what** can be asked of a collaborator; handlers (the simulator,
//! or bindings to real services) define **how**.
//!
//! # Effect Classification
//!
//! - **Identity** (`IdentityEffects`): OAuth-style sign-in and assertions
//! - **Key network** (`KeyNetworkEffects`): signer keys, session signatures,
//!   digest signing
//! - **Smart account** (`SmartAccountEffects`): address derivation, user
//!   operation construction, owner-key signing, submission, receipts
//! - **Recovery module** (`RecoveryModuleEffects`): module meta-transactions
//!   and guardian queries
//! - **Paymaster** (`PaymasterEffects`): gas sponsorship
//! - **Clock** (`ClockEffects`): wall-clock time and sleeping
//!
//! All workflow code is parameterized by these traits, so tests and the
//! console shell run against a deterministic simulator.

pub mod account;
pub mod identity;
pub mod key_network;
pub mod paymaster;
pub mod recovery;
pub mod time;

pub use account::SmartAccountEffects;
pub use identity::IdentityEffects;
pub use key_network::KeyNetworkEffects;
pub use paymaster::PaymasterEffects;
pub use recovery::RecoveryModuleEffects;
pub use time::ClockEffects;
