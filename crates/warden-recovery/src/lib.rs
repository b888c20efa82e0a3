//! # Warden Recovery - Guardian Social Recovery Workflow
//!
//! Sequences sign-in, guardian registration and the two recovery steps for a
//! Safe smart account guarded by a key-network signer.
//!
//! ## Purpose
//!
//! - Two-phase sign-in producing a [`GuardianSigner`] and the guardian's
//!   own smart account
//! - Owner-signed guardian registration (enable module + add guardian)
//! - Guardian-signed recovery proposal and finalization using `SafeOp`
//!   typed data
//! - A shared build → sponsor → sign → submit pipeline whose stages are
//!   encoded as types
//!
//! ## Architecture
//!
//! The workflow is generic over [`WorkflowEffects`], the composition of every
//! collaborator interface in `warden-core`. Session state is an explicit
//! enum; each action holds an in-flight guard so a duplicate trigger is
//! rejected instead of racing.
//!
//! ## What Does NOT Belong Here
//!
//! - Collaborator implementations (see `warden-simulator`)
//! - Console input and rendering (see `warden-cli`)

#![allow(missing_docs)]
#![forbid(unsafe_code)]

pub mod effects;
pub mod guard;
pub mod operation;
pub mod pipeline;
pub mod session;
pub mod signer;
pub mod types;
pub mod workflow;

pub use effects::{SignerEffects, WorkflowEffects};
pub use guard::{ActionGuard, InFlightActions};
pub use operation::{SignedOperation, SponsoredOperation, UnsignedOperation};
pub use pipeline::{OperationPipeline, SubmissionOutcome};
pub use session::{AuthenticatedSession, SessionState};
pub use signer::GuardianSigner;
pub use types::{
    AddGuardianReport, GuardianVerification, RecoveryReport, SessionSummary, SignInStep,
    WorkflowAction,
};
pub use workflow::GuardianRecoveryWorkflow;
