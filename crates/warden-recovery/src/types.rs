//! Public request/response types for the recovery workflow.

use crate::pipeline::SubmissionOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use warden_core::{Address, MetaTransaction, SignerIdentity, SmartAccountRef};

/// The externally triggered workflow actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowAction {
    /// Sign in and build the guardian signer
    SignIn,
    /// Register the guardian on the protected account
    AddGuardian,
    /// Guardian proposes recovery to the new owner
    BeginRecovery,
    /// Finalize recovery after the grace period
    FinalizeRecovery,
}

impl WorkflowAction {
    /// Stable name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "initialize_guardian_signer",
            Self::AddGuardian => "add_guardian",
            Self::BeginRecovery => "begin_recovery",
            Self::FinalizeRecovery => "finalize_recovery",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInStep {
    /// The user must visit `url`; the workflow resumes with the callback
    RedirectRequired {
        /// Identity provider consent URL
        url: String,
    },
    /// A guardian signer exists for this session
    Authenticated(SignerIdentity),
}

/// Snapshot of the session for status displays and action gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSummary {
    /// No guardian signer yet
    Unauthenticated,
    /// Guardian signer and account are ready
    Authenticated {
        /// Address of the key-network signer
        guardian_signer: Address,
        /// Guardian's own smart account
        guardian_account: Address,
        /// Token id of the signer key
        token_id: String,
    },
}

impl SessionSummary {
    /// Whether actions beyond sign-in are available.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Result of the post-inclusion guardian membership check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardianVerification {
    /// The module reports the guardian as registered
    Confirmed,
    /// Inclusion succeeded but the module does not list the guardian
    Mismatch,
    /// The membership query itself failed
    Unavailable {
        /// Query error
        reason: String,
    },
}

/// Report for a successful add-guardian action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddGuardianReport {
    /// Account being protected
    pub protected_account: SmartAccountRef,
    /// Guardian's own account registered as guardian
    pub guardian_account: SmartAccountRef,
    /// Batch that was submitted, in execution order
    pub transactions: Vec<MetaTransaction>,
    /// Submission and inclusion details
    pub submission: SubmissionOutcome,
    /// Membership check outcome
    pub verification: GuardianVerification,
}

/// Report for a successful begin- or finalize-recovery action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Account under recovery
    pub protected_account: SmartAccountRef,
    /// Guardian account that submitted the operation
    pub guardian_account: SmartAccountRef,
    /// Submitted batch
    pub transactions: Vec<MetaTransaction>,
    /// Submission and inclusion details
    pub submission: SubmissionOutcome,
    /// Earliest finalize time (unix ms), set by `begin_recovery`
    pub earliest_finalize_ms: Option<u64>,
}
