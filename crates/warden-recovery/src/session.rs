//! Session state: before and after the guardian signer exists.

use crate::effects::WorkflowEffects;
use crate::signer::GuardianSigner;
use crate::types::SessionSummary;
use warden_core::{SignerIdentity, SmartAccountRef, WardenError, WardenResult};

/// Everything actions need once sign-in has completed.
pub struct AuthenticatedSession<E: WorkflowEffects> {
    pub signer: GuardianSigner<E>,
    /// Smart account owned by the guardian signer
    pub guardian_account: SmartAccountRef,
}

impl<E: WorkflowEffects> Clone for AuthenticatedSession<E> {
    fn clone(&self) -> Self {
        Self {
            signer: self.signer.clone(),
            guardian_account: self.guardian_account.clone(),
        }
    }
}

impl<E: WorkflowEffects> std::fmt::Debug for AuthenticatedSession<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("signer", &self.signer)
            .field("guardian_account", &self.guardian_account.address)
            .finish()
    }
}

impl<E: WorkflowEffects> AuthenticatedSession<E> {
    /// Key-network identity behind the signer.
    pub fn identity(&self) -> &SignerIdentity {
        self.signer.identity()
    }
}

/// Session lifecycle. There is no transition back to `Unauthenticated`
/// other than an explicit reset.
pub enum SessionState<E: WorkflowEffects> {
    Unauthenticated,
    Authenticated(AuthenticatedSession<E>),
}

impl<E: WorkflowEffects> Default for SessionState<E> {
    fn default() -> Self {
        Self::Unauthenticated
    }
}

impl<E: WorkflowEffects> SessionState<E> {
    /// The active session, or `NotAuthenticated` naming `action`.
    pub fn require(&self, action: &str) -> WardenResult<AuthenticatedSession<E>> {
        match self {
            Self::Authenticated(session) => Ok(session.clone()),
            Self::Unauthenticated => Err(WardenError::not_authenticated(format!(
                "{action} requires a signed-in guardian"
            ))),
        }
    }

    /// Address-level view of the session.
    pub fn summary(&self) -> SessionSummary {
        match self {
            Self::Unauthenticated => SessionSummary::Unauthenticated,
            Self::Authenticated(session) => SessionSummary::Authenticated {
                guardian_signer: session.signer.address(),
                guardian_account: session.guardian_account.address,
                token_id: session.identity().token_id.clone(),
            },
        }
    }
}
