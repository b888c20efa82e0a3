//! Guardian recovery workflow.
//!
//! Owns the session state and sequences the four user-triggered actions:
//! sign-in, add guardian, begin recovery and finalize recovery. Every
//! external call goes through the effect handler; failures abort the action,
//! are logged at `error` and are returned unchanged (no retries, no
//! rollback of earlier steps).

use crate::effects::WorkflowEffects;
use crate::guard::InFlightActions;
use crate::pipeline::{OperationPipeline, SubmissionOutcome};
use crate::session::{AuthenticatedSession, SessionState};
use crate::signer::GuardianSigner;
use crate::types::{
    AddGuardianReport, GuardianVerification, RecoveryReport, SessionSummary, SignInStep,
    WorkflowAction,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use warden_core::effects::recovery::is_grace_period_revert;
use warden_core::{
    Address, MetaTransaction, ReturnContext, SignerIdentity, SmartAccountRef, WardenConfig,
    WardenError, WardenResult,
};

/// Social recovery driver for one guardian session.
pub struct GuardianRecoveryWorkflow<E: WorkflowEffects> {
    effects: Arc<E>,
    config: WardenConfig,
    state: RwLock<SessionState<E>>,
    in_flight: InFlightActions,
}

impl<E: WorkflowEffects> GuardianRecoveryWorkflow<E> {
    /// Create an unauthenticated workflow.
    pub fn new(effects: Arc<E>, config: WardenConfig) -> Self {
        Self {
            effects,
            config,
            state: RwLock::new(SessionState::Unauthenticated),
            in_flight: InFlightActions::new(),
        }
    }

    /// Configuration the workflow was built with.
    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Shared effect handler.
    pub fn effects(&self) -> &Arc<E> {
        &self.effects
    }

    /// Start sign-in: returns the consent URL the user must visit.
    pub async fn begin_sign_in(&self) -> WardenResult<SignInStep> {
        let result = self.effects.sign_in_url(&self.config.redirect_uri).await;
        let url = log_failure(WorkflowAction::SignIn, result)?;
        tracing::info!(provider = %self.config.identity_provider, "redirecting to identity provider");
        Ok(SignInStep::RedirectRequired { url })
    }

    /// Finish sign-in with the parameters seen on return from the provider.
    ///
    /// Returns the cached identity if the session is already authenticated.
    pub async fn complete_sign_in(&self, context: &ReturnContext) -> WardenResult<SignerIdentity> {
        let result = async {
            let _guard = self.in_flight.enter(WorkflowAction::SignIn)?;
            self.complete_sign_in_inner(context).await
        }
        .await;
        log_failure(WorkflowAction::SignIn, result)
    }

    /// Single entry point for the sign-in button.
    ///
    /// - cached signer: `Authenticated`, with no identity or network calls
    /// - no marker for the configured provider in `context`: `RedirectRequired`
    /// - otherwise: completes sign-in
    pub async fn initialize_guardian_signer(
        &self,
        context: &ReturnContext,
    ) -> WardenResult<SignInStep> {
        if let SessionState::Authenticated(session) = &*self.state.read().await {
            tracing::info!(signer = %session.signer.address(), "guardian signer already initialized");
            return Ok(SignInStep::Authenticated(session.identity().clone()));
        }
        if !self.returned_from_expected_provider(context) {
            if context.has_returned_from_provider() {
                tracing::warn!(
                    expected = %self.config.identity_provider,
                    actual = ?context.provider(),
                    "ignoring return from an unexpected identity provider"
                );
            }
            return self.begin_sign_in().await;
        }
        let identity = self.complete_sign_in(context).await?;
        Ok(SignInStep::Authenticated(identity))
    }

    async fn complete_sign_in_inner(&self, context: &ReturnContext) -> WardenResult<SignerIdentity> {
        if let SessionState::Authenticated(session) = &*self.state.read().await {
            return Ok(session.identity().clone());
        }

        if !self.returned_from_expected_provider(context) {
            return Err(WardenError::identity_unavailable(format!(
                "no return from identity provider {}",
                self.config.identity_provider
            )));
        }
        let assertion = self.effects.authenticate(context).await?.ok_or_else(|| {
            WardenError::identity_unavailable("identity provider returned no assertion")
        })?;
        tracing::info!(provider = %assertion.provider, "identity assertion received");

        let mut identities = self.effects.fetch_signer_identities(&assertion).await?;
        if identities.is_empty() {
            tracing::info!("no signer identity bound to assertion, minting one");
            let relay_api_key = self.config.require_relay_api_key()?;
            let receipt = self
                .effects
                .mint_signer_identity(&assertion, relay_api_key)
                .await
                .map_err(|e| match e {
                    WardenError::MintFailed { .. } => e,
                    other => WardenError::mint_failed(other.to_string()),
                })?;
            tracing::info!(token_id = ?receipt.token_id, "signer identity minted");
            identities = self.effects.fetch_signer_identities(&assertion).await?;
        }

        let identity = identities.into_iter().next().ok_or_else(|| {
            WardenError::mint_failed("no signer identity available after minting")
        })?;
        let signer = GuardianSigner::new(
            Arc::clone(&self.effects),
            assertion,
            identity.clone(),
            self.config.session_expiration_secs,
        )?;
        let guardian_account = self
            .effects
            .derive_account(&[signer.address()], self.config.guardian_salt);

        tracing::info!(
            signer = %signer.address(),
            token_id = %identity.token_id,
            guardian_account = %guardian_account.address,
            "guardian signer initialized"
        );

        *self.state.write().await = SessionState::Authenticated(AuthenticatedSession {
            signer,
            guardian_account,
        });
        Ok(identity)
    }

    /// Register the guardian's account as a guardian of the protected account.
    ///
    /// The protected account's owner signs a batch enabling the recovery
    /// module and adding the guardian. Membership is re-checked after
    /// inclusion; a failed or negative check is reported, not raised.
    pub async fn add_guardian(&self) -> WardenResult<AddGuardianReport> {
        let result = async {
            let _guard = self.in_flight.enter(WorkflowAction::AddGuardian)?;
            self.add_guardian_inner().await
        }
        .await;
        log_failure(WorkflowAction::AddGuardian, result)
    }

    async fn add_guardian_inner(&self) -> WardenResult<AddGuardianReport> {
        let session = self.session(WorkflowAction::AddGuardian).await?;
        let protected = self.protected_account()?;
        let guardian = session.guardian_account.address;

        let batch = vec![
            self.effects.enable_module_tx(protected.address),
            self.effects
                .add_guardian_tx(protected.address, guardian, self.config.guardian_threshold),
        ];
        tracing::info!(
            account = %protected.address,
            guardian = %guardian,
            threshold = self.config.guardian_threshold,
            "adding guardian"
        );

        let pipeline = self.pipeline();
        let unsigned = pipeline.build(&protected, batch).await?;
        let sponsored = pipeline.sponsor(unsigned).await?;
        let signed = pipeline.sign_with_owner(sponsored).await?;
        let transactions = signed.transactions().to_vec();
        let submission = pipeline.submit_and_wait(signed).await?;

        let rpc_url = self.config.require_rpc_url()?;
        let verification = match self
            .effects
            .is_guardian(rpc_url, protected.address, guardian)
            .await
        {
            Ok(true) => {
                tracing::info!(account = %protected.address, guardian = %guardian, "guardian registered");
                GuardianVerification::Confirmed
            }
            Ok(false) => {
                tracing::warn!(
                    account = %protected.address,
                    guardian = %guardian,
                    "operation included but module does not list the guardian"
                );
                GuardianVerification::Mismatch
            }
            Err(e) => {
                tracing::warn!(error = %e, "guardian membership check failed");
                GuardianVerification::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        Ok(AddGuardianReport {
            protected_account: protected,
            guardian_account: session.guardian_account,
            transactions,
            submission,
            verification,
        })
    }

    /// Propose recovery of the protected account to the configured new owner,
    /// signed by the guardian.
    pub async fn begin_recovery(&self) -> WardenResult<RecoveryReport> {
        let result = async {
            let _guard = self.in_flight.enter(WorkflowAction::BeginRecovery)?;
            self.begin_recovery_inner().await
        }
        .await;
        log_failure(WorkflowAction::BeginRecovery, result)
    }

    async fn begin_recovery_inner(&self) -> WardenResult<RecoveryReport> {
        let session = self.session(WorkflowAction::BeginRecovery).await?;
        let protected = self.protected_account()?;
        let new_owner = self.config.require_new_owner_address()?;

        match self.guardians_of(&protected).await {
            Ok(guardians) => {
                tracing::info!(account = %protected.address, ?guardians, "current guardians")
            }
            Err(e) => tracing::warn!(error = %e, "could not list current guardians"),
        }

        let tx = self.effects.confirm_recovery_tx(
            protected.address,
            &[new_owner],
            self.config.new_threshold,
            self.config.auto_execute,
        );
        tracing::info!(
            account = %protected.address,
            new_owner = %new_owner,
            execute = self.config.auto_execute,
            "proposing recovery"
        );
        let (transactions, submission) = self.run_as_guardian(&session, vec![tx]).await?;

        let grace_ms = u64::try_from(self.effects.grace_period().as_millis()).unwrap_or(u64::MAX);
        let earliest = submission.submitted_at_ms.saturating_add(grace_ms);
        if self.config.auto_execute {
            tracing::info!(
                earliest_finalize = %format_timestamp(earliest),
                "recovery started, finalize after the grace period"
            );
        } else {
            tracing::info!(
                earliest_finalize = %format_timestamp(earliest),
                "recovery confirmed, finalize after execution and the grace period"
            );
        }

        Ok(RecoveryReport {
            protected_account: protected,
            guardian_account: session.guardian_account,
            transactions,
            submission,
            earliest_finalize_ms: Some(earliest),
        })
    }

    /// Finalize a pending recovery once the module's grace period is over.
    ///
    /// The protected account is re-derived from configuration. An early
    /// attempt fails with `GracePeriodNotElapsed`.
    pub async fn finalize_recovery(&self) -> WardenResult<RecoveryReport> {
        let result = async {
            let _guard = self.in_flight.enter(WorkflowAction::FinalizeRecovery)?;
            self.finalize_recovery_inner().await
        }
        .await;
        log_failure(WorkflowAction::FinalizeRecovery, result)
    }

    async fn finalize_recovery_inner(&self) -> WardenResult<RecoveryReport> {
        let session = self.session(WorkflowAction::FinalizeRecovery).await?;
        let protected = self.protected_account()?;

        let tx = self.effects.finalize_recovery_tx(protected.address);
        tracing::info!(account = %protected.address, "finalizing recovery");
        let (transactions, submission) = self
            .run_as_guardian(&session, vec![tx])
            .await
            .map_err(classify_finalize_error)?;
        tracing::info!(account = %protected.address, "recovery finalized");

        Ok(RecoveryReport {
            protected_account: protected,
            guardian_account: session.guardian_account,
            transactions,
            submission,
            earliest_finalize_ms: None,
        })
    }

    /// Guardians currently registered for the protected account.
    pub async fn guardians(&self) -> WardenResult<Vec<Address>> {
        let result = async {
            let protected = self.protected_account()?;
            self.guardians_of(&protected).await
        }
        .await;
        match result {
            Ok(guardians) => Ok(guardians),
            Err(e) => {
                tracing::error!(error = %e, "guardian listing failed");
                Err(e)
            }
        }
    }

    /// Snapshot of the session for status output.
    pub async fn state_summary(&self) -> SessionSummary {
        self.state.read().await.summary()
    }

    /// Drop the session, as if the page were reloaded.
    pub async fn reset(&self) {
        *self.state.write().await = SessionState::Unauthenticated;
        tracing::info!("session reset");
    }

    /// The protected account, derived fresh from the configured owner.
    pub fn protected_account(&self) -> WardenResult<SmartAccountRef> {
        let owner = self.config.require_owner_address()?;
        Ok(self
            .effects
            .derive_account(&[owner], self.config.protected_salt))
    }

    fn returned_from_expected_provider(&self, context: &ReturnContext) -> bool {
        context.has_returned_from_provider()
            && context.provider() == Some(self.config.identity_provider.as_str())
    }

    async fn session(&self, action: WorkflowAction) -> WardenResult<AuthenticatedSession<E>> {
        self.state.read().await.require(action.as_str())
    }

    async fn guardians_of(&self, account: &SmartAccountRef) -> WardenResult<Vec<Address>> {
        let rpc_url = self.config.require_rpc_url()?;
        self.effects.guardians(rpc_url, account.address).await
    }

    fn pipeline(&self) -> OperationPipeline<'_, E> {
        OperationPipeline::new(self.effects.as_ref(), &self.config)
    }

    async fn run_as_guardian(
        &self,
        session: &AuthenticatedSession<E>,
        batch: Vec<MetaTransaction>,
    ) -> WardenResult<(Vec<MetaTransaction>, SubmissionOutcome)> {
        let pipeline = self.pipeline();
        let unsigned = pipeline.build(&session.guardian_account, batch).await?;
        let sponsored = pipeline.sponsor(unsigned).await?;
        let signed = pipeline.sign_as_guardian(sponsored, &session.signer).await?;
        let transactions = signed.transactions().to_vec();
        let submission = pipeline.submit_and_wait(signed).await?;
        Ok((transactions, submission))
    }
}

fn log_failure<T>(action: WorkflowAction, result: WardenResult<T>) -> WardenResult<T> {
    if let Err(e) = &result {
        tracing::error!(action = %action, error = %e, "action failed");
    }
    result
}

fn classify_finalize_error(err: WardenError) -> WardenError {
    match err {
        WardenError::OperationFailed { reason } if is_grace_period_revert(&reason) => {
            WardenError::grace_period_not_elapsed(reason)
        }
        other => other,
    }
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| format!("{ms} ms"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn grace_period_rejections_are_reclassified() {
        let err = classify_finalize_error(WardenError::operation_failed(
            "SRM: grace period has not elapsed",
        ));
        assert_matches!(err, WardenError::GracePeriodNotElapsed { .. });

        let other = classify_finalize_error(WardenError::operation_failed("AA24 signature error"));
        assert_matches!(other, WardenError::OperationFailed { .. });
    }

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp(1_700_000_000_000), "2023-11-14T22:13:20Z");
    }
}
