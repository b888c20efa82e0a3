//! Interactive shell over the recovery workflow.
//!
//! Each of the four actions runs as its own task, so a slow action does not
//! block the prompt and a second trigger of the same action hits the
//! workflow's in-flight guard. A panicking action is reported as an error
//! entry instead of disappearing with its task.

use crate::commands::{ShellCommand, HELP};
use crate::console::ConsolePanel;
use anyhow::Result;
use std::any::Any;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinError;
use warden_core::ReturnContext;
use warden_recovery::{
    GuardianRecoveryWorkflow, GuardianVerification, SessionSummary, SignInStep, WorkflowAction,
};
use warden_simulator::SimulatedNetwork;

pub type SandboxWorkflow = GuardianRecoveryWorkflow<SimulatedNetwork>;

pub struct Shell {
    workflow: Arc<SandboxWorkflow>,
    network: SimulatedNetwork,
    panel: ConsolePanel,
}

impl Shell {
    pub fn new(
        workflow: Arc<SandboxWorkflow>,
        network: SimulatedNetwork,
        panel: ConsolePanel,
    ) -> Self {
        Self {
            workflow,
            network,
            panel,
        }
    }

    pub async fn run(&self) -> Result<()> {
        println!("{HELP}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("warden> ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ShellCommand>() {
                Ok(ShellCommand::Quit) => break,
                Ok(command) => self.dispatch(command).await,
                Err(e) => println!("{e}"),
            }
        }
        let errors = self.panel.error_count();
        if errors > 0 {
            println!("session ended with {errors} error(s)");
        }
        Ok(())
    }

    async fn dispatch(&self, command: ShellCommand) {
        match command {
            ShellCommand::SignIn { callback_url } => {
                self.spawn_action(WorkflowAction::SignIn, move |workflow, network| async move {
                    sign_in(&workflow, &network, callback_url.as_deref()).await;
                });
            }
            ShellCommand::AddGuardian => {
                self.spawn_action(WorkflowAction::AddGuardian, |workflow, _| async move {
                    add_guardian(&workflow).await;
                });
            }
            ShellCommand::BeginRecovery => {
                self.spawn_action(WorkflowAction::BeginRecovery, |workflow, _| async move {
                    begin_recovery(&workflow).await;
                });
            }
            ShellCommand::FinalizeRecovery => {
                self.spawn_action(WorkflowAction::FinalizeRecovery, |workflow, _| async move {
                    finalize_recovery(&workflow).await;
                });
            }
            ShellCommand::Guardians => {
                if let Ok(guardians) = self.workflow.guardians().await {
                    if guardians.is_empty() {
                        tracing::info!("no guardians registered");
                    }
                    for guardian in guardians {
                        tracing::info!(%guardian, "guardian");
                    }
                }
            }
            ShellCommand::Status => self.status().await,
            ShellCommand::Advance { secs } => {
                self.network.advance(Duration::from_secs(secs));
                tracing::info!(now = %format_ms(self.network.clock_ms()), "clock advanced");
            }
            ShellCommand::Reset => self.workflow.reset().await,
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => {}
        }
    }

    async fn status(&self) {
        match self.workflow.state_summary().await {
            SessionSummary::Unauthenticated => {
                tracing::info!("signed out; available: sign-in");
            }
            SessionSummary::Authenticated {
                guardian_signer,
                guardian_account,
                token_id,
            } => {
                tracing::info!(
                    %guardian_signer,
                    %guardian_account,
                    %token_id,
                    "signed in; available: add-guardian, begin-recovery, finalize-recovery"
                );
            }
        }
        if let Ok(protected) = self.workflow.protected_account() {
            tracing::info!(protected_account = %protected.address, "protected account");
        }
        tracing::info!(now = %format_ms(self.network.clock_ms()), "simulated time");
    }

    fn spawn_action<F, Fut>(&self, action: WorkflowAction, run: F)
    where
        F: FnOnce(Arc<SandboxWorkflow>, SimulatedNetwork) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(run(Arc::clone(&self.workflow), self.network.clone()));
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                report_join_error(action, e);
            }
        });
    }
}

fn report_join_error(action: WorkflowAction, err: JoinError) {
    if err.is_panic() {
        let message = panic_message(err.into_panic());
        tracing::error!(action = %action, panic = %message, "action panicked");
    } else {
        tracing::error!(action = %action, "action was cancelled");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) fn format_ms(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| ms.to_string())
}

/// Sign in. Without a callback URL the sandbox approves the consent screen
/// itself and completes sign-in with the resulting callback.
pub(crate) async fn sign_in(
    workflow: &SandboxWorkflow,
    network: &SimulatedNetwork,
    callback_url: Option<&str>,
) {
    let context = match callback_url.map(ReturnContext::from_url) {
        Some(Ok(context)) => context,
        Some(Err(e)) => {
            tracing::error!(error = %e, "bad callback URL");
            return;
        }
        None => ReturnContext::empty(),
    };

    let step = match workflow.initialize_guardian_signer(&context).await {
        Ok(step) => step,
        Err(_) => return,
    };
    let identity = match step {
        SignInStep::Authenticated(identity) => identity,
        SignInStep::RedirectRequired { url } => {
            tracing::info!(%url, "consent required");
            let callback = match network.approve_consent(&url) {
                Ok(callback) => callback,
                Err(e) => {
                    tracing::error!(error = %e, "sandbox consent failed");
                    return;
                }
            };
            tracing::info!(%callback, "sandbox approved consent");
            let context = match ReturnContext::from_url(&callback) {
                Ok(context) => context,
                Err(e) => {
                    tracing::error!(error = %e, "bad callback URL");
                    return;
                }
            };
            match workflow.complete_sign_in(&context).await {
                Ok(identity) => identity,
                Err(_) => return,
            }
        }
    };
    tracing::info!(token_id = %identity.token_id, "signed in");
}

pub(crate) async fn add_guardian(workflow: &SandboxWorkflow) {
    if let Ok(report) = workflow.add_guardian().await {
        let verification = match &report.verification {
            GuardianVerification::Confirmed => "confirmed".to_string(),
            GuardianVerification::Mismatch => "not listed by module".to_string(),
            GuardianVerification::Unavailable { reason } => format!("unverified ({reason})"),
        };
        tracing::info!(
            guardian = %report.guardian_account.address,
            user_op_hash = %report.submission.user_op_hash,
            %verification,
            "add guardian complete"
        );
    }
}

pub(crate) async fn begin_recovery(workflow: &SandboxWorkflow) {
    if let Ok(report) = workflow.begin_recovery().await {
        let finalize_after = report
            .earliest_finalize_ms
            .map_or_else(|| "pending execution".to_string(), format_ms);
        tracing::info!(
            account = %report.protected_account.address,
            user_op_hash = %report.submission.user_op_hash,
            %finalize_after,
            "recovery proposed"
        );
    }
}

pub(crate) async fn finalize_recovery(workflow: &SandboxWorkflow) {
    if let Ok(report) = workflow.finalize_recovery().await {
        tracing::info!(
            account = %report.protected_account.address,
            user_op_hash = %report.submission.user_op_hash,
            "recovery complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "non-string panic payload");
    }

    #[tokio::test]
    async fn panicking_action_is_reported_as_error() {
        let panel = ConsolePanel::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(panel.clone())
            .with_ansi(false)
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let handle = tokio::spawn(async { panic!("signer exploded") });
        let err = handle.await.unwrap_err();
        report_join_error(WorkflowAction::AddGuardian, err);

        let entries = panel.entries();
        let last = entries.last().unwrap();
        assert_eq!(last.kind, crate::console::EntryKind::Error);
        assert!(last.text.contains("signer exploded"));
    }
}
