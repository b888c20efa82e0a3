//! Scripted walk through the full recovery against the sandbox.

use crate::shell::{self, SandboxWorkflow};
use anyhow::{bail, Result};
use warden_core::effects::RecoveryModuleEffects;
use warden_simulator::SimulatedNetwork;

pub async fn run(workflow: &SandboxWorkflow, network: &SimulatedNetwork) -> Result<()> {
    shell::sign_in(workflow, network, None).await;
    if !workflow.state_summary().await.is_authenticated() {
        bail!("sign-in did not complete");
    }

    shell::add_guardian(workflow).await;
    shell::begin_recovery(workflow).await;

    // too early: the module still enforces the grace period
    shell::finalize_recovery(workflow).await;

    let grace = network.grace_period();
    network.advance(grace);
    tracing::info!(
        skipped_secs = grace.as_secs(),
        now = %shell::format_ms(network.clock_ms()),
        "advanced past the grace period"
    );
    shell::finalize_recovery(workflow).await;

    let protected = workflow.protected_account()?;
    let new_owner = workflow.config().require_new_owner_address()?;
    match network.owners_of(protected.address) {
        Some(owners) if owners == vec![new_owner] => {
            tracing::info!(account = %protected.address, %new_owner, "account now owned by the new owner");
            Ok(())
        }
        other => bail!("recovery did not replace the owner: {other:?}"),
    }
}
