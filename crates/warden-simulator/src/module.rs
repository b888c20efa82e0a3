//! Simulated social recovery module client.

use crate::network::SimulatedNetwork;
use crate::record::CallRecord;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::time::Duration;
use warden_core::effects::RecoveryModuleEffects;
use warden_core::{MetaTransaction, SocialRecoveryCalls, WardenError, WardenResult};

impl SimulatedNetwork {
    fn calls_builder(&self) -> SocialRecoveryCalls {
        SocialRecoveryCalls::new(self.contracts.recovery_module)
    }
}

fn require_rpc(rpc_url: &str) -> WardenResult<()> {
    if rpc_url.trim().is_empty() {
        return Err(WardenError::external("rpc endpoint is empty"));
    }
    Ok(())
}

#[async_trait]
impl RecoveryModuleEffects for SimulatedNetwork {
    fn module_address(&self) -> Address {
        self.contracts.recovery_module
    }

    fn grace_period(&self) -> Duration {
        self.grace_period
    }

    fn enable_module_tx(&self, account: Address) -> MetaTransaction {
        self.calls_builder().enable_module(account)
    }

    fn add_guardian_tx(
        &self,
        account: Address,
        guardian: Address,
        threshold: u64,
    ) -> MetaTransaction {
        self.calls_builder()
            .add_guardian_with_threshold(account, guardian, threshold)
    }

    fn confirm_recovery_tx(
        &self,
        account: Address,
        new_owners: &[Address],
        new_threshold: u64,
        execute: bool,
    ) -> MetaTransaction {
        self.calls_builder()
            .confirm_recovery(account, new_owners, new_threshold, execute)
    }

    fn finalize_recovery_tx(&self, account: Address) -> MetaTransaction {
        self.calls_builder().finalize_recovery(account)
    }

    async fn is_guardian(
        &self,
        rpc_url: &str,
        account: Address,
        guardian: Address,
    ) -> WardenResult<bool> {
        let mut state = self.state.lock();
        state.record(CallRecord::IsGuardian { account, guardian });
        require_rpc(rpc_url)?;
        if let Some(message) = state.faults.membership_error.clone() {
            return Err(WardenError::external(message));
        }
        if let Some(answer) = state.faults.membership_override {
            return Ok(answer);
        }
        Ok(state.chain.module.is_guardian(account, guardian))
    }

    async fn guardians(&self, rpc_url: &str, account: Address) -> WardenResult<Vec<Address>> {
        let mut state = self.state.lock();
        state.record(CallRecord::Guardians { account });
        require_rpc(rpc_url)?;
        Ok(state.chain.module.guardians_of(account))
    }
}
