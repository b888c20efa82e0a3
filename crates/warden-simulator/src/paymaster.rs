//! Simulated verifying paymaster.

use crate::network::SimulatedNetwork;
use crate::record::CallRecord;
use alloy_primitives::{keccak256, Address, U256};
use async_trait::async_trait;
use warden_core::effects::PaymasterEffects;
use warden_core::{PaymasterEndpoints, UserOperation, WardenError, WardenResult};

const SPONSORED_PRE_VERIFICATION_GAS: u64 = 5_000;

#[async_trait]
impl PaymasterEffects for SimulatedNetwork {
    async fn sponsor_user_operation(
        &self,
        mut operation: UserOperation,
        entry_point: Address,
        endpoints: &PaymasterEndpoints,
    ) -> WardenResult<UserOperation> {
        let mut state = self.state.lock();
        state.record(CallRecord::SponsorUserOperation {
            sender: operation.sender,
        });
        if let Some(message) = state.faults.paymaster_error.clone() {
            return Err(WardenError::external(message));
        }
        if endpoints.paymaster_url.trim().is_empty() {
            return Err(WardenError::external("paymaster endpoint is empty"));
        }
        if entry_point != self.contracts.entry_point {
            return Err(WardenError::invalid(format!(
                "paymaster does not serve entry point {entry_point}"
            )));
        }

        // paymaster address followed by an approval over the sponsored fields
        let mut approval = Vec::new();
        approval.extend_from_slice(operation.sender.as_slice());
        approval.extend_from_slice(&operation.nonce.to_be_bytes::<32>());
        approval.extend_from_slice(&operation.call_data);
        let mut paymaster_and_data = self.contracts.paymaster.to_vec();
        paymaster_and_data.extend_from_slice(keccak256(&approval).as_slice());

        operation.paymaster_and_data = paymaster_and_data.into();
        operation.pre_verification_gas += U256::from(SPONSORED_PRE_VERIFICATION_GAS);
        Ok(operation)
    }
}
