//! Paymaster effect interface

use crate::account::{PaymasterEndpoints, UserOperation};
use crate::WardenResult;
use alloy_primitives::Address;
use async_trait::async_trait;

#[async_trait]
pub trait PaymasterEffects: Send + Sync {
    /// Return `operation` with sponsorship fields (and any gas limits the
    /// paymaster re-estimated) filled in.
    async fn sponsor_user_operation(
        &self,
        operation: UserOperation,
        entry_point: Address,
        endpoints: &PaymasterEndpoints,
    ) -> WardenResult<UserOperation>;
}
