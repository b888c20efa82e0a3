//! Smart account client effect interface

use crate::account::{ChainEndpoints, InclusionReceipt, MetaTransaction, SmartAccountRef, UserOperation};
use crate::config::OwnerKey;
use crate::WardenResult;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

/// ERC-4337 smart account client for Safe accounts.
#[async_trait]
pub trait SmartAccountEffects: Send + Sync {
    /// Counterfactual address for `owners` and `salt`.
    ///
    /// Pure: the same inputs always give the same address and no chain
    /// state is read.
    fn derive_account(&self, owners: &[Address], salt: U256) -> SmartAccountRef;

    /// Entry point the client submits to.
    fn entry_point(&self) -> Address;

    /// Safe 4337 module that verifies account signatures.
    fn safe_4337_module(&self) -> Address;

    /// Build an unsigned user operation executing `transactions` in order.
    async fn create_user_operation(
        &self,
        account: &SmartAccountRef,
        transactions: &[MetaTransaction],
        endpoints: &ChainEndpoints,
    ) -> WardenResult<UserOperation>;

    /// Sign with raw owner keys. Returns the formatted account signature.
    async fn sign_with_owner_keys(
        &self,
        operation: &UserOperation,
        keys: &[OwnerKey],
        chain_id: u64,
    ) -> WardenResult<Bytes>;

    /// Submit a signed operation. Returns the user operation hash.
    async fn send_user_operation(
        &self,
        operation: &UserOperation,
        bundler_url: &str,
    ) -> WardenResult<B256>;

    /// Receipt for a submitted operation, `None` while still pending.
    async fn user_operation_receipt(
        &self,
        user_op_hash: B256,
        bundler_url: &str,
    ) -> WardenResult<Option<InclusionReceipt>>;
}
