//! Social recovery module effect interface

use crate::account::MetaTransaction;
use crate::WardenResult;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::time::Duration;

/// Client for a deployed social recovery module.
///
/// Builders are pure. Queries read chain state through `rpc_url`.
#[async_trait]
pub trait RecoveryModuleEffects: Send + Sync {
    /// Module address.
    fn module_address(&self) -> Address;

    /// Fixed delay between a recovery starting and it being finalizable.
    fn grace_period(&self) -> Duration;

    /// Enable the module on `account`.
    fn enable_module_tx(&self, account: Address) -> MetaTransaction;

    /// Add `guardian` to `account` with an approval threshold.
    fn add_guardian_tx(&self, account: Address, guardian: Address, threshold: u64)
        -> MetaTransaction;

    /// Guardian confirmation of a recovery to `new_owners`.
    fn confirm_recovery_tx(
        &self,
        account: Address,
        new_owners: &[Address],
        new_threshold: u64,
        execute: bool,
    ) -> MetaTransaction;

    /// Finalize the pending recovery of `account`.
    fn finalize_recovery_tx(&self, account: Address) -> MetaTransaction;

    /// Whether `guardian` is registered for `account`.
    async fn is_guardian(
        &self,
        rpc_url: &str,
        account: Address,
        guardian: Address,
    ) -> WardenResult<bool>;

    /// Guardians registered for `account`.
    async fn guardians(&self, rpc_url: &str, account: Address) -> WardenResult<Vec<Address>>;
}

/// Revert fragments the recovery module uses when finalization is attempted
/// before the grace period has passed.
const GRACE_PERIOD_REVERT_MARKERS: &[&str] = &[
    "grace period",
    "delay period",
    "recovery period",
    "not yet finalizable",
];

/// Whether a revert reason is the module's grace-period guard.
pub fn is_grace_period_revert(reason: &str) -> bool {
    let reason = reason.to_ascii_lowercase();
    GRACE_PERIOD_REVERT_MARKERS
        .iter()
        .any(|marker| reason.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_period_reverts_are_recognized() {
        assert!(is_grace_period_revert("SRM: Grace period has not elapsed"));
        assert!(is_grace_period_revert("recovery period still pending"));
        assert!(!is_grace_period_revert("SRM: sender not a guardian"));
    }
}
