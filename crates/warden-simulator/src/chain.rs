//! In-memory chain: Safe accounts and the social recovery module.
//!
//! Execution of one user operation is atomic. Calls are applied to a copy of
//! the chain state that replaces the original only if every call succeeds.

use alloy_primitives::{Address, U256};
use std::collections::{BTreeSet, HashMap, HashSet};
use warden_core::abi::ModuleCall;
use warden_core::MetaTransaction;

/// Safe account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeAccount {
    pub owners: Vec<Address>,
    pub threshold: u64,
    pub nonce: U256,
    pub modules: HashSet<Address>,
}

impl SafeAccount {
    pub fn new(owners: Vec<Address>) -> Self {
        Self {
            owners,
            threshold: 1,
            nonce: U256::ZERO,
            modules: HashSet::new(),
        }
    }
}

/// A recovery proposal awaiting confirmations or the grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecovery {
    pub new_owners: Vec<Address>,
    pub new_threshold: u64,
    pub confirmations: BTreeSet<Address>,
    /// Set once the proposal is executed; finalization allowed from here
    pub execute_after_ms: Option<u64>,
}

/// State of the deployed recovery module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryModule {
    pub guardians: HashMap<Address, Vec<Address>>,
    pub thresholds: HashMap<Address, u64>,
    pub pending: HashMap<Address, PendingRecovery>,
}

impl RecoveryModule {
    pub fn guardians_of(&self, wallet: Address) -> Vec<Address> {
        self.guardians.get(&wallet).cloned().unwrap_or_default()
    }

    pub fn is_guardian(&self, wallet: Address, guardian: Address) -> bool {
        self.guardians
            .get(&wallet)
            .is_some_and(|list| list.contains(&guardian))
    }
}

/// Accounts plus module state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    pub accounts: HashMap<Address, SafeAccount>,
    pub module: RecoveryModule,
}

/// Context for executing a batch.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext {
    pub sender: Address,
    pub recovery_module: Address,
    pub now_ms: u64,
    pub grace_period_ms: u64,
}

impl Chain {
    /// Apply `transactions` in order. On revert the chain is left untouched
    /// and the revert reason is returned.
    pub fn execute_batch(
        &mut self,
        ctx: ExecutionContext,
        transactions: &[MetaTransaction],
    ) -> Result<(), String> {
        let mut scratch = self.clone();
        for tx in transactions {
            scratch.apply(ctx, tx)?;
        }
        *self = scratch;
        Ok(())
    }

    fn apply(&mut self, ctx: ExecutionContext, tx: &MetaTransaction) -> Result<(), String> {
        let call = ModuleCall::decode(&tx.data).map_err(|e| e.to_string())?;
        if tx.to == ctx.sender {
            return match call {
                ModuleCall::EnableModule { module } => {
                    let account = self
                        .accounts
                        .get_mut(&ctx.sender)
                        .ok_or_else(|| "account not deployed".to_string())?;
                    if !account.modules.insert(module) {
                        return Err("GS102: module already enabled".to_string());
                    }
                    Ok(())
                }
                other => Err(format!("account does not implement {}", other.label())),
            };
        }
        if tx.to != ctx.recovery_module {
            return Err(format!("no contract at {}", tx.to));
        }

        match call {
            ModuleCall::AddGuardianWithThreshold {
                wallet,
                guardian,
                threshold,
            } => {
                if wallet != ctx.sender {
                    return Err("SRM: only the wallet can manage its guardians".to_string());
                }
                self.require_enabled(wallet, ctx.recovery_module)?;
                if guardian == Address::ZERO || guardian == wallet {
                    return Err("SRM: invalid guardian".to_string());
                }
                let list = self.module.guardians.entry(wallet).or_default();
                if list.contains(&guardian) {
                    return Err("SRM: duplicate guardian".to_string());
                }
                list.push(guardian);
                let count = list.len() as u64;
                let threshold = u64::try_from(threshold)
                    .ok()
                    .filter(|t| *t > 0 && *t <= count)
                    .ok_or_else(|| "SRM: invalid threshold".to_string())?;
                self.module.thresholds.insert(wallet, threshold);
                Ok(())
            }
            ModuleCall::ConfirmRecovery {
                wallet,
                new_owners,
                new_threshold,
                execute,
            } => {
                self.require_enabled(wallet, ctx.recovery_module)?;
                if !self.module.is_guardian(wallet, ctx.sender) {
                    return Err("SRM: sender not a guardian".to_string());
                }
                let new_threshold = u64::try_from(new_threshold)
                    .ok()
                    .filter(|t| *t > 0 && *t as usize <= new_owners.len())
                    .ok_or_else(|| "SRM: invalid new threshold".to_string())?;

                let pending = self
                    .module
                    .pending
                    .entry(wallet)
                    .or_insert_with(|| PendingRecovery {
                        new_owners: new_owners.clone(),
                        new_threshold,
                        confirmations: BTreeSet::new(),
                        execute_after_ms: None,
                    });
                if pending.execute_after_ms.is_some() {
                    return Err("SRM: recovery already executed".to_string());
                }
                if pending.new_owners != new_owners || pending.new_threshold != new_threshold {
                    // a different proposal replaces the old one
                    pending.new_owners = new_owners;
                    pending.new_threshold = new_threshold;
                    pending.confirmations.clear();
                }
                pending.confirmations.insert(ctx.sender);

                let required = self.module.thresholds.get(&wallet).copied().unwrap_or(1);
                if execute && pending.confirmations.len() as u64 >= required {
                    pending.execute_after_ms = Some(ctx.now_ms.saturating_add(ctx.grace_period_ms));
                }
                Ok(())
            }
            ModuleCall::FinalizeRecovery { wallet } => {
                let execute_after = self
                    .module
                    .pending
                    .get(&wallet)
                    .and_then(|p| p.execute_after_ms)
                    .ok_or_else(|| "SRM: no pending recovery".to_string())?;
                if ctx.now_ms < execute_after {
                    return Err("SRM: grace period has not elapsed".to_string());
                }
                let recovery = self
                    .module
                    .pending
                    .remove(&wallet)
                    .ok_or_else(|| "SRM: no pending recovery".to_string())?;
                let account = self
                    .accounts
                    .get_mut(&wallet)
                    .ok_or_else(|| "SRM: wallet not deployed".to_string())?;
                account.owners = recovery.new_owners;
                account.threshold = recovery.new_threshold;
                Ok(())
            }
            other => Err(format!("module does not implement {}", other.label())),
        }
    }

    fn require_enabled(&self, wallet: Address, module: Address) -> Result<(), String> {
        let enabled = self
            .accounts
            .get(&wallet)
            .is_some_and(|a| a.modules.contains(&module));
        if enabled {
            Ok(())
        } else {
            Err("SRM: module not enabled".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::SocialRecoveryCalls;

    const GRACE_MS: u64 = 1_000;

    struct Setup {
        chain: Chain,
        calls: SocialRecoveryCalls,
        wallet: Address,
        guardian: Address,
    }

    fn setup() -> Setup {
        let wallet = Address::repeat_byte(0x0a);
        let guardian = Address::repeat_byte(0x0b);
        let mut chain = Chain::default();
        chain
            .accounts
            .insert(wallet, SafeAccount::new(vec![Address::repeat_byte(1)]));
        chain
            .accounts
            .insert(guardian, SafeAccount::new(vec![Address::repeat_byte(2)]));
        Setup {
            chain,
            calls: SocialRecoveryCalls::new(Address::repeat_byte(0x50)),
            wallet,
            guardian,
        }
    }

    fn ctx(s: &Setup, sender: Address, now_ms: u64) -> ExecutionContext {
        ExecutionContext {
            sender,
            recovery_module: s.calls.module(),
            now_ms,
            grace_period_ms: GRACE_MS,
        }
    }

    fn register_guardian(s: &mut Setup) {
        let batch = [
            s.calls.enable_module(s.wallet),
            s.calls.add_guardian_with_threshold(s.wallet, s.guardian, 1),
        ];
        let context = ctx(s, s.wallet, 0);
        s.chain.execute_batch(context, &batch).unwrap();
    }

    #[test]
    fn failed_batch_leaves_state_untouched() {
        let mut s = setup();
        let before = s.chain.clone();
        // second call reverts because the module is enabled twice
        let batch = [
            s.calls.enable_module(s.wallet),
            s.calls.enable_module(s.wallet),
        ];
        let context = ctx(&s, s.wallet, 0);
        let err = s.chain.execute_batch(context, &batch).unwrap_err();
        assert!(err.contains("GS102"));
        assert_eq!(s.chain, before);
    }

    #[test]
    fn guardian_requires_enabled_module() {
        let mut s = setup();
        let batch = [s.calls.add_guardian_with_threshold(s.wallet, s.guardian, 1)];
        let context = ctx(&s, s.wallet, 0);
        let err = s.chain.execute_batch(context, &batch).unwrap_err();
        assert_eq!(err, "SRM: module not enabled");
    }

    #[test]
    fn recovery_waits_for_grace_period() {
        let mut s = setup();
        register_guardian(&mut s);
        let new_owner = Address::repeat_byte(0xee);

        let confirm = [s.calls.confirm_recovery(s.wallet, &[new_owner], 1, true)];
        let context = ctx(&s, s.guardian, 10);
        s.chain.execute_batch(context, &confirm).unwrap();

        let finalize = [s.calls.finalize_recovery(s.wallet)];
        let context = ctx(&s, s.guardian, 10 + GRACE_MS - 1);
        let early = s.chain.execute_batch(context, &finalize).unwrap_err();
        assert!(early.contains("grace period"));

        let context = ctx(&s, s.guardian, 10 + GRACE_MS);
        s.chain.execute_batch(context, &finalize).unwrap();
        assert_eq!(s.chain.accounts[&s.wallet].owners, vec![new_owner]);
        assert!(s.chain.module.pending.is_empty());
    }

    #[test]
    fn non_guardian_cannot_confirm() {
        let mut s = setup();
        register_guardian(&mut s);
        let stranger = Address::repeat_byte(0x77);
        let confirm = [s.calls.confirm_recovery(s.wallet, &[stranger], 1, true)];
        let context = ctx(&s, stranger, 0);
        let err = s.chain.execute_batch(context, &confirm).unwrap_err();
        assert_eq!(err, "SRM: sender not a guardian");
    }
}
