//! The simulated network handle and its shared state.

use crate::chain::Chain;
use crate::faults::Faults;
use crate::keys;
use crate::record::CallRecord;
use alloy_primitives::{keccak256, Address, Bytes, B256};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use warden_core::{InclusionReceipt, OwnerKey, SmartAccountRef, UserOperation, WardenResult};

/// Chain id the simulator signs and verifies under.
pub const SIM_CHAIN_ID: u64 = 11_155_111;

/// Clock reading at construction (2023-11-14T22:13:20Z).
pub const GENESIS_MS: u64 = 1_700_000_000_000;

/// Default recovery grace period (three days).
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Calls kept in the log; older entries are dropped first.
pub const MAX_RECORDED_CALLS: usize = 4096;

/// Identity subject used unless overridden.
pub const DEFAULT_SUBJECT: &str = "guardian@example.com";

fn contract_address(label: &str) -> Address {
    Address::from_slice(&keccak256(format!("warden-sim/{label}").as_bytes())[12..])
}

/// Addresses of the simulated contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contracts {
    pub entry_point: Address,
    pub safe_4337_module: Address,
    pub recovery_module: Address,
    pub paymaster: Address,
    pub account_factory: Address,
}

impl Default for Contracts {
    fn default() -> Self {
        Self {
            entry_point: contract_address("entry-point"),
            safe_4337_module: contract_address("safe-4337-module"),
            recovery_module: contract_address("social-recovery-module"),
            paymaster: contract_address("paymaster"),
            account_factory: contract_address("safe-proxy-factory"),
        }
    }
}

/// Key bound to an identity subject.
#[derive(Debug, Clone)]
pub(crate) struct BoundKey {
    pub public_key: Bytes,
    pub token_id: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SubmittedOperation {
    pub operation: UserOperation,
    pub polls_remaining: u32,
}

#[derive(Debug, Default)]
pub(crate) struct SimState {
    pub now_ms: u64,
    pub faults: Faults,
    pub calls: VecDeque<CallRecord>,
    pub subject: String,
    pub consent_counter: u64,
    /// consent state parameter -> redirect uri
    pub consents: HashMap<String, String>,
    /// access token -> subject
    pub access_tokens: HashMap<String, String>,
    pub bound_keys: HashMap<String, Vec<BoundKey>>,
    pub mint_counter: u64,
    /// address -> secret, for every key the simulator can verify
    pub secrets: HashMap<Address, B256>,
    /// live session delegation -> expiry (unix ms)
    pub sessions: HashMap<Bytes, u64>,
    /// account address -> how it was derived
    pub derivations: HashMap<Address, SmartAccountRef>,
    pub chain: Chain,
    pub submitted: HashMap<B256, SubmittedOperation>,
    pub receipts: HashMap<B256, InclusionReceipt>,
    pub block_counter: u64,
}

impl SimState {
    pub fn record(&mut self, call: CallRecord) {
        if self.calls.len() >= MAX_RECORDED_CALLS {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }

    /// Forget session signatures that expired at or before the current time.
    pub fn prune_sessions(&mut self) {
        let now = self.now_ms;
        self.sessions.retain(|_, expires_at_ms| *expires_at_ms > now);
    }
}

/// Deterministic stand-in for every collaborator the workflow talks to.
///
/// Cloning yields another handle onto the same state.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    pub(crate) state: Arc<Mutex<SimState>>,
    pub(crate) contracts: Contracts,
    pub(crate) chain_id: u64,
    pub(crate) grace_period: Duration,
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        let state = SimState {
            now_ms: GENESIS_MS,
            subject: DEFAULT_SUBJECT.to_string(),
            ..SimState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            contracts: Contracts::default(),
            chain_id: SIM_CHAIN_ID,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Identity subject the provider signs users in as.
    pub fn with_subject(self, subject: impl Into<String>) -> Self {
        self.state.lock().subject = subject.into();
        self
    }

    pub fn contracts(&self) -> Contracts {
        self.contracts
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Current simulated time.
    pub fn clock_ms(&self) -> u64 {
        self.state.lock().now_ms
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let ms = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        let mut state = self.state.lock();
        state.now_ms = state.now_ms.saturating_add(ms);
        tracing::debug!(now_ms = state.now_ms, "simulated clock advanced");
    }

    /// Change fault injection settings.
    pub fn configure_faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.state.lock().faults);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Every call recorded so far, oldest first.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().calls.iter().cloned().collect()
    }

    /// Names of recorded calls, oldest first.
    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.state.lock().calls.iter().map(CallRecord::kind).collect()
    }

    pub fn count_calls(&self, kind: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Session signatures the key network still honours.
    pub fn live_sessions(&self) -> usize {
        let mut state = self.state.lock();
        state.prune_sessions();
        state.sessions.len()
    }

    /// Operations handed to the bundler, oldest first.
    pub fn submitted_operations(&self) -> Vec<UserOperation> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                CallRecord::SendUserOperation { operation } => Some(operation.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make an owner key verifiable and return its address.
    pub fn register_owner_key(&self, key: &OwnerKey) -> WardenResult<Address> {
        let secret = keys::owner_secret(key)?;
        let address = keys::address(secret);
        self.state.lock().secrets.insert(address, secret);
        Ok(address)
    }

    /// Owners of a deployed account.
    pub fn owners_of(&self, account: Address) -> Option<Vec<Address>> {
        self.state
            .lock()
            .chain
            .accounts
            .get(&account)
            .map(|a| a.owners.clone())
    }

    pub fn is_deployed(&self, account: Address) -> bool {
        self.state.lock().chain.accounts.contains_key(&account)
    }

    pub fn module_enabled(&self, account: Address) -> bool {
        self.state
            .lock()
            .chain
            .accounts
            .get(&account)
            .is_some_and(|a| a.modules.contains(&self.contracts.recovery_module))
    }

    /// Earliest finalize time of the pending recovery of `account`, if executed.
    pub fn pending_recovery_ready_at(&self, account: Address) -> Option<u64> {
        self.state
            .lock()
            .chain
            .module
            .pending
            .get(&account)
            .and_then(|p| p.execute_after_ms)
    }

    /// Bind a key directly, bypassing minting.
    pub fn bind_key_for_subject(&self, subject: &str, secret: B256) -> Bytes {
        let public_key = keys::public_key(secret);
        let mut state = self.state.lock();
        state.secrets.insert(keys::address(secret), secret);
        state
            .bound_keys
            .entry(subject.to_string())
            .or_default()
            .push(BoundKey {
                public_key: public_key.clone(),
                token_id: format!("preloaded-{}", hex_prefix(&public_key)),
            });
        public_key
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes
        .iter()
        .skip(1)
        .take(4)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::effects::SmartAccountEffects;
    use warden_core::U256;

    #[test]
    fn call_log_keeps_the_newest_entries() {
        let sim = SimulatedNetwork::new();
        for salt in 0..(MAX_RECORDED_CALLS as u64 + 10) {
            sim.derive_account(&[Address::repeat_byte(1)], U256::from(salt));
        }
        let calls = sim.calls();
        assert_eq!(calls.len(), MAX_RECORDED_CALLS);

        let newest = sim.derive_account(&[Address::repeat_byte(1)], U256::from(7_777));
        assert_eq!(
            sim.calls().last(),
            Some(&CallRecord::DeriveAccount {
                address: newest.address
            })
        );
        assert_eq!(sim.calls().len(), MAX_RECORDED_CALLS);
    }
}
