//! Simulated smart account client and bundler.
//!
//! The bundler checks what the real entry point and Safe 4337 module would:
//! nonce, sponsorship, deployment data and the `SafeOp` signature. Mining
//! happens lazily, when the receipt is first polled.

use crate::chain::{ExecutionContext, SafeAccount};
use crate::keys;
use crate::network::{SimState, SimulatedNetwork, SubmittedOperation};
use crate::record::CallRecord;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use warden_core::account::{decode_multisend_call, encode_multisend_call};
use warden_core::effects::SmartAccountEffects;
use warden_core::eip712::{
    format_safe_signature, parse_safe_signature, Eip712Domain, SafeOperation, ValidityWindow,
};
use warden_core::{
    ChainEndpoints, InclusionReceipt, MetaTransaction, OwnerKey, SmartAccountRef, UserOperation,
    WardenError, WardenResult,
};

const SIGNATURE_LEN: usize = 65;
const CALL_GAS_LIMIT: u64 = 250_000;
const VERIFICATION_GAS_LIMIT: u64 = 500_000;
const DEPLOYMENT_GAS: u64 = 350_000;
const PRE_VERIFICATION_GAS: u64 = 60_000;
const MAX_FEE_PER_GAS: u64 = 3_000_000_000;
const MAX_PRIORITY_FEE_PER_GAS: u64 = 1_000_000_000;

impl SimulatedNetwork {
    fn account_address(&self, owners: &[Address], salt: U256) -> Address {
        let mut preimage = Vec::with_capacity(20 + owners.len() * 20 + 32);
        preimage.extend_from_slice(self.contracts.account_factory.as_slice());
        for owner in owners {
            preimage.extend_from_slice(owner.as_slice());
        }
        preimage.extend_from_slice(&salt.to_be_bytes::<32>());
        Address::from_slice(&keccak256(&preimage)[12..])
    }

    fn init_code(&self, account: &SmartAccountRef) -> Bytes {
        let mut code = Vec::new();
        code.extend_from_slice(self.contracts.account_factory.as_slice());
        code.extend_from_slice(&account.salt.to_be_bytes::<32>());
        for owner in &account.owners {
            code.extend_from_slice(owner.as_slice());
        }
        code.into()
    }

    fn domain(&self, chain_id: u64) -> Eip712Domain {
        Eip712Domain {
            chain_id,
            verifying_contract: self.contracts.safe_4337_module,
        }
    }

    /// Owners and threshold the signature must satisfy, deploying from
    /// `initCode` if needed.
    fn signing_owners(
        &self,
        state: &SimState,
        op: &UserOperation,
    ) -> Result<(Vec<Address>, u64), String> {
        if let Some(account) = state.chain.accounts.get(&op.sender) {
            if !op.init_code.is_empty() {
                return Err("AA10 sender already constructed".to_string());
            }
            return Ok((account.owners.clone(), account.threshold));
        }
        let owners = self.owners_from_init_code(op)?;
        Ok((owners, 1))
    }

    fn owners_from_init_code(&self, op: &UserOperation) -> Result<Vec<Address>, String> {
        let code = &op.init_code;
        if code.is_empty() {
            return Err("AA20 account not deployed".to_string());
        }
        if code.len() < 52
            || (code.len() - 52) % 20 != 0
            || code[..20] != *self.contracts.account_factory.as_slice()
        {
            return Err("AA13 initCode failed or OOG".to_string());
        }
        let salt = U256::from_be_slice(&code[20..52]);
        let owners: Vec<Address> = code[52..].chunks(20).map(Address::from_slice).collect();
        if self.account_address(&owners, salt) != op.sender {
            return Err("AA14 initCode must return sender".to_string());
        }
        Ok(owners)
    }

    fn verify_signature(
        &self,
        state: &SimState,
        op: &UserOperation,
        owners: &[Address],
        threshold: u64,
    ) -> Result<(), String> {
        const REJECTED: &str = "AA24 signature error";
        let (window, signatures) =
            parse_safe_signature(&op.signature).ok_or_else(|| REJECTED.to_string())?;
        if signatures.is_empty() || signatures.len() % SIGNATURE_LEN != 0 {
            return Err(REJECTED.to_string());
        }
        let digest = SafeOperation::from_user_operation(op, window, self.contracts.entry_point)
            .signing_hash(&self.domain(self.chain_id));

        let mut sorted_owners = owners.to_vec();
        sorted_owners.sort();
        let mut last: Option<Address> = None;
        let mut valid = 0u64;
        for chunk in signatures.chunks(SIGNATURE_LEN) {
            let signer = sorted_owners
                .iter()
                .filter(|owner| last.map_or(true, |l| **owner > l))
                .find(|owner| {
                    state
                        .secrets
                        .get(*owner)
                        .is_some_and(|secret| keys::sign(*secret, digest)[..] == *chunk)
                })
                .copied()
                .ok_or_else(|| REJECTED.to_string())?;
            last = Some(signer);
            valid += 1;
        }
        if valid < threshold {
            return Err(REJECTED.to_string());
        }
        Ok(())
    }

    /// Include a submitted operation and produce its receipt.
    fn mine(&self, state: &mut SimState, user_op_hash: B256, op: &UserOperation) -> InclusionReceipt {
        if !state.chain.accounts.contains_key(&op.sender) {
            let owners = self.owners_from_init_code(op).unwrap_or_default();
            state.chain.accounts.insert(op.sender, SafeAccount::new(owners));
        }
        if let Some(account) = state.chain.accounts.get_mut(&op.sender) {
            account.nonce += U256::from(1);
        }
        state.block_counter += 1;
        let mut tx_preimage = user_op_hash.to_vec();
        tx_preimage.extend_from_slice(&state.block_counter.to_be_bytes());
        let transaction_hash = keccak256(&tx_preimage);

        let outcome = match state.faults.inclusion_failure.take() {
            Some(reason) => Err(reason),
            None => decode_batch(&op.call_data).and_then(|batch| {
                let ctx = ExecutionContext {
                    sender: op.sender,
                    recovery_module: self.contracts.recovery_module,
                    now_ms: state.now_ms,
                    grace_period_ms: u64::try_from(self.grace_period.as_millis())
                        .unwrap_or(u64::MAX),
                };
                state.chain.execute_batch(ctx, &batch)
            }),
        };

        match &outcome {
            Ok(()) => tracing::debug!(%user_op_hash, sender = %op.sender, "user operation mined"),
            Err(reason) => {
                tracing::debug!(%user_op_hash, sender = %op.sender, %reason, "user operation reverted");
            }
        }
        InclusionReceipt {
            user_op_hash,
            success: outcome.is_ok(),
            transaction_hash,
            revert_reason: outcome.err(),
        }
    }
}

fn decode_batch(call_data: &[u8]) -> Result<Vec<MetaTransaction>, String> {
    decode_multisend_call(call_data).map_err(|e| format!("unsupported account call: {e}"))
}

fn require_endpoint(name: &str, url: &str) -> WardenResult<()> {
    if url.trim().is_empty() {
        return Err(WardenError::external(format!("{name} endpoint is empty")));
    }
    Ok(())
}

#[async_trait]
impl SmartAccountEffects for SimulatedNetwork {
    fn derive_account(&self, owners: &[Address], salt: U256) -> SmartAccountRef {
        let account = SmartAccountRef {
            address: self.account_address(owners, salt),
            owners: owners.to_vec(),
            salt,
        };
        let mut state = self.state.lock();
        state.record(CallRecord::DeriveAccount {
            address: account.address,
        });
        state.derivations.insert(account.address, account.clone());
        account
    }

    fn entry_point(&self) -> Address {
        self.contracts.entry_point
    }

    fn safe_4337_module(&self) -> Address {
        self.contracts.safe_4337_module
    }

    async fn create_user_operation(
        &self,
        account: &SmartAccountRef,
        transactions: &[MetaTransaction],
        endpoints: &ChainEndpoints,
    ) -> WardenResult<UserOperation> {
        let mut state = self.state.lock();
        state.record(CallRecord::CreateUserOperation {
            sender: account.address,
            transactions: transactions.to_vec(),
        });
        require_endpoint("rpc", &endpoints.rpc_url)?;
        require_endpoint("bundler", &endpoints.bundler_url)?;
        if self.account_address(&account.owners, account.salt) != account.address {
            return Err(WardenError::invalid(
                "account reference does not match its owners and salt",
            ));
        }

        let deployed = state.chain.accounts.get(&account.address);
        let nonce = deployed.map_or(U256::ZERO, |a| a.nonce);
        let (init_code, verification_gas) = match deployed {
            Some(_) => (Bytes::new(), VERIFICATION_GAS_LIMIT),
            None => (
                self.init_code(account),
                VERIFICATION_GAS_LIMIT + DEPLOYMENT_GAS,
            ),
        };
        let call_data = encode_multisend_call(transactions);

        Ok(UserOperation {
            sender: account.address,
            nonce,
            init_code,
            call_data,
            call_gas_limit: U256::from(CALL_GAS_LIMIT),
            verification_gas_limit: U256::from(verification_gas),
            pre_verification_gas: U256::from(PRE_VERIFICATION_GAS),
            max_fee_per_gas: U256::from(MAX_FEE_PER_GAS),
            max_priority_fee_per_gas: U256::from(MAX_PRIORITY_FEE_PER_GAS),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        })
    }

    async fn sign_with_owner_keys(
        &self,
        operation: &UserOperation,
        owner_keys: &[OwnerKey],
        chain_id: u64,
    ) -> WardenResult<Bytes> {
        if owner_keys.is_empty() {
            return Err(WardenError::invalid("no owner keys supplied"));
        }
        let window = ValidityWindow::ALWAYS;
        let digest = SafeOperation::from_user_operation(operation, window, self.contracts.entry_point)
            .signing_hash(&self.domain(chain_id));

        let mut signatures = Vec::with_capacity(owner_keys.len());
        let mut state = self.state.lock();
        state.record(CallRecord::SignWithOwnerKeys {
            sender: operation.sender,
            chain_id,
        });
        for key in owner_keys {
            let secret = keys::owner_secret(key)?;
            let address = keys::address(secret);
            state.secrets.insert(address, secret);
            signatures.push((address, keys::sign(secret, digest)));
        }
        Ok(format_safe_signature(&signatures, window))
    }

    async fn send_user_operation(
        &self,
        operation: &UserOperation,
        bundler_url: &str,
    ) -> WardenResult<B256> {
        let mut state = self.state.lock();
        state.record(CallRecord::SendUserOperation {
            operation: operation.clone(),
        });
        require_endpoint("bundler", bundler_url)?;

        let expected_nonce = state
            .chain
            .accounts
            .get(&operation.sender)
            .map_or(U256::ZERO, |a| a.nonce);
        if operation.nonce != expected_nonce {
            return Err(WardenError::operation_failed("AA25 invalid account nonce"));
        }
        if !operation.is_sponsored() {
            return Err(WardenError::operation_failed("AA21 didn't pay prefund"));
        }
        if operation.paymaster_and_data.len() < 20
            || operation.paymaster_and_data[..20] != *self.contracts.paymaster.as_slice()
        {
            return Err(WardenError::operation_failed("AA30 paymaster not deployed"));
        }
        let (owners, threshold) = self
            .signing_owners(&state, operation)
            .map_err(WardenError::operation_failed)?;
        self.verify_signature(&state, operation, &owners, threshold)
            .map_err(WardenError::operation_failed)?;

        let mut preimage = SafeOperation::from_user_operation(
            operation,
            ValidityWindow::ALWAYS,
            self.contracts.entry_point,
        )
        .struct_hash()
        .to_vec();
        preimage.extend_from_slice(&self.chain_id.to_be_bytes());
        let user_op_hash = keccak256(&preimage);
        if state.submitted.contains_key(&user_op_hash) || state.receipts.contains_key(&user_op_hash) {
            return Err(WardenError::operation_failed("AA25 duplicate user operation"));
        }

        let polls_remaining = state.faults.inclusion_delay_polls;
        state.submitted.insert(
            user_op_hash,
            SubmittedOperation {
                operation: operation.clone(),
                polls_remaining,
            },
        );
        tracing::debug!(%user_op_hash, sender = %operation.sender, "user operation accepted");
        Ok(user_op_hash)
    }

    async fn user_operation_receipt(
        &self,
        user_op_hash: B256,
        bundler_url: &str,
    ) -> WardenResult<Option<InclusionReceipt>> {
        let mut state = self.state.lock();
        state.record(CallRecord::UserOperationReceipt { user_op_hash });
        require_endpoint("bundler", bundler_url)?;

        if let Some(receipt) = state.receipts.get(&user_op_hash) {
            return Ok(Some(receipt.clone()));
        }
        let never_include = state.faults.never_include;
        let submitted = state
            .submitted
            .get_mut(&user_op_hash)
            .ok_or_else(|| WardenError::external(format!("unknown user operation {user_op_hash}")))?;
        if never_include {
            return Ok(None);
        }
        if submitted.polls_remaining > 0 {
            submitted.polls_remaining -= 1;
            return Ok(None);
        }

        let Some(submitted) = state.submitted.remove(&user_op_hash) else {
            return Ok(None);
        };
        let receipt = self.mine(&mut state, user_op_hash, &submitted.operation);
        state.receipts.insert(user_op_hash, receipt.clone());
        Ok(Some(receipt))
    }
}
