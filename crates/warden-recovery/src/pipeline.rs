//! Build, sponsor, sign and submit pipeline shared by every action.

use crate::effects::WorkflowEffects;
use crate::operation::{SignedOperation, SponsoredOperation, UnsignedOperation};
use crate::signer::GuardianSigner;
use warden_core::eip712::{format_safe_signature, Eip712Domain, SafeOperation, ValidityWindow};
use warden_core::{
    ChainEndpoints, InclusionReceipt, MetaTransaction, PaymasterEndpoints, SmartAccountRef,
    WardenConfig, WardenError, WardenResult, B256,
};

/// What the bundler reported for an included operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Hash returned by the bundler at submission
    pub user_op_hash: B256,
    /// Successful inclusion receipt
    pub receipt: InclusionReceipt,
    /// Clock reading when the operation was handed to the bundler
    pub submitted_at_ms: u64,
}

/// Drives one user operation from batch to inclusion.
pub struct OperationPipeline<'a, E: WorkflowEffects> {
    effects: &'a E,
    config: &'a WardenConfig,
}

impl<'a, E: WorkflowEffects> OperationPipeline<'a, E> {
    pub fn new(effects: &'a E, config: &'a WardenConfig) -> Self {
        Self { effects, config }
    }

    /// Ask the account client for an unsigned operation executing
    /// `transactions` in order from `account`.
    pub async fn build(
        &self,
        account: &SmartAccountRef,
        transactions: Vec<MetaTransaction>,
    ) -> WardenResult<UnsignedOperation> {
        if transactions.is_empty() {
            return Err(WardenError::invalid("cannot build an empty batch"));
        }
        let endpoints = ChainEndpoints {
            rpc_url: self.config.require_rpc_url()?.to_string(),
            bundler_url: self.config.require_bundler_url()?.to_string(),
        };
        let user_op = self
            .effects
            .create_user_operation(account, &transactions, &endpoints)
            .await?;
        if user_op.sender != account.address {
            return Err(WardenError::external(format!(
                "account client built an operation for {} instead of {}",
                user_op.sender, account.address
            )));
        }
        tracing::debug!(
            account = %account.address,
            calls = transactions.len(),
            nonce = %user_op.nonce,
            "user operation built"
        );
        Ok(UnsignedOperation::new(account.clone(), transactions, user_op))
    }

    /// Attach paymaster sponsorship.
    pub async fn sponsor(&self, unsigned: UnsignedOperation) -> WardenResult<SponsoredOperation> {
        let endpoints = PaymasterEndpoints {
            paymaster_url: self.config.require_paymaster_url()?.to_string(),
            bundler_url: self.config.require_bundler_url()?.to_string(),
        };
        let original = unsigned.user_operation().clone();
        let sponsored = self
            .effects
            .sponsor_user_operation(original.clone(), self.effects.entry_point(), &endpoints)
            .await?;

        if !sponsored.is_sponsored() {
            return Err(WardenError::external(
                "paymaster returned an operation without sponsorship data",
            ));
        }
        if sponsored.sender != original.sender
            || sponsored.nonce != original.nonce
            || sponsored.call_data != original.call_data
        {
            return Err(WardenError::external(
                "paymaster altered the sender, nonce or calldata",
            ));
        }
        tracing::debug!(account = %original.sender, "user operation sponsored");
        Ok(unsigned.into_sponsored(sponsored))
    }

    /// Sign with the configured owner private key.
    pub async fn sign_with_owner(
        &self,
        sponsored: SponsoredOperation,
    ) -> WardenResult<SignedOperation> {
        let key = self.config.require_owner_private_key()?.clone();
        let chain_id = self.config.require_chain_id()?;
        let signature = self
            .effects
            .sign_with_owner_keys(sponsored.user_operation(), &[key], chain_id)
            .await?;
        Ok(sponsored.into_signed(signature))
    }

    /// Sign the `SafeOp` typed data with the guardian's key-network key.
    ///
    /// The domain is the configured chain and the Safe 4337 module, with an
    /// unrestricted validity window.
    pub async fn sign_as_guardian(
        &self,
        sponsored: SponsoredOperation,
        signer: &GuardianSigner<E>,
    ) -> WardenResult<SignedOperation> {
        let domain = Eip712Domain {
            chain_id: self.config.require_chain_id()?,
            verifying_contract: self.effects.safe_4337_module(),
        };
        let window = ValidityWindow::ALWAYS;
        let typed = SafeOperation::from_user_operation(
            sponsored.user_operation(),
            window,
            self.effects.entry_point(),
        );
        let raw = signer.sign_safe_operation(&typed, &domain).await?;
        let signature = format_safe_signature(&[(signer.address(), raw)], window);
        Ok(sponsored.into_signed(signature))
    }

    /// Submit and poll for inclusion.
    ///
    /// A receipt reporting failure, or no receipt within the configured
    /// timeout, is an `OperationFailed`.
    pub async fn submit_and_wait(&self, signed: SignedOperation) -> WardenResult<SubmissionOutcome> {
        let bundler_url = self.config.require_bundler_url()?;
        let (account, transactions, user_op) = signed.into_parts();

        let submitted_at_ms = self.effects.now_ms().await;
        let user_op_hash = self
            .effects
            .send_user_operation(&user_op, bundler_url)
            .await?;
        tracing::info!(
            account = %account.address,
            calls = transactions.len(),
            user_op_hash = %user_op_hash,
            "user operation submitted"
        );

        let poll_interval = self.config.poll_interval_ms.max(1);
        let timeout = self.config.inclusion_timeout_ms;
        loop {
            if let Some(receipt) = self
                .effects
                .user_operation_receipt(user_op_hash, bundler_url)
                .await?
            {
                if !receipt.success {
                    return Err(WardenError::operation_failed(receipt.failure_reason()));
                }
                tracing::info!(
                    user_op_hash = %user_op_hash,
                    transaction_hash = %receipt.transaction_hash,
                    "user operation included"
                );
                return Ok(SubmissionOutcome {
                    user_op_hash,
                    receipt,
                    submitted_at_ms,
                });
            }

            let elapsed = self
                .effects
                .now_ms()
                .await
                .saturating_sub(submitted_at_ms);
            if elapsed >= timeout {
                return Err(WardenError::operation_failed(format!(
                    "user operation {user_op_hash} not included within {timeout} ms"
                )));
            }
            self.effects.sleep_ms(poll_interval).await;
        }
    }
}
