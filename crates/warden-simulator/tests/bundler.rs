//! Bundler and module behavior exercised through the effect traits.

use assert_matches::assert_matches;
use warden_core::effects::{PaymasterEffects, RecoveryModuleEffects, SmartAccountEffects};
use warden_core::{
    ChainEndpoints, MetaTransaction, PaymasterEndpoints, SmartAccountRef, UserOperation,
    WardenError, B256,
};
use warden_simulator::fixtures::{self, SANDBOX_BUNDLER_URL, SANDBOX_PAYMASTER_URL, SANDBOX_RPC_URL};
use warden_simulator::{CallRecord, SimulatedNetwork};

fn chain_endpoints() -> ChainEndpoints {
    ChainEndpoints {
        rpc_url: SANDBOX_RPC_URL.to_string(),
        bundler_url: SANDBOX_BUNDLER_URL.to_string(),
    }
}

fn paymaster_endpoints() -> PaymasterEndpoints {
    PaymasterEndpoints {
        paymaster_url: SANDBOX_PAYMASTER_URL.to_string(),
        bundler_url: SANDBOX_BUNDLER_URL.to_string(),
    }
}

struct Harness {
    sim: SimulatedNetwork,
    account: SmartAccountRef,
}

impl Harness {
    fn new() -> Self {
        let sim = SimulatedNetwork::new();
        let owner = sim.register_owner_key(&fixtures::owner_key()).unwrap();
        let account = sim.derive_account(&[owner], Default::default());
        Self { sim, account }
    }

    fn enable_batch(&self) -> Vec<MetaTransaction> {
        vec![self.sim.enable_module_tx(self.account.address)]
    }

    async fn build(&self, batch: &[MetaTransaction]) -> UserOperation {
        self.sim
            .create_user_operation(&self.account, batch, &chain_endpoints())
            .await
            .unwrap()
    }

    async fn sponsor(&self, op: UserOperation) -> UserOperation {
        self.sim
            .sponsor_user_operation(op, self.sim.entry_point(), &paymaster_endpoints())
            .await
            .unwrap()
    }

    async fn owner_sign(&self, mut op: UserOperation) -> UserOperation {
        op.signature = self
            .sim
            .sign_with_owner_keys(&op, &[fixtures::owner_key()], self.sim.chain_id())
            .await
            .unwrap();
        op
    }

    async fn include(&self, op: &UserOperation) -> B256 {
        let hash = self
            .sim
            .send_user_operation(op, SANDBOX_BUNDLER_URL)
            .await
            .unwrap();
        let receipt = self
            .sim
            .user_operation_receipt(hash, SANDBOX_BUNDLER_URL)
            .await
            .unwrap()
            .expect("mined on first poll");
        assert!(receipt.success, "unexpected revert: {:?}", receipt.revert_reason);
        hash
    }
}

#[tokio::test]
async fn first_operation_deploys_the_account() {
    let h = Harness::new();
    let op = h.build(&h.enable_batch()).await;
    assert!(!op.init_code.is_empty(), "undeployed account needs initCode");

    let op = h.owner_sign(h.sponsor(op).await).await;
    h.include(&op).await;

    assert!(h.sim.is_deployed(h.account.address));
    assert!(h.sim.module_enabled(h.account.address));

    let next = h.build(&[h.sim.finalize_recovery_tx(h.account.address)]).await;
    assert!(next.init_code.is_empty());
    assert_eq!(next.nonce, warden_core::U256::from(1));
}

#[tokio::test]
async fn signature_made_before_sponsorship_is_rejected() {
    let h = Harness::new();
    let op = h.build(&h.enable_batch()).await;
    let signed_early = h.owner_sign(op).await;
    let mut sponsored = h.sponsor(signed_early.clone()).await;
    sponsored.signature = signed_early.signature;

    let result = h.sim.send_user_operation(&sponsored, SANDBOX_BUNDLER_URL).await;
    assert_matches!(result, Err(WardenError::OperationFailed { reason }) if reason.contains("AA24"));
}

#[tokio::test]
async fn unsponsored_operation_is_rejected() {
    let h = Harness::new();
    let op = h.owner_sign(h.build(&h.enable_batch()).await).await;
    let result = h.sim.send_user_operation(&op, SANDBOX_BUNDLER_URL).await;
    assert_matches!(result, Err(WardenError::OperationFailed { reason }) if reason.contains("AA21"));
}

#[tokio::test]
async fn wrong_chain_signature_is_rejected() {
    let h = Harness::new();
    let mut op = h.sponsor(h.build(&h.enable_batch()).await).await;
    op.signature = h
        .sim
        .sign_with_owner_keys(&op, &[fixtures::owner_key()], 1)
        .await
        .unwrap();
    assert!(h.sim.send_user_operation(&op, SANDBOX_BUNDLER_URL).await.is_err());
}

#[tokio::test]
async fn reverted_batch_consumes_nonce_but_not_state() {
    let h = Harness::new();
    h.sim
        .configure_faults(|f| f.inclusion_failure = Some("execution reverted".into()));
    let op = h.owner_sign(h.sponsor(h.build(&h.enable_batch()).await).await).await;
    let hash = h.sim.send_user_operation(&op, SANDBOX_BUNDLER_URL).await.unwrap();
    let receipt = h
        .sim
        .user_operation_receipt(hash, SANDBOX_BUNDLER_URL)
        .await
        .unwrap()
        .unwrap();

    assert!(!receipt.success);
    assert_eq!(receipt.failure_reason(), "execution reverted");
    assert!(!h.sim.module_enabled(h.account.address));

    // fault is one-shot
    let retry = h.owner_sign(h.sponsor(h.build(&h.enable_batch()).await).await).await;
    assert_eq!(retry.nonce, warden_core::U256::from(1));
    h.include(&retry).await;
    assert!(h.sim.module_enabled(h.account.address));
}

#[tokio::test]
async fn delayed_inclusion_needs_extra_polls() {
    let h = Harness::new();
    h.sim.configure_faults(|f| f.inclusion_delay_polls = 2);
    let op = h.owner_sign(h.sponsor(h.build(&h.enable_batch()).await).await).await;
    let hash = h.sim.send_user_operation(&op, SANDBOX_BUNDLER_URL).await.unwrap();

    for _ in 0..2 {
        let pending = h.sim.user_operation_receipt(hash, SANDBOX_BUNDLER_URL).await;
        assert_matches!(pending, Ok(None));
    }
    let receipt = h.sim.user_operation_receipt(hash, SANDBOX_BUNDLER_URL).await.unwrap();
    assert!(receipt.is_some_and(|r| r.success));
    assert_eq!(
        h.sim
            .calls()
            .iter()
            .filter(|c| matches!(c, CallRecord::UserOperationReceipt { .. }))
            .count(),
        3
    );
}
