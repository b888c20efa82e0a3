//! Smart account, meta-transaction and user operation types.

use crate::abi::IMultiSend;
use crate::{WardenError, WardenResult};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol_data, SolCall, SolType};
use serde::{Deserialize, Serialize};

/// Deterministic contract-wallet address derived from owner inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SmartAccountRef {
    /// Counterfactual account address
    pub address: Address,
    /// Owners the address was derived from
    pub owners: Vec<Address>,
    /// Salt (c2 nonce) used in the derivation
    pub salt: U256,
}

/// One contract call inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTransaction {
    /// Call target
    pub to: Address,
    /// Wei attached to the call
    pub value: U256,
    /// ABI-encoded calldata
    pub data: Bytes,
}

impl MetaTransaction {
    /// Zero-value call.
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: data.into(),
        }
    }
}

/// One packed multi-send entry: `operation, to, value, data length, data`.
type MultiSendEntry = (
    sol_data::Uint<8>,
    sol_data::Address,
    sol_data::Uint<256>,
    sol_data::Uint<256>,
    sol_data::Bytes,
);

/// Encode a batch in the packed multi-send layout.
///
/// Each entry is `operation(uint8) || to(address) || value(uint256) ||
/// len(uint256) || data`, with operation `0` (plain call). Order is preserved.
pub fn encode_multisend(transactions: &[MetaTransaction]) -> Bytes {
    transactions
        .iter()
        .flat_map(|tx| {
            <MultiSendEntry as SolType>::abi_encode_packed(&(
                0u8,
                tx.to,
                tx.value,
                U256::from(tx.data.len()),
                tx.data.clone(),
            ))
        })
        .collect::<Vec<u8>>()
        .into()
}

/// Account calldata executing `transactions` through `multiSend(bytes)`.
pub fn encode_multisend_call(transactions: &[MetaTransaction]) -> Bytes {
    IMultiSend::multiSendCall {
        transactions: encode_multisend(transactions),
    }
    .abi_encode()
    .into()
}

/// Decode account calldata produced by [`encode_multisend_call`].
pub fn decode_multisend_call(call_data: &[u8]) -> WardenResult<Vec<MetaTransaction>> {
    let call = IMultiSend::multiSendCall::abi_decode(call_data, true)?;
    decode_multisend(&call.transactions)
}

/// Decode a packed multi-send batch.
///
/// Packed encodings have no ABI decoder, so entries are walked by their
/// fixed-size header.
pub fn decode_multisend(packed: &[u8]) -> WardenResult<Vec<MetaTransaction>> {
    const HEADER: usize = 1 + 20 + 32 + 32;
    let mut transactions = Vec::new();
    let mut cursor = 0;
    while cursor < packed.len() {
        if packed.len() - cursor < HEADER {
            return Err(WardenError::invalid("truncated multi-send entry header"));
        }
        if packed[cursor] != 0 {
            return Err(WardenError::invalid("delegate calls are not supported"));
        }
        let to = Address::from_slice(&packed[cursor + 1..cursor + 21]);
        let value = U256::from_be_slice(&packed[cursor + 21..cursor + 53]);
        let len = U256::from_be_slice(&packed[cursor + 53..cursor + 85]);
        let len = usize::try_from(len)
            .map_err(|_| WardenError::invalid("multi-send data length overflows"))?;
        let start = cursor + HEADER;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= packed.len())
            .ok_or_else(|| WardenError::invalid("truncated multi-send entry data"))?;
        transactions.push(MetaTransaction {
            to,
            value,
            data: Bytes::copy_from_slice(&packed[start..end]),
        });
        cursor = end;
    }
    Ok(transactions)
}

/// ERC-4337 (entry point v0.6) user operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl UserOperation {
    /// Whether paymaster sponsorship fields are present.
    pub fn is_sponsored(&self) -> bool {
        !self.paymaster_and_data.is_empty()
    }
}

/// Endpoints threaded into account-client calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoints {
    /// JSON-RPC node URL
    pub rpc_url: String,
    /// Bundler URL
    pub bundler_url: String,
}

/// Endpoints threaded into paymaster calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterEndpoints {
    /// Paymaster URL
    pub paymaster_url: String,
    /// Bundler URL used for gas re-estimation
    pub bundler_url: String,
}

/// Outcome of a submitted user operation once included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionReceipt {
    /// User operation hash returned at submission
    pub user_op_hash: B256,
    /// Whether execution succeeded
    pub success: bool,
    /// Hash of the bundle transaction that included the operation
    pub transaction_hash: B256,
    /// Revert reason when execution failed
    pub revert_reason: Option<String>,
}

impl InclusionReceipt {
    /// Human-readable failure reason.
    pub fn failure_reason(&self) -> String {
        self.revert_reason
            .clone()
            .unwrap_or_else(|| "user operation execution reverted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn tx(seed: u8, len: usize) -> MetaTransaction {
        MetaTransaction::call(Address::repeat_byte(seed), vec![seed; len])
    }

    #[test]
    fn multisend_preserves_order() {
        let batch = vec![tx(1, 4), tx(2, 36), tx(3, 0)];
        let decoded = decode_multisend(&encode_multisend(&batch)).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn multisend_call_wraps_packed_batch() {
        let batch = vec![tx(4, 3), tx(5, 68)];
        let call_data = encode_multisend_call(&batch);
        assert_eq!(
            &call_data[..4],
            IMultiSend::multiSendCall::SELECTOR.as_slice()
        );
        assert_eq!(decode_multisend_call(&call_data).unwrap(), batch);
        assert_matches!(
            decode_multisend_call(&call_data[..4]),
            Err(WardenError::Invalid { .. })
        );
    }

    #[test]
    fn packed_entry_layout() {
        let packed = encode_multisend(&[tx(7, 2)]);
        assert_eq!(packed.len(), 1 + 20 + 32 + 32 + 2);
        assert_eq!(packed[0], 0);
        assert_eq!(&packed[1..21], Address::repeat_byte(7).as_slice());
        assert_eq!(packed[84], 2);
    }

    #[test]
    fn truncated_batch_is_rejected() {
        let packed = encode_multisend(&[tx(9, 10)]);
        assert_matches!(
            decode_multisend(&packed[..packed.len() - 1]),
            Err(WardenError::Invalid { .. })
        );
    }

    proptest! {
        #[test]
        fn multisend_order_survives_any_batch(
            seeds in proptest::collection::vec((any::<u8>(), 0usize..80), 0..8)
        ) {
            let batch: Vec<_> = seeds.iter().map(|(s, l)| tx(*s, *l)).collect();
            let decoded = decode_multisend(&encode_multisend(&batch)).unwrap();
            prop_assert_eq!(decoded, batch);
        }
    }
}
