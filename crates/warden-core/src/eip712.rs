//! EIP-712 view of a user operation as the Safe 4337 module verifies it.
//!
//! The module recomputes the `SafeOp` struct hash under a domain made of the
//! chain id and the module address, so every field here must match what the
//! module reads from the submitted operation.

use crate::account::UserOperation;
use alloy_primitives::aliases::U48;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{eip712_domain, sol, sol_data, SolStruct, SolType};
use serde::{Deserialize, Serialize};

sol! {
    /// `SafeOp` as hashed by the Safe 4337 module for entry point v0.6
    #[derive(Debug, PartialEq, Eq)]
    struct SafeOp {
        address safe;
        uint256 nonce;
        bytes initCode;
        bytes callData;
        uint256 callGasLimit;
        uint256 verificationGasLimit;
        uint256 preVerificationGas;
        uint256 maxFeePerGas;
        uint256 maxPriorityFeePerGas;
        bytes paymasterAndData;
        uint48 validAfter;
        uint48 validUntil;
        address entryPoint;
    }
}

/// Packed `validAfter || validUntil || signatures` layout.
type SafeSignatureLayout = (sol_data::Uint<48>, sol_data::Uint<48>, sol_data::Bytes);

/// Bytes taken by the two `uint48` window fields of a formatted signature.
const WINDOW_LEN: usize = 12;

/// Signing domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Domain {
    /// Chain the signature is valid on
    pub chain_id: u64,
    /// Module that verifies the signature
    pub verifying_contract: Address,
}

impl Eip712Domain {
    fn to_sol(self) -> alloy_sol_types::Eip712Domain {
        eip712_domain! {
            chain_id: self.chain_id,
            verifying_contract: self.verifying_contract,
        }
    }

    /// Domain separator hash.
    pub fn separator(&self) -> B256 {
        self.to_sol().separator()
    }
}

/// Validity window attached to a Safe signature. `0/0` means always valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// Earliest valid timestamp (seconds)
    pub valid_after: u64,
    /// Latest valid timestamp (seconds), zero for no expiry
    pub valid_until: u64,
}

impl ValidityWindow {
    /// The unrestricted window.
    pub const ALWAYS: Self = Self {
        valid_after: 0,
        valid_until: 0,
    };
}

/// The `SafeOp` typed-data message reconstructed from a user operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeOperation {
    pub safe: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub valid_after: u64,
    pub valid_until: u64,
    pub entry_point: Address,
}

impl SafeOperation {
    /// Rebuild the typed view of `op`: `sender` becomes `safe`, the signature
    /// is dropped and the validity window and entry point are added.
    pub fn from_user_operation(
        op: &UserOperation,
        window: ValidityWindow,
        entry_point: Address,
    ) -> Self {
        Self {
            safe: op.sender,
            nonce: op.nonce,
            init_code: op.init_code.clone(),
            call_data: op.call_data.clone(),
            call_gas_limit: op.call_gas_limit,
            verification_gas_limit: op.verification_gas_limit,
            pre_verification_gas: op.pre_verification_gas,
            max_fee_per_gas: op.max_fee_per_gas,
            max_priority_fee_per_gas: op.max_priority_fee_per_gas,
            paymaster_and_data: op.paymaster_and_data.clone(),
            valid_after: window.valid_after,
            valid_until: window.valid_until,
            entry_point,
        }
    }

    fn to_sol(&self) -> SafeOp {
        SafeOp {
            safe: self.safe,
            nonce: self.nonce,
            initCode: self.init_code.clone(),
            callData: self.call_data.clone(),
            callGasLimit: self.call_gas_limit,
            verificationGasLimit: self.verification_gas_limit,
            preVerificationGas: self.pre_verification_gas,
            maxFeePerGas: self.max_fee_per_gas,
            maxPriorityFeePerGas: self.max_priority_fee_per_gas,
            paymasterAndData: self.paymaster_and_data.clone(),
            validAfter: U48::saturating_from(self.valid_after),
            validUntil: U48::saturating_from(self.valid_until),
            entryPoint: self.entry_point,
        }
    }

    /// `hashStruct(SafeOp)`.
    pub fn struct_hash(&self) -> B256 {
        self.to_sol().eip712_hash_struct()
    }

    /// Final digest `keccak256(0x1901 || domainSeparator || structHash)`.
    pub fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        self.to_sol().eip712_signing_hash(&domain.to_sol())
    }
}

/// Encode signatures into the layout the Safe 4337 module expects:
/// `validAfter(uint48) || validUntil(uint48) || sig_1 || ... || sig_n`,
/// with signatures ordered by ascending signer address.
pub fn format_safe_signature(
    signatures: &[(Address, Bytes)],
    window: ValidityWindow,
) -> Bytes {
    let mut sorted: Vec<&(Address, Bytes)> = signatures.iter().collect();
    sorted.sort_by_key(|(signer, _)| *signer);
    let joined: Vec<u8> = sorted
        .into_iter()
        .flat_map(|(_, signature)| signature.iter().copied())
        .collect();

    <SafeSignatureLayout as SolType>::abi_encode_packed(&(
        U48::saturating_from(window.valid_after),
        U48::saturating_from(window.valid_until),
        Bytes::from(joined),
    ))
    .into()
}

/// Split a formatted signature back into its window and signature bytes.
///
/// Packed encodings carry no length prefixes, so the window is read off the
/// fixed 12-byte head.
pub fn parse_safe_signature(formatted: &[u8]) -> Option<(ValidityWindow, &[u8])> {
    if formatted.len() < WINDOW_LEN {
        return None;
    }
    let read = |bytes: &[u8]| U48::try_from_be_slice(bytes).map(|v| v.to::<u64>());
    let window = ValidityWindow {
        valid_after: read(&formatted[..6])?,
        valid_until: read(&formatted[6..WINDOW_LEN])?,
    };
    Some((window, &formatted[WINDOW_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_op() -> UserOperation {
        UserOperation {
            sender: Address::repeat_byte(0x5a),
            nonce: U256::from(3),
            init_code: Bytes::new(),
            call_data: vec![1, 2, 3].into(),
            call_gas_limit: U256::from(100_000),
            verification_gas_limit: U256::from(200_000),
            pre_verification_gas: U256::from(50_000),
            max_fee_per_gas: U256::from(30),
            max_priority_fee_per_gas: U256::from(2),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        }
    }

    fn domain() -> Eip712Domain {
        Eip712Domain {
            chain_id: 11_155_111,
            verifying_contract: Address::repeat_byte(0x45),
        }
    }

    #[test]
    fn typed_view_uses_sender_as_safe() {
        let op = sample_op();
        let entry_point = Address::repeat_byte(0xe9);
        let view = SafeOperation::from_user_operation(&op, ValidityWindow::ALWAYS, entry_point);
        assert_eq!(view.safe, op.sender);
        assert_eq!(view.valid_after, 0);
        assert_eq!(view.valid_until, 0);
        assert_eq!(view.entry_point, entry_point);
    }

    #[test]
    fn digest_covers_paymaster_fields() {
        let entry_point = Address::repeat_byte(0xe9);
        let mut op = sample_op();
        let before = SafeOperation::from_user_operation(&op, ValidityWindow::ALWAYS, entry_point)
            .signing_hash(&domain());
        op.paymaster_and_data = vec![0xaa; 20].into();
        let after = SafeOperation::from_user_operation(&op, ValidityWindow::ALWAYS, entry_point)
            .signing_hash(&domain());
        assert_ne!(before, after);
    }

    #[test]
    fn digest_ignores_existing_signature() {
        let entry_point = Address::repeat_byte(0xe9);
        let mut op = sample_op();
        let before = SafeOperation::from_user_operation(&op, ValidityWindow::ALWAYS, entry_point)
            .signing_hash(&domain());
        op.signature = vec![9; 65].into();
        let after = SafeOperation::from_user_operation(&op, ValidityWindow::ALWAYS, entry_point)
            .signing_hash(&domain());
        assert_eq!(before, after);
    }

    #[test]
    fn type_string_matches_safe_4337_module() {
        assert_eq!(
            SafeOp::eip712_encode_type(),
            "SafeOp(address safe,uint256 nonce,bytes initCode,bytes callData,\
uint256 callGasLimit,uint256 verificationGasLimit,uint256 preVerificationGas,\
uint256 maxFeePerGas,uint256 maxPriorityFeePerGas,bytes paymasterAndData,\
uint48 validAfter,uint48 validUntil,address entryPoint)"
        );
    }

    #[test]
    fn domain_binds_chain_and_module() {
        let mut other = domain();
        other.chain_id = 1;
        assert_ne!(domain().separator(), other.separator());
    }

    #[test]
    fn signatures_sorted_by_signer() {
        let low = Address::repeat_byte(0x01);
        let high = Address::repeat_byte(0xf0);
        let formatted = format_safe_signature(
            &[(high, vec![0xbb; 2].into()), (low, vec![0xaa; 2].into())],
            ValidityWindow::ALWAYS,
        );
        assert_eq!(&formatted[..12], &[0u8; 12]);
        assert_eq!(&formatted[12..], &[0xaa, 0xaa, 0xbb, 0xbb]);
    }

    #[test]
    fn window_is_recoverable_from_formatted_signature() {
        let window = ValidityWindow {
            valid_after: 17,
            valid_until: 1_700_000_000,
        };
        let formatted = format_safe_signature(&[(Address::ZERO, vec![1; 65].into())], window);
        let (parsed, sig) = parse_safe_signature(&formatted).unwrap();
        assert_eq!(parsed, window);
        assert_eq!(sig.len(), 65);
    }
}
