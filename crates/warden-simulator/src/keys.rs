//! Simulated secp256k1 stand-in.
//!
//! Keys, addresses and signatures are keccak derivations of a secret. They
//! have the right shapes (65-byte `0x04` keys, 20-byte addresses, 65-byte
//! signatures) but can only be verified by the simulator itself, which keeps
//! an address-to-secret registry.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use warden_core::{OwnerKey, WardenResult};

/// Recovery id appended to every simulated signature.
pub const SIGNATURE_V: u8 = 27;

/// Uncompressed public key for `secret`.
pub fn public_key(secret: B256) -> Bytes {
    let mut key = Vec::with_capacity(65);
    key.push(0x04);
    key.extend_from_slice(keccak256([secret.as_slice(), b"x".as_slice()].concat()).as_slice());
    key.extend_from_slice(keccak256([secret.as_slice(), b"y".as_slice()].concat()).as_slice());
    key.into()
}

/// Address of the public key for `secret`.
pub fn address(secret: B256) -> Address {
    let key = public_key(secret);
    Address::from_slice(&keccak256(&key[1..])[12..])
}

/// Deterministic 65-byte signature over `digest`.
pub fn sign(secret: B256, digest: B256) -> Bytes {
    let mut sig = Vec::with_capacity(65);
    sig.extend_from_slice(keccak256([secret.as_slice(), digest.as_slice()].concat()).as_slice());
    sig.extend_from_slice(
        keccak256([secret.as_slice(), digest.as_slice(), [1u8].as_slice()].concat()).as_slice(),
    );
    sig.push(SIGNATURE_V);
    sig.into()
}

/// Secret backing an owner private key.
pub fn owner_secret(key: &OwnerKey) -> WardenResult<B256> {
    Ok(keccak256(key.to_bytes()?.as_slice()))
}

/// Address the simulator assigns to an owner private key.
pub fn owner_address(key: &OwnerKey) -> WardenResult<Address> {
    Ok(address(owner_secret(key)?))
}

/// Derive a named secret, used for minted keys and fixtures.
pub fn derive_secret(label: &str, index: u64) -> B256 {
    keccak256([label.as_bytes(), index.to_be_bytes().as_slice()].concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::SignerIdentity;

    #[test]
    fn key_and_address_agree_with_signer_identity() {
        let secret = derive_secret("guardian", 0);
        let identity = SignerIdentity::new(public_key(secret), "token");
        assert!(identity.is_usable());
        assert_eq!(identity.address().unwrap(), address(secret));
    }

    #[test]
    fn signatures_bind_secret_and_digest() {
        let a = derive_secret("a", 0);
        let b = derive_secret("b", 0);
        let digest = B256::repeat_byte(7);
        assert_eq!(sign(a, digest).len(), 65);
        assert_ne!(sign(a, digest), sign(b, digest));
        assert_ne!(sign(a, digest), sign(a, B256::repeat_byte(8)));
    }
}
