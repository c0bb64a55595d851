//! Keccak-256 hashing and sender derivation

use crate::types::Address;
use k256::ecdsa::SigningKey;
use primitive_types::H256;
use sha3::{Digest, Keccak256};

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256(hasher.finalize().into())
}

/// Derive the sender address of a fixture's `secretKey`
pub fn secret_key_to_address(secret: &H256) -> Result<Address, String> {
    let key = SigningKey::from_slice(secret.as_bytes())
        .map_err(|e| format!("invalid secret key: {}", e))?;

    // Uncompressed point is 0x04 || x || y; hash the 64 coordinate bytes
    let encoded = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);

    Ok(Address::from_slice(&hash.as_bytes()[12..]))
}
