//! ECDSA public-key recovery for EIP-191 personal messages.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use snapvote_core::{eip191_digest, keccak256, Address};

use crate::error::SiweError;

/// Recover the 20-byte signer address of an EIP-191 personal-message
/// signature over `message`.
///
/// `signature` is the 65-byte `r || s || v` layout; `v` may be 0/1 or the
/// legacy 27/28.
pub fn recover_address(message: &[u8], signature: &[u8; 65]) -> Result<Address, SiweError> {
    let recovery_id = normalize_v(signature[64]).ok_or(SiweError::InvalidSignature)?;
    let recovery_id = RecoveryId::try_from(recovery_id).map_err(|_| SiweError::InvalidSignature)?;
    let sig =
        Signature::try_from(&signature[..64]).map_err(|_| SiweError::InvalidSignature)?;

    let digest = eip191_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| SiweError::InvalidSignature)?;

    Ok(pubkey_to_address(&key))
}

/// Derive an address from an uncompressed secp256k1 public key:
/// low 20 bytes of `keccak256(pubkey)` with the 0x04 tag stripped.
pub fn pubkey_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    out
}

fn normalize_v(v: u8) -> Option<u8> {
    match v {
        0 | 1 => Some(v),
        27 | 28 => Some(v - 27),
        _ => None,
    }
}
