//! Key generation, serialization, and Ed25519 -> Curve25519 conversion,
//! mirroring `uam.protocol.crypto`'s key-handling functions.
//!
//! UAM identities are Ed25519 keypairs. Encryption (NaCl Box / SealedBox)
//! operates on Curve25519 keys, so every encrypting/decrypting operation
//! first converts the Ed25519 key using the standard birational map between
//! the Edwards and Montgomery curve forms (the same derivation libsodium
//! uses internally for `crypto_sign_ed25519_sk_to_curve25519`).

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256, Sha512};

use crate::errors::{ProtocolError, Result};
use crate::types::{b64_decode, b64_encode};

/// Generate a fresh Ed25519 keypair using the OS CSPRNG.
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Serialize a signing key to URL-safe base64 (its 32-byte seed).
pub fn serialize_signing_key(key: &SigningKey) -> String {
    b64_encode(&key.to_bytes())
}

/// Restore a signing key from its base64-encoded seed.
pub fn deserialize_signing_key(s: &str) -> Result<SigningKey> {
    let bytes = b64_decode(s).map_err(|e| ProtocolError::Signature(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ProtocolError::Signature("signing key must be 32 bytes".into()))?;
    Ok(SigningKey::from_bytes(&arr))
}

/// Serialize a verify (public) key to URL-safe base64.
pub fn serialize_verify_key(key: &VerifyingKey) -> String {
    b64_encode(key.as_bytes())
}

/// Restore a verify key from its base64 encoding.
pub fn deserialize_verify_key(s: &str) -> Result<VerifyingKey> {
    let bytes = b64_decode(s).map_err(|e| ProtocolError::Signature(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ProtocolError::Signature("verify key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| ProtocolError::Signature(e.to_string()))
}

/// SHA-256 hex digest of the verify key bytes; serves as the agent's
/// identity fingerprint.
pub fn public_key_fingerprint(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)
}

/// Convert an Ed25519 verify key to its Curve25519 (Montgomery) public key,
/// for use with NaCl Box / SealedBox.
pub fn to_curve25519_public(key: &VerifyingKey) -> Result<x25519_dalek::PublicKey> {
    let compressed = CompressedEdwardsY(*key.as_bytes());
    let edwards = compressed
        .decompress()
        .ok_or_else(|| ProtocolError::Signature("invalid Ed25519 public key point".into()))?;
    let montgomery = edwards.to_montgomery();
    Ok(x25519_dalek::PublicKey::from(montgomery.to_bytes()))
}

/// Convert an Ed25519 signing key to its Curve25519 (Montgomery) private key,
/// for use with NaCl Box / SealedBox.
///
/// Follows the standard derivation: SHA-512 the 32-byte seed, clamp the
/// first half, and use it directly as the X25519 scalar.
pub fn to_curve25519_secret(key: &SigningKey) -> x25519_dalek::StaticSecret {
    let hash = Sha512::digest(key.to_bytes());
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&hash[..32]);
    x25519_dalek::StaticSecret::from(scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_key_round_trips_through_base64() {
        let key = generate_keypair();
        let encoded = serialize_signing_key(&key);
        let decoded = deserialize_signing_key(&encoded).unwrap();
        assert_eq!(key.to_bytes(), decoded.to_bytes());
    }

    #[test]
    fn verify_key_round_trips_through_base64() {
        let key = generate_keypair();
        let verify_key = key.verifying_key();
        let encoded = serialize_verify_key(&verify_key);
        let decoded = deserialize_verify_key(&encoded).unwrap();
        assert_eq!(verify_key, decoded);
    }

    #[test]
    fn fingerprint_is_64_hex_chars_and_stable() {
        let key = generate_keypair();
        let verify_key = key.verifying_key();
        let fp1 = public_key_fingerprint(&verify_key);
        let fp2 = public_key_fingerprint(&verify_key);
        assert_eq!(fp1.len(), 64);
        assert_eq!(fp1, fp2);
        assert!(fp1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn curve25519_conversion_produces_matching_keypair() {
        let signing_key = generate_keypair();
        let verify_key = signing_key.verifying_key();

        let curve_secret = to_curve25519_secret(&signing_key);
        let curve_public_from_secret = x25519_dalek::PublicKey::from(&curve_secret);
        let curve_public_from_verify = to_curve25519_public(&verify_key).unwrap();

        assert_eq!(
            curve_public_from_secret.as_bytes(),
            curve_public_from_verify.as_bytes()
        );
    }

    #[test]
    fn rejects_malformed_base64_length() {
        assert!(deserialize_signing_key("not-32-bytes").is_err());
    }
}
