//! Ed25519 signing and verification, mirroring `uam.protocol.crypto`'s
//! signing functions.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::errors::{ProtocolError, Result};
use crate::types::{b64_decode, b64_encode};

/// Sign `data` with the Ed25519 `signing_key`, returning a URL-safe
/// base64-encoded 64-byte signature.
pub fn sign_message(data: &[u8], signing_key: &SigningKey) -> String {
    let signature = signing_key.sign(data);
    b64_encode(&signature.to_bytes())
}

/// Verify an Ed25519 signature over `data`.
pub fn verify_signature(data: &[u8], signature_b64: &str, verify_key: &VerifyingKey) -> Result<()> {
    let sig_bytes = b64_decode(signature_b64)
        .map_err(|_| ProtocolError::SignatureVerification)?;
    let sig_arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| ProtocolError::SignatureVerification)?;
    let signature = Signature::from_bytes(&sig_arr);
    verify_key
        .verify(data, &signature)
        .map_err(|_| ProtocolError::SignatureVerification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn valid_signature_verifies() {
        let key = generate_keypair();
        let verify_key = key.verifying_key();
        let data = b"the contents of an envelope";
        let sig = sign_message(data, &key);
        assert!(verify_signature(data, &sig, &verify_key).is_ok());
    }

    #[test]
    fn tampered_data_fails_verification() {
        let key = generate_keypair();
        let verify_key = key.verifying_key();
        let sig = sign_message(b"original", &key);
        assert!(verify_signature(b"tampered", &sig, &verify_key).is_err());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let key = generate_keypair();
        let other_key = generate_keypair();
        let data = b"some payload";
        let sig = sign_message(data, &key);
        assert!(verify_signature(data, &sig, &other_key.verifying_key()).is_err());
    }

    #[test]
    fn malformed_base64_fails_verification() {
        let key = generate_keypair();
        let verify_key = key.verifying_key();
        assert!(verify_signature(b"data", "not valid base64 sig!!", &verify_key).is_err());
    }
}
