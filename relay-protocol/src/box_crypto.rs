//! NaCl Box (authenticated) and SealedBox (anonymous) encryption, mirroring
//! the encryption half of `uam.protocol.crypto`.
//!
//! Both operate on Curve25519 keys derived from the caller's Ed25519
//! identity via [`crate::keys`]. Ciphertext is encoded as the 24-byte nonce
//! followed by the sealed bytes, then base64, matching PyNaCl's
//! `Box.encrypt()` wire format.

use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::errors::{ProtocolError, Result};
use crate::keys::{to_curve25519_public, to_curve25519_secret};
use crate::types::{b64_decode, b64_encode};

const NONCE_LEN: usize = 24;

fn secret_key_from_dalek(secret: &x25519_dalek::StaticSecret) -> SecretKey {
    SecretKey::from(secret.to_bytes())
}

fn public_key_from_dalek(public: &x25519_dalek::PublicKey) -> PublicKey {
    PublicKey::from(*public.as_bytes())
}

/// Encrypt `plaintext` using NaCl Box (authenticated encryption): both
/// parties are known, and the sender implicitly authenticates via key
/// exchange. Returns base64-encoded `nonce || ciphertext`.
pub fn encrypt_payload(
    plaintext: &[u8],
    sender_signing_key: &SigningKey,
    recipient_verify_key: &VerifyingKey,
) -> Result<String> {
    let sender_secret = secret_key_from_dalek(&to_curve25519_secret(sender_signing_key));
    let recipient_public = public_key_from_dalek(&to_curve25519_public(recipient_verify_key)?);
    let cipher = SalsaBox::new(&recipient_public, &sender_secret);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| ProtocolError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(b64_encode(&out))
}

/// Decrypt NaCl Box ciphertext produced by [`encrypt_payload`].
pub fn decrypt_payload(
    ciphertext_b64: &str,
    recipient_signing_key: &SigningKey,
    sender_verify_key: &VerifyingKey,
) -> Result<Vec<u8>> {
    let raw = b64_decode(ciphertext_b64).map_err(|_| ProtocolError::Decryption)?;
    if raw.len() < NONCE_LEN {
        return Err(ProtocolError::Decryption);
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);

    let recipient_secret = secret_key_from_dalek(&to_curve25519_secret(recipient_signing_key));
    let sender_public = public_key_from_dalek(
        &to_curve25519_public(sender_verify_key).map_err(|_| ProtocolError::Decryption)?,
    );
    let cipher = SalsaBox::new(&sender_public, &recipient_secret);
    let nonce = crypto_box::aead::generic_array::GenericArray::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| ProtocolError::Decryption)
}

/// Encrypt `plaintext` using NaCl SealedBox (anonymous sender): only the
/// recipient's public key is required. Used for `handshake.request`
/// messages, where the sender has no established relationship yet with the
/// recipient; envelope-level signing still authenticates the sender
/// separately.
pub fn encrypt_payload_anonymous(
    plaintext: &[u8],
    recipient_verify_key: &VerifyingKey,
) -> Result<String> {
    let recipient_public = public_key_from_dalek(&to_curve25519_public(recipient_verify_key)?);
    let sealed = recipient_public
        .seal(&mut OsRng, plaintext)
        .map_err(|e| ProtocolError::Encryption(e.to_string()))?;
    Ok(b64_encode(&sealed))
}

/// Decrypt NaCl SealedBox ciphertext produced by [`encrypt_payload_anonymous`].
pub fn decrypt_payload_anonymous(
    ciphertext_b64: &str,
    recipient_signing_key: &SigningKey,
) -> Result<Vec<u8>> {
    let raw = b64_decode(ciphertext_b64).map_err(|_| ProtocolError::Decryption)?;
    let recipient_secret = secret_key_from_dalek(&to_curve25519_secret(recipient_signing_key));
    recipient_secret.unseal(&raw).map_err(|_| ProtocolError::Decryption)
}

/// Generate 24 cryptographically random bytes, base64-encoded. Exposed for
/// components that need a standalone nonce outside of [`encrypt_payload`].
pub fn generate_nonce() -> String {
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    b64_encode(&nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn box_round_trips_between_two_parties() {
        let alice = generate_keypair();
        let bob = generate_keypair();
        let plaintext = b"hello bob, this is alice";

        let ciphertext = encrypt_payload(plaintext, &alice, &bob.verifying_key()).unwrap();
        let decrypted = decrypt_payload(&ciphertext, &bob, &alice.verifying_key()).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn box_decryption_fails_with_wrong_recipient() {
        let alice = generate_keypair();
        let bob = generate_keypair();
        let mallory = generate_keypair();
        let ciphertext = encrypt_payload(b"secret", &alice, &bob.verifying_key()).unwrap();

        assert!(decrypt_payload(&ciphertext, &mallory, &alice.verifying_key()).is_err());
    }

    #[test]
    fn sealed_box_round_trips_anonymously() {
        let bob = generate_keypair();
        let plaintext = b"anonymous handshake request";

        let ciphertext = encrypt_payload_anonymous(plaintext, &bob.verifying_key()).unwrap();
        let decrypted = decrypt_payload_anonymous(&ciphertext, &bob).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn sealed_box_decryption_fails_with_wrong_key() {
        let bob = generate_keypair();
        let mallory = generate_keypair();
        let ciphertext = encrypt_payload_anonymous(b"secret", &bob.verifying_key()).unwrap();

        assert!(decrypt_payload_anonymous(&ciphertext, &mallory).is_err());
    }

    #[test]
    fn nonce_is_24_bytes_decoded() {
        let nonce = generate_nonce();
        assert_eq!(b64_decode(&nonce).unwrap().len(), NONCE_LEN);
    }
}
