//! Envelope wire format: the signed, encrypted unit of transport between
//! agents, mirroring the (unretrieved) `uam.protocol.envelope` module's
//! shape as described by the wire fields used throughout the rest of the
//! protocol and persistence layers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::box_crypto::{decrypt_payload, decrypt_payload_anonymous, encrypt_payload, encrypt_payload_anonymous};
use crate::canonical::canonicalize;
use crate::errors::{ProtocolError, Result};
use crate::keys::deserialize_verify_key;
use crate::sign::{sign_message, verify_signature};
use crate::types::{b64_encode, utc_timestamp, MessageType, MAX_ENVELOPE_SIZE, UAM_VERSION};
use ed25519_dalek::{SigningKey, VerifyingKey};

/// A signed, encrypted envelope: the unit of transport between agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    pub message_id: Uuid,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub nonce: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub payload: String,
    pub signature: String,
}

/// Fields needed to construct a new envelope before it is signed.
pub struct NewEnvelope<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub message_type: MessageType,
    pub thread_id: Option<String>,
    pub reply_to: Option<String>,
    pub media_type: Option<String>,
    pub plaintext: &'a [u8],
}

impl Envelope {
    /// Build, encrypt, and sign a new envelope.
    ///
    /// `message_type.uses_sealed_box()` selects NaCl SealedBox (anonymous
    /// sender) over the authenticated Box variant, per the handshake flow.
    pub fn create(
        new: NewEnvelope<'_>,
        sender_signing_key: &SigningKey,
        recipient_verify_key: &VerifyingKey,
    ) -> Result<Self> {
        let payload = if new.message_type.uses_sealed_box() {
            encrypt_payload_anonymous(new.plaintext, recipient_verify_key)?
        } else {
            encrypt_payload(new.plaintext, sender_signing_key, recipient_verify_key)?
        };

        let mut nonce_bytes = [0u8; 24];
        use rand_core::RngCore;
        rand_core::OsRng.fill_bytes(&mut nonce_bytes);

        let mut envelope = Envelope {
            version: UAM_VERSION.to_string(),
            message_id: Uuid::now_v7(),
            from: new.from.to_string(),
            to: new.to.to_string(),
            message_type: new.message_type,
            nonce: b64_encode(&nonce_bytes),
            timestamp: utc_timestamp(),
            thread_id: new.thread_id,
            reply_to: new.reply_to,
            media_type: new.media_type,
            payload,
            signature: String::new(),
        };

        let signable = envelope.to_signable_json()?;
        let signature = sign_message(&canonicalize(&signable), sender_signing_key);
        envelope.signature = signature;
        Ok(envelope)
    }

    /// Serialize to the wire JSON `Value`, including the signature.
    pub fn to_wire(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))
    }

    /// Parse from a wire JSON value, rejecting anything over the size cap.
    /// Does not verify the signature; call [`Envelope::verify`] separately.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(ProtocolError::EnvelopeTooLarge {
                limit: MAX_ENVELOPE_SIZE,
                actual: bytes.len(),
            });
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))
    }

    /// Serialized size in bytes of this envelope's wire form.
    pub fn wire_size(&self) -> Result<usize> {
        Ok(serde_json::to_vec(self)
            .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))?
            .len())
    }

    fn to_signable_json(&self) -> Result<Value> {
        let mut value = serde_json::to_value(&*self)
            .map_err(|e| ProtocolError::InvalidEnvelope(e.to_string()))?;
        if let Value::Object(ref mut map) = value {
            map.remove("signature");
        }
        Ok(value)
    }

    fn signable_bytes(&self) -> Result<Vec<u8>> {
        Ok(canonicalize(&self.to_signable_json()?))
    }

    /// Verify the envelope signature against the claimed sender's public key.
    pub fn verify(&self, sender_verify_key: &VerifyingKey) -> Result<()> {
        let bytes = self.signable_bytes()?;
        verify_signature(&bytes, &self.signature, sender_verify_key)
    }

    /// Verify the signature using a base64-encoded public key string.
    pub fn verify_with_key_str(&self, sender_public_key: &str) -> Result<()> {
        let key = deserialize_verify_key(sender_public_key)?;
        self.verify(&key)
    }

    /// Decrypt the envelope payload. `sealed` must match
    /// `self.message_type.uses_sealed_box()`.
    pub fn decrypt(
        &self,
        recipient_signing_key: &SigningKey,
        sender_verify_key: &VerifyingKey,
    ) -> Result<Vec<u8>> {
        if self.message_type.uses_sealed_box() {
            decrypt_payload_anonymous(&self.payload, recipient_signing_key)
        } else {
            decrypt_payload(&self.payload, recipient_signing_key, sender_verify_key)
        }
    }

    /// Extra, non-signed keys present on the raw wire object, preserved for
    /// forward compatibility with future protocol fields. Empty for
    /// envelopes built through [`Envelope::create`].
    pub fn extra_fields(value: &Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    fn new_envelope<'a>(
        from: &'a str,
        to: &'a str,
        plaintext: &'a [u8],
    ) -> NewEnvelope<'a> {
        NewEnvelope {
            from,
            to,
            message_type: MessageType::Message,
            thread_id: None,
            reply_to: None,
            media_type: None,
            plaintext,
        }
    }

    #[test]
    fn create_verify_decrypt_round_trip() {
        let alice = generate_keypair();
        let bob = generate_keypair();

        let envelope = Envelope::create(
            new_envelope("alice::relay.test", "bob::relay.test", b"hello bob"),
            &alice,
            &bob.verifying_key(),
        )
        .unwrap();

        envelope.verify(&alice.verifying_key()).unwrap();
        let plaintext = envelope.decrypt(&bob, &alice.verifying_key()).unwrap();
        assert_eq!(plaintext, b"hello bob");
    }

    #[test]
    fn handshake_request_uses_sealed_box() {
        let alice = generate_keypair();
        let bob = generate_keypair();

        let mut new = new_envelope("alice::relay.test", "bob::relay.test", b"handshake");
        new.message_type = MessageType::HandshakeRequest;

        let envelope = Envelope::create(new, &alice, &bob.verifying_key()).unwrap();
        assert!(envelope.message_type.uses_sealed_box());

        let plaintext = envelope.decrypt(&bob, &alice.verifying_key()).unwrap();
        assert_eq!(plaintext, b"handshake");
    }

    #[test]
    fn wire_round_trip_is_a_fixed_point() {
        let alice = generate_keypair();
        let bob = generate_keypair();
        let envelope = Envelope::create(
            new_envelope("alice::relay.test", "bob::relay.test", b"payload"),
            &alice,
            &bob.verifying_key(),
        )
        .unwrap();

        let wire = envelope.to_wire().unwrap();
        let reparsed = Envelope::from_wire(&wire).unwrap();
        let wire_again = reparsed.to_wire().unwrap();
        assert_eq!(wire, wire_again);
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let alice = generate_keypair();
        let bob = generate_keypair();
        let mut envelope = Envelope::create(
            new_envelope("alice::relay.test", "bob::relay.test", b"payload"),
            &alice,
            &bob.verifying_key(),
        )
        .unwrap();

        envelope.to = "mallory::relay.test".to_string();
        assert!(envelope.verify(&alice.verifying_key()).is_err());
    }

    #[test]
    fn oversized_envelope_is_rejected() {
        let huge_payload = Value::String("x".repeat(MAX_ENVELOPE_SIZE + 1));
        let mut map = Map::new();
        map.insert("version".into(), Value::String(UAM_VERSION.into()));
        map.insert("payload".into(), huge_payload);
        let value = Value::Object(map);

        let err = Envelope::from_wire(&value).unwrap_err();
        assert!(matches!(err, ProtocolError::EnvelopeTooLarge { .. }));
    }
}
