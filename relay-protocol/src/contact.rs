//! Contact cards: self-signed agent identity documents, mirroring
//! `uam.protocol.contact`.
//!
//! A contact card advertises an agent's address, public key, relay
//! endpoint, and optional metadata, signed by the agent's own key so any
//! recipient can verify authenticity using the embedded public key alone
//! (trust-on-first-use, no external lookup).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::address::parse_address;
use crate::canonical::canonicalize;
use crate::errors::{ProtocolError, Result};
use crate::keys::{deserialize_verify_key, public_key_fingerprint, serialize_verify_key};
use crate::sign::{sign_message, verify_signature};
use crate::types::UAM_VERSION;
use ed25519_dalek::SigningKey;

const DEFAULT_PAYLOAD_FORMATS: &[&str] = &["text/plain", "text/markdown"];

/// A self-signed agent identity card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactCard {
    pub version: String,
    pub address: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_endpoint: Option<String>,
    pub relay: String,
    pub public_key: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_formats: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Optional fields accepted when creating a new contact card.
#[derive(Default)]
pub struct NewContactCardOptions {
    pub description: Option<String>,
    pub system: Option<String>,
    pub connection_endpoint: Option<String>,
    pub verified_domain: Option<String>,
    pub payload_formats: Option<Vec<String>>,
}

/// The subset of fields that are actually signed: everything except
/// `signature`, the auto-derived `fingerprint`, and `payload_formats` (which
/// can change without re-signing, since it is advisory metadata).
fn build_signable(card: &ContactCard) -> Value {
    let mut map = Map::new();
    map.insert("version".into(), Value::String(card.version.clone()));
    map.insert("address".into(), Value::String(card.address.clone()));
    map.insert(
        "display_name".into(),
        Value::String(card.display_name.clone()),
    );
    map.insert("relay".into(), Value::String(card.relay.clone()));
    map.insert("public_key".into(), Value::String(card.public_key.clone()));
    if let Some(ref d) = card.description {
        map.insert("description".into(), Value::String(d.clone()));
    }
    if let Some(ref s) = card.system {
        map.insert("system".into(), Value::String(s.clone()));
    }
    if let Some(ref c) = card.connection_endpoint {
        map.insert("connection_endpoint".into(), Value::String(c.clone()));
    }
    if let Some(ref v) = card.verified_domain {
        map.insert("verified_domain".into(), Value::String(v.clone()));
    }
    Value::Object(map)
}

impl ContactCard {
    /// Create and self-sign a new contact card for `address`.
    ///
    /// `payload_formats` defaults to `["text/plain", "text/markdown"]`. The
    /// fingerprint is always computed as the SHA-256 hex digest of the
    /// Ed25519 public key.
    pub fn create(
        address: &str,
        display_name: &str,
        relay: &str,
        signing_key: &SigningKey,
        opts: NewContactCardOptions,
    ) -> Result<Self> {
        parse_address(address)?;

        let public_key = serialize_verify_key(&signing_key.verifying_key());
        let fingerprint = public_key_fingerprint(&signing_key.verifying_key());
        let payload_formats = opts.payload_formats.unwrap_or_else(|| {
            DEFAULT_PAYLOAD_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect()
        });

        let mut card = ContactCard {
            version: UAM_VERSION.to_string(),
            address: address.to_string(),
            display_name: display_name.to_string(),
            description: opts.description,
            system: opts.system,
            connection_endpoint: opts.connection_endpoint,
            relay: relay.to_string(),
            public_key,
            signature: String::new(),
            verified_domain: opts.verified_domain,
            payload_formats: Some(payload_formats),
            fingerprint: Some(fingerprint),
        };

        let signable = build_signable(&card);
        card.signature = sign_message(&canonicalize(&signable), signing_key);
        Ok(card)
    }

    /// Verify this card's signature using its own embedded public key.
    pub fn verify(&self) -> Result<()> {
        parse_address(&self.address)
            .map_err(|e| ProtocolError::InvalidContactCard(e.to_string()))?;
        let verify_key = deserialize_verify_key(&self.public_key)?;
        let signable = build_signable(self);
        verify_signature(&canonicalize(&signable), &self.signature, &verify_key)
    }

    /// Parse a card from its wire JSON representation, verifying its
    /// signature unless `verify` is false (for building test fixtures).
    pub fn from_wire(value: &Value, verify: bool) -> Result<Self> {
        let card: ContactCard = serde_json::from_value(value.clone())
            .map_err(|e| ProtocolError::InvalidContactCard(e.to_string()))?;
        if verify {
            card.verify()?;
        }
        Ok(card)
    }

    pub fn to_wire(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ProtocolError::InvalidContactCard(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn create_and_verify_round_trips() {
        let key = generate_keypair();
        let card = ContactCard::create(
            "alice::relay.test",
            "Alice",
            "https://relay.test",
            &key,
            NewContactCardOptions::default(),
        )
        .unwrap();

        assert!(card.verify().is_ok());
        assert_eq!(
            card.payload_formats.as_deref(),
            Some(&["text/plain".to_string(), "text/markdown".to_string()][..])
        );
        assert_eq!(card.fingerprint.as_deref().unwrap().len(), 64);
    }

    #[test]
    fn wire_round_trip_preserves_verifiability() {
        let key = generate_keypair();
        let card = ContactCard::create(
            "bob::relay.test",
            "Bob",
            "https://relay.test",
            &key,
            NewContactCardOptions::default(),
        )
        .unwrap();

        let wire = card.to_wire().unwrap();
        let reparsed = ContactCard::from_wire(&wire, true).unwrap();
        assert_eq!(reparsed.address, "bob::relay.test");
    }

    #[test]
    fn tampered_display_name_fails_verification() {
        let key = generate_keypair();
        let mut card = ContactCard::create(
            "carol::relay.test",
            "Carol",
            "https://relay.test",
            &key,
            NewContactCardOptions::default(),
        )
        .unwrap();

        card.display_name = "Mallory".to_string();
        assert!(card.verify().is_err());
    }

    #[test]
    fn payload_formats_are_not_signed() {
        let key = generate_keypair();
        let mut card = ContactCard::create(
            "dave::relay.test",
            "Dave",
            "https://relay.test",
            &key,
            NewContactCardOptions::default(),
        )
        .unwrap();

        card.payload_formats = Some(vec!["application/json".to_string()]);
        assert!(card.verify().is_ok());
    }

    #[test]
    fn rejects_invalid_address() {
        let key = generate_keypair();
        let result = ContactCard::create(
            "not a valid address",
            "Eve",
            "https://relay.test",
            &key,
            NewContactCardOptions::default(),
        );
        assert!(result.is_err());
    }
}
