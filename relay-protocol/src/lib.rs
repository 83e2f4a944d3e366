//! Wire format, crypto primitives, and identity documents for the agent
//! messaging relay.
//!
//! This crate never interprets message plaintext; it only builds, signs,
//! verifies, encrypts, and decrypts envelopes and contact cards on behalf of
//! callers who hold the relevant Ed25519 keys.

pub mod address;
pub mod box_crypto;
pub mod canonical;
pub mod contact;
pub mod envelope;
pub mod errors;
pub mod keys;
pub mod sign;
pub mod types;

pub use address::{parse_address, Address};
pub use contact::{ContactCard, NewContactCardOptions};
pub use envelope::{Envelope, NewEnvelope};
pub use errors::{ProtocolError, Result};
pub use types::{MessageType, MAX_ENVELOPE_SIZE, UAM_VERSION};
