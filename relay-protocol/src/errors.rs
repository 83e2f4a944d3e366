//! Protocol-level exception hierarchy, mirroring `uam.protocol.errors`.

use thiserror::Error;

/// Base error type for all protocol-layer failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("envelope exceeds {limit} bytes ({actual} bytes)")]
    EnvelopeTooLarge { limit: usize, actual: usize },

    #[error("signature error: {0}")]
    Signature(String),

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed")]
    Decryption,

    #[error("invalid contact card: {0}")]
    InvalidContactCard(String),

    #[error("pinned key mismatch for contact")]
    KeyPinning,
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
