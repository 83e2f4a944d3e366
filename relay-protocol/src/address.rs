//! UAM address parsing and validation, mirroring `uam.protocol.address`.
//!
//! An address has the form `agent::domain` (e.g. `alice::youam.network`).

use std::fmt;

use crate::errors::{ProtocolError, Result};

const MAX_AGENT_LEN: usize = 64;
const MAX_ADDRESS_LEN: usize = 128;

/// A parsed, always-lowercase UAM address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub agent: String,
    pub domain: String,
}

impl Address {
    pub fn full(&self) -> String {
        format!("{}::{}", self.agent, self.domain)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full())
    }
}

fn is_agent_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

fn is_domain_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'
}

fn validate_agent(agent: &str) -> bool {
    let chars: Vec<char> = agent.chars().collect();
    if chars.is_empty() || chars.len() > 63 {
        return false;
    }
    if chars.len() == 1 {
        return chars[0].is_ascii_lowercase() || chars[0].is_ascii_digit();
    }
    let first_ok = chars[0].is_ascii_lowercase() || chars[0].is_ascii_digit();
    let last_ok = {
        let l = *chars.last().unwrap();
        l.is_ascii_lowercase() || l.is_ascii_digit()
    };
    first_ok && last_ok && chars.iter().all(|&c| is_agent_char(c))
}

fn validate_domain(domain: &str) -> bool {
    let chars: Vec<char> = domain.chars().collect();
    if chars.is_empty() || chars.len() > 255 {
        return false;
    }
    let first_ok = chars[0].is_ascii_lowercase() || chars[0].is_ascii_digit();
    if chars.len() == 1 {
        return first_ok;
    }
    let last_ok = {
        let l = *chars.last().unwrap();
        l.is_ascii_lowercase() || l.is_ascii_digit()
    };
    first_ok && last_ok && chars.iter().all(|&c| is_domain_char(c))
}

/// Parse and validate a UAM address string.
///
/// Strips whitespace, lowercases, and validates format. Enforces max
/// lengths: agent <= 64 chars, full address <= 128 chars.
pub fn parse_address(raw: &str) -> Result<Address> {
    let normalized = raw.trim().to_lowercase();
    if normalized.len() > MAX_ADDRESS_LEN {
        return Err(ProtocolError::InvalidAddress(format!(
            "address exceeds {MAX_ADDRESS_LEN} characters: {raw:?}"
        )));
    }
    let Some((agent, domain)) = normalized.split_once("::") else {
        return Err(ProtocolError::InvalidAddress(format!(
            "invalid UAM address: {raw:?}"
        )));
    };
    if !validate_agent(agent) || !validate_domain(domain) {
        return Err(ProtocolError::InvalidAddress(format!(
            "invalid UAM address: {raw:?}"
        )));
    }
    if agent.len() > MAX_AGENT_LEN {
        return Err(ProtocolError::InvalidAddress(format!(
            "agent name exceeds {MAX_AGENT_LEN} characters: {raw:?}"
        )));
    }
    Ok(Address {
        agent: agent.to_string(),
        domain: domain.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_address() {
        let addr = parse_address("alice::youam.network").unwrap();
        assert_eq!(addr.agent, "alice");
        assert_eq!(addr.domain, "youam.network");
        assert_eq!(addr.full(), "alice::youam.network");
    }

    #[test]
    fn lowercases_and_trims() {
        let addr = parse_address("  Alice::YouAM.Network  ").unwrap();
        assert_eq!(addr.full(), "alice::youam.network");
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(parse_address("alice.youam.network").is_err());
    }

    #[test]
    fn rejects_agent_starting_or_ending_with_hyphen() {
        assert!(parse_address("-alice::youam.network").is_err());
        assert!(parse_address("alice-::youam.network").is_err());
    }

    #[test]
    fn rejects_overlong_address() {
        let long_domain = "a".repeat(130);
        assert!(parse_address(&format!("bob::{long_domain}")).is_err());
    }

    #[test]
    fn single_character_agent_is_valid() {
        assert!(parse_address("a::example.com").is_ok());
    }
}
