//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ValidationError;

/// Longest accepted identifier, in bytes. Two identifiers and a separator
/// must fit in one LMDB key of at most 511 bytes.
pub const MAX_ID_BYTES: usize = 255;

fn validate_identifier(s: String) -> Result<String, ValidationError> {
    if s.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier);
    }
    if s.len() > MAX_ID_BYTES {
        return Err(ValidationError::IdentifierTooLong {
            max: MAX_ID_BYTES,
            got: s.len(),
        });
    }
    // NUL separates organization from participant in membership keys.
    if s.contains('\0') {
        return Err(ValidationError::IdentifierContainsNul);
    }
    Ok(s)
}

/// A voter, identified by a stable string such as a wallet address.
///
/// Immutable after profile creation; the resolver only sees it as a graph node.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        validate_identifier(raw.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

/// The organization a participant and a proposal belong to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        validate_identifier(raw.into()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrganizationId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric proposal identifier. Stored big-endian so keys sort by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProposalId(u64);

impl ProposalId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based position of an option within its proposal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OptionId(u16);

impl OptionId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_participant_rejected() {
        assert_eq!(ParticipantId::new("  "), Err(ValidationError::EmptyIdentifier));
        assert!(ParticipantId::new("0xabc").is_ok());
    }

    #[test]
    fn identifiers_fit_a_store_key() {
        let longest = "a".repeat(MAX_ID_BYTES);
        assert!(ParticipantId::new(longest.clone()).is_ok());
        assert!(OrganizationId::new(longest).is_ok());
        assert_eq!(
            ParticipantId::new("é".repeat(128)),
            Err(ValidationError::IdentifierTooLong { max: MAX_ID_BYTES, got: 256 })
        );
        assert_eq!(OrganizationId::new("acme\0x"), Err(ValidationError::IdentifierContainsNul));
        assert_eq!(ParticipantId::new("p\01"), Err(ValidationError::IdentifierContainsNul));
    }

    #[test]
    fn deserializing_applies_the_same_checks() {
        let err = serde_json::from_str::<OrganizationId>("\"acme\\u0000\"").unwrap_err();
        assert!(err.to_string().contains("NUL"));
        let ok: ParticipantId = serde_json::from_str("\"0xabc\"").unwrap();
        assert_eq!(ok.as_str(), "0xabc");
    }

    #[test]
    fn proposal_id_keys_sort_numerically() {
        let a = ProposalId::new(2).to_be_bytes();
        let b = ProposalId::new(256).to_be_bytes();
        assert!(a < b);
        assert_eq!(ProposalId::from_be_bytes(b), ProposalId::new(256));
    }
}
