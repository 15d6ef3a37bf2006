//! Value encoding and composite key layout.
//!
//! Values are bincode. Keys that belong to a proposal start with the
//! proposal id in big-endian so a proposal's rows form one contiguous range.

use liquid_types::{OrganizationId, ParticipantId, ProposalId};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::LmdbError;

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LmdbError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

/// `proposal_be ++ participant`
pub(crate) fn proposal_participant_key(proposal: ProposalId, participant: &ParticipantId) -> Vec<u8> {
    let p = participant.as_str().as_bytes();
    let mut key = Vec::with_capacity(8 + p.len());
    key.extend_from_slice(&proposal.to_be_bytes());
    key.extend_from_slice(p);
    key
}

/// `proposal_be ++ seq_be`
pub(crate) fn proposal_seq_key(proposal: ProposalId, seq: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&proposal.to_be_bytes());
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Sequence number stored in the last 8 bytes of a [`proposal_seq_key`].
pub(crate) fn seq_of(key: &[u8]) -> Result<u64, LmdbError> {
    let tail: [u8; 8] = key
        .get(8..16)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| LmdbError::Serialization(format!("malformed sequence key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(tail))
}

/// `organization ++ 0x00`, the prefix of every member key of `organization`.
pub(crate) fn organization_prefix(organization: &OrganizationId) -> Vec<u8> {
    let mut key = organization.as_str().as_bytes().to_vec();
    key.push(0);
    key
}

/// `organization ++ 0x00 ++ participant`
pub(crate) fn member_key(organization: &OrganizationId, participant: &ParticipantId) -> Vec<u8> {
    let mut key = organization_prefix(organization);
    key.extend_from_slice(participant.as_str().as_bytes());
    key
}
