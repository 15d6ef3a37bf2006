//! Proposals and the participants who vote on them.

use serde::{Deserialize, Serialize};

use crate::{OptionId, OrganizationId, ParticipantId, ProposalId, Timestamp, ValidationError};

/// Fewest options a proposal may offer.
pub const MIN_OPTIONS: usize = 2;
/// Most options a proposal may offer.
pub const MAX_OPTIONS: usize = 10;

/// A member of an organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub organization: OrganizationId,
    pub joined_at: Timestamp,
}

/// A decision unit with a fixed, ordered option list. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    id: ProposalId,
    organization: OrganizationId,
    title: String,
    options: Vec<String>,
    created_at: Timestamp,
    deadline: Timestamp,
}

impl Proposal {
    pub fn new(
        id: ProposalId,
        organization: OrganizationId,
        title: impl Into<String>,
        options: Vec<String>,
        created_at: Timestamp,
        deadline: Timestamp,
    ) -> Result<Self, ValidationError> {
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
            return Err(ValidationError::OptionCount {
                min: MIN_OPTIONS,
                max: MAX_OPTIONS,
                got: options.len(),
            });
        }
        if options.iter().any(|o| o.trim().is_empty()) {
            return Err(ValidationError::EmptyOptionLabel);
        }
        if deadline <= created_at {
            return Err(ValidationError::DeadlineBeforeCreation {
                created_at: created_at.as_secs(),
                deadline: deadline.as_secs(),
            });
        }
        Ok(Self {
            id,
            organization,
            title: title.into(),
            options,
            created_at,
            deadline,
        })
    }

    pub fn id(&self) -> ProposalId {
        self.id
    }

    pub fn organization(&self) -> &OrganizationId {
        &self.organization
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// Option ids in display order (`1..=len`).
    pub fn option_ids(&self) -> impl Iterator<Item = OptionId> + '_ {
        (1..=self.options.len() as u16).map(OptionId::new)
    }

    pub fn has_option(&self, option: OptionId) -> bool {
        option.get() >= 1 && usize::from(option.get()) <= self.options.len()
    }

    pub fn label(&self, option: OptionId) -> Option<&str> {
        if !self.has_option(option) {
            return None;
        }
        self.options
            .get(usize::from(option.get()) - 1)
            .map(String::as_str)
    }

    /// Voting is over once the deadline is reached.
    pub fn is_closed(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrganizationId {
        OrganizationId::new("acme").unwrap()
    }

    fn options(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn option_count_bounds() {
        let make = |n| {
            Proposal::new(
                ProposalId::new(1),
                org(),
                "t",
                options(n),
                Timestamp::new(0),
                Timestamp::new(10),
            )
        };
        assert!(matches!(make(1), Err(ValidationError::OptionCount { got: 1, .. })));
        assert!(make(2).is_ok());
        assert!(make(10).is_ok());
        assert!(matches!(make(11), Err(ValidationError::OptionCount { got: 11, .. })));
    }

    #[test]
    fn deadline_must_follow_creation() {
        let err = Proposal::new(
            ProposalId::new(1),
            org(),
            "t",
            options(2),
            Timestamp::new(10),
            Timestamp::new(10),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::DeadlineBeforeCreation { .. }));
    }

    #[test]
    fn options_are_one_based() {
        let p = Proposal::new(
            ProposalId::new(1),
            org(),
            "t",
            vec!["yes".into(), "no".into()],
            Timestamp::new(0),
            Timestamp::new(10),
        )
        .unwrap();
        assert!(!p.has_option(OptionId::new(0)));
        assert_eq!(p.label(OptionId::new(1)), Some("yes"));
        assert_eq!(p.label(OptionId::new(2)), Some("no"));
        assert_eq!(p.label(OptionId::new(3)), None);
        assert_eq!(p.option_ids().count(), 2);
    }

    #[test]
    fn closes_at_deadline() {
        let p = Proposal::new(
            ProposalId::new(1),
            org(),
            "t",
            options(2),
            Timestamp::new(0),
            Timestamp::new(100),
        )
        .unwrap();
        assert!(!p.is_closed(Timestamp::new(99)));
        assert!(p.is_closed(Timestamp::new(100)));
    }
}
