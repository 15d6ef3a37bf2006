//! Liquid-democracy core.
//!
//! Pipeline: [`ActionSnapshot`] (point-in-time copy of a proposal's actions)
//! → [`DelegationResolver`] (classifies every participant) → [`TallyEngine`]
//! (one unit of voting power per non-abstaining participant) → [`AuditRecord`]
//! (immutable record of the run).
//!
//! Key principle: delegation transfers voting power intact. It never
//! multiplies or divides it.

pub mod audit;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod snapshot;
pub mod tally;

pub use audit::{AuditRecord, AuditStatus};
pub use error::GovernanceError;
pub use policy::{ActionSpacing, VotingPolicy};
pub use resolver::{AbstainReason, DelegationResolver, Resolution, ResolutionResult, ResolutionStats};
pub use snapshot::ActionSnapshot;
pub use tally::{TallyEngine, TallyOutcome, TallyResult};
