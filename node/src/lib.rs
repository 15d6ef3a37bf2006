//! Liquid-democracy voting node.
//!
//! The node is the central coordinator that:
//! - Registers participants and creates proposals
//! - Validates and records votes and delegations
//! - Resolves delegation chains and tallies proposals once they close
//! - Keeps best-effort backup snapshots of raw voting state
//! - Runs the deadline sweeper and the hourly backup loop

pub mod backup;
pub mod config;
pub mod error;
pub mod locks;
pub mod metrics;
pub mod node;
pub mod resolution;
pub mod shutdown;
pub mod store_call;
pub mod sweeper;
pub mod tracing_spans;
pub mod voting;

pub use backup::BackupCoordinator;
pub use config::NodeConfig;
pub use error::NodeError;
pub use metrics::NodeMetrics;
pub use node::LiquidNode;
pub use resolution::{ResolutionCoordinator, ResolutionOutcome, ResolveRequest, ResolveTrigger};
pub use shutdown::ShutdownController;
pub use store_call::{BlockingStore, SharedStore};
pub use sweeper::{DeadlineSweeper, SweepReport};
pub use voting::{ActionReceipt, VotingService};
