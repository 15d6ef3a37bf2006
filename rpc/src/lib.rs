//! JSON admin API for a liquid-democracy node.
//!
//! Provides endpoints for:
//! - Participant registration and proposal creation
//! - Vote and delegation submission
//! - Triggering resolution and reading tallies and audits
//! - Manual backup snapshots
//! - Prometheus metrics

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{RpcError, RpcResult};
pub use routes::router;
pub use server::RpcServer;
pub use state::RpcState;
