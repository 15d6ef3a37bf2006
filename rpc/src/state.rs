//! Shared handler state.

use std::sync::Arc;

use liquid_node::{BackupCoordinator, LiquidNode, NodeMetrics, ResolutionCoordinator, VotingService};

#[derive(Clone)]
pub struct RpcState {
    pub voting: Arc<VotingService>,
    pub resolution: Arc<ResolutionCoordinator>,
    pub backup: Arc<BackupCoordinator>,
    pub metrics: Arc<NodeMetrics>,
}

impl RpcState {
    pub fn from_node(node: &LiquidNode) -> Self {
        Self {
            voting: Arc::clone(&node.voting),
            resolution: Arc::clone(&node.resolution),
            backup: Arc::clone(&node.backup),
            metrics: Arc::clone(&node.metrics),
        }
    }
}
