//! Top-level wiring of a running voting node.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use liquid_store_lmdb::LmdbEnvironment;
use liquid_types::{Clock, SystemClock};

use crate::backup::BackupCoordinator;
use crate::resolution::ResolutionCoordinator;
use crate::store_call::{BlockingStore, SharedStore};
use crate::sweeper::DeadlineSweeper;
use crate::voting::VotingService;
use crate::{NodeConfig, NodeError, NodeMetrics, ShutdownController};

/// How long [`LiquidNode::stop`] waits for background loops.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running voting node.
pub struct LiquidNode {
    pub config: NodeConfig,
    pub store: SharedStore,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    pub voting: Arc<VotingService>,
    pub resolution: Arc<ResolutionCoordinator>,
    pub backup: Arc<BackupCoordinator>,
    pub sweeper: Arc<DeadlineSweeper>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl LiquidNode {
    /// Open the LMDB environment at `config.data_dir` and build every service.
    /// Call [`start`](Self::start) to launch the background loops.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)?;
        Ok(Self::with_store(config, Arc::new(env), Arc::new(SystemClock)))
    }

    /// Build a node on an arbitrary backend and clock.
    pub fn with_store(config: NodeConfig, store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        let metrics = Arc::new(NodeMetrics::new());
        let blocking = BlockingStore::new(Arc::clone(&store), config.store_timeout());

        let voting = Arc::new(VotingService::new(
            blocking.clone(),
            Arc::clone(&clock),
            config.voting_policy(),
            Arc::clone(&metrics),
        ));
        let backup = Arc::new(BackupCoordinator::new(
            blocking.clone(),
            Arc::clone(&clock),
            Arc::clone(&metrics),
        ));
        let resolution = Arc::new(ResolutionCoordinator::new(
            blocking.clone(),
            Arc::clone(&clock),
            Arc::clone(&backup),
            Arc::clone(&metrics),
        ));
        let sweeper = Arc::new(DeadlineSweeper::new(
            blocking,
            Arc::clone(&clock),
            Arc::clone(&resolution),
            Arc::clone(&voting),
        ));

        Self {
            config,
            store,
            clock,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            voting,
            resolution,
            backup,
            sweeper,
            task_handles: Vec::new(),
        }
    }

    /// Spawn the deadline sweeper and the hourly backup loop.
    pub fn start(&mut self) {
        tracing::info!(
            data_dir = %self.config.data_dir.display(),
            sweep_interval_secs = self.config.sweep_interval_secs,
            backup_interval_secs = self.config.backup_interval_secs,
            "liquid node starting"
        );

        let sweeper = Arc::clone(&self.sweeper);
        let sweep_rx = self.shutdown.subscribe();
        let sweep_every = self.config.sweep_interval();
        self.task_handles
            .push(tokio::spawn(sweeper.run(sweep_rx, sweep_every)));

        let backup = Arc::clone(&self.backup);
        let backup_rx = self.shutdown.subscribe();
        let backup_every = self.config.backup_interval();
        self.task_handles
            .push(tokio::spawn(backup.run(backup_rx, backup_every)));

        tracing::info!("liquid node started");
    }

    pub fn is_running(&self) -> bool {
        self.task_handles.iter().any(|h| !h.is_finished())
    }

    /// Signal every loop to stop and wait for them, bounded by a timeout.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        if self.shutdown.is_triggered() && self.task_handles.is_empty() {
            return Ok(());
        }
        tracing::info!("liquid node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "background task ended abnormally");
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
            return Err(NodeError::ShutdownTimeout);
        }

        tracing::info!("liquid node stopped");
        Ok(())
    }
}
