//! Prometheus metrics for the voting node.
//!
//! Exposes counters, gauges, and histograms covering action submission,
//! resolution runs, and backup snapshots. The [`NodeMetrics`] struct owns a
//! dedicated [`Registry`] that the RPC `/metrics` endpoint can encode into
//! the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Vote/delegation actions written to the store.
    pub actions_accepted: IntCounter,
    /// Actions refused (closed proposal, rate limit, invalid target, ...).
    pub actions_rejected: IntCounter,
    /// Resolution runs that committed an audit and a tally.
    pub resolutions_completed: IntCounter,
    /// Resolution runs that failed after starting (validation or store).
    pub resolutions_failed: IntCounter,
    /// Resolution triggers refused up front (already resolved, in flight, still open).
    pub resolutions_rejected: IntCounter,
    /// Backup snapshots written.
    pub snapshots_taken: IntCounter,
    /// Backup snapshots that could not be written.
    pub snapshots_failed: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Resolutions currently running.
    pub resolutions_in_flight: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of a resolution run, in milliseconds.
    pub resolution_duration_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let actions_accepted = register_int_counter_with_registry!(
            Opts::new("liquid_actions_accepted_total", "Vote and delegation actions accepted"),
            registry
        )
        .expect("failed to register actions_accepted counter");

        let actions_rejected = register_int_counter_with_registry!(
            Opts::new("liquid_actions_rejected_total", "Vote and delegation actions rejected"),
            registry
        )
        .expect("failed to register actions_rejected counter");

        let resolutions_completed = register_int_counter_with_registry!(
            Opts::new(
                "liquid_resolutions_completed_total",
                "Resolution runs that committed a tally"
            ),
            registry
        )
        .expect("failed to register resolutions_completed counter");

        let resolutions_failed = register_int_counter_with_registry!(
            Opts::new(
                "liquid_resolutions_failed_total",
                "Resolution runs that failed without committing a tally"
            ),
            registry
        )
        .expect("failed to register resolutions_failed counter");

        let resolutions_rejected = register_int_counter_with_registry!(
            Opts::new(
                "liquid_resolutions_rejected_total",
                "Resolution triggers refused before running"
            ),
            registry
        )
        .expect("failed to register resolutions_rejected counter");

        let snapshots_taken = register_int_counter_with_registry!(
            Opts::new("liquid_snapshots_taken_total", "Backup snapshots written"),
            registry
        )
        .expect("failed to register snapshots_taken counter");

        let snapshots_failed = register_int_counter_with_registry!(
            Opts::new("liquid_snapshots_failed_total", "Backup snapshots that failed"),
            registry
        )
        .expect("failed to register snapshots_failed counter");

        // Gauges
        let resolutions_in_flight = register_int_gauge_with_registry!(
            Opts::new("liquid_resolutions_in_flight", "Resolutions currently running"),
            registry
        )
        .expect("failed to register resolutions_in_flight gauge");

        // Histograms – exponential buckets covering 1 ms → ~16 s.
        let resolution_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "liquid_resolution_duration_ms",
                "Resolution run duration in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register resolution_duration_ms histogram");

        Self {
            registry,
            actions_accepted,
            actions_rejected,
            resolutions_completed,
            resolutions_failed,
            resolutions_rejected,
            snapshots_taken,
            snapshots_failed,
            resolutions_in_flight,
            resolution_duration_ms,
        }
    }

    /// Encode every metric in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_encoding_lists_counters() {
        let metrics = NodeMetrics::new();
        metrics.resolutions_completed.inc();
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("liquid_resolutions_completed_total 1"));
        assert!(text.contains("liquid_resolutions_in_flight 0"));
    }
}
