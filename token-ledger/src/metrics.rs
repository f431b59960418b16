//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `token_invocations_committed_total` - Invocations whose write-set committed
//! - `token_invocations_aborted_total` - Failed invocations, by error kind
//! - `token_claims_total` - Successful claims
//! - `token_transfers_total` - Successful transfers
//! - `token_event_delivery_failures_total` - Committed invocations whose events were not delivered
//! - `token_invocation_duration_seconds` - Histogram of invocation latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed invocations
    pub committed_total: IntCounter,

    /// Aborted invocations by error kind
    pub aborted_total: IntCounterVec,

    /// Successful claims
    pub claims_total: IntCounter,

    /// Successful transfers
    pub transfers_total: IntCounter,

    /// Committed invocations whose events were not delivered
    pub event_failures_total: IntCounter,

    /// Invocation duration histogram
    pub invocation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let committed_total = IntCounter::new(
            "token_invocations_committed_total",
            "Invocations whose write-set committed",
        )?;
        registry.register(Box::new(committed_total.clone()))?;

        let aborted_total = IntCounterVec::new(
            Opts::new(
                "token_invocations_aborted_total",
                "Failed invocations, by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(aborted_total.clone()))?;

        let claims_total = IntCounter::new("token_claims_total", "Successful claims")?;
        registry.register(Box::new(claims_total.clone()))?;

        let transfers_total = IntCounter::new("token_transfers_total", "Successful transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let event_failures_total = IntCounter::new(
            "token_event_delivery_failures_total",
            "Committed invocations whose events were not delivered",
        )?;
        registry.register(Box::new(event_failures_total.clone()))?;

        let invocation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "token_invocation_duration_seconds",
                "Histogram of invocation latencies",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(invocation_duration.clone()))?;

        Ok(Self {
            committed_total,
            aborted_total,
            claims_total,
            transfers_total,
            event_failures_total,
            invocation_duration,
            registry,
        })
    }

    /// Record a committed invocation
    pub fn record_commit(&self) {
        self.committed_total.inc();
    }

    /// Record a failed invocation
    pub fn record_abort(&self, kind: &str) {
        self.aborted_total.with_label_values(&[kind]).inc();
    }

    /// Record a successful claim
    pub fn record_claim(&self) {
        self.claims_total.inc();
    }

    /// Record a successful transfer
    pub fn record_transfer(&self) {
        self.transfers_total.inc();
    }

    /// Record an event delivery failure after commit
    pub fn record_event_failure(&self) {
        self.event_failures_total.inc();
    }

    /// Record invocation duration
    pub fn record_duration(&self, duration_seconds: f64) {
        self.invocation_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("committed_total", &self.committed_total.get())
            .field("claims_total", &self.claims_total.get())
            .field("transfers_total", &self.transfers_total.get())
            .finish_non_exhaustive()
    }
}
