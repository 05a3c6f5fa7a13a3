//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring a ledger
//! instance. Collectors live in a per-instance registry, so any number of
//! instances can coexist in one process.
//!
//! # Metrics
//!
//! - `nesting_mints_total` - Tokens minted (plain and nested)
//! - `nesting_transfers_total` - Non-nested transfers
//! - `nesting_nest_transfers_total` - Transfers into a token slot
//! - `nesting_children_proposed_total` - Child reports appended to pending
//! - `nesting_children_accepted_total` - Children promoted to active
//! - `nesting_children_unnested_total` - Child entries removed
//! - `nesting_rejections_total` - Pending collections dropped wholesale
//! - `nesting_burns_total` - Burns initiated against this instance
//! - `nesting_burned_descendants` - Histogram of descendants per burn
//! - `nesting_live_tokens` - Tokens currently existing in this instance

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Tokens minted
    pub mints_total: IntCounter,

    /// Non-nested transfers
    pub transfers_total: IntCounter,

    /// Nested transfers
    pub nest_transfers_total: IntCounter,

    /// Child reports recorded
    pub children_proposed_total: IntCounter,

    /// Children promoted
    pub children_accepted_total: IntCounter,

    /// Child entries removed
    pub children_unnested_total: IntCounter,

    /// Pending collections dropped
    pub rejections_total: IntCounter,

    /// Burns initiated against this instance
    pub burns_total: IntCounter,

    /// Descendants burned per burn
    pub burned_descendants: Histogram,

    /// Live token count
    pub live_tokens: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let mints_total = IntCounter::new("nesting_mints_total", "Tokens minted")?;
        registry.register(Box::new(mints_total.clone()))?;

        let transfers_total =
            IntCounter::new("nesting_transfers_total", "Non-nested transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let nest_transfers_total = IntCounter::new(
            "nesting_nest_transfers_total",
            "Transfers into a token slot",
        )?;
        registry.register(Box::new(nest_transfers_total.clone()))?;

        let children_proposed_total = IntCounter::new(
            "nesting_children_proposed_total",
            "Child reports appended to pending collections",
        )?;
        registry.register(Box::new(children_proposed_total.clone()))?;

        let children_accepted_total = IntCounter::new(
            "nesting_children_accepted_total",
            "Children promoted to active collections",
        )?;
        registry.register(Box::new(children_accepted_total.clone()))?;

        let children_unnested_total = IntCounter::new(
            "nesting_children_unnested_total",
            "Child entries removed from collections",
        )?;
        registry.register(Box::new(children_unnested_total.clone()))?;

        let rejections_total = IntCounter::new(
            "nesting_rejections_total",
            "Pending collections dropped wholesale",
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let burns_total =
            IntCounter::new("nesting_burns_total", "Burns initiated against this instance")?;
        registry.register(Box::new(burns_total.clone()))?;

        let burned_descendants = Histogram::with_opts(
            HistogramOpts::new(
                "nesting_burned_descendants",
                "Descendants burned per burn",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;
        registry.register(Box::new(burned_descendants.clone()))?;

        let live_tokens = IntGauge::new(
            "nesting_live_tokens",
            "Tokens currently existing in this instance",
        )?;
        registry.register(Box::new(live_tokens.clone()))?;

        Ok(Self {
            mints_total,
            transfers_total,
            nest_transfers_total,
            children_proposed_total,
            children_accepted_total,
            children_unnested_total,
            rejections_total,
            burns_total,
            burned_descendants,
            live_tokens,
            registry,
        })
    }

    /// Record a mint
    pub fn record_mint(&self) {
        self.mints_total.inc();
        self.live_tokens.inc();
    }

    /// Record a transfer
    pub fn record_transfer(&self, nested: bool) {
        if nested {
            self.nest_transfers_total.inc();
        } else {
            self.transfers_total.inc();
        }
    }

    /// Record a child report
    pub fn record_child_proposed(&self) {
        self.children_proposed_total.inc();
    }

    /// Record a child promotion
    pub fn record_child_accepted(&self) {
        self.children_accepted_total.inc();
    }

    /// Record a child removal
    pub fn record_child_unnested(&self) {
        self.children_unnested_total.inc();
    }

    /// Record a wholesale pending rejection
    pub fn record_reject_all(&self) {
        self.rejections_total.inc();
    }

    /// Record a burn and how many descendants went with it
    pub fn record_burn(&self, descendants: u64) {
        self.burns_total.inc();
        self.burned_descendants.observe(descendants as f64);
        self.live_tokens.dec();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.mints_total.get(), 0);
        assert_eq!(metrics.burns_total.get(), 0);
        assert_eq!(metrics.live_tokens.get(), 0);
    }

    #[test]
    fn test_two_collectors_coexist() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_mint();
        assert_eq!(a.mints_total.get(), 1);
        assert_eq!(b.mints_total.get(), 0);
    }

    #[test]
    fn test_record_mint_and_burn_track_live_tokens() {
        let metrics = Metrics::new().unwrap();
        metrics.record_mint();
        metrics.record_mint();
        assert_eq!(metrics.live_tokens.get(), 2);

        metrics.record_burn(1);
        assert_eq!(metrics.live_tokens.get(), 1);
        assert_eq!(metrics.burns_total.get(), 1);
    }

    #[test]
    fn test_record_transfer_split_by_kind() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transfer(false);
        metrics.record_transfer(true);
        metrics.record_transfer(true);
        assert_eq!(metrics.transfers_total.get(), 1);
        assert_eq!(metrics.nest_transfers_total.get(), 2);
    }
}
