//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub mint_attempts: IntCounter,
    pub mint_success: IntCounter,
    pub mint_failed: IntCounter,
    pub mint_timeouts: IntCounter,
    pub gate_withheld: IntCounter,
    pub state_refreshes: IntCounter,
    pub state_refresh_failures: IntCounter,
    pub state_reloads: IntCounter,

    // Gauges
    pub mints_in_flight: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
    pub submit_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let mint_attempts = IntCounter::with_opts(Opts::new(
            "mint_attempts_total",
            "Mint actions dispatched after preconditions and gate passed",
        ))?;

        let mint_success =
            IntCounter::with_opts(Opts::new("mint_success_total", "Mints confirmed on-chain"))?;

        let mint_failed = IntCounter::with_opts(Opts::new(
            "mint_failed_total",
            "Mints that failed at submission or on-chain",
        ))?;

        let mint_timeouts = IntCounter::with_opts(Opts::new(
            "mint_timeouts_total",
            "Mints with no terminal status before the deadline",
        ))?;

        let gate_withheld = IntCounter::with_opts(Opts::new(
            "gate_withheld_total",
            "Mint triggers stopped by the identity gate",
        ))?;

        let state_refreshes = IntCounter::with_opts(Opts::new(
            "state_refreshes_total",
            "Successful sale state refreshes",
        ))?;

        let state_refresh_failures = IntCounter::with_opts(Opts::new(
            "state_refresh_failures_total",
            "Sale state refreshes that failed",
        ))?;

        let state_reloads = IntCounter::with_opts(Opts::new(
            "state_reloads_total",
            "Full state reloads triggered by sold-out failures",
        ))?;

        let mints_in_flight = IntGauge::with_opts(Opts::new(
            "mints_in_flight",
            "Mint attempts currently in flight (0 or 1)",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new("confirmation_latency_seconds", "Submit-to-terminal-status latency")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
        )?;

        let submit_latency = Histogram::with_opts(
            HistogramOpts::new("submit_latency_seconds", "Transaction build, sign and send latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(mint_attempts.clone()))?;
        registry.register(Box::new(mint_success.clone()))?;
        registry.register(Box::new(mint_failed.clone()))?;
        registry.register(Box::new(mint_timeouts.clone()))?;
        registry.register(Box::new(gate_withheld.clone()))?;
        registry.register(Box::new(state_refreshes.clone()))?;
        registry.register(Box::new(state_refresh_failures.clone()))?;
        registry.register(Box::new(state_reloads.clone()))?;
        registry.register(Box::new(mints_in_flight.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(submit_latency.clone()))?;

        Ok(Self {
            registry,
            mint_attempts,
            mint_success,
            mint_failed,
            mint_timeouts,
            gate_withheld,
            state_refreshes,
            state_refresh_failures,
            state_reloads,
            mints_in_flight,
            confirmation_latency,
            submit_latency,
        })
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
