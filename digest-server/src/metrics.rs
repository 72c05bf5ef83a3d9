//! Prometheus metrics collection for the digest gateway

use digest_core::{GateDecision, ReloadResult};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions
pub fn init_metrics() {
    // Counters
    describe_counter!("digest_gate_decisions_total", "Total number of edge gate decisions");
    describe_counter!("digest_proxy_requests_total", "Total number of proxied report requests");
    describe_counter!("digest_config_reloads_total", "Total number of configuration reload attempts");

    // Histograms
    describe_histogram!("digest_proxy_latency_seconds", "Upstream round-trip latency in seconds");
}

/// Record a gate decision
pub fn record_gate_decision(decision: &GateDecision) {
    let outcome = if decision.is_allowed() { "allow" } else { "deny" };
    counter!(
        "digest_gate_decisions_total",
        "outcome" => outcome,
        "reason" => decision.label()
    )
    .increment(1);
}

/// Record a proxied request
pub fn record_proxy_request(outcome: &'static str, latency_seconds: f64) {
    counter!("digest_proxy_requests_total", "outcome" => outcome).increment(1);
    histogram!("digest_proxy_latency_seconds").record(latency_seconds);
}

/// Record a configuration reload attempt
pub fn record_reload(result: &ReloadResult) {
    counter!("digest_config_reloads_total", "result" => result.as_str()).increment(1);
}

/// Timer for measuring operation latency
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Storage for Prometheus handle
static PROMETHEUS_HANDLE: std::sync::OnceLock<metrics_exporter_prometheus::PrometheusHandle> =
    std::sync::OnceLock::new();

/// Initialize Prometheus exporter and store the handle
pub fn init_prometheus() -> anyhow::Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder.install_recorder()?;
    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Failed to set Prometheus handle"))?;
    Ok(())
}

/// Get Prometheus metrics string
pub fn get_prometheus_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Prometheus metrics not initialized\n".to_string())
}
