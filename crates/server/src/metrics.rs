//! Prometheus metrics
//!
//! Without an installed recorder the macros are no-ops, so handlers record
//! unconditionally.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use debate_agent_agent::{ReplySource, TurnOutcome};

/// Install the global Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

pub fn record_turn(outcome: &TurnOutcome) {
    counter!(
        "debate_turns_total",
        "source" => outcome.source.as_str(),
        "ephemeral" => if outcome.ephemeral { "true" } else { "false" }
    )
    .increment(1);

    if let ReplySource::Provider { latency_ms, .. } = &outcome.source {
        histogram!("debate_provider_latency_ms").record(*latency_ms as f64);
    }
    if outcome.ephemeral {
        record_store_error();
    }
}

pub fn record_analyze() {
    counter!("debate_analyze_requests_total").increment(1);
}

/// `outcome` is `ok`, `unknown_technique` or `invalid`
pub fn record_demonstrate(outcome: &'static str) {
    counter!("debate_demonstrate_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_store_error() {
    counter!("debate_store_errors_total").increment(1);
}
