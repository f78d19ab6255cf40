//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Submission attempts and nonce retries
//! - Terminal outcomes by kind
//! - Confirmation latency

use crate::tx::Outcome;

use anyhow::Result;
use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref TX_SUBMITTED: Counter = register_counter!(
        "txcourier_transactions_submitted_total",
        "Total transactions accepted by the node"
    )
    .unwrap();

    pub static ref NONCE_RETRIES: Counter = register_counter!(
        "txcourier_nonce_retries_total",
        "Total submission retries caused by nonce collisions"
    )
    .unwrap();

    pub static ref TX_FAILED: Counter = register_counter!(
        "txcourier_submissions_failed_total",
        "Total submissions rejected by the node"
    )
    .unwrap();

    pub static ref TX_OUTCOMES: CounterVec = register_counter_vec!(
        "txcourier_outcomes_total",
        "Terminal outcomes of tracked transactions",
        &["outcome"]
    )
    .unwrap();

    pub static ref CONFIRMATION_SECONDS: Histogram = register_histogram!(
        "txcourier_confirmation_seconds",
        "Time from submission to receipt",
        vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]
    )
    .unwrap();
}

/// Record an accepted submission
pub fn record_submission() {
    TX_SUBMITTED.inc();
}

/// Record a nonce-collision retry
pub fn record_nonce_retry() {
    NONCE_RETRIES.inc();
}

/// Record a rejected submission
pub fn record_submission_failure() {
    TX_FAILED.inc();
}

/// Record the terminal outcome of a tracked transaction
pub fn record_outcome(outcome: Outcome) {
    TX_OUTCOMES.with_label_values(&[outcome.label()]).inc();
}

/// Record time-to-receipt for a tracked transaction
pub fn observe_confirmation(elapsed_ms: u64) {
    CONFIRMATION_SECONDS.observe(elapsed_ms as f64 / 1000.0);
}

/// Standalone metrics HTTP server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    /// Create a new metrics server
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Run the metrics server
    pub async fn run(&self) -> Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Render all registered metrics in Prometheus text format
async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_counter_accepts_all_labels() {
        for outcome in [
            Outcome::NotReached,
            Outcome::Pending,
            Outcome::Reverted,
            Outcome::OutOfGas,
            Outcome::Success,
        ] {
            record_outcome(outcome);
        }
        assert!(TX_OUTCOMES.with_label_values(&["success"]).get() >= 1.0);
    }
}
