use anyhow::{Context, Result};
use log::info;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{net::SocketAddr, time::Duration};

use crate::engine::state::TokenState;
use crate::error::ErrorClass;
use crate::types::TxKind;

pub const METRIC_CYCLES: &str = "sweeper_cycles_total";
pub const METRIC_CYCLE_DURATION: &str = "sweeper_cycle_duration_seconds";
pub const METRIC_TOKENS_PROCESSED: &str = "sweeper_tokens_processed_total";
pub const METRIC_FAILURES: &str = "sweeper_failures_total";
pub const METRIC_TX_SUBMITTED: &str = "sweeper_transactions_submitted_total";
pub const METRIC_TX_CONFIRMED: &str = "sweeper_transactions_confirmed_total";
pub const METRIC_ACCOUNTS: &str = "sweeper_accounts_managed";

/// Serves `/metrics` on `0.0.0.0:port`. Must run inside the tokio runtime.
pub fn install_exporter(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install prometheus exporter")?;
    info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

pub fn record_cycle(duration: Duration) {
    counter!(METRIC_CYCLES, 1);
    histogram!(METRIC_CYCLE_DURATION, duration.as_secs_f64());
}

pub fn record_token(state: TokenState) {
    counter!(METRIC_TOKENS_PROCESSED, 1, "outcome" => state.label());
}

pub fn record_failure(class: ErrorClass) {
    counter!(METRIC_FAILURES, 1, "class" => class.label());
}

pub fn record_tx_submitted(kind: TxKind) {
    counter!(METRIC_TX_SUBMITTED, 1, "kind" => kind.label());
}

pub fn record_tx_confirmed(kind: TxKind) {
    counter!(METRIC_TX_CONFIRMED, 1, "kind" => kind.label());
}

pub fn set_accounts_managed(count: usize) {
    gauge!(METRIC_ACCOUNTS, count as f64);
}
