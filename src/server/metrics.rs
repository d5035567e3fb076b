//! Prometheus metrics for the emulator server
//!
//! - Requests by operation and outcome (`ok` or the error code)
//! - Records accepted and rejected by write calls

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::model::WriteRecordsResponse;

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tswrite_requests_total", "Requests handled, by operation and outcome"),
        &["operation", "outcome"]
    ).expect("valid metric definition");

    pub static ref RECORDS_INGESTED: IntCounter = IntCounter::new(
        "tswrite_records_ingested_total",
        "Records accepted by write calls"
    ).expect("valid metric definition");

    pub static ref RECORDS_REJECTED: IntCounter = IntCounter::new(
        "tswrite_records_rejected_total",
        "Records rejected by write calls"
    ).expect("valid metric definition");
}

static INIT: Once = Once::new();

/// Registers all metrics with the global registry. Safe to call repeatedly.
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(REQUESTS_TOTAL.clone()),
            Box::new(RECORDS_INGESTED.clone()),
            Box::new(RECORDS_REJECTED.clone()),
        ];
        for collector in collectors {
            if let Err(e) = METRICS_REGISTRY.register(collector) {
                error!(error = %e, "Failed to register metric");
            }
        }
        info!("Metrics registered");
    });
}

/// Counts one handled request.
pub fn observe<T>(operation: &str, result: &Result<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    REQUESTS_TOTAL.with_label_values(&[operation, outcome]).inc();
}

/// Counts the records of one write call of `batch_size` records.
pub fn observe_write(batch_size: usize, result: &Result<WriteRecordsResponse>) {
    match result {
        Ok(response) => RECORDS_INGESTED.inc_by(response.records_ingested.total as u64),
        Err(Error::RejectedRecords(rejected)) => {
            RECORDS_REJECTED.inc_by(rejected.len() as u64);
            RECORDS_INGESTED.inc_by(batch_size.saturating_sub(rejected.len()) as u64);
        }
        Err(_) => {}
    }
}

/// Renders the registry in the Prometheus text format.
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&METRICS_REGISTRY.gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
