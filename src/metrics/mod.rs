/*!
 * # Metrics Module
 *
 * Prometheus counters for the mutation, log and sync paths, registered in a
 * crate-local registry and rendered in the text exposition format.
 */

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref QUANTITY_CHANGES: IntCounterVec = register_counter_vec(
        "inventory_quantity_changes_total",
        "Quantity changes applied, by direction",
        &["direction"]
    );
    pub static ref LOG_ENTRIES: IntCounterVec = register_counter_vec(
        "inventory_log_entries_total",
        "Log appends, by outcome (created or merged)",
        &["outcome"]
    );
    pub static ref SANITIZED_KEYS: IntCounter = register_counter(
        "inventory_sanitized_keys_total",
        "Keys removed from outbound payloads by the sanitizer"
    );
    pub static ref REMOTE_UPDATES: IntCounterVec = register_counter_vec(
        "inventory_remote_updates_total",
        "Remote notifications, by resource and outcome",
        &["resource", "outcome"]
    );
    pub static ref REMOTE_WRITE_FAILURES: IntCounter = register_counter(
        "inventory_remote_write_failures_total",
        "Outbound writes the remote store did not accept"
    );
    pub static ref IMPORT_ROWS: IntCounterVec = register_counter_vec(
        "inventory_import_rows_total",
        "Bulk import rows, by outcome (applied or rejected)",
        &["outcome"]
    );
}

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric can be created");
    if let Err(err) = REGISTRY.register(Box::new(counter.clone())) {
        error!("failed to register metric {}: {}", name, err);
    }
    counter
}

fn register_counter_vec(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let counter = IntCounterVec::new(Opts::new(name, help), labels).expect("metric can be created");
    if let Err(err) = REGISTRY.register(Box::new(counter.clone())) {
        error!("failed to register metric {}: {}", name, err);
    }
    counter
}

/// Text exposition of every registered counter.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("failed to encode metrics: {}", err);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
