//! Pipeline counters.
//!
//! Recording is a no-op until `init_metrics` installs a recorder, so batch
//! commands and tests can call these helpers unconditionally.

use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

pub const RECORDS_CLEANED: &str = "activity_records_cleaned_total";
pub const RECORDS_FAILED: &str = "activity_records_failed_total";
pub const DUPLICATES_REMOVED: &str = "activity_duplicates_removed_total";
pub const RECLASSIFIED: &str = "activity_reclassified_total";
pub const QUALITY_SCORE: &str = "activity_quality_score";

/// Install a Prometheus recorder when ACTIVITY_METRICS_ADDR is set.
///
/// Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let Ok(addr_str) = std::env::var("ACTIVITY_METRICS_ADDR") else {
            return;
        };
        let addr = match addr_str.parse::<std::net::SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}", addr_str, e);
                return;
            }
        };

        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                describe_metrics();
                info!("Prometheus exporter listening at http://{}/metrics", addr);
            }
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
    });
}

fn describe_metrics() {
    metrics::describe_counter!(RECORDS_CLEANED, "Cleaned activity writes by platform and outcome");
    metrics::describe_counter!(RECORDS_FAILED, "Records that failed a pipeline stage");
    metrics::describe_counter!(DUPLICATES_REMOVED, "Raw duplicates deleted by source table");
    metrics::describe_counter!(RECLASSIFIED, "City reassignments made by the reclassify pass");
    metrics::describe_histogram!(QUALITY_SCORE, "Quality score of cleaned activities");
}

pub fn record_cleaned(platform: &'static str, change: &'static str, quality_score: u8) {
    metrics::counter!(RECORDS_CLEANED, "platform" => platform, "change" => change).increment(1);
    metrics::histogram!(QUALITY_SCORE, "platform" => platform).record(f64::from(quality_score));
}

pub fn record_failure(stage: &'static str) {
    metrics::counter!(RECORDS_FAILED, "stage" => stage).increment(1);
}

pub fn record_duplicates_removed(source: &'static str, count: u64) {
    metrics::counter!(DUPLICATES_REMOVED, "source" => source).increment(count);
}

pub fn record_reclassified(from: &str, to: &str) {
    metrics::counter!(RECLASSIFIED, "from" => from.to_string(), "to" => to.to_string()).increment(1);
}
