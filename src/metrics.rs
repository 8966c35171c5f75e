//! Research pipeline counters.
//!
//! Counters are recorded through the `metrics` facade and are no-ops until a
//! recorder is installed. `init_metrics` installs the Prometheus exporter when
//! `SCOUT_METRICS_ADDR` is set.

use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

pub const FETCH_SUCCESS: &str = "scout_fetch_success_total";
pub const FETCH_ERROR: &str = "scout_fetch_error_total";
pub const FETCH_ROBOTS_BLOCKED: &str = "scout_fetch_robots_blocked_total";
pub const FETCH_RETRIES: &str = "scout_fetch_retries_total";
pub const CANDIDATES_ACCEPTED: &str = "scout_candidates_accepted_total";
pub const CANDIDATES_REJECTED: &str = "scout_candidates_rejected_total";
pub const CANDIDATES_ESCALATED: &str = "scout_candidates_escalated_total";
pub const FINDINGS_PERSISTED: &str = "scout_findings_persisted_total";
pub const FINDINGS_PERSIST_ERROR: &str = "scout_findings_persist_error_total";

/// Install the Prometheus recorder and HTTP listener if `SCOUT_METRICS_ADDR` is set.
///
/// Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let Ok(addr_str) = std::env::var("SCOUT_METRICS_ADDR") else {
            return;
        };
        let addr = match addr_str.parse::<std::net::SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid SCOUT_METRICS_ADDR '{}': {}", addr_str, e);
                return;
            }
        };
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

pub struct FetchMetrics;

impl FetchMetrics {
    pub fn record_success() {
        ::metrics::counter!(FETCH_SUCCESS).increment(1);
    }

    pub fn record_error(error_type: &'static str) {
        ::metrics::counter!(FETCH_ERROR, "error_type" => error_type).increment(1);
    }

    pub fn record_robots_blocked() {
        ::metrics::counter!(FETCH_ROBOTS_BLOCKED).increment(1);
    }

    pub fn record_retry() {
        ::metrics::counter!(FETCH_RETRIES).increment(1);
    }
}

pub struct CandidateMetrics;

impl CandidateMetrics {
    pub fn record_accepted() {
        ::metrics::counter!(CANDIDATES_ACCEPTED).increment(1);
    }

    pub fn record_rejected(gate: &'static str) {
        ::metrics::counter!(CANDIDATES_REJECTED, "gate" => gate).increment(1);
    }

    pub fn record_escalated() {
        ::metrics::counter!(CANDIDATES_ESCALATED).increment(1);
    }

    pub fn record_persisted() {
        ::metrics::counter!(FINDINGS_PERSISTED).increment(1);
    }

    pub fn record_persist_error() {
        ::metrics::counter!(FINDINGS_PERSIST_ERROR).increment(1);
    }
}
