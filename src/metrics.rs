//! Metric name constants.

use anyhow::Context;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config;

pub const AUTH_FAILED: &str = "anonreport.auth.failed"; // Counter.

pub const REPORTS_CREATED: &str = "anonreport.reports.created"; // Counter.
pub const CODE_COLLISIONS: &str = "anonreport.reports.code_collisions"; // Counter.
pub const REPORT_LOOKUPS: &str = "anonreport.reports.lookups"; // Counter.
pub const REPORT_LOOKUP_MISSES: &str = "anonreport.reports.lookup_misses"; // Counter.
pub const STATUS_UPDATES: &str = "anonreport.reports.status_updates"; // Counter.

/// Must be ran exactly once on startup. This will declare all of the instruments for `metrics`.
pub fn setup(config: Option<&config::MetricConfig>) -> anyhow::Result<()> {
    describe_counter!(AUTH_FAILED, "The number of failed admin login attempts.");

    describe_counter!(REPORTS_CREATED, "The count of submitted reports.");
    describe_counter!(
        CODE_COLLISIONS,
        "The count of generated access codes whose digest was already in use."
    );
    describe_counter!(REPORT_LOOKUPS, "The count of access code lookups.");
    describe_counter!(
        REPORT_LOOKUP_MISSES,
        "The count of access code lookups that matched no report."
    );
    describe_counter!(STATUS_UPDATES, "The count of appended status updates.");

    if let Some(config) = config {
        match config {
            config::MetricConfig::Prometheus(prometheus_config) => {
                PrometheusBuilder::new()
                    .with_http_listener(prometheus_config.listen_address)
                    .install()
                    .context("failed to install metrics exporter")?;
            }
        }
    }

    Ok(())
}
