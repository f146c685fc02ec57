//! Prometheus metric descriptions for the delivery pipeline.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn install_prometheus_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

pub fn describe_metrics() {
    metrics::describe_counter!(
        "scim_deliveries_claimed_total",
        "Deliveries claimed by the poller"
    );
    metrics::describe_counter!(
        "scim_deliveries_succeeded_total",
        "Deliveries that reached SUCCESS"
    );
    metrics::describe_counter!(
        "scim_deliveries_retried_total",
        "Deliveries that transitioned to RETRYING"
    );
    metrics::describe_counter!(
        "scim_deliveries_failed_total",
        "Deliveries that reached FAILED"
    );
    metrics::describe_histogram!(
        "scim_http_request_duration_seconds",
        "Latency of outbound SCIM HTTP requests"
    );
}
