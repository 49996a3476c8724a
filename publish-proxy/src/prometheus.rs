use std::net::SocketAddr;

use lazy_static::lazy_static;
use prometheus_exporter::Builder;
use prometheus_exporter::prometheus::{HistogramVec, register_histogram_vec_with_registry, register_int_counter_vec_with_registry};
use prometheus_exporter::prometheus::core::{AtomicI64, AtomicU64, GenericCounterVec, GenericGaugeVec};
use prometheus_exporter::prometheus::register_int_gauge_vec_with_registry;
use prometheus_exporter::prometheus::Registry;

pub const CONN_DOWNSTREAM: &str = "downstream";

pub const RECORD_INVOCATION: &str = "invocation";
pub const RECORD_LATENCY: &str = "latency";

const KNOWN_METHODS: [&str; 9] = ["GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH"];

/// Method label value, anything outside the standard methods is reported as `OTHER`.
pub fn method_label(method: &str) -> &'static str {
    KNOWN_METHODS.iter().find(|it| **it == method).copied().unwrap_or("OTHER")
}

lazy_static! {
    pub static ref REGISTRY: prometheus_exporter::prometheus::Registry =
        prometheus_exporter::prometheus::Registry::new_custom(Some("publish_proxy".to_string()), None)
        .expect("metric registry should be created");
    pub static ref METRICS: Metrics = Metrics::new(REGISTRY.to_owned());
}

pub struct PrometheusServer {}

impl PrometheusServer {
    pub fn start(export_addr: &str, export_uri: &str) -> anyhow::Result<()> {
        let export_addr: SocketAddr = export_addr.parse()?;
        let mut exporter_builder = Builder::new(export_addr);
        exporter_builder.with_endpoint(export_uri)?;
        exporter_builder.with_registry(REGISTRY.to_owned());
        exporter_builder.start()?;
        Ok(())
    }
}

pub struct Metrics {
    pub connections: GenericGaugeVec<AtomicI64>,
    pub requests: GenericCounterVec<AtomicU64>,
    pub request_latency: HistogramVec,
    pub published_records: GenericCounterVec<AtomicU64>,
    pub publish_failures: GenericCounterVec<AtomicU64>,
    pub skipped_requests: GenericCounterVec<AtomicU64>,
}

impl Metrics {
    pub fn new(registry: Registry) -> Self {
        let connections = register_int_gauge_vec_with_registry!(
            "connections", "Number of open downstream connections",
            &["type"], registry
        ).expect("connections metrics can be created");

        let requests = register_int_counter_vec_with_registry!(
            "requests", "Requests handled, by method and response status.",
            &["method", "status"], registry
        ).expect("requests metrics can be created");

        let request_latency = register_histogram_vec_with_registry!(
            "request_latency", "The latency of the requests in seconds.",
            &["method"], vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0], registry
        ).expect("request_latency metrics can be created");

        let published_records = register_int_counter_vec_with_registry!(
            "published_records", "Records handed to the data publisher.",
            &["type"], registry
        ).expect("published_records metrics can be created");

        let publish_failures = register_int_counter_vec_with_registry!(
            "publish_failures", "Records the data publisher refused.",
            &["type"], registry
        ).expect("publish_failures metrics can be created");

        let skipped_requests = register_int_counter_vec_with_registry!(
            "skipped_requests", "Requests whose telemetry was not published.",
            &["reason"], registry
        ).expect("skipped_requests metrics can be created");

        Self {
            connections,
            requests,
            request_latency,
            published_records,
            publish_failures,
            skipped_requests,
        }
    }
}
