//! Prometheus metrics for the log server.

use axum::http::Method;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

use crate::protocol::RequestKind;

/// Labels for per-request-type metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub request: String,
}

impl From<RequestKind> for RequestLabels {
    fn from(kind: RequestKind) -> Self {
        Self {
            request: kind.as_str().to_string(),
        }
    }
}

/// Labels for HTTP request metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabelsWithStatus {
    pub method: HttpMethod,
    pub endpoint: String,
    pub status: u16,
}

/// HTTP method label value.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum HttpMethod {
    Get,
    Post,
    Other,
}

impl From<&Method> for HttpMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => HttpMethod::Get,
            Method::POST => HttpMethod::Post,
            _ => HttpMethod::Other,
        }
    }
}

/// Labels for the HTTP latency histogram.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: HttpMethod,
    pub endpoint: String,
}

/// Container for all Prometheus metrics.
pub struct Metrics {
    registry: Registry,

    /// Requests received, by type. Exported as `log_requests_total`.
    pub log_requests: Family<RequestLabels, Counter>,

    /// Requests that failed, by type.
    pub log_request_failures: Family<RequestLabels, Counter>,

    /// Messages successfully appended.
    pub log_messages_sent: Counter,

    /// Messages returned by polls.
    pub log_messages_polled: Counter,

    /// HTTP requests by method, endpoint and status.
    pub http_requests: Family<HttpLabelsWithStatus, Counter>,

    /// Histogram of HTTP request latency in seconds.
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,

    /// Gauge of currently in-flight requests.
    pub http_requests_in_flight: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics registry with all metrics registered.
    ///
    /// Counters are registered without a `_total` suffix; the text encoder
    /// appends it.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let log_requests = Family::<RequestLabels, Counter>::default();
        registry.register(
            "log_requests",
            "Total number of log requests by type",
            log_requests.clone(),
        );

        let log_request_failures = Family::<RequestLabels, Counter>::default();
        registry.register(
            "log_request_failures",
            "Total number of failed log requests by type",
            log_request_failures.clone(),
        );

        let log_messages_sent = Counter::default();
        registry.register(
            "log_messages_sent",
            "Total number of messages appended to the log",
            log_messages_sent.clone(),
        );

        let log_messages_polled = Counter::default();
        registry.register(
            "log_messages_polled",
            "Total number of messages returned by polls",
            log_messages_polled.clone(),
        );

        let http_requests = Family::<HttpLabelsWithStatus, Counter>::default();
        registry.register(
            "http_requests",
            "Total number of HTTP requests",
            http_requests.clone(),
        );

        // buckets from 1ms to ~8s
        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 14))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
            http_request_duration_seconds.clone(),
        );

        let http_requests_in_flight = Gauge::default();
        registry.register(
            "http_requests_in_flight",
            "Number of HTTP requests currently being processed",
            http_requests_in_flight.clone(),
        );

        Self {
            registry,
            log_requests,
            log_request_failures,
            log_messages_sent,
            log_messages_polled,
            http_requests,
            http_request_duration_seconds,
            http_requests_in_flight,
        }
    }

    /// Encode all metrics to Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = prometheus_client::encoding::text::encode(&mut buffer, &self.registry) {
            tracing::error!(error = %e, "failed to encode metrics");
        }
        buffer
    }
}
