//! Request instrumentation for the HTTP server.
//!
//! [`InstrumentLayer`] wraps the router once and handles both concerns the
//! server needs per request: a debug log line on completion and the HTTP
//! metrics (count by status, latency, in-flight gauge).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use prometheus_client::metrics::gauge::Gauge;
use tower::{Layer, Service};

use super::metrics::{HttpLabels, HttpLabelsWithStatus, HttpMethod, Metrics};

#[derive(Clone)]
pub struct InstrumentLayer {
    metrics: Arc<Metrics>,
}

impl InstrumentLayer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for InstrumentLayer {
    type Service = Instrumented<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Instrumented {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[derive(Clone)]
pub struct Instrumented<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

/// One slot of the in-flight gauge, released on drop so that a request
/// abandoned mid-flight does not stay counted.
struct InFlight(Gauge);

impl InFlight {
    fn enter(gauge: &Gauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}

impl<S, ResBody> Service<Request<Body>> for Instrumented<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let labels = HttpLabels {
            method: HttpMethod::from(request.method()),
            endpoint: request.uri().path().to_string(),
        };
        let metrics = Arc::clone(&self.metrics);
        let in_flight = InFlight::enter(&metrics.http_requests_in_flight);
        let started = Instant::now();
        let response = self.inner.call(request);

        Box::pin(async move {
            let _in_flight = in_flight;
            let response = response.await?;
            let elapsed = started.elapsed();
            let status = response.status().as_u16();

            tracing::debug!(
                method = ?labels.method,
                endpoint = %labels.endpoint,
                status,
                duration_ms = elapsed.as_millis() as u64,
                "handled HTTP request"
            );
            metrics
                .http_request_duration_seconds
                .get_or_create(&labels)
                .observe(elapsed.as_secs_f64());
            metrics
                .http_requests
                .get_or_create(&HttpLabelsWithStatus {
                    method: labels.method,
                    endpoint: labels.endpoint,
                    status,
                })
                .inc();

            Ok(response)
        })
    }
}
