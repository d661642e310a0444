use prometheus::{
    Encoder, HistogramOpts, HistogramTimer, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use crate::errors::{AppError, Result};

/// Prometheus collectors for the service, registered on a private registry.
pub struct MetricsService {
    registry: Registry,
    uploads_total: IntCounter,
    deletes_total: IntCounter,
    bytes_processed_total: IntCounterVec,
    errors_total: IntCounterVec,
    http_requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    reconciled_total: IntCounterVec,
}

fn internal(e: prometheus::Error) -> AppError {
    AppError::Internal(anyhow::Error::new(e))
}

impl MetricsService {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("impressio".to_string()), None).map_err(internal)?;

        let uploads_total = IntCounter::new("uploads_total", "Completed image uploads").map_err(internal)?;
        let deletes_total = IntCounter::new("deletes_total", "Deleted images").map_err(internal)?;
        let bytes_processed_total = IntCounterVec::new(
            Opts::new("bytes_processed_total", "Bytes stored per asset kind"),
            &["kind"],
        )
        .map_err(internal)?;
        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Error responses by class"),
            &["type"],
        )
        .map_err(internal)?;
        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by method and status"),
            &["method", "status"],
        )
        .map_err(internal)?;
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request latency by route"),
            &["endpoint"],
        )
        .map_err(internal)?;
        let reconciled_total = IntCounterVec::new(
            Opts::new("reconciled_total", "Records handled by the reconciler"),
            &["outcome"],
        )
        .map_err(internal)?;

        registry.register(Box::new(uploads_total.clone())).map_err(internal)?;
        registry.register(Box::new(deletes_total.clone())).map_err(internal)?;
        registry.register(Box::new(bytes_processed_total.clone())).map_err(internal)?;
        registry.register(Box::new(errors_total.clone())).map_err(internal)?;
        registry.register(Box::new(http_requests_total.clone())).map_err(internal)?;
        registry.register(Box::new(request_duration_seconds.clone())).map_err(internal)?;
        registry.register(Box::new(reconciled_total.clone())).map_err(internal)?;

        Ok(Self {
            registry,
            uploads_total,
            deletes_total,
            bytes_processed_total,
            errors_total,
            http_requests_total,
            request_duration_seconds,
            reconciled_total,
        })
    }

    pub fn record_upload(&self, original_bytes: i64, compressed_bytes: i64) {
        self.uploads_total.inc();
        self.bytes_processed_total
            .with_label_values(&["original"])
            .inc_by(original_bytes.max(0) as u64);
        self.bytes_processed_total
            .with_label_values(&["compressed"])
            .inc_by(compressed_bytes.max(0) as u64);
    }

    pub fn record_delete(&self) {
        self.deletes_total.inc();
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors_total.with_label_values(&[error_type]).inc();
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
    }

    pub fn record_reconciled(&self, outcome: &str) {
        self.reconciled_total.with_label_values(&[outcome]).inc();
    }

    /// Observes the request duration when the returned timer is dropped.
    pub fn start_request_timer(&self, endpoint: &str) -> HistogramTimer {
        self.request_duration_seconds
            .with_label_values(&[endpoint])
            .start_timer()
    }

    /// Renders every collector in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(internal)?;
        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.into()))
    }
}
