use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Scrapes of this path are not counted.
const METRICS_PATH: &str = "/metrics";

/// Records `http_requests_total` and `http_request_duration_seconds`, labelled
/// by method, route template and status class (`2xx`, `4xx`, ...).
pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    if path == METRICS_PATH {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().to_string();

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("path", path),
        ("status", status_class(response.status().as_u16())),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());

    response
}

fn status_class(status: u16) -> String {
    format!("{}xx", status / 100)
}

/// Installs the process-wide Prometheus recorder. Call once, from `main`.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}
