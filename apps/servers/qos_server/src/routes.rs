use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use prometheus::{Encoder, Registry, TextEncoder};

/// Simulated unit of work; `ms` controls how long the handler holds its
/// service slot.
pub async fn work(Query(params): Query<HashMap<String, String>>) -> StatusCode {
	let ms = params.get("ms").and_then(|v| v.parse::<u64>().ok()).unwrap_or(25);
	tokio::time::sleep(Duration::from_millis(ms)).await;
	StatusCode::OK
}

pub async fn healthz() -> StatusCode {
	StatusCode::OK
}

/// Prometheus metrics handler
pub async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Result<String, StatusCode> {
	let encoder = TextEncoder::new();
	let metric_families = registry.gather();
	let mut buffer = Vec::new();

	if encoder.encode(&metric_families, &mut buffer).is_err() {
		return Err(StatusCode::INTERNAL_SERVER_ERROR);
	}

	String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
