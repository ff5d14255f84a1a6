use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

/// Failures raised while building the scheduler. All of these fail init;
/// none of them can occur once requests are flowing.
#[derive(Error, Debug)]
pub enum QosError {
	#[error("invalid value for {key}: {value}")]
	InvalidConfig { key: String, value: String },

	#[error("rolling counters need a sample window of at least 1")]
	ZeroSampleWindow,

	#[error("metrics registration failed: {0}")]
	Prometheus(#[from] prometheus::Error),
}

/// Terminal outcomes on the admission path. The caller sees a uniform
/// "service unavailable" whatever the internal reason; the distinction
/// only matters for logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
	#[error("request queue is full")]
	QueueFull,

	#[error("request aged out waiting for a service slot")]
	AgedOut,
}

impl IntoResponse for AdmissionError {
	fn into_response(self) -> axum::response::Response {
		StatusCode::SERVICE_UNAVAILABLE.into_response()
	}
}
