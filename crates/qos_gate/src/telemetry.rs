use std::time::Duration;

use prometheus::{Gauge, Registry};

use crate::counters::{RollingAverageCounter, RollingRateCounter};
use crate::error::QosError;

/// Completed requests contributing to each gauge.
pub const SAMPLE_WINDOW: usize = 100;

/// Request rate and mean service latency over the most recent
/// completions, mirrored into Prometheus gauges on every completion.
pub struct QosTelemetry {
	rate: RollingRateCounter,
	latency: RollingAverageCounter,
	requests_per_second: Gauge,
	mean_response_time_ms: Gauge,
}

impl QosTelemetry {
	pub fn new(registry: &Registry) -> Result<Self, QosError> {
		let requests_per_second = Gauge::new("qos_requests_per_second", "Completed requests per second over the sample window")?;
		let mean_response_time_ms = Gauge::new("qos_mean_response_time_ms", "Mean service latency in milliseconds over the sample window")?;

		registry.register(Box::new(requests_per_second.clone()))?;
		registry.register(Box::new(mean_response_time_ms.clone()))?;

		Ok(Self {
			rate: RollingRateCounter::new(SAMPLE_WINDOW)?,
			latency: RollingAverageCounter::new(SAMPLE_WINDOW)?,
			requests_per_second,
			mean_response_time_ms,
		})
	}

	/// Records one completed request. Rejected and bypass requests never
	/// reach this point.
	pub fn record_completion(&self, service_time: Duration) {
		self.latency.record(u64::try_from(service_time.as_millis()).unwrap_or(u64::MAX));
		self.rate.record();
		self.requests_per_second.set(self.rate.value());
		self.mean_response_time_ms.set(self.latency.value() as f64);
	}

	#[must_use]
	pub fn requests_per_second(&self) -> f64 {
		self.rate.value()
	}

	#[must_use]
	pub fn mean_response_time_ms(&self) -> u64 {
		self.latency.value()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_gauges_follow_the_counters() {
		let registry = Registry::new();
		let telemetry = QosTelemetry::new(&registry).unwrap();

		telemetry.record_completion(Duration::from_millis(40));
		telemetry.record_completion(Duration::from_millis(60));

		assert_eq!(telemetry.mean_response_time_ms(), 50);

		let families = registry.gather();
		let mean = families.iter().find(|f| f.get_name() == "qos_mean_response_time_ms").unwrap();
		assert!((mean.get_metric()[0].get_gauge().get_value() - 50.0).abs() < f64::EPSILON);
	}

	#[test]
	fn test_registration_is_single_use_per_registry() {
		let registry = Registry::new();
		let _first = QosTelemetry::new(&registry).unwrap();
		assert!(QosTelemetry::new(&registry).is_err());
	}
}
