use std::sync::Mutex;
use std::time::Instant;

use crate::error::QosError;

/// Mean of the last `window` integer samples.
///
/// A fixed-capacity ring with a running sum, so `value()` is O(1) and
/// recording evicts the overwritten slot from the sum once the ring is
/// full. Both counters sit in the request completion path, hence the
/// plain mutex rather than anything fancier.
pub struct RollingAverageCounter {
	ring: Mutex<AverageRing>,
}

struct AverageRing {
	samples: Vec<u64>,
	sum: u64,
	write: usize,
	recorded: usize,
}

impl RollingAverageCounter {
	pub fn new(window: usize) -> Result<Self, QosError> {
		if window == 0 {
			return Err(QosError::ZeroSampleWindow);
		}
		Ok(Self {
			ring: Mutex::new(AverageRing {
				samples: vec![0; window],
				sum: 0,
				write: 0,
				recorded: 0,
			}),
		})
	}

	pub fn record(&self, value: u64) {
		let mut ring = self.ring.lock().expect("average ring poisoned");
		let window = ring.samples.len();

		if ring.recorded == window {
			let evicted = ring.samples[ring.write];
			ring.sum -= evicted;
		} else {
			ring.recorded += 1;
		}

		ring.sum += value;
		let write = ring.write;
		ring.samples[write] = value;
		ring.write = (write + 1) % window;
	}

	/// Mean over the recorded samples; 0 while empty.
	pub fn value(&self) -> u64 {
		let ring = self.ring.lock().expect("average ring poisoned");
		if ring.recorded == 0 {
			0
		} else {
			ring.sum / ring.recorded as u64
		}
	}
}

/// Events per second over the last `window` events.
pub struct RollingRateCounter {
	ring: Mutex<RateRing>,
}

struct RateRing {
	samples: Vec<Instant>,
	write: usize,
	recorded: usize,
}

impl RollingRateCounter {
	pub fn new(window: usize) -> Result<Self, QosError> {
		if window == 0 {
			return Err(QosError::ZeroSampleWindow);
		}
		Ok(Self {
			ring: Mutex::new(RateRing {
				samples: vec![Instant::now(); window],
				write: 0,
				recorded: 0,
			}),
		})
	}

	pub fn record(&self) {
		self.record_at(Instant::now());
	}

	fn record_at(&self, at: Instant) {
		let mut ring = self.ring.lock().expect("rate ring poisoned");
		let window = ring.samples.len();
		let write = ring.write;
		ring.samples[write] = at;
		ring.write = (write + 1) % window;
		if ring.recorded < window {
			ring.recorded += 1;
		}
	}

	/// Recorded count divided by the span between oldest and newest
	/// sample; 0 while empty or when all samples share one timestamp.
	pub fn value(&self) -> f64 {
		let ring = self.ring.lock().expect("rate ring poisoned");
		if ring.recorded == 0 {
			return 0.0;
		}

		let window = ring.samples.len();
		let newest = ring.samples[(ring.write + window - 1) % window];
		let oldest = if ring.recorded == window { ring.samples[ring.write] } else { ring.samples[0] };

		let span = newest.duration_since(oldest);
		if span.is_zero() {
			return 0.0;
		}
		ring.recorded as f64 / span.as_secs_f64()
	}
}
