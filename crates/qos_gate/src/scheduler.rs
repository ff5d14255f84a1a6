use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::Registry;
use tokio::sync::oneshot;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::config::QosConfig;
use crate::error::{AdmissionError, QosError};
use crate::priority::{Priority, PriorityExtractor, MAX_URGENCY};
use crate::queue::{PriorityQueues, Waiter};
use crate::slots::SlotPool;
use crate::telemetry::QosTelemetry;

/// Orchestrates the admit / queue / promote / dispatch / expire lifecycle
/// for every request passing through [`admission_middleware`].
///
/// A request that cannot take the fast path parks on a oneshot channel;
/// whoever releases capacity hands the freed permit straight to the most
/// urgent parked request over that channel. While parked, a request is
/// promoted one urgency step per `promotion_interval` until it is either
/// dispatched or runs out of time.
pub struct AdmissionScheduler {
	config: QosConfig,
	slots: SlotPool,
	queues: PriorityQueues,
	extractor: PriorityExtractor,
	telemetry: QosTelemetry,
	next_waiter_id: AtomicU64,
}

impl AdmissionScheduler {
	pub fn new(config: QosConfig, registry: &Registry) -> Result<Self, QosError> {
		config.validate()?;
		Ok(Self {
			slots: SlotPool::new(config.max_concurrent),
			queues: PriorityQueues::new(config.priority_levels(), config.max_queue_depth),
			extractor: PriorityExtractor::new(config.min_priority),
			telemetry: QosTelemetry::new(registry)?,
			next_waiter_id: AtomicU64::new(0),
			config,
		})
	}

	#[must_use]
	pub fn telemetry(&self) -> &QosTelemetry {
		&self.telemetry
	}

	/// Requests currently parked across all priority levels.
	#[must_use]
	pub fn queued(&self) -> usize {
		self.queues.total_queued()
	}

	/// Service slots not currently held by a dispatched request.
	#[must_use]
	pub fn available_slots(&self) -> usize {
		self.slots.available()
	}

	/// Secures a service slot for a request entering at `priority`,
	/// parking and promoting it as needed. `Err` means rejection.
	async fn admit(&self, priority: u8) -> Result<OwnedSemaphorePermit, AdmissionError> {
		let arrival = Instant::now();

		// Fast path: nobody is parked and a slot frees up in time.
		if self.queues.total_queued() == 0 {
			if let Some(permit) = self.slots.acquire_timeout(self.config.slot_acquire_timeout).await {
				return Ok(permit);
			}
		}

		self.wait_for_slot(priority, arrival).await
	}

	async fn wait_for_slot(&self, priority: u8, arrival: Instant) -> Result<OwnedSemaphorePermit, AdmissionError> {
		let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
		let mut current = priority;
		let (slot_tx, mut slot_rx) = oneshot::channel();

		if !self.queues.enqueue(level_index(current), Waiter { id, slot_tx }) {
			debug!(id, priority = current, "queue full, rejecting on arrival");
			self.drain();
			return Err(AdmissionError::QueueFull);
		}
		let mut parked = ParkedRequest {
			queues: &self.queues,
			id,
			level: level_index(current),
		};

		// A slot may have been released between the failed fast path and
		// the enqueue above; one drain pass makes that release visible.
		self.drain();

		let mut wait = self.config.promotion_interval;
		loop {
			match timeout(wait, &mut slot_rx).await {
				Ok(Ok(permit)) => {
					debug!(id, priority = current, waited_ms = arrival.elapsed().as_millis() as u64, "slot granted");
					return Ok(permit);
				}
				Ok(Err(_)) => {
					// The sender vanished without a permit; the waiter was
					// evicted, so there is nothing left to wait for.
					return Err(AdmissionError::AgedOut);
				}
				Err(_) => {}
			}

			// Promotion timer fired; reclaim the queue entry before moving it.
			let Some(stale) = self.queues.remove(level_index(current), id) else {
				// A drainer claimed this request between timer fire and
				// removal; the permit is already in flight on the channel.
				return match slot_rx.await {
					Ok(permit) => Ok(permit),
					Err(_) => Err(AdmissionError::AgedOut),
				};
			};
			drop(stale);

			if current <= MAX_URGENCY {
				// Aged to the top without securing a slot: out of time.
				warn!(id, waited_ms = arrival.elapsed().as_millis() as u64, "request aged out");
				return Err(AdmissionError::AgedOut);
			}

			current -= 1;
			wait = if current > MAX_URGENCY {
				self.config.promotion_interval
			} else {
				// Entering the most urgent level: whatever is left of the
				// absolute deadline. Zero fires the timer immediately.
				self.config.request_deadline.saturating_sub(arrival.elapsed())
			};

			let (slot_tx, new_rx) = oneshot::channel();
			slot_rx = new_rx;
			if !self.queues.enqueue(level_index(current), Waiter { id, slot_tx }) {
				debug!(id, priority = current, "queue full at promotion, rejecting");
				self.drain();
				return Err(AdmissionError::QueueFull);
			}
			parked.level = level_index(current);
			debug!(id, priority = current, "promoted");
			self.drain();
		}
	}

	/// Completion of a dispatched request: counters first, then the slot
	/// goes back, then whoever is most urgent gets it.
	fn complete(&self, service_time: Duration, permit: OwnedSemaphorePermit) {
		self.telemetry.record_completion(service_time);
		drop(permit);
		self.drain();
	}

	/// Moves free capacity to parked requests, most urgent first. The
	/// permit is transferred over the waiter's channel; a waiter whose
	/// receiver is gone was cancelled, so the slot goes back instead.
	fn drain(&self) {
		while self.queues.total_queued() > 0 {
			let Some(permit) = self.slots.try_acquire() else {
				return;
			};
			match self.queues.poll_highest() {
				Some(waiter) => {
					if waiter.slot_tx.send(permit).is_err() {
						debug!(id = waiter.id, "waiter cancelled before dispatch, releasing slot");
						return;
					}
				}
				// Emptied concurrently; the permit drops and is released.
				None => return,
			}
		}
	}
}

/// Cancellation guard for a parked request. Dropping the middleware
/// future mid-wait removes the entry from its queue; removal by id is a
/// no-op once the request has been dispatched or rejected.
struct ParkedRequest<'a> {
	queues: &'a PriorityQueues,
	id: u64,
	level: usize,
}

impl Drop for ParkedRequest<'_> {
	fn drop(&mut self) {
		self.queues.remove(self.level, self.id);
	}
}

const fn level_index(priority: u8) -> usize {
	(priority - MAX_URGENCY) as usize
}

/// Admission middleware, wired the `from_fn_with_state` way:
///
/// ```ignore
/// Router::new()
///     .route("/work", get(work))
///     .layer(from_fn_with_state(scheduler, admission_middleware))
/// ```
pub async fn admission_middleware(State(scheduler): State<Arc<AdmissionScheduler>>, request: Request<Body>, next: Next) -> Response {
	match scheduler.extractor.extract(request.uri()) {
		Priority::Bypass => {
			// Maintenance traffic: no slot, no queue, no counters.
			debug!(uri = %request.uri(), "bypassing admission control");
			next.run(request).await
		}
		Priority::Level(priority) => match scheduler.admit(priority).await {
			Ok(permit) => {
				let started = Instant::now();
				let response = next.run(request).await;
				scheduler.complete(started.elapsed(), permit);
				response
			}
			Err(rejection) => {
				debug!(%rejection, "request rejected");
				rejection.into_response()
			}
		},
	}
}
