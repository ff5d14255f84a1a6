use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

/// Bounded pool of concurrent service permits.
///
/// tokio's semaphore queues waiters in FIFO order, so grants are fair
/// under contention. Releasing is dropping the permit.
pub struct SlotPool {
	permits: Arc<Semaphore>,
}

impl SlotPool {
	#[must_use]
	pub fn new(max_concurrent: usize) -> Self {
		Self {
			permits: Arc::new(Semaphore::new(max_concurrent)),
		}
	}

	/// Waits up to `wait` for a permit. A lapsed timer and a closed
	/// semaphore both mean "no permit", never an error.
	pub async fn acquire_timeout(&self, wait: Duration) -> Option<OwnedSemaphorePermit> {
		match timeout(wait, Arc::clone(&self.permits).acquire_owned()).await {
			Ok(Ok(permit)) => Some(permit),
			Ok(Err(_)) | Err(_) => None,
		}
	}

	/// Immediate acquire attempt, used by the drain loop.
	#[must_use]
	pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
		Arc::clone(&self.permits).try_acquire_owned().ok()
	}

	#[must_use]
	pub fn available(&self) -> usize {
		self.permits.available_permits()
	}
}
