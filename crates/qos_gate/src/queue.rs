use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;
use tokio::sync::OwnedSemaphorePermit;

/// One parked request: its identity and the channel that hands it a slot.
pub(crate) struct Waiter {
	pub id: u64,
	pub slot_tx: oneshot::Sender<OwnedSemaphorePermit>,
}

/// FIFO queues, one per priority level, most urgent at index 0.
///
/// The level queues and the total count form a single logical region: the
/// capacity check, the queue mutation and the count update all happen
/// under the one mutex. The atomic mirror of the count exists only so the
/// fast path can read it without locking.
pub(crate) struct PriorityQueues {
	levels: Mutex<Vec<VecDeque<Waiter>>>,
	queued: AtomicUsize,
	max_depth: usize,
}

impl PriorityQueues {
	pub fn new(levels: usize, max_depth: usize) -> Self {
		Self {
			levels: Mutex::new((0..levels).map(|_| VecDeque::new()).collect()),
			queued: AtomicUsize::new(0),
			max_depth,
		}
	}

	/// Appends to the given level unless the total is at capacity.
	pub fn enqueue(&self, level: usize, waiter: Waiter) -> bool {
		let mut levels = self.levels.lock().expect("priority queues poisoned");
		if self.queued.load(Ordering::Acquire) >= self.max_depth {
			return false;
		}
		levels[level].push_back(waiter);
		self.queued.fetch_add(1, Ordering::Release);
		true
	}

	/// Removes a specific waiter by identity. A miss is not an error: the
	/// waiter may have been dispatched concurrently.
	pub fn remove(&self, level: usize, id: u64) -> Option<Waiter> {
		let mut levels = self.levels.lock().expect("priority queues poisoned");
		let position = levels[level].iter().position(|waiter| waiter.id == id)?;
		let waiter = levels[level].remove(position);
		if waiter.is_some() {
			self.queued.fetch_sub(1, Ordering::Release);
		}
		waiter
	}

	/// Pops from the most urgent non-empty level.
	pub fn poll_highest(&self) -> Option<Waiter> {
		let mut levels = self.levels.lock().expect("priority queues poisoned");
		for level in levels.iter_mut() {
			if let Some(waiter) = level.pop_front() {
				self.queued.fetch_sub(1, Ordering::Release);
				return Some(waiter);
			}
		}
		None
	}

	pub fn total_queued(&self) -> usize {
		self.queued.load(Ordering::Acquire)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn waiter(id: u64) -> Waiter {
		let (slot_tx, _slot_rx) = oneshot::channel();
		Waiter { id, slot_tx }
	}

	#[test]
	fn test_fifo_within_a_level() {
		let queues = PriorityQueues::new(5, 10);
		assert!(queues.enqueue(2, waiter(1)));
		assert!(queues.enqueue(2, waiter(2)));
		assert!(queues.enqueue(2, waiter(3)));

		assert_eq!(queues.poll_highest().unwrap().id, 1);
		assert_eq!(queues.poll_highest().unwrap().id, 2);
		assert_eq!(queues.poll_highest().unwrap().id, 3);
		assert!(queues.poll_highest().is_none());
	}

	#[test]
	fn test_most_urgent_level_drains_first() {
		let queues = PriorityQueues::new(5, 10);
		assert!(queues.enqueue(4, waiter(1)));
		assert!(queues.enqueue(4, waiter(2)));
		assert!(queues.enqueue(0, waiter(3)));

		assert_eq!(queues.poll_highest().unwrap().id, 3);
		assert_eq!(queues.poll_highest().unwrap().id, 1);
		assert_eq!(queues.poll_highest().unwrap().id, 2);
	}

	#[test]
	fn test_enqueue_respects_total_depth() {
		let queues = PriorityQueues::new(3, 2);
		assert!(queues.enqueue(0, waiter(1)));
		assert!(queues.enqueue(2, waiter(2)));
		// Capacity is shared across levels, not per level.
		assert!(!queues.enqueue(1, waiter(3)));
		assert_eq!(queues.total_queued(), 2);

		queues.poll_highest().unwrap();
		assert!(queues.enqueue(1, waiter(3)));
	}

	#[test]
	fn test_remove_by_identity() {
		let queues = PriorityQueues::new(3, 10);
		assert!(queues.enqueue(1, waiter(7)));
		assert!(queues.enqueue(1, waiter(8)));

		assert_eq!(queues.remove(1, 7).unwrap().id, 7);
		assert!(queues.remove(1, 7).is_none());
		assert_eq!(queues.total_queued(), 1);
		assert_eq!(queues.poll_highest().unwrap().id, 8);
	}

	#[test]
	fn test_count_tracks_queue_lengths() {
		let queues = PriorityQueues::new(4, 10);
		assert_eq!(queues.total_queued(), 0);
		assert!(queues.enqueue(0, waiter(1)));
		assert!(queues.enqueue(3, waiter(2)));
		assert_eq!(queues.total_queued(), 2);
		queues.poll_highest().unwrap();
		assert_eq!(queues.total_queued(), 1);
		queues.remove(3, 2).unwrap();
		assert_eq!(queues.total_queued(), 0);
	}
}
