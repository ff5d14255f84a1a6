use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::QosError;
use crate::priority::MAX_URGENCY;

#[derive(Parser, Clone, Debug, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
pub struct QosConfig {
	/// Lowest-urgency priority level accepted for scheduling
	#[arg(long = "minpriority", env = "QOS_MIN_PRIORITY", default_value = "5")]
	pub min_priority: u8,

	/// Concurrent service slots
	#[arg(long = "maxreq", env = "QOS_MAX_REQ", default_value = "1")]
	pub max_concurrent: usize,

	/// Total queued requests across all priority levels
	#[arg(long = "maxqueue", env = "QOS_MAX_QUEUE", default_value = "100")]
	pub max_queue_depth: usize,

	/// Fast-path slot wait in milliseconds
	#[arg(long = "locktimeout", env = "QOS_LOCK_TIMEOUT_MS", default_value = "50", value_parser = parse_millis)]
	pub slot_acquire_timeout: Duration,

	/// Maximum time from arrival to service start, in milliseconds
	#[arg(long = "requesttimeout", env = "QOS_REQUEST_TIMEOUT_MS", default_value = "2000", value_parser = parse_millis)]
	pub request_deadline: Duration,

	/// Time spent at each priority level before promotion, in milliseconds
	#[arg(long = "prioritytimeout", env = "QOS_PRIORITY_TIMEOUT_MS", default_value = "500", value_parser = parse_millis)]
	pub promotion_interval: Duration,
}

impl Default for QosConfig {
	fn default() -> Self {
		Self {
			min_priority: 5,
			max_concurrent: 1,
			max_queue_depth: 100,
			slot_acquire_timeout: Duration::from_millis(50),
			request_deadline: Duration::from_millis(2000),
			promotion_interval: Duration::from_millis(500),
		}
	}
}

impl QosConfig {
	/// Builds a config from a name→value mapping. Unrecognized keys are
	/// ignored; malformed integers fail init.
	pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QosError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let mut config = Self::default();

		for (key, value) in pairs {
			let (key, value) = (key.as_ref(), value.as_ref());
			match key {
				"minpriority" => config.min_priority = parse_value(key, value)?,
				"maxreq" => config.max_concurrent = parse_value(key, value)?,
				"maxqueue" => config.max_queue_depth = parse_value(key, value)?,
				"locktimeout" => config.slot_acquire_timeout = Duration::from_millis(parse_value(key, value)?),
				"requesttimeout" => config.request_deadline = Duration::from_millis(parse_value(key, value)?),
				"prioritytimeout" => config.promotion_interval = Duration::from_millis(parse_value(key, value)?),
				_ => {}
			}
		}

		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), QosError> {
		if self.min_priority < MAX_URGENCY {
			return Err(QosError::InvalidConfig {
				key: "minpriority".into(),
				value: self.min_priority.to_string(),
			});
		}
		if self.max_concurrent == 0 {
			return Err(QosError::InvalidConfig {
				key: "maxreq".into(),
				value: self.max_concurrent.to_string(),
			});
		}
		Ok(())
	}

	/// Number of waiting queues, one per schedulable level.
	#[must_use]
	pub const fn priority_levels(&self) -> usize {
		(self.min_priority - MAX_URGENCY) as usize + 1
	}
}

fn parse_millis(s: &str) -> Result<Duration, std::num::ParseIntError> {
	s.parse::<u64>().map(Duration::from_millis)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, QosError> {
	value.parse().map_err(|_| QosError::InvalidConfig {
		key: key.to_string(),
		value: value.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_config() {
		let config = QosConfig::default();
		assert_eq!(config.min_priority, 5);
		assert_eq!(config.max_concurrent, 1);
		assert_eq!(config.max_queue_depth, 100);
		assert_eq!(config.slot_acquire_timeout, Duration::from_millis(50));
		assert_eq!(config.request_deadline, Duration::from_millis(2000));
		assert_eq!(config.promotion_interval, Duration::from_millis(500));
		assert_eq!(config.priority_levels(), 5);
	}

	#[test]
	fn test_from_pairs() {
		let config = QosConfig::from_pairs([
			("minpriority", "3"),
			("maxreq", "4"),
			("maxqueue", "20"),
			("locktimeout", "10"),
			("requesttimeout", "1000"),
			("prioritytimeout", "100"),
		])
		.unwrap();

		assert_eq!(config.min_priority, 3);
		assert_eq!(config.max_concurrent, 4);
		assert_eq!(config.max_queue_depth, 20);
		assert_eq!(config.slot_acquire_timeout, Duration::from_millis(10));
		assert_eq!(config.request_deadline, Duration::from_millis(1000));
		assert_eq!(config.promotion_interval, Duration::from_millis(100));
		assert_eq!(config.priority_levels(), 3);
	}

	#[test]
	fn test_from_pairs_ignores_unknown_keys() {
		let config = QosConfig::from_pairs([("maxreq", "2"), ("flavor", "vanilla")]).unwrap();
		assert_eq!(config.max_concurrent, 2);
		assert_eq!(config.min_priority, 5);
	}

	#[test]
	fn test_from_pairs_rejects_malformed_integers() {
		assert!(QosConfig::from_pairs([("maxqueue", "lots")]).is_err());
		assert!(QosConfig::from_pairs([("locktimeout", "-50")]).is_err());
	}

	#[test]
	fn test_validate_rejects_bad_bounds() {
		assert!(QosConfig::from_pairs([("minpriority", "0")]).is_err());
		assert!(QosConfig::from_pairs([("maxreq", "0")]).is_err());
	}

	#[test]
	fn test_config_parser() {
		let args = vec![
			"program",
			"--minpriority",
			"4",
			"--maxreq",
			"8",
			"--maxqueue",
			"50",
			"--locktimeout",
			"25",
			"--requesttimeout",
			"1500",
			"--prioritytimeout",
			"250",
		];

		let config = QosConfig::try_parse_from(args).unwrap();
		assert_eq!(config.min_priority, 4);
		assert_eq!(config.max_concurrent, 8);
		assert_eq!(config.max_queue_depth, 50);
		assert_eq!(config.slot_acquire_timeout, Duration::from_millis(25));
		assert_eq!(config.request_deadline, Duration::from_millis(1500));
		assert_eq!(config.promotion_interval, Duration::from_millis(250));
	}
}
