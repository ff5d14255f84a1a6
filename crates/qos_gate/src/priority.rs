use std::collections::HashMap;

use axum::extract::Query;
use axum::http::Uri;

/// Most urgent schedulable level. Smaller numbers are more urgent.
pub const MAX_URGENCY: u8 = 1;

/// Requests carrying this level skip admission control entirely.
pub const BYPASS: u8 = 0;

/// Query parameter consulted for the initial priority.
pub const PRIORITY_PARAM: &str = "priority";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
	Bypass,
	Level(u8),
}

/// Maps an incoming request URI to its initial priority.
pub struct PriorityExtractor {
	min_priority: u8,
}

impl PriorityExtractor {
	#[must_use]
	pub const fn new(min_priority: u8) -> Self {
		Self { min_priority }
	}

	/// Reads `priority` from the query string. A missing, unparseable or
	/// out-of-range value falls back to the lowest urgency. Bypass sits
	/// outside the schedulable range, so it is checked before the range.
	#[must_use]
	pub fn extract(&self, uri: &Uri) -> Priority {
		let Some(raw) = query_param(uri, PRIORITY_PARAM) else {
			return Priority::Level(self.min_priority);
		};
		let Ok(value) = raw.parse::<i64>() else {
			return Priority::Level(self.min_priority);
		};

		if let Ok(level) = u8::try_from(value) {
			if level == BYPASS {
				return Priority::Bypass;
			}
			if (MAX_URGENCY..=self.min_priority).contains(&level) {
				return Priority::Level(level);
			}
		}

		Priority::Level(self.min_priority)
	}
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
	let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
	params.remove(name)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn extract(uri: &str) -> Priority {
		PriorityExtractor::new(5).extract(&uri.parse::<Uri>().unwrap())
	}

	#[test]
	fn test_bypass_recognized_before_range_check() {
		assert_eq!(extract("/work?priority=0"), Priority::Bypass);
	}

	#[test]
	fn test_in_range_values_honored() {
		assert_eq!(extract("/work?priority=1"), Priority::Level(1));
		assert_eq!(extract("/work?priority=3"), Priority::Level(3));
		assert_eq!(extract("/work?priority=5"), Priority::Level(5));
	}

	#[test]
	fn test_out_of_range_clamps_to_min_priority() {
		assert_eq!(extract("/work?priority=6"), Priority::Level(5));
		assert_eq!(extract("/work?priority=250"), Priority::Level(5));
		assert_eq!(extract("/work?priority=-2"), Priority::Level(5));
	}

	#[test]
	fn test_missing_or_garbage_falls_back() {
		assert_eq!(extract("/work"), Priority::Level(5));
		assert_eq!(extract("/work?priority="), Priority::Level(5));
		assert_eq!(extract("/work?priority=fast"), Priority::Level(5));
		assert_eq!(extract("/work?other=1"), Priority::Level(5));
	}

	#[test]
	fn test_other_params_do_not_interfere() {
		assert_eq!(extract("/work?ms=40&priority=2&tag=a"), Priority::Level(2));
	}

	#[test]
	fn test_single_level_range() {
		let extractor = PriorityExtractor::new(1);
		assert_eq!(extractor.extract(&"/work?priority=1".parse::<Uri>().unwrap()), Priority::Level(1));
		assert_eq!(extractor.extract(&"/work?priority=2".parse::<Uri>().unwrap()), Priority::Level(1));
		assert_eq!(extractor.extract(&"/work?priority=0".parse::<Uri>().unwrap()), Priority::Bypass);
	}
}
