//! Tunables of a [`MultiSelect`](crate::MultiSelect) instance.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(8) {
	Some(capacity) => capacity,
	None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Maximum number of projection trees kept in the cache.
	pub projection_cache_capacity: NonZeroUsize,
	/// Notify listeners even when a flush's net diff is empty.
	pub emit_empty_flush: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			projection_cache_capacity: DEFAULT_CACHE_CAPACITY,
			emit_empty_flush: true,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_fields_take_defaults() {
		let settings: Settings = serde_json::from_str(r#"{ "emit_empty_flush": false }"#).unwrap();
		assert_eq!(settings.projection_cache_capacity.get(), 8);
		assert!(!settings.emit_empty_flush);
	}

	#[test]
	fn zero_capacity_is_rejected() {
		assert!(serde_json::from_str::<Settings>(r#"{ "projection_cache_capacity": 0 }"#).is_err());
	}
}
