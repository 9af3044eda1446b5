//! Canonical selection set plus the bookkeeping derived from its change stream.
//!
//! ```text
//! apply(Change) ──► selected set      (source of truth for every query)
//!               ├─► order book        (collapse tie-breaks)
//!               ├─► pending diff      (net change since last flush)
//!               └─► version           (projection cache key)
//! ```

use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashSet as HashSet};
use serde::{Deserialize, Serialize};

use crate::collapse::OrderBook;
use crate::id::Id;
use crate::item::Change;

/// Snapshot of the selection handed to listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
	/// Selected IDs in registry order.
	pub selected_ids: Vec<Id>,
}

/// Net selection change since the previous notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDiff {
	pub added: Vec<Id>,
	pub removed: Vec<Id>,
}

impl SelectionDiff {
	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.removed.is_empty()
	}
}

/// Selection counts under a scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSummary {
	pub total: usize,
	pub selected: usize,
}

#[derive(Debug, Default)]
struct PendingDiff {
	added: IndexSet<Id, FxBuildHasher>,
	removed: IndexSet<Id, FxBuildHasher>,
}

/// Owner of the canonical selected-ID set.
#[derive(Debug, Default)]
pub struct SelectionBook {
	selected: HashSet<Id>,
	orders: OrderBook,
	pending: PendingDiff,
	version: u64,
}

impl SelectionBook {
	/// Seeds the set and the order book in the given order, without a diff.
	pub fn with_initial(ids: impl IntoIterator<Item = Id>) -> Self {
		let mut book = Self::default();
		for id in ids {
			if book.selected.insert(id.clone()) {
				book.orders.record(id);
			}
		}
		book
	}

	pub fn contains(&self, id: &Id) -> bool {
		self.selected.contains(id)
	}

	pub fn len(&self) -> usize {
		self.selected.len()
	}

	pub fn is_empty(&self) -> bool {
		self.selected.is_empty()
	}

	/// Incremented once per change that altered the set.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn orders(&self) -> &OrderBook {
		&self.orders
	}

	/// Applies `change`, skipping redundant entries. Returns how many IDs
	/// actually changed state.
	pub fn apply(&mut self, change: Change) -> usize {
		let mut accepted = 0;
		for id in change.added {
			if self.selected.insert(id.clone()) {
				self.orders.record(id.clone());
				if !self.pending.removed.shift_remove(&id) {
					self.pending.added.insert(id);
				}
				accepted += 1;
			}
		}
		for id in change.removed {
			if self.selected.remove(&id) {
				self.orders.forget(&id);
				if !self.pending.added.shift_remove(&id) {
					self.pending.removed.insert(id);
				}
				accepted += 1;
			}
		}
		if accepted > 0 {
			self.version = self.version.wrapping_add(1);
		}
		accepted
	}

	pub fn has_pending(&self) -> bool {
		!self.pending.added.is_empty() || !self.pending.removed.is_empty()
	}

	/// Drains the net change accumulated since the last call.
	pub fn take_diff(&mut self) -> SelectionDiff {
		let pending = std::mem::take(&mut self.pending);
		SelectionDiff {
			added: pending.added.into_iter().collect(),
			removed: pending.removed.into_iter().collect(),
		}
	}
}
