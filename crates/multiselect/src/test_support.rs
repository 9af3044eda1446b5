use std::cell::RefCell;

use rustc_hash::FxHashSet as HashSet;
use serde_json::{Value, json};

use crate::id::Id;
use crate::item::{Change, SelectionSink};

/// Sink that applies changes to a plain set and records every call.
#[derive(Default)]
pub(crate) struct RecordingSink {
	pub selected: RefCell<HashSet<Id>>,
	pub calls: RefCell<Vec<Change>>,
}

impl RecordingSink {
	pub fn with_selected(ids: impl IntoIterator<Item = Id>) -> Self {
		let sink = Self::default();
		sink.selected.borrow_mut().extend(ids);
		sink
	}

	pub fn call_count(&self) -> usize {
		self.calls.borrow().len()
	}

	pub fn sorted(&self) -> Vec<Id> {
		let mut ids: Vec<Id> = self.selected.borrow().iter().cloned().collect();
		ids.sort();
		ids
	}
}

impl SelectionSink for RecordingSink {
	fn contains(&self, id: &Id) -> bool {
		self.selected.borrow().contains(id)
	}

	fn apply(&self, change: Change) {
		{
			let mut selected = self.selected.borrow_mut();
			for id in &change.added {
				selected.insert(id.clone());
			}
			for id in &change.removed {
				selected.remove(id);
			}
		}
		self.calls.borrow_mut().push(change);
	}
}

/// Ten records across three categories: fruit x3, vegetable x3, animal x4.
pub(crate) fn catalog() -> Vec<Value> {
	vec![
		json!({ "id": 1, "label": "Apple", "category": "fruit", "taste": { "brix": 10 } }),
		json!({ "id": 2, "label": "Banana", "category": "fruit", "taste": { "brix": 15 } }),
		json!({ "id": 3, "label": "Cherry", "category": "fruit", "taste": { "brix": 10 } }),
		json!({ "id": 4, "label": "Carrot", "category": "vegetable", "taste": { "brix": 2 } }),
		json!({ "id": 5, "label": "Broccoli", "category": "vegetable", "taste": { "brix": 1 } }),
		json!({ "id": 6, "label": "Spinach", "category": "vegetable", "taste": { "brix": 1 } }),
		json!({ "id": 7, "label": "Dog", "category": "animal", "mbti": "ENFP" }),
		json!({ "id": 8, "label": "Cat", "category": "animal", "mbti": "INFP" }),
		json!({ "id": 9, "label": "Elephant", "category": "animal", "mbti": "ENFP" }),
		json!({ "id": 10, "label": "Lion", "category": "animal", "mbti": "ISTJ" }),
	]
}

pub(crate) fn ids(values: &[i64]) -> Vec<Id> {
	values.iter().map(|&v| Id::Int(v)).collect()
}
