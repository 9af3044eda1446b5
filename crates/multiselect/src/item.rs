//! Item registry: one [`Item`] per input record.
//!
//! Items never store their own selection flag. Every selection accessor reads
//! from, and every mutation writes through, a [`SelectionSink`] owned by the
//! orchestrator.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap as HashMap;

use crate::accessor::Accessor;
use crate::error::{Error, Result};
use crate::id::Id;

/// Batch of selection changes routed to a [`SelectionSink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Change {
	pub added: Vec<Id>,
	pub removed: Vec<Id>,
}

impl Change {
	pub fn add(id: Id) -> Self {
		Self {
			added: vec![id],
			removed: Vec::new(),
		}
	}

	pub fn remove(id: Id) -> Self {
		Self {
			added: Vec::new(),
			removed: vec![id],
		}
	}

	pub fn is_empty(&self) -> bool {
		self.added.is_empty() && self.removed.is_empty()
	}
}

/// Single entry point through which selection state is read and mutated.
///
/// The orchestrator is the only implementor in this crate; components receive
/// it by shared reference and never hold the selection set themselves.
pub trait SelectionSink {
	/// Returns whether `id` is in the canonical selection set.
	fn contains(&self, id: &Id) -> bool;

	/// Applies a change to the canonical selection set.
	fn apply(&self, change: Change);
}

/// Definition of how records become items.
pub struct ItemDef<D, M = ()> {
	pub id: Accessor<D>,
	pub meta: Option<Rc<dyn Fn(&D) -> M>>,
}

impl<D> ItemDef<D> {
	pub fn new(id: impl Into<Accessor<D>>) -> Self {
		Self { id: id.into(), meta: None }
	}
}

impl<D, M> ItemDef<D, M> {
	/// Computes per-item metadata once at construction time.
	pub fn with_meta<N, F>(self, meta: F) -> ItemDef<D, N>
	where
		F: Fn(&D) -> N + 'static,
	{
		ItemDef {
			id: self.id,
			meta: Some(Rc::new(meta)),
		}
	}
}

/// A wrapped input record.
pub struct Item<D, M = ()> {
	id: Id,
	data: D,
	meta: Option<M>,
}

impl<D, M> Item<D, M> {
	pub fn id(&self) -> &Id {
		&self.id
	}

	pub fn data(&self) -> &D {
		&self.data
	}

	pub fn meta(&self) -> Option<&M> {
		self.meta.as_ref()
	}

	pub fn is_selected<S: SelectionSink + ?Sized>(&self, sink: &S) -> bool {
		sink.contains(&self.id)
	}

	/// Selects the item. No-op, with no notification, if already selected.
	pub fn select<S: SelectionSink + ?Sized>(&self, sink: &S) {
		if !sink.contains(&self.id) {
			sink.apply(Change::add(self.id.clone()));
		}
	}

	/// Unselects the item. No-op, with no notification, if not selected.
	pub fn unselect<S: SelectionSink + ?Sized>(&self, sink: &S) {
		if sink.contains(&self.id) {
			sink.apply(Change::remove(self.id.clone()));
		}
	}

	pub fn toggle<S: SelectionSink + ?Sized>(&self, sink: &S) {
		if sink.contains(&self.id) {
			self.unselect(sink);
		} else {
			self.select(sink);
		}
	}
}

impl<D: fmt::Debug, M: fmt::Debug> fmt::Debug for Item<D, M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Item")
			.field("id", &self.id)
			.field("data", &self.data)
			.field("meta", &self.meta)
			.finish()
	}
}

/// Items in input order plus an ID index. Built once, never mutated.
pub struct ItemRegistry<D, M> {
	items: Rc<[Rc<Item<D, M>>]>,
	by_id: HashMap<Id, usize>,
}

impl<D, M> ItemRegistry<D, M> {
	/// Wraps every record, failing on the first record without an ID.
	pub fn build(data: Vec<D>, def: &ItemDef<D, M>) -> Result<Self> {
		let mut items = Vec::with_capacity(data.len());
		let mut by_id = HashMap::default();
		by_id.reserve(data.len());

		for (index, record) in data.into_iter().enumerate() {
			let Some(id) = def.id.resolve(&record) else {
				return Err(Error::MissingId {
					index,
					accessor: def.id.to_string(),
				});
			};
			if let Some(&first) = by_id.get(&id) {
				return Err(Error::DuplicateId { id, first, second: index });
			}
			let meta = def.meta.as_ref().map(|f| f(&record));
			by_id.insert(id.clone(), index);
			items.push(Rc::new(Item { id, data: record, meta }));
		}

		tracing::debug!(count = items.len(), "built item registry");
		Ok(Self {
			items: items.into(),
			by_id,
		})
	}

	pub fn get(&self, id: &Id) -> Option<&Rc<Item<D, M>>> {
		self.by_id.get(id).map(|&index| &self.items[index])
	}

	pub fn index_of(&self, id: &Id) -> Option<usize> {
		self.by_id.get(id).copied()
	}

	pub fn items(&self) -> &[Rc<Item<D, M>>] {
		&self.items
	}

	pub fn shared(&self) -> Rc<[Rc<Item<D, M>>]> {
		Rc::clone(&self.items)
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}
