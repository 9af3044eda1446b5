//! Collapse engine: reduces a selection to its coarsest covering entries.
//!
//! Walking the projection depth-first, a node whose scoped items are all
//! selected is emitted as one group entry and not descended into. Otherwise a
//! leaf node emits its selected items one by one and the walk continues into
//! sub-groups. Entries are ordered by a [`PositionStrategy`] applied to the
//! selection-order numbers kept in an [`OrderBook`].

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap as HashMap;

use crate::id::Id;
use crate::item::{Item, SelectionSink};
use crate::projection::{GroupView, Scope};

/// Order assigned to selected items that were never recorded. Sorts last.
pub const UNORDERED: u64 = u64::MAX;

/// Selection-order bookkeeping: ID to a monotonically increasing sequence number.
#[derive(Debug, Default, Clone)]
pub struct OrderBook {
	orders: HashMap<Id, u64>,
	next: u64,
}

impl OrderBook {
	/// Records a selection, replacing any earlier number for the same ID.
	pub fn record(&mut self, id: Id) -> u64 {
		let order = self.next;
		self.next += 1;
		self.orders.insert(id, order);
		order
	}

	pub fn forget(&mut self, id: &Id) {
		self.orders.remove(id);
	}

	pub fn get(&self, id: &Id) -> Option<u64> {
		self.orders.get(id).copied()
	}

	pub fn order_of(&self, id: &Id) -> u64 {
		self.get(id).unwrap_or(UNORDERED)
	}

	pub fn len(&self) -> usize {
		self.orders.len()
	}

	pub fn is_empty(&self) -> bool {
		self.orders.is_empty()
	}
}

/// Tie-break rule turning the orders of an entry's constituents into one position.
#[derive(Clone, Default)]
pub enum PositionStrategy {
	/// Earliest constituent selection wins.
	#[default]
	First,
	/// Latest constituent selection wins.
	Last,
	Custom(Rc<dyn Fn(&[u64]) -> u64>),
}

impl PositionStrategy {
	pub fn custom<F>(f: F) -> Self
	where
		F: Fn(&[u64]) -> u64 + 'static,
	{
		Self::Custom(Rc::new(f))
	}

	/// Position for a non-empty list of constituent orders.
	pub fn position(&self, orders: &[u64]) -> u64 {
		match self {
			Self::First => orders.iter().copied().min().unwrap_or(UNORDERED),
			Self::Last => orders.iter().copied().max().unwrap_or(UNORDERED),
			Self::Custom(f) => f(orders),
		}
	}
}

impl fmt::Debug for PositionStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::First => f.write_str("First"),
			Self::Last => f.write_str("Last"),
			Self::Custom(_) => f.write_str("Custom(..)"),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct CollapseOptions {
	pub filtered_only: bool,
	pub strategy: PositionStrategy,
}

impl CollapseOptions {
	pub fn scope(&self) -> Scope {
		Scope {
			filtered_only: self.filtered_only,
		}
	}
}

/// One entry of a collapsed selection.
pub enum CollapsedNode<D, M = (), H = ()> {
	Item { item: Rc<Item<D, M>>, order: u64 },
	Group { group: GroupView<D, M, H>, order: u64 },
}

impl<D, M, H> CollapsedNode<D, M, H> {
	pub fn order(&self) -> u64 {
		match self {
			Self::Item { order, .. } | Self::Group { order, .. } => *order,
		}
	}

	pub fn is_group(&self) -> bool {
		matches!(self, Self::Group { .. })
	}

	/// Key of the group, or ID of the item.
	pub fn key(&self) -> &Id {
		match self {
			Self::Item { item, .. } => item.id(),
			Self::Group { group, .. } => group.key(),
		}
	}

	/// Items this entry stands for under `scope`.
	pub fn covered(&self, scope: Scope) -> &[Rc<Item<D, M>>] {
		match self {
			Self::Item { item, .. } => std::slice::from_ref(item),
			Self::Group { group, .. } => group.items(scope),
		}
	}
}

impl<D, M, H> Clone for CollapsedNode<D, M, H> {
	fn clone(&self) -> Self {
		match self {
			Self::Item { item, order } => Self::Item {
				item: Rc::clone(item),
				order: *order,
			},
			Self::Group { group, order } => Self::Group {
				group: group.clone(),
				order: *order,
			},
		}
	}
}

impl<D, M, H> fmt::Debug for CollapsedNode<D, M, H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = if self.is_group() { "Group" } else { "Item" };
		f.debug_struct(kind).field("key", self.key()).field("order", &self.order()).finish()
	}
}

/// Collapses the selection over `roots`, appending selected `loose` items
/// (already restricted to the requested scope) as item entries.
pub fn collapse_selection<D, M, H, S>(
	roots: &[GroupView<D, M, H>],
	loose: &[Rc<Item<D, M>>],
	orders: &OrderBook,
	options: &CollapseOptions,
	sink: &S,
) -> Vec<CollapsedNode<D, M, H>>
where
	S: SelectionSink + ?Sized,
{
	let mut walk = Walk {
		orders,
		options,
		scope: options.scope(),
		sink,
		out: Vec::new(),
	};
	for root in roots {
		walk.node(root);
	}
	for item in loose.iter().filter(|item| item.is_selected(sink)) {
		walk.push_item(item);
	}

	let mut out = walk.out;
	out.sort_by_key(CollapsedNode::order);
	out
}

struct Walk<'a, D, M, H, S: ?Sized> {
	orders: &'a OrderBook,
	options: &'a CollapseOptions,
	scope: Scope,
	sink: &'a S,
	out: Vec<CollapsedNode<D, M, H>>,
}

impl<D, M, H, S: SelectionSink + ?Sized> Walk<'_, D, M, H, S> {
	fn node(&mut self, view: &GroupView<D, M, H>) {
		let items = view.items(self.scope);
		let selected: Vec<&Rc<Item<D, M>>> = items.iter().filter(|item| item.is_selected(self.sink)).collect();

		if !selected.is_empty() && selected.len() == items.len() {
			let orders: Vec<u64> = selected.iter().map(|item| self.orders.order_of(item.id())).collect();
			self.out.push(CollapsedNode::Group {
				group: view.clone(),
				order: self.options.strategy.position(&orders),
			});
			return;
		}

		if !view.has_sub_groups(self.scope) {
			for item in selected {
				self.push_item(item);
			}
		}
		for child in view.sub_groups(self.scope) {
			self.node(child);
		}
	}

	fn push_item(&mut self, item: &Rc<Item<D, M>>) {
		self.out.push(CollapsedNode::Item {
			item: Rc::clone(item),
			order: self.orders.order_of(item.id()),
		});
	}
}
