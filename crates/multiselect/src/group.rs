//! Grouping engine.
//!
//! Builds an immutable multi-level tree by partitioning items with an ordered
//! list of key accessors. Buckets keep first-seen order. A node holds items
//! directly only when recursion below it produced no child groups; otherwise
//! it holds children and no items.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashSet as HashSet};

use crate::accessor::{Accessor, Fields};
use crate::error::{Error, Result};
use crate::id::Id;
use crate::item::{Change, Item, SelectionSink};

/// Per-level metadata callback: `(group key, contained records, level)`.
pub type GroupMetaFn<D, H> = Rc<dyn Fn(&Id, &[&D], usize) -> H>;

/// One grouping level: the key accessor plus optional per-group metadata.
pub struct GroupBy<D, H = ()> {
	pub accessor: Accessor<D>,
	pub meta: Option<GroupMetaFn<D, H>>,
}

impl<D, H> GroupBy<D, H> {
	pub fn new(accessor: impl Into<Accessor<D>>) -> Self {
		Self {
			accessor: accessor.into(),
			meta: None,
		}
	}

	pub fn with_meta<F>(mut self, meta: F) -> Self
	where
		F: Fn(&Id, &[&D], usize) -> H + 'static,
	{
		self.meta = Some(Rc::new(meta));
		self
	}
}

impl<D, H> From<Accessor<D>> for GroupBy<D, H> {
	fn from(accessor: Accessor<D>) -> Self {
		Self::new(accessor)
	}
}

impl<D: Fields, H> From<&str> for GroupBy<D, H> {
	fn from(path: &str) -> Self {
		Self::new(Accessor::path(path))
	}
}

/// Raw node of the group tree.
pub struct GroupNode<D, M = (), H = ()> {
	key: Id,
	level: usize,
	path: Box<[Id]>,
	children: Vec<Rc<GroupNode<D, M, H>>>,
	/// Items this node transitively contains; for leaves, its own items.
	leaves: Rc<[Rc<Item<D, M>>]>,
	meta: Option<H>,
}

impl<D, M, H> GroupNode<D, M, H> {
	pub fn key(&self) -> &Id {
		&self.key
	}

	pub fn level(&self) -> usize {
		self.level
	}

	/// Root-to-node sequence of keys, this node's key included.
	pub fn path(&self) -> &[Id] {
		&self.path
	}

	/// Items held directly. Empty for internal nodes.
	pub fn items(&self) -> &[Rc<Item<D, M>>] {
		if self.children.is_empty() { &self.leaves } else { &[] }
	}

	pub fn children(&self) -> &[Rc<GroupNode<D, M, H>>] {
		&self.children
	}

	pub fn has_children(&self) -> bool {
		!self.children.is_empty()
	}

	/// Every item reachable below this node, in tree order.
	pub fn leaves(&self) -> &[Rc<Item<D, M>>] {
		&self.leaves
	}

	pub(crate) fn shared_leaves(&self) -> Rc<[Rc<Item<D, M>>]> {
		Rc::clone(&self.leaves)
	}

	/// Metadata computed for this node's level, if that level has a callback.
	pub fn meta(&self) -> Option<&H> {
		self.meta.as_ref()
	}

	pub fn is_all_selected<S: SelectionSink + ?Sized>(&self, sink: &S) -> bool {
		self.leaves.iter().all(|item| item.is_selected(sink))
	}

	/// Selects every leaf this group transitively contains.
	pub fn select<S: SelectionSink + ?Sized>(&self, sink: &S) {
		select_items(&self.leaves, sink);
	}

	pub fn unselect<S: SelectionSink + ?Sized>(&self, sink: &S) {
		unselect_items(&self.leaves, sink);
	}

	/// Unselects all leaves if all are selected, otherwise selects all.
	pub fn toggle<S: SelectionSink + ?Sized>(&self, sink: &S) {
		if self.is_all_selected(sink) {
			self.unselect(sink);
		} else {
			self.select(sink);
		}
	}
}

impl<D, M, H: fmt::Debug> fmt::Debug for GroupNode<D, M, H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GroupNode")
			.field("key", &self.key)
			.field("level", &self.level)
			.field("leaves", &self.leaves.len())
			.field("children", &self.children)
			.field("meta", &self.meta)
			.finish()
	}
}

/// Routes the not-yet-selected subset of `items` through `sink` as one change.
pub(crate) fn select_items<D, M, S: SelectionSink + ?Sized>(items: &[Rc<Item<D, M>>], sink: &S) {
	let added: Vec<Id> = items.iter().filter(|i| !i.is_selected(sink)).map(|i| i.id().clone()).collect();
	if !added.is_empty() {
		sink.apply(Change { added, removed: Vec::new() });
	}
}

pub(crate) fn unselect_items<D, M, S: SelectionSink + ?Sized>(items: &[Rc<Item<D, M>>], sink: &S) {
	let removed: Vec<Id> = items.iter().filter(|i| i.is_selected(sink)).map(|i| i.id().clone()).collect();
	if !removed.is_empty() {
		sink.apply(Change { added: Vec::new(), removed });
	}
}

/// Immutable group tree built from the full, unfiltered item set.
pub struct GroupTree<D, M = (), H = ()> {
	depth: usize,
	roots: Vec<Rc<GroupNode<D, M, H>>>,
	ungrouped: Vec<Rc<Item<D, M>>>,
}

impl<D, M, H> GroupTree<D, M, H> {
	/// Partitions `items` by `levels`, one accessor per tree level.
	pub fn build(items: &[Rc<Item<D, M>>], levels: &[GroupBy<D, H>]) -> Result<Self> {
		let roots = group_level(items, levels, 0, &[])?;

		let mut placed = HashSet::default();
		let mut stack: Vec<&Rc<GroupNode<D, M, H>>> = roots.iter().collect();
		while let Some(node) = stack.pop() {
			if node.has_children() {
				stack.extend(node.children.iter());
			} else {
				placed.extend(node.leaves.iter().map(|i| i.id()));
			}
		}
		let ungrouped: Vec<_> = items.iter().filter(|i| !placed.contains(i.id())).cloned().collect();

		tracing::debug!(depth = levels.len(), roots = roots.len(), ungrouped = ungrouped.len(), "built group tree");
		Ok(Self {
			depth: levels.len(),
			roots,
			ungrouped,
		})
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn roots(&self) -> &[Rc<GroupNode<D, M, H>>] {
		&self.roots
	}

	/// Items not placed in any leaf group, in input order.
	///
	/// With zero levels this is every item; otherwise it holds the items a
	/// function accessor excluded.
	pub fn ungrouped(&self) -> &[Rc<Item<D, M>>] {
		&self.ungrouped
	}

	/// All grouped leaves in tree order followed by the ungrouped items.
	pub fn flatten(&self) -> Vec<Rc<Item<D, M>>> {
		self.roots
			.iter()
			.flat_map(|node| node.leaves.iter())
			.chain(self.ungrouped.iter())
			.cloned()
			.collect()
	}

	/// First node in pre-order whose key is `key`.
	pub fn group(&self, key: &Id) -> Option<&Rc<GroupNode<D, M, H>>> {
		let mut stack: Vec<&Rc<GroupNode<D, M, H>>> = self.roots.iter().rev().collect();
		while let Some(node) = stack.pop() {
			if &node.key == key {
				return Some(node);
			}
			stack.extend(node.children.iter().rev());
		}
		None
	}

	/// Finds the node at an exact key path.
	pub fn find(&self, path: &[Id]) -> Option<&Rc<GroupNode<D, M, H>>> {
		let (first, rest) = path.split_first()?;
		let mut node = self.roots.iter().find(|n| &n.key == first)?;
		for key in rest {
			node = node.children.iter().find(|n| &n.key == key)?;
		}
		Some(node)
	}
}

fn group_level<D, M, H>(
	items: &[Rc<Item<D, M>>],
	levels: &[GroupBy<D, H>],
	level: usize,
	path: &[Id],
) -> Result<Vec<Rc<GroupNode<D, M, H>>>> {
	let Some(grouping) = levels.get(level) else {
		return Ok(Vec::new());
	};

	let mut buckets: IndexMap<Id, Vec<Rc<Item<D, M>>>, FxBuildHasher> = IndexMap::default();
	for item in items {
		match (grouping.accessor.resolve(item.data()), &grouping.accessor) {
			(Some(key), _) => buckets.entry(key).or_default().push(Rc::clone(item)),
			(None, Accessor::Path { path: field, .. }) => {
				return Err(Error::MissingGroupKey {
					path: field.to_string(),
					level,
					item: item.id().clone(),
				});
			}
			(None, Accessor::Function(_)) => {}
		}
	}

	let mut nodes = Vec::with_capacity(buckets.len());
	for (key, bucket) in buckets {
		let mut node_path = Vec::with_capacity(path.len() + 1);
		node_path.extend_from_slice(path);
		node_path.push(key.clone());

		let children = group_level(&bucket, levels, level + 1, &node_path)?;
		let leaves: Rc<[Rc<Item<D, M>>]> = if children.is_empty() {
			bucket.into()
		} else {
			children.iter().flat_map(|c| c.leaves.iter().cloned()).collect()
		};
		let meta = grouping.meta.as_ref().map(|f| {
			let records: Vec<&D> = leaves.iter().map(|i| i.data()).collect();
			f(&key, &records, level)
		});

		nodes.push(Rc::new(GroupNode {
			key,
			level,
			path: node_path.into(),
			children,
			leaves,
			meta,
		}));
	}
	Ok(nodes)
}

#[cfg(test)]
mod tests;
