//! Projection layer: read-only views combining the raw group tree with the
//! filter and selection scopes.
//!
//! Projection runs in two passes over immutable data:
//!
//! ```text
//! GroupTree ──filter pass──► unified views ──selection pass──► Projection
//!            (prune by filtered set,          (prune by selected leaves,
//!             split all/filtered leaves)       share leaf lists)
//! ```
//!
//! Pruning decides which nodes exist. The per-call [`Scope`] passed to view
//! accessors decides which items a surviving node lists.

use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::{Deserialize, Serialize};

use crate::group::{GroupNode, GroupTree, select_items, unselect_items};
use crate::id::Id;
use crate::item::{Item, SelectionSink};

/// Per-call item scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
	/// Restrict to items matching the active filter.
	pub filtered_only: bool,
}

impl Scope {
	pub const ALL: Self = Self { filtered_only: false };
	pub const FILTERED: Self = Self { filtered_only: true };
}

/// Selection-scoped pruning request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionScope {
	pub selected_only: bool,
	/// Keep groups with at least one selected leaf instead of only fully
	/// selected ones.
	pub include_partial: bool,
}

/// Options for [`MultiSelect::group_tree`](crate::MultiSelect::group_tree).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupTreeOptions {
	pub filter: Scope,
	pub selection: SelectionScope,
}

impl GroupTreeOptions {
	pub fn filtered() -> Self {
		Self {
			filter: Scope::FILTERED,
			..Self::default()
		}
	}

	pub fn selected(include_partial: bool) -> Self {
		Self {
			selection: SelectionScope {
				selected_only: true,
				include_partial,
			},
			..Self::default()
		}
	}
}

/// Cache key of a projection.
///
/// Includes the selection and filter versions so two different selection
/// states, or two predicates sharing a query, never share a cached tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionKey {
	pub query: Box<str>,
	/// Effective flag: requested and a non-empty query is active.
	pub filtered_only: bool,
	pub selected_only: bool,
	pub include_partial: bool,
	/// Requested filter scope, which bounds selection counting even when
	/// the query is empty.
	pub selection_within_filter: bool,
	pub selection_version: u64,
	pub filter_version: u64,
}

impl ProjectionKey {
	pub fn new(query: &str, flags: ProjectionFlags, selection_version: u64, filter_version: u64) -> Self {
		Self {
			query: query.into(),
			filtered_only: flags.prune_filtered,
			selected_only: flags.selected_only,
			include_partial: flags.include_partial,
			selection_within_filter: flags.selection_within_filter,
			selection_version,
			filter_version,
		}
	}
}

/// Resolved build flags for one projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionFlags {
	/// Drop nodes without filtered leaves. Only set when a non-empty query is active.
	pub prune_filtered: bool,
	pub selected_only: bool,
	pub include_partial: bool,
	/// Count a leaf as selected only if it is also in the filtered set.
	pub selection_within_filter: bool,
}

impl ProjectionFlags {
	/// Resolves caller options against the active query.
	pub fn resolve(options: &GroupTreeOptions, query: &str) -> Self {
		Self {
			prune_filtered: options.filter.filtered_only && !query.is_empty(),
			selected_only: options.selection.selected_only,
			include_partial: options.selection.include_partial,
			selection_within_filter: options.filter.filtered_only,
		}
	}
}

struct ViewNode<D, M, H> {
	node: Rc<GroupNode<D, M, H>>,
	all: Rc<[Rc<Item<D, M>>]>,
	filtered: Rc<[Rc<Item<D, M>>]>,
	children: Vec<GroupView<D, M, H>>,
}

/// Read-only view of a group node under a filter and selection scope.
///
/// Cloning is cheap; views share their leaf lists and the raw node.
pub struct GroupView<D, M = (), H = ()>(Rc<ViewNode<D, M, H>>);

impl<D, M, H> Clone for GroupView<D, M, H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<D, M, H> GroupView<D, M, H> {
	pub fn key(&self) -> &Id {
		self.0.node.key()
	}

	pub fn level(&self) -> usize {
		self.0.node.level()
	}

	pub fn path(&self) -> &[Id] {
		self.0.node.path()
	}

	/// The raw node this view projects.
	pub fn node(&self) -> &Rc<GroupNode<D, M, H>> {
		&self.0.node
	}

	/// Leaves of this view: all of them, or only those matching the filter.
	pub fn items(&self, scope: Scope) -> &[Rc<Item<D, M>>] {
		if scope.filtered_only { &self.0.filtered } else { &self.0.all }
	}

	/// Surviving sub-groups. With a filtered scope, sub-groups without any
	/// filtered leaf are skipped.
	pub fn sub_groups(&self, scope: Scope) -> impl Iterator<Item = &GroupView<D, M, H>> + '_ {
		self.0.children.iter().filter(move |child| !scope.filtered_only || child.filtered_count() > 0)
	}

	pub fn sub_group(&self, key: &Id) -> Option<&GroupView<D, M, H>> {
		self.0.children.iter().find(|child| child.key() == key)
	}

	pub fn has_sub_groups(&self, scope: Scope) -> bool {
		self.sub_groups(scope).next().is_some()
	}

	/// Structural children, regardless of scope.
	pub fn children(&self) -> &[GroupView<D, M, H>] {
		&self.0.children
	}

	pub fn total_count(&self) -> usize {
		self.0.all.len()
	}

	pub fn filtered_count(&self) -> usize {
		self.0.filtered.len()
	}

	/// Per-level metadata of the underlying group.
	///
	/// Computed once at tree build from every record of the unpruned group,
	/// so under a filter it may describe more leaves than [`Self::total_count`]
	/// counts.
	pub fn meta(&self) -> Option<&H> {
		self.0.node.meta()
	}

	/// False when the scoped item list is empty.
	pub fn is_all_selected<S: SelectionSink + ?Sized>(&self, sink: &S, scope: Scope) -> bool {
		let items = self.items(scope);
		!items.is_empty() && items.iter().all(|item| item.is_selected(sink))
	}

	pub fn select<S: SelectionSink + ?Sized>(&self, sink: &S, scope: Scope) {
		select_items(self.items(scope), sink);
	}

	pub fn unselect<S: SelectionSink + ?Sized>(&self, sink: &S, scope: Scope) {
		unselect_items(self.items(scope), sink);
	}

	pub fn toggle<S: SelectionSink + ?Sized>(&self, sink: &S, scope: Scope) {
		if self.is_all_selected(sink, scope) {
			self.unselect(sink, scope);
		} else {
			self.select(sink, scope);
		}
	}

	/// Whether two handles point at the same projected node.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	fn with_children(&self, children: Vec<GroupView<D, M, H>>) -> Self {
		Self(Rc::new(ViewNode {
			node: Rc::clone(&self.0.node),
			all: Rc::clone(&self.0.all),
			filtered: Rc::clone(&self.0.filtered),
			children,
		}))
	}
}

impl<D, M, H> fmt::Debug for GroupView<D, M, H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GroupView")
			.field("path", &self.path())
			.field("total", &self.total_count())
			.field("filtered", &self.filtered_count())
			.field("children", &self.0.children)
			.finish()
	}
}

/// A built projection: root views plus a key lookup.
pub struct Projection<D, M = (), H = ()> {
	roots: Vec<GroupView<D, M, H>>,
	by_key: HashMap<Id, GroupView<D, M, H>>,
}

impl<D, M, H> Projection<D, M, H> {
	pub fn roots(&self) -> &[GroupView<D, M, H>] {
		&self.roots
	}

	/// Looks a group up by key. When a key occurs at several levels the
	/// first node in pre-order wins.
	pub fn group(&self, key: &Id) -> Option<&GroupView<D, M, H>> {
		self.by_key.get(key)
	}

	/// Looks a group up by its exact key path.
	pub fn find(&self, path: &[Id]) -> Option<&GroupView<D, M, H>> {
		let (first, rest) = path.split_first()?;
		let mut view = self.roots.iter().find(|v| v.key() == first)?;
		for key in rest {
			view = view.sub_group(key)?;
		}
		Some(view)
	}

	/// Number of views in the whole tree.
	pub fn node_count(&self) -> usize {
		fn count<D, M, H>(views: &[GroupView<D, M, H>]) -> usize {
			views.iter().map(|v| 1 + count(v.children())).sum()
		}
		count(&self.roots)
	}

	pub fn is_empty(&self) -> bool {
		self.roots.is_empty()
	}
}

/// Builds the projection of `tree` under `flags`.
pub fn project<D, M, H, S>(tree: &GroupTree<D, M, H>, filtered: &HashSet<Id>, flags: ProjectionFlags, sink: &S) -> Projection<D, M, H>
where
	S: SelectionSink + ?Sized,
{
	let unified: Vec<_> = tree.roots().iter().filter_map(|node| unify(node, filtered, flags.prune_filtered)).collect();

	let roots = if flags.selected_only {
		let rule = SelectionRule {
			sink,
			filtered,
			flags,
		};
		unified.iter().filter_map(|view| rule.prune(view)).collect()
	} else {
		unified
	};

	let mut by_key = HashMap::default();
	let mut stack: Vec<&GroupView<D, M, H>> = roots.iter().rev().collect();
	while let Some(view) = stack.pop() {
		by_key.entry(view.key().clone()).or_insert_with(|| view.clone());
		stack.extend(view.children().iter().rev());
	}

	Projection { roots, by_key }
}

fn unify<D, M, H>(node: &Rc<GroupNode<D, M, H>>, filtered: &HashSet<Id>, prune: bool) -> Option<GroupView<D, M, H>> {
	let children: Vec<_> = node.children().iter().filter_map(|child| unify(child, filtered, prune)).collect();
	if node.has_children() && children.is_empty() {
		return None;
	}

	let all: Rc<[Rc<Item<D, M>>]> = if prune && node.has_children() {
		children.iter().flat_map(|child| child.0.all.iter().cloned()).collect()
	} else {
		node.shared_leaves()
	};
	let matching: Rc<[Rc<Item<D, M>>]> = all.iter().filter(|item| filtered.contains(item.id())).cloned().collect();
	if prune && matching.is_empty() {
		return None;
	}

	Some(GroupView(Rc::new(ViewNode {
		node: Rc::clone(node),
		all,
		filtered: matching,
		children,
	})))
}

struct SelectionRule<'a, S: ?Sized> {
	sink: &'a S,
	filtered: &'a HashSet<Id>,
	flags: ProjectionFlags,
}

impl<S: SelectionSink + ?Sized> SelectionRule<'_, S> {
	/// A node survives if it qualifies itself or keeps a surviving child.
	fn prune<D, M, H>(&self, view: &GroupView<D, M, H>) -> Option<GroupView<D, M, H>> {
		let children: Vec<_> = view.children().iter().filter_map(|child| self.prune(child)).collect();

		let leaves = view.items(Scope {
			filtered_only: self.flags.prune_filtered,
		});
		let selected = leaves.iter().filter(|item| self.counts_as_selected(item.id())).count();
		let qualifies = if self.flags.include_partial {
			selected > 0
		} else {
			!leaves.is_empty() && selected == leaves.len()
		};

		(qualifies || !children.is_empty()).then(|| view.with_children(children))
	}

	fn counts_as_selected(&self, id: &Id) -> bool {
		self.sink.contains(id) && (!self.flags.selection_within_filter || self.filtered.contains(id))
	}
}

/// Bounded cache of built projections keyed by [`ProjectionKey`].
pub struct ProjectionCache<D, M, H> {
	entries: LruCache<ProjectionKey, Rc<Projection<D, M, H>>>,
}

impl<D, M, H> ProjectionCache<D, M, H> {
	pub fn new(capacity: NonZeroUsize) -> Self {
		Self {
			entries: LruCache::new(capacity),
		}
	}

	pub fn get(&mut self, key: &ProjectionKey) -> Option<Rc<Projection<D, M, H>>> {
		self.entries.get(key).cloned()
	}

	pub fn insert(&mut self, key: ProjectionKey, projection: Rc<Projection<D, M, H>>) {
		self.entries.put(key, projection);
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests;
