//! The selection model: owns the canonical selection and wires every engine.
//!
//! ```text
//! records ──► ItemRegistry ──► GroupTree (static)
//!                                  │
//! FilterEngine ──filtered ids──► project ──► ProjectionCache ──► collapse_selection
//!                                  ▲
//! SelectionBook ──contains─────────┘
//!      │ apply
//!      └──► pending diff ──► Scheduler ──► flush ──► listeners
//! ```
//!
//! Mutations update the selection synchronously, so every query reflects
//! them immediately. Only notification is deferred: the first accepted change
//! after a flush schedules the next flush, and every change until then is
//! coalesced into one net diff.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashSet as HashSet;

use crate::collapse::{CollapseOptions, CollapsedNode, collapse_selection};
use crate::error::Result;
use crate::filter::{Filter, FilterEngine};
use crate::group::{GroupBy, GroupTree, select_items, unselect_items};
use crate::id::Id;
use crate::item::{Change, Item, ItemDef, ItemRegistry, SelectionSink};
use crate::projection::{GroupTreeOptions, GroupView, Projection, ProjectionCache, ProjectionFlags, ProjectionKey, Scope, project};
use crate::scheduler::{self, Scheduler};
use crate::selection::{SelectionBook, SelectionDiff, SelectionState, SelectionSummary};
use crate::settings::Settings;

type ListenerFn = dyn FnMut(&SelectionState, &SelectionDiff);

#[derive(Clone)]
struct ListenerEntry {
	id: u64,
	callback: Rc<RefCell<Box<ListenerFn>>>,
}

/// Registered listeners in subscription order.
#[derive(Default)]
struct Listeners {
	entries: RefCell<Vec<ListenerEntry>>,
	next_id: Cell<u64>,
}

impl Listeners {
	fn add(&self, callback: Box<ListenerFn>) -> ListenerEntry {
		let id = self.next_id.get();
		self.next_id.set(id.wrapping_add(1));
		let entry = ListenerEntry {
			id,
			callback: Rc::new(RefCell::new(callback)),
		};
		self.entries.borrow_mut().push(entry.clone());
		entry
	}

	fn remove(&self, id: u64) -> bool {
		let mut entries = self.entries.borrow_mut();
		let before = entries.len();
		entries.retain(|entry| entry.id != id);
		entries.len() != before
	}

	fn contains(&self, id: u64) -> bool {
		self.entries.borrow().iter().any(|entry| entry.id == id)
	}

	fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Invokes every listener registered when the call starts. Listeners
	/// removed by an earlier callback in the same pass are skipped.
	fn notify(&self, state: &SelectionState, diff: &SelectionDiff) {
		let snapshot: Vec<ListenerEntry> = self.entries.borrow().clone();
		for entry in snapshot {
			if !self.contains(entry.id) {
				continue;
			}
			let Ok(mut callback) = entry.callback.try_borrow_mut() else {
				tracing::warn!(listener = entry.id, "listener is already running, skipped re-entrant notification");
				continue;
			};
			(&mut **callback)(state, diff);
		}
	}
}

/// Handle for a registered listener.
#[derive(Debug)]
pub struct Subscription {
	listeners: Weak<Listeners>,
	id: u64,
}

impl Subscription {
	/// Stops further notifications. Returns false if the listener was
	/// already removed or the model is gone.
	pub fn unsubscribe(&self) -> bool {
		self.listeners.upgrade().is_some_and(|listeners| listeners.remove(self.id))
	}

	pub fn is_active(&self) -> bool {
		self.listeners.upgrade().is_some_and(|listeners| listeners.contains(self.id))
	}
}

struct Core<D, M, H> {
	registry: ItemRegistry<D, M>,
	tree: GroupTree<D, M, H>,
	filter: RefCell<FilterEngine<D, M>>,
	selection: RefCell<SelectionBook>,
	cache: RefCell<ProjectionCache<D, M, H>>,
	flush_scheduled: Cell<bool>,
	listeners: Rc<Listeners>,
	scheduler: Rc<dyn Scheduler>,
	settings: Settings,
}

impl<D, M, H> Core<D, M, H> {
	fn state(&self) -> SelectionState {
		let selection = self.selection.borrow();
		SelectionState {
			selected_ids: self
				.registry
				.items()
				.iter()
				.filter(|item| selection.contains(item.id()))
				.map(|item| item.id().clone())
				.collect(),
		}
	}

	fn flush(&self) {
		self.flush_scheduled.set(false);
		let diff = self.selection.borrow_mut().take_diff();
		if diff.is_empty() && !self.settings.emit_empty_flush {
			tracing::trace!("skipped empty selection flush");
			return;
		}

		let state = self.state();
		tracing::trace!(
			added = diff.added.len(),
			removed = diff.removed.len(),
			listeners = self.listeners.len(),
			"flushing selection diff"
		);
		self.listeners.notify(&state, &diff);
	}
}

/// Builder for [`MultiSelect`].
pub struct MultiSelectBuilder<D, M = (), H = ()> {
	data: Vec<D>,
	item_def: ItemDef<D, M>,
	levels: Vec<GroupBy<D, H>>,
	filter: Option<Filter<D, M>>,
	initial: Vec<Id>,
	scheduler: Option<Rc<dyn Scheduler>>,
	settings: Settings,
}

impl<D, M, H> MultiSelectBuilder<D, M, H> {
	/// Starts a builder whose group metadata type is inferred from the
	/// levels added later.
	pub fn new(data: Vec<D>, item_def: ItemDef<D, M>) -> Self {
		Self {
			data,
			item_def,
			levels: Vec::new(),
			filter: None,
			initial: Vec::new(),
			scheduler: None,
			settings: Settings::default(),
		}
	}

	/// Appends one grouping level.
	pub fn group_by(mut self, level: impl Into<GroupBy<D, H>>) -> Self {
		self.levels.push(level.into());
		self
	}

	pub fn filter(mut self, filter: Filter<D, M>) -> Self {
		self.filter = Some(filter);
		self
	}

	/// IDs selected at construction, in selection order. Unknown IDs are dropped.
	pub fn initial_selection<I>(mut self, ids: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<Id>,
	{
		self.initial.extend(ids.into_iter().map(Into::into));
		self
	}

	/// Defaults to this thread's [`scheduler::frame`] queue.
	pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
		let scheduler: Rc<dyn Scheduler> = Rc::new(scheduler);
		self.scheduler = Some(scheduler);
		self
	}

	pub fn settings(mut self, settings: Settings) -> Self {
		self.settings = settings;
		self
	}

	/// Wraps the records and builds the group tree.
	///
	/// # Errors
	///
	/// Returns a configuration error when a record has no ID, two records
	/// share an ID, or a path group accessor misses for some item.
	pub fn build(self) -> Result<MultiSelect<D, M, H>> {
		let registry = ItemRegistry::build(self.data, &self.item_def)?;
		let tree = GroupTree::build(registry.items(), &self.levels)?;

		let initial: Vec<Id> = self
			.initial
			.into_iter()
			.filter(|id| {
				let known = registry.index_of(id).is_some();
				if !known {
					tracing::warn!(%id, "dropping unknown id from initial selection");
				}
				known
			})
			.collect();
		let scheduler: Rc<dyn Scheduler> = match self.scheduler {
			Some(scheduler) => scheduler,
			None => Rc::new(scheduler::frame()),
		};

		tracing::debug!(items = registry.len(), depth = tree.depth(), selected = initial.len(), "built multiselect");
		let filter = FilterEngine::new(registry.shared(), self.filter);
		Ok(MultiSelect {
			core: Rc::new(Core {
				registry,
				tree,
				filter: RefCell::new(filter),
				selection: RefCell::new(SelectionBook::with_initial(initial)),
				cache: RefCell::new(ProjectionCache::new(self.settings.projection_cache_capacity)),
				flush_scheduled: Cell::new(false),
				listeners: Rc::default(),
				scheduler,
				settings: self.settings,
			}),
		})
	}
}

/// Selection state over a grouped, filterable item collection.
///
/// Handles are cheap to clone and share one model. The model is also the
/// [`SelectionSink`] passed to item, group and view mutations.
pub struct MultiSelect<D, M = (), H = ()> {
	core: Rc<Core<D, M, H>>,
}

impl<D, M, H> Clone for MultiSelect<D, M, H> {
	fn clone(&self) -> Self {
		Self {
			core: Rc::clone(&self.core),
		}
	}
}

impl<D, M> MultiSelect<D, M> {
	/// Starts a builder without group metadata.
	/// Use [`MultiSelectBuilder::new`] when levels carry metadata.
	pub fn builder(data: Vec<D>, item_def: ItemDef<D, M>) -> MultiSelectBuilder<D, M> {
		MultiSelectBuilder::new(data, item_def)
	}
}

impl<D: 'static, M: 'static, H: 'static> MultiSelect<D, M, H> {
	pub fn items(&self) -> &[Rc<Item<D, M>>] {
		self.core.registry.items()
	}

	pub fn len(&self) -> usize {
		self.core.registry.len()
	}

	pub fn is_empty(&self) -> bool {
		self.core.registry.is_empty()
	}

	pub fn get_item(&self, id: &Id) -> Option<&Rc<Item<D, M>>> {
		self.core.registry.get(id)
	}

	pub fn is_selected(&self, id: &Id) -> bool {
		self.core.selection.borrow().contains(id)
	}

	/// Selects one item. Returns false if the ID is unknown.
	pub fn select(&self, id: &Id) -> bool {
		let Some(item) = self.get_item(id) else {
			return false;
		};
		item.select(self);
		true
	}

	pub fn unselect(&self, id: &Id) -> bool {
		let Some(item) = self.get_item(id) else {
			return false;
		};
		item.unselect(self);
		true
	}

	pub fn toggle(&self, id: &Id) -> bool {
		let Some(item) = self.get_item(id) else {
			return false;
		};
		item.toggle(self);
		true
	}

	/// Selected items in registry order, optionally restricted to the filter.
	pub fn selected_items(&self, scope: Scope) -> Vec<Rc<Item<D, M>>> {
		let filtered = self.filtered_scope(scope);
		let selection = self.core.selection.borrow();
		self.items()
			.iter()
			.filter(|item| selection.contains(item.id()) && filtered.as_ref().is_none_or(|ids| ids.contains(item.id())))
			.cloned()
			.collect()
	}

	pub fn selected_ids(&self, scope: Scope) -> Vec<Id> {
		self.selected_items(scope).iter().map(|item| item.id().clone()).collect()
	}

	pub fn selection_summary(&self, scope: Scope) -> SelectionSummary {
		let total = self.filtered_scope(scope).map_or_else(|| self.len(), |ids| ids.len());
		SelectionSummary {
			total,
			selected: self.selected_items(scope).len(),
		}
	}

	/// Snapshot handed to listeners.
	pub fn state(&self) -> SelectionState {
		self.core.state()
	}

	/// False for an empty model.
	pub fn is_all_selected(&self) -> bool {
		!self.is_empty() && self.core.selection.borrow().len() == self.len()
	}

	pub fn select_all(&self) {
		select_items(self.items(), self);
	}

	pub fn unselect_all(&self) {
		unselect_items(self.items(), self);
	}

	pub fn toggle_all(&self) {
		if self.is_all_selected() {
			self.unselect_all();
		} else {
			self.select_all();
		}
	}

	pub fn filtered_items(&self) -> Vec<Rc<Item<D, M>>> {
		self.core.filter.borrow().filtered_items()
	}

	pub fn is_all_filtered_selected(&self) -> bool {
		self.core.filter.borrow().is_all_filtered_selected(self)
	}

	pub fn select_all_filtered(&self) {
		self.core.filter.borrow().select_all_filtered(self);
	}

	pub fn unselect_all_filtered(&self) {
		self.core.filter.borrow().unselect_all_filtered(self);
	}

	pub fn toggle_all_filtered(&self) {
		self.core.filter.borrow().toggle_all_filtered(self);
	}

	/// Replaces the active filter. Selection is untouched.
	pub fn set_filter(&self, filter: Option<Filter<D, M>>) {
		let mut engine = self.core.filter.borrow_mut();
		engine.set_filter(filter);
		tracing::debug!(query = engine.query(), version = engine.version(), "set filter");
	}

	pub fn filter(&self) -> Option<Filter<D, M>> {
		self.core.filter.borrow().filter().cloned()
	}

	/// The raw, unfiltered group tree.
	pub fn raw_tree(&self) -> &GroupTree<D, M, H> {
		&self.core.tree
	}

	/// Projects the group tree under `options`, serving repeated requests
	/// for the same filter and selection state from the cache.
	pub fn group_tree(&self, options: GroupTreeOptions) -> Rc<Projection<D, M, H>> {
		let filter = self.core.filter.borrow();
		let flags = ProjectionFlags::resolve(&options, filter.query());
		let key = ProjectionKey::new(filter.query(), flags, self.core.selection.borrow().version(), filter.version());

		if let Some(cached) = self.core.cache.borrow_mut().get(&key) {
			tracing::trace!(?key, "projection cache hit");
			return cached;
		}

		let projection = Rc::new(project(&self.core.tree, &filter.filtered_ids(), flags, self));
		tracing::debug!(
			query = %key.query,
			filtered_only = key.filtered_only,
			selected_only = key.selected_only,
			nodes = projection.node_count(),
			"built projection"
		);
		self.core.cache.borrow_mut().insert(key, Rc::clone(&projection));
		projection
	}

	/// Looks a group up by key in the unscoped projection. When a key occurs
	/// at several levels the coarsest node wins.
	pub fn get_group(&self, key: &Id) -> Option<GroupView<D, M, H>> {
		self.group_tree(GroupTreeOptions::default()).group(key).cloned()
	}

	pub fn group_at(&self, path: &[Id]) -> Option<GroupView<D, M, H>> {
		self.group_tree(GroupTreeOptions::default()).find(path).cloned()
	}

	/// Metadata of the group `get_group` would return.
	pub fn get_group_meta(&self, key: &Id) -> Option<&H> {
		self.core.tree.group(key)?.meta()
	}

	/// The selection reduced to its coarsest covering entries, ordered by
	/// `options.strategy`.
	pub fn collapsed_selection(&self, options: &CollapseOptions) -> Vec<CollapsedNode<D, M, H>> {
		let projection = self.group_tree(GroupTreeOptions {
			filter: options.scope(),
			..GroupTreeOptions::default()
		});
		let ungrouped = self.core.tree.ungrouped();
		let loose: Vec<Rc<Item<D, M>>> = match self.filtered_scope(options.scope()) {
			Some(filtered) => ungrouped.iter().filter(|item| filtered.contains(item.id())).cloned().collect(),
			None => ungrouped.to_vec(),
		};

		let selection = self.core.selection.borrow();
		collapse_selection(projection.roots(), &loose, selection.orders(), options, self)
	}

	/// Registers a listener and immediately calls it with the current state
	/// and an empty diff.
	pub fn subscribe<F>(&self, listener: F) -> Subscription
	where
		F: FnMut(&SelectionState, &SelectionDiff) + 'static,
	{
		let entry = self.core.listeners.add(Box::new(listener));
		let state = self.core.state();
		(&mut **entry.callback.borrow_mut())(&state, &SelectionDiff::default());
		Subscription {
			listeners: Rc::downgrade(&self.core.listeners),
			id: entry.id,
		}
	}

	pub fn listener_count(&self) -> usize {
		self.core.listeners.len()
	}

	/// Whether a flush is scheduled and has not run yet.
	pub fn has_pending_flush(&self) -> bool {
		self.core.flush_scheduled.get()
	}

	/// Drops every cached projection.
	pub fn clear_cache(&self) {
		self.core.cache.borrow_mut().clear();
	}

	pub fn settings(&self) -> &Settings {
		&self.core.settings
	}

	fn filtered_scope(&self, scope: Scope) -> Option<HashSet<Id>> {
		scope.filtered_only.then(|| self.core.filter.borrow().filtered_ids())
	}

	fn schedule_flush(&self) {
		if self.core.flush_scheduled.replace(true) {
			return;
		}
		let core = Rc::downgrade(&self.core);
		self.core.scheduler.schedule(Box::new(move || {
			if let Some(core) = core.upgrade() {
				core.flush();
			}
		}));
	}
}

impl<D: 'static, M: 'static, H: 'static> SelectionSink for MultiSelect<D, M, H> {
	fn contains(&self, id: &Id) -> bool {
		self.is_selected(id)
	}

	/// Applies the known, non-redundant part of `change` and schedules a
	/// flush if anything changed.
	fn apply(&self, change: Change) {
		let registry = &self.core.registry;
		let change = Change {
			added: change.added.into_iter().filter(|id| registry.index_of(id).is_some()).collect(),
			removed: change.removed.into_iter().filter(|id| registry.index_of(id).is_some()).collect(),
		};

		let (accepted, version) = {
			let mut selection = self.core.selection.borrow_mut();
			(selection.apply(change), selection.version())
		};
		if accepted == 0 {
			return;
		}
		tracing::trace!(accepted, version, "applied selection change");
		self.schedule_flush();
	}
}

impl<D, M, H> fmt::Debug for MultiSelect<D, M, H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MultiSelect")
			.field("items", &self.core.registry.len())
			.field("selected", &self.core.selection.borrow().len())
			.field("query", &self.core.filter.borrow().query())
			.field("listeners", &self.core.listeners.len())
			.finish_non_exhaustive()
	}
}
