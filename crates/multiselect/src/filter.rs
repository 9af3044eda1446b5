//! Filter engine: the active item subset under a query predicate.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet as HashSet;

use crate::group::{select_items, unselect_items};
use crate::id::Id;
use crate::item::{Item, SelectionSink};

/// Filter predicate: `(record, query, item meta)`.
pub type FilterPredicate<D, M> = Rc<dyn Fn(&D, &str, Option<&M>) -> bool>;

/// A query string plus the predicate that interprets it.
pub struct Filter<D, M = ()> {
	query: String,
	predicate: FilterPredicate<D, M>,
}

impl<D, M> Filter<D, M> {
	pub fn new<F>(query: impl Into<String>, predicate: F) -> Self
	where
		F: Fn(&D, &str, Option<&M>) -> bool + 'static,
	{
		Self {
			query: query.into(),
			predicate: Rc::new(predicate),
		}
	}

	/// Same predicate, different query.
	pub fn with_query(&self, query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			predicate: Rc::clone(&self.predicate),
		}
	}

	pub fn query(&self) -> &str {
		&self.query
	}

	pub fn matches(&self, item: &Item<D, M>) -> bool {
		(self.predicate)(item.data(), &self.query, item.meta())
	}
}

impl<D, M> Clone for Filter<D, M> {
	fn clone(&self) -> Self {
		Self {
			query: self.query.clone(),
			predicate: Rc::clone(&self.predicate),
		}
	}
}

impl<D, M> fmt::Debug for Filter<D, M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Filter").field("query", &self.query).finish_non_exhaustive()
	}
}

/// Holds zero or one active filter over a fixed item list.
pub struct FilterEngine<D, M> {
	items: Rc<[Rc<Item<D, M>>]>,
	filter: Option<Filter<D, M>>,
	version: u64,
}

impl<D, M> FilterEngine<D, M> {
	pub fn new(items: Rc<[Rc<Item<D, M>>]>, filter: Option<Filter<D, M>>) -> Self {
		Self { items, filter, version: 0 }
	}

	/// Replaces the active filter. Every call counts as a change, even when
	/// the query text is unchanged, since the predicate may differ.
	pub fn set_filter(&mut self, filter: Option<Filter<D, M>>) {
		self.filter = filter;
		self.version = self.version.wrapping_add(1);
	}

	pub fn filter(&self) -> Option<&Filter<D, M>> {
		self.filter.as_ref()
	}

	/// Active query, or the empty string without a filter.
	pub fn query(&self) -> &str {
		self.filter.as_ref().map_or("", Filter::query)
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	/// All items without a filter, otherwise exactly those the predicate accepts.
	pub fn filtered_items(&self) -> Vec<Rc<Item<D, M>>> {
		match &self.filter {
			None => self.items.to_vec(),
			Some(filter) => self.items.iter().filter(|item| filter.matches(item)).cloned().collect(),
		}
	}

	pub fn filtered_ids(&self) -> HashSet<Id> {
		match &self.filter {
			None => self.items.iter().map(|item| item.id().clone()).collect(),
			Some(filter) => self.items.iter().filter(|item| filter.matches(item)).map(|item| item.id().clone()).collect(),
		}
	}

	/// False for an empty filtered subset.
	pub fn is_all_filtered_selected<S: SelectionSink + ?Sized>(&self, sink: &S) -> bool {
		let filtered = self.filtered_items();
		!filtered.is_empty() && filtered.iter().all(|item| item.is_selected(sink))
	}

	pub fn select_all_filtered<S: SelectionSink + ?Sized>(&self, sink: &S) {
		select_items(&self.filtered_items(), sink);
	}

	pub fn unselect_all_filtered<S: SelectionSink + ?Sized>(&self, sink: &S) {
		unselect_items(&self.filtered_items(), sink);
	}

	pub fn toggle_all_filtered<S: SelectionSink + ?Sized>(&self, sink: &S) {
		if self.is_all_filtered_selected(sink) {
			self.unselect_all_filtered(sink);
		} else {
			self.select_all_filtered(sink);
		}
	}
}
