use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

use super::*;
use crate::accessor::Accessor;
use crate::filter::{Filter, FilterEngine};
use crate::group::GroupBy;
use crate::item::{ItemDef, ItemRegistry};
use crate::test_support::{RecordingSink, catalog, ids};

struct Fixture {
	tree: GroupTree<Value>,
	filter: FilterEngine<Value, ()>,
}

impl Fixture {
	fn new(levels: &[GroupBy<Value>]) -> Self {
		Self::with_data(catalog(), levels)
	}

	fn with_data(data: Vec<Value>, levels: &[GroupBy<Value>]) -> Self {
		let registry = ItemRegistry::build(data, &ItemDef::new("id")).unwrap();
		Self {
			tree: GroupTree::build(registry.items(), levels).unwrap(),
			filter: FilterEngine::new(registry.shared(), None),
		}
	}

	fn search(mut self, query: &str) -> Self {
		self.filter.set_filter(Some(label_filter(query)));
		self
	}

	fn project(&self, options: GroupTreeOptions, sink: &RecordingSink) -> Projection<Value> {
		let flags = ProjectionFlags::resolve(&options, self.filter.query());
		project(&self.tree, &self.filter.filtered_ids(), flags, sink)
	}
}

fn label_filter(query: &str) -> Filter<Value> {
	Filter::new(query, |v: &Value, q: &str, _: Option<&()>| {
		v["label"].as_str().is_some_and(|label| label.to_lowercase().contains(q))
	})
}

fn brix() -> GroupBy<Value> {
	GroupBy::new(Accessor::function(|v: &Value| v.pointer("/taste/brix").and_then(Value::as_i64).map(Id::from)))
}

fn root_keys(projection: &Projection<Value>) -> Vec<Id> {
	projection.roots().iter().map(|v| v.key().clone()).collect()
}

fn item_ids(items: &[Rc<Item<Value>>]) -> Vec<Id> {
	items.iter().map(|i| i.id().clone()).collect()
}

#[test]
fn unscoped_projection_mirrors_the_raw_tree() {
	let fixture = Fixture::new(&[GroupBy::from("category")]);
	let projection = fixture.project(GroupTreeOptions::default(), &RecordingSink::default());

	assert_eq!(root_keys(&projection), vec![Id::from("fruit"), Id::from("vegetable"), Id::from("animal")]);
	let animal = projection.group(&Id::from("animal")).unwrap();
	assert_eq!(animal.total_count(), 4);
	assert_eq!(animal.filtered_count(), 4);
	assert!(!animal.has_sub_groups(Scope::ALL));
}

#[test]
fn filtered_only_prunes_nodes_without_matches() {
	let fixture = Fixture::new(&[GroupBy::from("category")]).search("an");
	let projection = fixture.project(GroupTreeOptions::filtered(), &RecordingSink::default());

	assert_eq!(root_keys(&projection), vec![Id::from("fruit"), Id::from("animal")]);
	let fruit = &projection.roots()[0];
	assert_eq!(fruit.total_count(), 3);
	assert_eq!(fruit.filtered_count(), 1);
	assert_eq!(item_ids(fruit.items(Scope::FILTERED)), ids(&[2]));
	assert_eq!(item_ids(fruit.items(Scope::ALL)), ids(&[1, 2, 3]));
}

#[test]
fn pruning_needs_a_non_empty_query() {
	let fixture = Fixture::new(&[GroupBy::from("category")]).search("");
	let projection = fixture.project(GroupTreeOptions::filtered(), &RecordingSink::default());
	assert_eq!(projection.roots().len(), 3);

	let unrequested = Fixture::new(&[GroupBy::from("category")]).search("an");
	let projection = unrequested.project(GroupTreeOptions::default(), &RecordingSink::default());
	assert_eq!(projection.roots().len(), 3);
	assert_eq!(projection.roots()[1].filtered_count(), 0);
}

#[test]
fn pruned_internal_nodes_count_only_surviving_subtrees() {
	let fixture = Fixture::new(&[GroupBy::from("category"), brix()]).search("an");
	let projection = fixture.project(GroupTreeOptions::filtered(), &RecordingSink::default());

	let fruit = projection.find(&[Id::from("fruit")]).unwrap();
	let children: Vec<_> = fruit.children().iter().map(|c| c.key().clone()).collect();
	assert_eq!(children, vec![Id::Int(15)]);
	assert_eq!(fruit.total_count(), 1);

	let animal = projection.find(&[Id::from("animal")]).unwrap();
	assert_eq!(animal.total_count(), 4);
	assert_eq!(item_ids(animal.items(Scope::FILTERED)), ids(&[9]));
}

#[test]
fn per_call_scope_hides_unmatched_sub_groups() {
	let fixture = Fixture::new(&[GroupBy::from("category"), brix()]).search("an");
	let projection = fixture.project(GroupTreeOptions::default(), &RecordingSink::default());

	let fruit = projection.find(&[Id::from("fruit")]).unwrap();
	assert_eq!(fruit.children().len(), 2);
	let visible: Vec<_> = fruit.sub_groups(Scope::FILTERED).map(|c| c.key().clone()).collect();
	assert_eq!(visible, vec![Id::Int(15)]);
	assert_eq!(fruit.sub_groups(Scope::ALL).count(), 2);
}

#[test]
fn selected_only_keeps_fully_or_partially_selected_groups() {
	let fixture = Fixture::new(&[GroupBy::from("category")]);
	let sink = RecordingSink::with_selected(ids(&[1, 2, 3, 7]));

	let full = fixture.project(GroupTreeOptions::selected(false), &sink);
	assert_eq!(root_keys(&full), vec![Id::from("fruit")]);

	let partial = fixture.project(GroupTreeOptions::selected(true), &sink);
	assert_eq!(root_keys(&partial), vec![Id::from("fruit"), Id::from("animal")]);
}

#[test]
fn parent_survives_through_a_qualifying_child() {
	let fixture = Fixture::new(&[GroupBy::from("category"), brix()]);
	let sink = RecordingSink::with_selected(ids(&[1, 3]));

	let projection = fixture.project(GroupTreeOptions::selected(false), &sink);
	assert_eq!(root_keys(&projection), vec![Id::from("fruit")]);
	let fruit = &projection.roots()[0];
	let children: Vec<_> = fruit.children().iter().map(|c| c.key().clone()).collect();
	assert_eq!(children, vec![Id::Int(10)]);
	assert_eq!(fruit.total_count(), 3);
}

#[test]
fn selection_pruning_respects_the_filter_scope() {
	let fixture = Fixture::new(&[GroupBy::from("category")]).search("an");
	let sink = RecordingSink::with_selected(ids(&[2]));

	let scoped = GroupTreeOptions {
		filter: Scope::FILTERED,
		selection: SelectionScope {
			selected_only: true,
			include_partial: false,
		},
	};
	assert_eq!(root_keys(&fixture.project(scoped, &sink)), vec![Id::from("fruit")]);
	assert!(fixture.project(GroupTreeOptions::selected(false), &sink).is_empty());
}

#[test]
fn metadata_is_shared_with_the_raw_node() {
	let levels = [GroupBy::from("category").with_meta(|_: &Id, records: &[&Value], _| records.len())];
	let registry = ItemRegistry::<Value, ()>::build(catalog(), &ItemDef::new("id")).unwrap();
	let tree = GroupTree::build(registry.items(), &levels).unwrap();
	let filtered = registry.items().iter().map(|i| i.id().clone()).collect();
	let projection = project(&tree, &filtered, ProjectionFlags::default(), &RecordingSink::default());

	assert_eq!(projection.group(&Id::from("animal")).unwrap().meta(), Some(&4));
}

#[test]
fn metadata_describes_the_unpruned_group() {
	let levels = [GroupBy::from("category").with_meta(|_: &Id, records: &[&Value], _| records.len())];
	let registry = ItemRegistry::<Value, ()>::build(catalog(), &ItemDef::new("id")).unwrap();
	let tree = GroupTree::build(registry.items(), &levels).unwrap();
	let filter = FilterEngine::new(registry.shared(), Some(label_filter("an")));
	let flags = ProjectionFlags::resolve(&GroupTreeOptions::filtered(), filter.query());
	let projection = project(&tree, &filter.filtered_ids(), flags, &RecordingSink::default());

	let fruit = projection.group(&Id::from("fruit")).unwrap();
	assert_eq!(fruit.total_count(), 1);
	assert_eq!(fruit.meta(), Some(&3));
}

#[test]
fn key_tracks_effective_and_requested_filter_scope() {
	let flags = ProjectionFlags::resolve(&GroupTreeOptions::filtered(), "");
	let key = ProjectionKey::new("", flags, 3, 1);
	assert!(!key.filtered_only);
	assert!(key.selection_within_filter);
	assert_ne!(key, ProjectionKey::new("", ProjectionFlags::default(), 3, 1));
}

#[test]
fn duplicate_keys_resolve_to_the_coarsest_group() {
	let same = GroupBy::new(Accessor::function(|v: &Value| v["category"].as_str().map(Id::from)));
	let fixture = Fixture::new(&[GroupBy::from("category"), same]);
	let projection = fixture.project(GroupTreeOptions::default(), &RecordingSink::default());

	let fruit = projection.group(&Id::from("fruit")).unwrap();
	assert_eq!(fruit.level(), 0);
	assert_eq!(projection.find(&[Id::from("fruit"), Id::from("fruit")]).unwrap().level(), 1);
}

#[test]
fn view_mutations_follow_the_per_call_scope() {
	let fixture = Fixture::new(&[GroupBy::from("category")]).search("an");
	let projection = fixture.project(GroupTreeOptions::default(), &RecordingSink::default());
	let animal = projection.group(&Id::from("animal")).unwrap();
	let sink = RecordingSink::default();

	animal.toggle(&sink, Scope::FILTERED);
	assert_eq!(sink.sorted(), ids(&[9]));
	assert!(animal.is_all_selected(&sink, Scope::FILTERED));
	assert!(!animal.is_all_selected(&sink, Scope::ALL));

	animal.toggle(&sink, Scope::ALL);
	assert_eq!(sink.sorted(), ids(&[7, 8, 9, 10]));
	animal.unselect(&sink, Scope::FILTERED);
	assert_eq!(sink.sorted(), ids(&[7, 8, 10]));

	let vegetable = projection.group(&Id::from("vegetable")).unwrap();
	assert!(!vegetable.is_all_selected(&sink, Scope::FILTERED));
	vegetable.toggle(&sink, Scope::FILTERED);
	assert_eq!(sink.sorted(), ids(&[7, 8, 10]));
}

#[test]
fn cache_returns_the_same_tree_and_evicts_least_recent() {
	let fixture = Fixture::new(&[GroupBy::from("category")]);
	let mut cache = ProjectionCache::new(NonZeroUsize::MIN);
	let key = |selection_version| ProjectionKey::new("", ProjectionFlags::default(), selection_version, 0);

	let built = Rc::new(fixture.project(GroupTreeOptions::default(), &RecordingSink::default()));
	cache.insert(key(0), Rc::clone(&built));
	assert!(Rc::ptr_eq(&cache.get(&key(0)).unwrap(), &built));
	assert!(cache.get(&key(1)).is_none());

	cache.insert(key(1), Rc::new(fixture.project(GroupTreeOptions::default(), &RecordingSink::default())));
	assert!(cache.get(&key(0)).is_none());
	assert_eq!(cache.len(), 1);
	cache.clear();
	assert!(cache.is_empty());
}

fn arb_rows() -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
	prop::collection::vec((0u8..4, 0u8..4, 0u8..10), 1..40)
}

proptest! {
	/// Narrowing the match set never grows the pruned tree.
	#[test]
	fn prop_filter_pruning_is_monotonic(rows in arb_rows(), narrow in 0u8..10, widen in 0u8..10) {
		let (low, high) = (narrow.min(widen), narrow.max(widen));
		let data: Vec<Value> = rows
			.iter()
			.enumerate()
			.map(|(i, &(a, b, score))| json!({ "id": i, "a": a, "b": b, "score": score }))
			.collect();
		let levels = [GroupBy::from("a"), GroupBy::from("b")];

		let count = |threshold: u8| {
			let mut fixture = Fixture::with_data(data.clone(), &levels);
			fixture.filter.set_filter(Some(Filter::new("q", move |v: &Value, _: &str, _: Option<&()>| {
				v["score"].as_u64().is_some_and(|s| s < u64::from(threshold))
			})));
			fixture.project(GroupTreeOptions::filtered(), &RecordingSink::default()).node_count()
		};

		prop_assert!(count(low) <= count(high));
	}
}
