use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{Value, json};

use super::*;
use crate::item::{ItemDef, ItemRegistry};
use crate::test_support::{RecordingSink, catalog, ids};

fn registry(data: Vec<Value>) -> ItemRegistry<Value, ()> {
	ItemRegistry::build(data, &ItemDef::new("id")).unwrap()
}

fn brix() -> Accessor<Value> {
	Accessor::function(|v: &Value| v.pointer("/taste/brix").and_then(Value::as_i64).map(Id::from))
}

fn leaf_ids(node: &GroupNode<Value>) -> Vec<Id> {
	node.leaves().iter().map(|i| i.id().clone()).collect()
}

#[test]
fn single_level_buckets_in_first_seen_order() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::from("category")]).unwrap();

	let keys: Vec<_> = tree.roots().iter().map(|n| n.key().clone()).collect();
	assert_eq!(keys, vec![Id::from("fruit"), Id::from("vegetable"), Id::from("animal")]);

	let animal = &tree.roots()[2];
	assert_eq!(animal.level(), 0);
	assert_eq!(animal.path(), &[Id::from("animal")]);
	assert!(!animal.has_children());
	assert_eq!(leaf_ids(animal), ids(&[7, 8, 9, 10]));
	assert!(tree.ungrouped().is_empty());
}

#[test]
fn internal_nodes_hold_no_items() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::from("category"), GroupBy::new(brix())]).unwrap();

	let fruit = &tree.roots()[0];
	assert!(fruit.has_children());
	assert!(fruit.items().is_empty());
	assert_eq!(leaf_ids(fruit), ids(&[1, 3, 2]));

	let ten = &fruit.children()[0];
	assert_eq!(ten.path(), &[Id::from("fruit"), Id::Int(10)]);
	assert_eq!(ten.level(), 1);
	assert_eq!(ten.items().len(), 2);
}

#[test]
fn key_lookup_prefers_the_first_node_in_pre_order() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::new(brix()), GroupBy::new(brix())]).unwrap();

	let ten = tree.group(&Id::Int(10)).unwrap();
	assert_eq!(ten.level(), 0);
	assert_eq!(tree.find(&[Id::Int(10), Id::Int(10)]).unwrap().level(), 1);
	assert!(tree.group(&Id::from("fruit")).is_none());
}

#[test]
fn function_miss_at_every_item_turns_node_into_leaf() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::from("category"), GroupBy::new(brix())]).unwrap();

	let animal = tree.find(&[Id::from("animal")]).unwrap();
	assert!(!animal.has_children());
	assert_eq!(animal.items().len(), 4);
}

#[test]
fn function_miss_excludes_items_from_grouping() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::new(brix())]).unwrap();

	assert_eq!(tree.roots().len(), 4);
	let ungrouped: Vec<_> = tree.ungrouped().iter().map(|i| i.id().clone()).collect();
	assert_eq!(ungrouped, ids(&[7, 8, 9, 10]));
}

#[test]
fn path_miss_is_a_configuration_error() {
	let registry = registry(catalog());
	let err = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::from("category"), GroupBy::from("taste.brix")])
		.err()
		.unwrap();
	assert_eq!(
		err,
		Error::MissingGroupKey {
			path: "taste.brix".into(),
			level: 1,
			item: Id::Int(7),
		}
	);
}

#[test]
fn zero_levels_leave_everything_ungrouped() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[]).unwrap();
	assert_eq!(tree.depth(), 0);
	assert!(tree.roots().is_empty());
	assert_eq!(tree.flatten().len(), 10);
}

#[test]
fn metadata_is_computed_per_level_from_leaf_records() {
	let registry = registry(catalog());
	let levels = [
		GroupBy::from("category").with_meta(|key: &Id, records: &[&Value], level| format!("{key}:{}@{level}", records.len())),
		GroupBy::new(brix()),
	];
	let tree = GroupTree::build(registry.items(), &levels).unwrap();

	assert_eq!(tree.roots()[0].meta().map(String::as_str), Some("fruit:3@0"));
	assert_eq!(tree.roots()[2].meta().map(String::as_str), Some("animal:4@0"));
	assert_eq!(tree.roots()[0].children()[0].meta(), None);
}

#[test]
fn group_mutations_touch_exactly_the_transitive_leaves() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::from("category"), GroupBy::new(brix())]).unwrap();
	let sink = RecordingSink::with_selected([Id::Int(4)]);

	let vegetable = tree.find(&[Id::from("vegetable")]).unwrap();
	vegetable.select(&sink);
	assert_eq!(sink.sorted(), ids(&[4, 5, 6]));
	assert!(vegetable.is_all_selected(&sink));
	assert_eq!(sink.calls.borrow()[0].added, ids(&[5, 6]));

	vegetable.toggle(&sink);
	assert!(sink.sorted().is_empty());

	let carrot_bucket = tree.find(&[Id::from("vegetable"), Id::Int(2)]).unwrap();
	carrot_bucket.toggle(&sink);
	assert_eq!(sink.sorted(), ids(&[4]));
	vegetable.toggle(&sink);
	assert_eq!(sink.sorted(), ids(&[4, 5, 6]));
}

#[test]
fn redundant_group_mutations_are_silent() {
	let registry = registry(catalog());
	let tree = GroupTree::<_, _, ()>::build(registry.items(), &[GroupBy::from("category")]).unwrap();
	let sink = RecordingSink::default();

	tree.roots()[0].unselect(&sink);
	assert_eq!(sink.call_count(), 0);
	tree.roots()[0].select(&sink);
	tree.roots()[0].select(&sink);
	assert_eq!(sink.call_count(), 1);
}

fn arb_records() -> impl Strategy<Value = Vec<Value>> {
	prop::collection::vec((0u8..4, prop::option::of(0u8..3), 0u8..5), 0..40).prop_map(|rows| {
		rows.into_iter()
			.enumerate()
			.map(|(i, (a, b, c))| match b {
				Some(b) => json!({ "id": i, "a": a, "b": b, "c": c }),
				None => json!({ "id": i, "a": a, "c": c }),
			})
			.collect()
	})
}

proptest! {
	/// Grouped leaves plus ungrouped items are a permutation of the input.
	#[test]
	fn prop_flatten_recovers_items(records in arb_records(), depth in 0usize..4) {
		let registry = registry(records);
		let opt_b = Accessor::function(|v: &Value| v.get("b").and_then(Value::as_i64).map(Id::from));
		let all: [GroupBy<Value>; 3] = [GroupBy::from("a"), GroupBy::new(opt_b), GroupBy::from("c")];
		let tree = GroupTree::build(registry.items(), &all[..depth.min(3)]).unwrap();

		let mut flat: Vec<Id> = tree.flatten().iter().map(|i| i.id().clone()).collect();
		let mut expected: Vec<Id> = registry.items().iter().map(|i| i.id().clone()).collect();
		flat.sort();
		expected.sort();
		prop_assert_eq!(flat, expected);
	}
}
