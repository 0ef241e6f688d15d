//! Tests for node identity under default and custom payload strategies

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use labeltree::util::testing::init_test_setup;
use labeltree::{Intrinsic, NodeRef, PayloadEquivalence, TreeArena};
use proptest::prelude::*;

/// Payloads are equal when their last decimal digit is.
struct LastDigit;

impl PayloadEquivalence<i64> for LastDigit {
    fn equivalent(a: &i64, b: &i64) -> bool {
        a.rem_euclid(10) == b.rem_euclid(10)
    }

    fn hash_of(value: &i64) -> u64 {
        value.rem_euclid(10) as u64
    }
}

/// A payload with no `Eq` or `Hash` of its own.
#[derive(Debug, Clone)]
struct Reading {
    sensor: String,
    value: f64,
}

struct BySensor;

impl PayloadEquivalence<Reading> for BySensor {
    fn equivalent(a: &Reading, b: &Reading) -> bool {
        a.sensor == b.sensor
    }

    fn hash_of(value: &Reading) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.sensor.hash(&mut hasher);
        hasher.finish()
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn pair_equal_and_hashes<Q: PayloadEquivalence<i64>>(
    tree: &TreeArena<i64, Q>,
    a: labeltree::Index,
    b: labeltree::Index,
) -> (bool, bool) {
    let a: NodeRef<'_, i64, Q> = tree.node(a).unwrap();
    let b: NodeRef<'_, i64, Q> = tree.node(b).unwrap();
    (a == b, hash_of(&a) == hash_of(&b))
}

#[test]
fn given_equal_payloads_with_different_structure_when_comparing_then_nodes_equal() {
    init_test_setup();
    let mut tree: TreeArena<i64> = TreeArena::new();
    let r = tree.insert_node("root", 0, None).unwrap();
    let left = tree.insert_node("left", 1, Some(r)).unwrap();
    let loose = tree.create_named_node("elsewhere", 5, None).unwrap();
    let deep = tree.insert_node("deep", 5, Some(left)).unwrap();
    tree.insert_node("below", 9, Some(deep)).unwrap();
    tree.get_node_mut(deep).unwrap().height = 42;

    let (equal, same_hash) = pair_equal_and_hashes(&tree, loose, deep);

    assert!(equal);
    assert!(same_hash);
    assert_ne!(tree.node(loose).unwrap(), tree.node(left).unwrap());
}

#[test]
fn given_last_digit_strategy_when_comparing_3_and_13_then_equal_and_hash_equal() {
    init_test_setup();
    let mut tree: TreeArena<i64, LastDigit> = TreeArena::new();
    let three = tree.create_node(3, None).unwrap();
    let thirteen = tree.create_node(13, None).unwrap();
    let four = tree.create_node(4, None).unwrap();

    assert_eq!(pair_equal_and_hashes(&tree, three, thirteen), (true, true));
    assert!(!pair_equal_and_hashes(&tree, three, four).0);
}

#[test]
fn given_last_digit_arena_when_converted_back_to_intrinsic_then_3_and_13_differ() {
    init_test_setup();
    let mut tree: TreeArena<i64, LastDigit> = TreeArena::new();
    let three = tree.create_node(3, None).unwrap();
    let thirteen = tree.create_node(13, None).unwrap();

    let (tree, remap) = tree.into_strategy::<Intrinsic>();
    let (three, thirteen) = (remap[&three], remap[&thirteen]);

    assert_eq!(
        pair_equal_and_hashes(&tree, three, thirteen),
        (false, false)
    );

    let (tree, remap) = tree.into_strategy::<LastDigit>();
    assert_eq!(
        pair_equal_and_hashes(&tree, remap[&three], remap[&thirteen]),
        (true, true)
    );
}

#[test]
fn given_last_digit_strategy_when_adding_colliding_sibling_then_replaces_it() {
    init_test_setup();
    let mut tree: TreeArena<i64, LastDigit> = TreeArena::new();
    let r = tree.insert_node("r", 0, None).unwrap();
    let three = tree.insert_node("three", 3, Some(r)).unwrap();

    let thirteen = tree.create_named_node("thirteen", 13, Some(r)).unwrap();
    let displaced = tree.add_child(r, thirteen).unwrap();

    assert_eq!(displaced, Some(three));
    let root = tree.node(r).unwrap();
    assert_eq!(root.num_children(), 1);
    assert_eq!(root.child_by_data(&23).map(|c| c.name()), Some("thirteen"));
}

#[test]
fn given_siblings_that_collide_under_new_strategy_when_converting_then_last_kept() {
    init_test_setup();
    let mut tree: TreeArena<i64> = TreeArena::new();
    let r = tree.insert_node("r", 0, None).unwrap();
    tree.insert_node("three", 3, Some(r)).unwrap();
    tree.insert_node("four", 4, Some(r)).unwrap();
    tree.insert_node("thirteen", 13, Some(r)).unwrap();

    let (tree, remap) = tree.into_strategy::<LastDigit>();

    let root = tree.node(remap[&r]).unwrap();
    let names: Vec<&str> = root.children().map(|c| c.name()).collect();
    assert_eq!(names, ["four", "thirteen"]);
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.root(), Some(remap[&r]));
    for child in root.children() {
        assert_eq!(child.parent().map(|p| p.index()), Some(remap[&r]));
    }
}

#[test]
fn given_payload_without_eq_when_using_custom_strategy_then_lookup_works() {
    init_test_setup();
    let mut tree: TreeArena<Reading, BySensor> = TreeArena::new();
    let r = tree
        .insert_node(
            "site",
            Reading {
                sensor: "site".into(),
                value: 0.0,
            },
            None,
        )
        .unwrap();
    let t = tree
        .insert_node(
            "temp",
            Reading {
                sensor: "temp".into(),
                value: 21.5,
            },
            Some(r),
        )
        .unwrap();

    let lookup = Reading {
        sensor: "temp".into(),
        value: f64::NAN,
    };
    let found = tree.child_by_data(r, &lookup).unwrap();

    assert_eq!(found, Some(t));
    assert_eq!(tree.node(t).unwrap().data().value, 21.5);
    assert_eq!(tree.descendants_and_self(r).unwrap().len(), 2);
}

proptest! {
    #[test]
    fn prop_equal_payload_implies_equal_node_and_hash(
        a in -1000_i64..1000,
        b in -1000_i64..1000,
        name_a in "[a-z]{1,8}",
        name_b in "[a-z]{1,8}",
    ) {
        let mut tree: TreeArena<i64, LastDigit> = TreeArena::new();
        let x = tree.create_named_node(name_a, a, None).unwrap();
        let y = tree.create_named_node(name_b, b, Some(x)).unwrap();

        let (equal, same_hash) = pair_equal_and_hashes(&tree, x, y);
        prop_assert_eq!(equal, a.rem_euclid(10) == b.rem_euclid(10));
        if equal {
            prop_assert!(same_hash);
        }
    }
}
