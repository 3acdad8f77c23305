//! Persistence: old versions never change, no-op writes keep identity,
//! untouched sub-tries stay shared, builders edit their own copies in place.

use std::cell::Cell;

use archery::{SharedPointer, SharedPointerKind};

use super::{BuildPassThrough, CollidingKey};
use crate::node::{BITS_PER_LEVEL, Bitmap, Child, fragment, index, mask};
use crate::owner::Owner;
use crate::{ChampMap, OrderedMap};

fn numbers(n: u64) -> ChampMap<u64, u64> {
    (0..n).map(|i| (i, i)).collect()
}

type Forced = ChampMap<CollidingKey, u32, BuildPassThrough>;

/// Spreads `id` over the 30 hash bits the trie uses.
fn spread(id: u32) -> u64 {
    u64::from(id).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 34
}

#[allow(clippy::cast_possible_truncation)]
const fn trie_hash(key: &CollidingKey) -> u32 {
    (key.forced_hash & ((1 << 30) - 1)) as u32
}

/// Walks two versions of a trie side by side, asserting that every child
/// off `hash`'s path is the very same node and that no slot off the path
/// changed kind. Returns the number of copied child nodes on the path.
fn copied_along<K, V, P: SharedPointerKind>(
    old: &Bitmap<K, V, P>,
    new: &Bitmap<K, V, P>,
    hash: u32,
    shift: u32,
) -> usize {
    let path = mask(fragment(hash, shift));
    assert_eq!(old.data_map & !path, new.data_map & !path, "inline slots moved at shift {shift}");
    assert_eq!(old.node_map & !path, new.node_map & !path, "child slots moved at shift {shift}");

    let mut copied = 0;
    for bit in (0..32).map(mask) {
        if old.node_map & bit == 0 || new.node_map & bit == 0 {
            continue;
        }
        let a = &old.children[index(old.node_map, bit)];
        let b = &new.children[index(new.node_map, bit)];
        if a.ptr_eq(b) {
            continue;
        }
        assert_eq!(bit, path, "child off the write path copied at shift {shift}");
        copied += 1;
        if let (Child::Branch(a), Child::Branch(b)) = (a, b) {
            copied += copied_along(a, b, hash, shift + BITS_PER_LEVEL);
        }
    }
    copied
}

/// Sixteen root slots each holding a two-entry sub-trie, plus inline
/// entries in root slots 16 to 23.
fn slotted() -> Forced {
    let mut builder = Forced::default().mutate();
    for slot in 0..16_u32 {
        for below in 1..=2_u32 {
            let hash = u64::from(slot | (below << BITS_PER_LEVEL));
            builder.set(CollidingKey::new(slot * 10 + below, hash), slot);
        }
    }
    for slot in 16..24_u32 {
        builder.set(CollidingKey::new(slot * 10, u64::from(slot)), slot);
    }
    builder.finish()
}

// ---------------------------------------------------------------------------
// Immutability
// ---------------------------------------------------------------------------

#[test]
fn set_leaves_original_untouched() {
    let v1 = numbers(100);
    let v2 = v1.set(1000, 1000);
    let v3 = v2.set(5, 500);

    assert_eq!(v1.len(), 100);
    assert_eq!(v1.get(&1000), None);
    assert_eq!(v1.get(&5), Some(&5));
    assert_eq!(v2.get(&5), Some(&5));
    assert_eq!(v3.get(&5), Some(&500));
    assert_eq!(v3.len(), 101);
}

#[test]
fn delete_leaves_original_untouched() {
    let v1 = numbers(100);
    let v2 = v1.delete(&42);
    assert_eq!(v1.get(&42), Some(&42));
    assert_eq!(v2.get(&42), None);
    assert_eq!(v1.len(), 100);
    assert_eq!(v2.len(), 99);
    v1.trie().check();
    v2.trie().check();
}

#[test]
fn worked_example() {
    let m0: OrderedMap<&str, i32> = OrderedMap::new();
    let m1 = m0.set("a", 1);
    let m2 = m1.set("b", 2);
    let m3 = m2.delete(&"a");

    assert!(m0.is_empty());
    assert_eq!(m1.iter().collect::<Vec<_>>(), vec![(&"a", &1)]);
    assert_eq!(m2.iter().collect::<Vec<_>>(), vec![(&"a", &1), (&"b", &2)]);
    assert_eq!(m3.iter().collect::<Vec<_>>(), vec![(&"b", &2)]);
}

// ---------------------------------------------------------------------------
// Identity of no-op writes
// ---------------------------------------------------------------------------

#[test]
fn set_equal_value_keeps_identity() {
    let map = numbers(500);
    for i in [0, 17, 250, 499] {
        assert!(map.set(i, i).ptr_eq(&map), "set({i}, {i}) copied the map");
    }
}

#[test]
fn delete_missing_keeps_identity() {
    let map = numbers(500);
    assert!(map.delete(&10_000).ptr_eq(&map));
    let empty: ChampMap<u64, u64> = ChampMap::new();
    assert!(empty.delete(&1).ptr_eq(&empty));
}

#[test]
fn update_to_equal_keeps_identity() {
    let map = numbers(50);
    assert!(map.update(&7, |v| *v).ptr_eq(&map));
    assert!(!map.update(&7, |v| v + 1).ptr_eq(&map));
}

#[test]
fn map_values_identity_keeps_identity() {
    let map = numbers(1000);
    assert!(map.map_values(|_, v| *v).ptr_eq(&map));
}

#[test]
fn map_values_shares_unchanged_children() {
    let map = numbers(1000);
    let bumped = map.map_values(|k, v| if *k == 3 { v + 1 } else { *v });
    assert!(!bumped.ptr_eq(&map));

    let old = &map.trie().root.children;
    let new = &bumped.trie().root.children;
    assert_eq!(old.len(), new.len());
    let changed = old.iter().zip(new).filter(|(a, b)| !a.ptr_eq(b)).count();
    assert!(changed <= 1, "{changed} root children copied");
    bumped.trie().check();
}

#[test]
fn filter_keeping_everything_keeps_identity() {
    let map = numbers(300);
    assert!(map.filter(|_, _| true).ptr_eq(&map));
}

// ---------------------------------------------------------------------------
// Structural sharing
// ---------------------------------------------------------------------------

/// A write copies only the path to its slot; every other root child is the
/// very same node.
#[test]
fn set_shares_untouched_children() {
    let map = numbers(2000);
    let next = map.set(7, 700);

    let old = &map.trie().root.children;
    let new = &next.trie().root.children;
    assert!(!SharedPointer::ptr_eq(&map.trie().root, &next.trie().root));
    let changed = old.iter().zip(new).filter(|(a, b)| !a.ptr_eq(b)).count();
    assert!(changed <= 1, "{changed} root children copied");
}

/// Keys in distinct root slots: updating one leaves the other's sub-trie
/// shared.
#[test]
fn sibling_subtrie_is_shared() {
    let key = |id, slot: u64, below: u64| CollidingKey::new(id, slot | (below << 5));
    let map: ChampMap<CollidingKey, u32, BuildPassThrough> = ChampMap::default()
        .set(key(1, 0, 1), 1)
        .set(key(2, 0, 2), 2)
        .set(key(3, 1, 1), 3)
        .set(key(4, 1, 2), 4);

    let next = map.set(key(1, 0, 1), 10);
    let (Child::Branch(old), Child::Branch(new)) =
        (&map.trie().root.children[1], &next.trie().root.children[1])
    else {
        panic!("expected two branch children");
    };
    assert!(SharedPointer::ptr_eq(old, new));
    assert!(!map.trie().root.children[0].ptr_eq(&next.trie().root.children[0]));
}

/// Adding absent keys to a deep trie copies one node per level on the new
/// key's path and shares everything else, at every depth.
#[test]
fn absent_key_insert_copies_only_its_path() {
    let map: Forced = (0..5000).map(|id| (CollidingKey::new(id, spread(id)), id)).collect();
    for id in 5000..5200 {
        let key = CollidingKey::new(id, spread(id));
        let hash = trie_hash(&key);
        let next = map.set(key, id);
        assert_eq!(next.len(), 5001);

        let copied = copied_along(&map.trie().root, &next.trie().root, hash, 0);
        assert!(copied <= 6, "{copied} levels copied for id {id}");
        assert_eq!(map.len(), 5000);
    }
    map.trie().check();
}

#[test]
fn insert_into_empty_root_slot_shares_every_child() {
    let map = slotted();
    let key = CollidingKey::new(9001, 30);
    let next = map.set(key.clone(), 1);

    assert_eq!(copied_along(&map.trie().root, &next.trie().root, 30, 0), 0);
    assert_eq!(next.trie().root.data_map, map.trie().root.data_map | mask(30));
    assert_eq!(next.get(&key), Some(&1));
    next.trie().check();
}

#[test]
fn insert_into_empty_nested_slot_copies_one_child() {
    let map = slotted();
    let hash = 3 | (9 << BITS_PER_LEVEL);
    let next = map.set(CollidingKey::new(9001, u64::from(hash)), 1);

    assert_eq!(copied_along(&map.trie().root, &next.trie().root, hash, 0), 1);
    assert_eq!(next.trie().root.node_map, map.trie().root.node_map);
    next.trie().check();
}

#[test]
fn insert_splitting_an_inline_entry_shares_every_child() {
    let map = slotted();
    let hash = 17 | (1 << BITS_PER_LEVEL);
    let key = CollidingKey::new(9001, u64::from(hash));
    let next = map.set(key.clone(), 1);

    let (old, new) = (&map.trie().root, &next.trie().root);
    assert_eq!(copied_along(old, new, hash, 0), 0);
    assert_eq!(new.node_map, old.node_map | mask(17));
    assert_eq!(new.data_map, old.data_map & !mask(17));
    assert_eq!(next.get(&key), Some(&1));
    assert_eq!(next.get(&CollidingKey::new(170, 17)), Some(&17));
    next.trie().check();
}

// ---------------------------------------------------------------------------
// Custom equality
// ---------------------------------------------------------------------------

thread_local! {
    static VALUE_COMPARISONS: Cell<usize> = const { Cell::new(0) };
}

/// Value whose `PartialEq` counts its calls on the current thread.
#[derive(Clone, Debug)]
struct Counted(u32);

impl PartialEq for Counted {
    fn eq(&self, other: &Self) -> bool {
        VALUE_COMPARISONS.with(|n| n.set(n.get() + 1));
        self.0 == other.0
    }
}

fn comparisons() -> usize {
    VALUE_COMPARISONS.with(Cell::take)
}

type Inner = ChampMap<u32, Counted>;

fn same_root(a: &Inner, b: &Inner) -> bool {
    a.ptr_eq(b)
}

#[test]
fn nested_map_set_with_identity_skips_deep_comparison() {
    let inner: Inner = (0..10_000).map(|i| (i, Counted(i))).collect();
    let outer = ChampMap::new().set("inner", inner.clone());
    let edited = inner.set(5, Counted(500));
    comparisons();

    let next = outer.set_with("inner", edited.clone(), same_root);
    assert_eq!(comparisons(), 0);
    assert!(next.get(&"inner").is_some_and(|stored| stored.ptr_eq(&edited)));

    let again = next.set_with("inner", edited, same_root);
    assert_eq!(comparisons(), 0);
    assert!(again.ptr_eq(&next));
}

#[test]
fn set_with_identity_replaces_structurally_equal_value() {
    let inner: Inner = (0..1000).map(|i| (i, Counted(i))).collect();
    let rebuilt: Inner = (0..1000).rev().map(|i| (i, Counted(i))).collect();
    let outer = ChampMap::new().set("inner", inner);
    comparisons();

    // Deep equality walks all entries and keeps the old value.
    let deep = outer.set("inner", rebuilt.clone());
    assert!(deep.ptr_eq(&outer));
    assert_eq!(comparisons(), 1000);

    let shallow = outer.set_with("inner", rebuilt.clone(), same_root);
    assert!(!shallow.ptr_eq(&outer));
    assert!(shallow.get(&"inner").is_some_and(|stored| stored.ptr_eq(&rebuilt)));
    assert_eq!(comparisons(), 0);
}

#[test]
fn set_with_predicate_decides_noop() {
    let map = numbers(100);
    assert!(map.set_with(5, 999, |_, _| true).ptr_eq(&map));
    let forced = map.set_with(5, 5, |_, _| false);
    assert!(!forced.ptr_eq(&map));
    assert_eq!(forced, map);

    let ordered: OrderedMap<u64, u64> = (0..100).map(|i| (i, i)).collect();
    assert!(ordered.set_with(5, 999, |_, _| true).ptr_eq(&ordered));
    let forced = ordered.set_with(5, 5, |_, _| false);
    assert!(!forced.ptr_eq(&ordered));
    assert_eq!(forced, ordered);
    forced.check();
}

#[test]
fn builders_accept_custom_equality() {
    let inner: Inner = (0..500).map(|i| (i, Counted(i))).collect();
    let outer = ChampMap::new().set("a", inner.clone());
    let ordered = OrderedMap::new().set("a", inner.clone()).set("b", inner.clone());
    let edited = inner.set(1, Counted(10));
    comparisons();

    let mut builder = outer.mutate();
    builder
        .set_with("a", inner.clone(), same_root)
        .set_with("a", edited.clone(), same_root);
    let built = builder.finish();
    assert!(built.get(&"a").is_some_and(|stored| stored.ptr_eq(&edited)));

    let mut builder = ordered.mutate();
    builder.set_with("b", edited.clone(), same_root);
    let built = builder.finish();
    assert_eq!(built.keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(built.get(&"b").is_some_and(|stored| stored.ptr_eq(&edited)));
    assert_eq!(comparisons(), 0);
}

// ---------------------------------------------------------------------------
// Mapped maps
// ---------------------------------------------------------------------------

#[test]
fn mapped_nodes_belong_to_no_owner() {
    let map = numbers(3000);
    let bumped = map.map_values(|_, v| v + 1);
    let labels = map.map(|_, v| v.to_string());
    assert_eq!(bumped.trie().root.owner, Owner::NONE);
    assert_eq!(labels.trie().root.owner, Owner::NONE);

    let ordered: OrderedMap<u64, u64> = (0..3000).map(|i| (i, i)).collect();
    assert_eq!(ordered.map_values(|_, v| v + 1).entries().root.owner, Owner::NONE);
    assert_eq!(ordered.map(|_, v| v + 1).entries().root.owner, Owner::NONE);
}

#[test]
fn writes_to_mapped_map_leave_it_untouched() {
    let map = numbers(3000);
    let bumped = map.map_values(|_, v| v + 1);

    let mut builder = bumped.mutate();
    for i in 0..3000 {
        builder.update(&i, |v| v * 2);
    }
    let doubled = builder.finish();
    let single = bumped.set(7, 0);

    assert!((0..3000).all(|i| bumped.get(&i) == Some(&(i + 1))));
    assert!((0..3000).all(|i| doubled.get(&i) == Some(&((i + 1) * 2))));
    assert_eq!(single.get(&7), Some(&0));
    assert_eq!(map.get(&7), Some(&7));
    bumped.trie().check();
    doubled.trie().check();
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

#[test]
fn builder_edits_in_place_after_first_copy() {
    let map = numbers(1000);
    let mut builder = map.mutate();

    builder.set(1, 10);
    let first: *const _ = &*builder.trie().root;
    for i in 2..200 {
        builder.set(i, i * 10);
        assert!(std::ptr::eq(&*builder.trie().root, first), "root copied again at {i}");
    }
    let done = builder.finish();

    assert_eq!(done.get(&150), Some(&1500));
    assert_eq!(map.get(&150), Some(&150));
    done.trie().check();
    map.trie().check();
}

#[test]
fn builder_does_not_disturb_source() {
    let map = numbers(300);
    let snapshot: Vec<(u64, u64)> = {
        let mut v: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
        v.sort_unstable();
        v
    };

    let mut builder = map.mutate();
    for i in 0..300 {
        if i % 3 == 0 {
            builder.delete(&i);
        } else {
            builder.update(&i, |v| v + 1);
        }
    }
    builder.set(999, 999);
    let done = builder.finish();

    let mut after: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
    after.sort_unstable();
    assert_eq!(after, snapshot);
    assert_eq!(done.len(), 201);
    done.trie().check();
}

#[test]
fn builder_matches_persistent_writes() {
    let ops: Vec<(u64, Option<u64>)> = (0..500)
        .map(|i| (i * 7 % 131, if i % 4 == 0 { None } else { Some(i) }))
        .collect();

    let mut persistent = ChampMap::new();
    let mut builder = ChampMap::new().mutate();
    for &(key, value) in &ops {
        match value {
            Some(value) => {
                persistent = persistent.set(key, value);
                builder.set(key, value);
            }
            None => {
                persistent = persistent.delete(&key);
                builder.delete(&key);
            }
        }
    }
    let built = builder.finish();
    assert_eq!(built, persistent);
    built.trie().check();
}

#[test]
fn finished_map_is_frozen() {
    let map = numbers(64);
    let mut builder = map.mutate();
    builder.set(1, 100);
    let frozen = builder.finish();

    let later = frozen.set(2, 200);
    assert_eq!(frozen.get(&2), Some(&2));
    assert_eq!(later.get(&2), Some(&200));
    assert_eq!(later.get(&1), Some(&100));
}

#[test]
fn two_builders_from_one_map() {
    let map = numbers(100);
    let mut a = map.mutate();
    let mut b = map.mutate();
    a.set(1, 111);
    b.set(1, 222);
    let (a, b) = (a.finish(), b.finish());
    assert_eq!(a.get(&1), Some(&111));
    assert_eq!(b.get(&1), Some(&222));
    assert_eq!(map.get(&1), Some(&1));
}

#[test]
fn ordered_builder_edits_in_place() {
    let map: OrderedMap<u64, u64> = (0..5000).map(|i| (i, i)).collect();
    let mut builder = map.mutate();
    builder.set(0, 1);
    let first: *const _ = &*builder.entries().root;
    for i in 1..100 {
        builder.set(i, i + 1);
        assert!(std::ptr::eq(&*builder.entries().root, first));
    }
    let done = builder.finish();
    assert_eq!(done.get(&50), Some(&51));
    assert_eq!(map.get(&50), Some(&50));
    done.check();
    map.check();
}
