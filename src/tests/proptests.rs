//! Model-based property tests: random operation sequences against a plain
//! `Vec` insertion-order model and `std::collections::HashMap`.

use std::collections::HashMap;

use proptest::prelude::*;

use super::{BuildPassThrough, CollidingKey};
use crate::{ChampMap, OrderedMap};

#[derive(Clone, Debug)]
enum Op {
    Set(u8, u16),
    Update(u8),
    Delete(u8),
    Get(u8),
    Filter(u8),
    MapValues,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    // A small key space keeps overwrites and deletes of live keys frequent.
    let key = 0_u8..64;
    let op = prop_oneof![
        40 => (key.clone(), any::<u16>()).prop_map(|(k, v)| Op::Set(k, v)),
        10 => key.clone().prop_map(Op::Update),
        25 => key.clone().prop_map(Op::Delete),
        20 => key.clone().prop_map(Op::Get),
        3 => (1_u8..8).prop_map(Op::Filter),
        2 => Just(Op::MapValues),
    ];
    prop::collection::vec(op, 0..=400)
}

/// Insertion-ordered reference model.
#[derive(Default)]
struct Model(Vec<(u8, u16)>);

impl Model {
    fn get(&self, key: u8) -> Option<u16> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn set(&mut self, key: u8, value: u16) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    fn delete(&mut self, key: u8) {
        self.0.retain(|(k, _)| *k != key);
    }
}

fn bump(v: &u16) -> u16 {
    v.wrapping_mul(3).wrapping_add(1)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_ordered_matches_model(ops in ops_strategy()) {
        let mut map: OrderedMap<u8, u16> = OrderedMap::new();
        let mut model = Model::default();

        for op in ops {
            let before = map.clone();
            match op {
                Op::Set(key, value) => {
                    let unchanged = model.get(key) == Some(value);
                    map = map.set(key, value);
                    model.set(key, value);
                    prop_assert_eq!(map.ptr_eq(&before), unchanged);
                }
                Op::Update(key) => {
                    map = map.update(&key, bump);
                    if let Some(value) = model.get(key) {
                        model.set(key, bump(&value));
                    } else {
                        prop_assert!(map.ptr_eq(&before));
                    }
                }
                Op::Delete(key) => {
                    let present = model.get(key).is_some();
                    map = map.delete(&key);
                    model.delete(key);
                    prop_assert_eq!(map.ptr_eq(&before), !present);
                }
                Op::Get(key) => {
                    prop_assert_eq!(map.get(&key).copied(), model.get(key));
                    prop_assert_eq!(map.contains_key(&key), model.get(key).is_some());
                }
                Op::Filter(m) => {
                    map = map.filter(|k, _| k % m != 0);
                    model.0.retain(|(k, _)| k % m != 0);
                }
                Op::MapValues => {
                    map = map.map_values(|_, v| bump(v));
                    for slot in &mut model.0 {
                        slot.1 = bump(&slot.1);
                    }
                }
            }

            prop_assert_eq!(map.len(), model.0.len());
        }

        map.check();
        let got: Vec<(u8, u16)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(got, model.0.clone());
        prop_assert_eq!(map.first().map(|(k, v)| (*k, *v)), model.0.first().copied());
        prop_assert_eq!(map.last().map(|(k, v)| (*k, *v)), model.0.last().copied());
    }

    #[test]
    fn prop_champ_matches_std(ops in ops_strategy()) {
        let mut map: ChampMap<u8, u16> = ChampMap::new();
        let mut model: HashMap<u8, u16> = HashMap::new();

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    map = map.set(key, value);
                    model.insert(key, value);
                }
                Op::Update(key) => {
                    map = map.update(&key, bump);
                    if let Some(value) = model.get_mut(&key) {
                        *value = bump(value);
                    }
                }
                Op::Delete(key) => {
                    map = map.delete(&key);
                    model.remove(&key);
                }
                Op::Get(key) => {
                    prop_assert_eq!(map.get(&key), model.get(&key));
                }
                Op::Filter(m) => {
                    map = map.filter(|k, _| k % m != 0);
                    model.retain(|k, _| k % m != 0);
                }
                Op::MapValues => {
                    map = map.map_values(|_, v| bump(v));
                    for value in model.values_mut() {
                        *value = bump(value);
                    }
                }
            }

            prop_assert_eq!(map.len(), model.len());
        }

        prop_assert_eq!(map.trie().check(), model.len());
        let got: HashMap<u8, u16> = map.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(got, model);
    }

    /// A builder replaying the same operations ends equal to the persistent
    /// result, and the map it started from is left untouched.
    #[test]
    fn prop_builder_matches_persistent(ops in ops_strategy()) {
        let start: OrderedMap<u8, u16> = (0..32).map(|k| (k, u16::from(k))).collect();
        let mut persistent = start.clone();
        let mut builder = start.mutate();

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    persistent = persistent.set(key, value);
                    builder.set(key, value);
                }
                Op::Update(key) => {
                    persistent = persistent.update(&key, bump);
                    builder.update(&key, bump);
                }
                Op::Delete(key) => {
                    persistent = persistent.delete(&key);
                    builder.delete(&key);
                }
                Op::Get(_) | Op::Filter(_) | Op::MapValues => {}
            }
        }

        let built = builder.finish();
        built.check();
        prop_assert_eq!(&built, &persistent);
        prop_assert!(start.iter().map(|(k, v)| (*k, *v)).eq((0..32).map(|k| (k, u16::from(k)))));
    }

    /// Keys squeezed into a handful of full-hash buckets exercise collision
    /// nodes on every path.
    #[test]
    fn prop_collisions_match_std(ops in prop::collection::vec((0_u32..40, any::<bool>()), 0..=300)) {
        let key = |id: u32| CollidingKey::new(id, u64::from(id % 4) << 20);
        let mut map: ChampMap<CollidingKey, u32, BuildPassThrough> = ChampMap::default();
        let mut model: HashMap<u32, u32> = HashMap::new();

        for (id, insert) in ops {
            if insert {
                map = map.set(key(id), id);
                model.insert(id, id);
            } else {
                map = map.delete(&key(id));
                model.remove(&id);
            }
            prop_assert_eq!(map.len(), model.len());
        }

        prop_assert_eq!(map.trie().check(), model.len());
        for id in 0..40 {
            prop_assert_eq!(map.get(&key(id)), model.get(&id));
        }
    }
}
