use std::collections::{BTreeMap, HashSet};
use std::convert::Infallible;

use compatkit::{MixedTypeField, OrderedDictionary, OrderedSet, from_mixed, to_mixed};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("compatkit=warn".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, i32),
    Remove(u8),
    Swap(usize, usize),
    Sort,
    Reverse,
    Shuffle(u64),
    RetainAbove(i32),
    MergeKeepNew(Vec<(u8, i32)>),
    Update(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..24, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        (0u8..24).prop_map(Op::Remove),
        (0usize..32, 0usize..32).prop_map(|(i, j)| Op::Swap(i, j)),
        Just(Op::Sort),
        Just(Op::Reverse),
        any::<u64>().prop_map(Op::Shuffle),
        any::<i32>().prop_map(Op::RetainAbove),
        prop::collection::vec((0u8..24, any::<i32>()), 0..6).prop_map(Op::MergeKeepNew),
        (0u8..24).prop_map(Op::Update),
    ]
}

fn apply(d: &mut OrderedDictionary<u8, i32>, op: Op) {
    match op {
        Op::Insert(k, v) => {
            d.insert(k, v);
        }
        Op::Remove(k) => {
            d.remove(&k);
        }
        Op::Swap(i, j) => {
            if i < d.len() && j < d.len() {
                d.swap_at(i, j);
            }
        }
        Op::Sort => d.sort(),
        Op::Reverse => d.reverse(),
        Op::Shuffle(seed) => d.shuffle_using(&mut StdRng::seed_from_u64(seed)),
        Op::RetainAbove(floor) => d.retain(|_, v| *v > floor),
        Op::MergeKeepNew(pairs) => d.merge(pairs, |_, new| Ok::<_, Infallible>(new)).unwrap(),
        Op::Update(k) => d.update_or_insert(k, 0, |v| *v = v.wrapping_add(1)),
    }
}

fn assert_consistent(d: &OrderedDictionary<u8, i32>) {
    assert_eq!(d.keys().len(), d.values().len());
    for (position, key) in d.keys().iter().enumerate() {
        assert_eq!(d.index_of(key), Some(position));
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
struct Record {
    label: String,
    flag: bool,
    count: i64,
    ratio: f64,
    slots: Vec<Option<i32>>,
    groups: BTreeMap<String, Vec<i64>>,
    child: Option<Box<Record>>,
}

fn record() -> impl Strategy<Value = Record> {
    let leaf = (
        ".{0,8}",
        any::<bool>(),
        any::<i64>(),
        -1.0e9f64..1.0e9,
        prop::collection::vec(prop::option::of(any::<i32>()), 0..5),
        prop::collection::btree_map("[a-z]{1,4}", prop::collection::vec(any::<i64>(), 0..4), 0..4),
    )
        .prop_map(|(label, flag, count, ratio, slots, groups)| Record {
            label,
            flag,
            count,
            ratio,
            slots,
            groups,
            child: None,
        });
    leaf.prop_recursive(3, 8, 1, |inner| {
        (inner.clone(), inner).prop_map(|(mut parent, child)| {
            parent.child = Some(Box::new(child));
            parent
        })
    })
}

fn json_value() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        (-1.0e6f64..1.0e6).prop_map(serde_json::Value::from),
        "[a-z ]{0,6}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z]{1,3}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn append_never_duplicates(items in prop::collection::vec(0u16..64, 0..80)) {
        let mut set = OrderedSet::new();
        let mut first_seen = Vec::new();
        for item in &items {
            let (inserted, index) = set.append(*item);
            if inserted {
                first_seen.push(*item);
            } else {
                prop_assert_eq!(first_seen[index], *item, "re-append reports the original index");
            }
        }
        let distinct: HashSet<u16> = items.iter().copied().collect();
        prop_assert_eq!(set.len(), distinct.len());
        prop_assert_eq!(set.as_slice(), first_seen.as_slice());
    }

    #[test]
    fn parity_survives_mutation_sequences(ops in prop::collection::vec(op(), 0..40)) {
        let mut d = OrderedDictionary::new();
        for op in ops {
            apply(&mut d, op);
            assert_consistent(&d);
        }
    }

    #[test]
    fn shuffle_keeps_each_value_with_its_key(
        pairs in prop::collection::btree_map(any::<u16>(), any::<i64>(), 0..50),
        seed in any::<u64>(),
    ) {
        let original: OrderedDictionary<u16, i64> = pairs.into_iter().collect();
        let mut shuffled = original.clone();
        shuffled.shuffle_using(&mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(shuffled.len(), original.len());
        for (key, value) in original.iter() {
            prop_assert_eq!(shuffled.get(key), Some(value));
        }
        prop_assert_eq!(shuffled.sorted(), original.sorted());
    }

    #[test]
    fn records_round_trip_through_tree(value in record()) {
        let tree = to_mixed(&value).unwrap();
        let back: Record = from_mixed(&tree).unwrap();
        prop_assert_eq!(back, value);
    }

    #[test]
    fn json_round_trips_and_tagging_is_idempotent(value in json_value()) {
        let tree = MixedTypeField::from(value.clone());
        prop_assert_eq!(MixedTypeField::encoding(&tree), Some(tree.clone()));
        prop_assert_eq!(to_mixed(&tree).unwrap(), tree.clone());
        let decoded: serde_json::Value = from_mixed(&tree).unwrap();
        prop_assert_eq!(&decoded, &value);
        prop_assert_eq!(serde_json::Value::from(tree), value);
    }
}
