use std::collections::{BTreeMap, HashMap};

use compatkit::coding::{CodingKey, CodingOptions, CodingPath};
use compatkit::decoder::Decoder;
use compatkit::encoder::Encoder;
use compatkit::{CompatError, MixedTypeField, OrderedDictionary, from_mixed, from_mixed_with, to_mixed, to_mixed_with};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("compatkit=info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
struct Pet {
    name: String,
    age: u8,
    weight: f64,
    vaccinated: bool,
    nickname: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Owner {
    name: String,
    pets: Vec<Pet>,
    visits: BTreeMap<String, Vec<i64>>,
    ratings: Vec<Option<i32>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
enum Shape {
    Empty,
    Circle(f64),
    Segment(i32, i32),
    Rect { w: u16, h: u16 },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
enum Species {
    Cat,
    Dog,
}

fn rex() -> Pet {
    Pet {
        name: "Rex".into(),
        age: 3,
        weight: 12.5,
        vaccinated: true,
        nickname: None,
    }
}

fn round_trip<T>(value: &T) -> T
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let tree = to_mixed(value).unwrap();
    from_mixed(&tree).unwrap()
}

#[test]
fn primitives_round_trip() {
    assert_eq!(round_trip(&"text".to_string()), "text");
    assert!(round_trip(&true));
    assert_eq!(round_trip(&-42i64), -42);
    assert_eq!(round_trip(&200u8), 200);
    assert_eq!(round_trip(&0.125f64), 0.125);
    assert_eq!(round_trip(&'q'), 'q');
    assert_eq!(round_trip(&()), ());
}

#[test]
fn nested_containers_round_trip() {
    let mut visits = BTreeMap::new();
    visits.insert("2024".to_string(), vec![3, 9]);
    visits.insert("2025".to_string(), vec![]);
    let owner = Owner {
        name: "Ann".into(),
        pets: vec![rex(), Pet { nickname: Some("Kit".into()), ..rex() }],
        visits,
        ratings: vec![Some(5), None, Some(-1)],
    };
    assert_eq!(round_trip(&owner), owner);

    let dictionary_of_arrays: HashMap<String, Vec<String>> =
        [("a".to_string(), vec!["x".to_string()]), ("b".to_string(), vec![])].into_iter().collect();
    assert_eq!(round_trip(&dictionary_of_arrays), dictionary_of_arrays);

    let with_nulls: Vec<Option<String>> = vec![None, Some("v".into()), None];
    assert_eq!(round_trip(&with_nulls), with_nulls);
}

#[test]
fn struct_encodes_as_dictionary() {
    let tree = to_mixed(&rex()).unwrap();
    let fields = tree.as_dictionary().expect("struct becomes a dictionary");
    let keys: Vec<&str> = fields.keys().iter().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "age", "weight", "vaccinated", "nickname"]);
    assert_eq!(tree.get("age"), Some(&MixedTypeField::Int(3)));
    assert_eq!(tree.get("nickname"), Some(&MixedTypeField::Null));
}

#[test]
fn enums_are_externally_tagged() {
    assert_eq!(to_mixed(&Shape::Empty).unwrap(), MixedTypeField::String("Empty".into()));
    assert_eq!(to_mixed(&Shape::Circle(1.5)).unwrap(), MixedTypeField::from(json!({"Circle": 1.5})));
    assert_eq!(to_mixed(&Shape::Segment(1, 2)).unwrap(), MixedTypeField::from(json!({"Segment": [1, 2]})));
    assert_eq!(
        to_mixed(&Shape::Rect { w: 3, h: 4 }).unwrap(),
        MixedTypeField::from(json!({"Rect": {"w": 3, "h": 4}}))
    );
    for shape in [Shape::Empty, Shape::Circle(0.5), Shape::Segment(-1, 1), Shape::Rect { w: 1, h: 2 }] {
        let tree = to_mixed(&shape).unwrap();
        assert_eq!(from_mixed::<Shape>(&tree).unwrap(), shape);
    }
}

#[test]
fn json_documents_decode_into_types() {
    let tree = MixedTypeField::from(json!({
        "name": "Milo", "age": 2, "weight": 4, "vaccinated": false
    }));
    let pet: Pet = from_mixed(&tree).unwrap();
    assert_eq!(pet.weight, 4.0, "int widens to double");
    assert_eq!(pet.nickname, None, "absent optional key decodes as None");
}

#[test]
fn empty_array_as_keyed_container_is_type_mismatch() {
    let empty = MixedTypeField::Array(Vec::new());
    let err = Decoder::new(&empty).keyed_container().err().expect("arrays are not keyed");
    assert!(err.is_type_mismatch(), "got {err}");
    assert!(err.to_string().contains("dictionary expected"), "got {err}");

    let err = from_mixed::<Pet>(&empty).unwrap_err();
    assert!(err.to_string().contains("dictionary expected"), "got {err}");
}

#[test]
fn errors_carry_the_coding_path() {
    let tree = MixedTypeField::from(json!({
        "name": "Ann",
        "pets": [
            {"name": "Rex", "age": 3, "weight": 1.0, "vaccinated": true},
            {"name": "Kit", "age": "old", "weight": 1.0, "vaccinated": true}
        ],
        "visits": {},
        "ratings": []
    }));
    let err = from_mixed::<Owner>(&tree).unwrap_err();
    match &err {
        CompatError::TypeMismatch { found, path, .. } => {
            assert_eq!(path, "pets[1].age");
            assert_eq!(found, "string");
        }
        other => panic!("expected a type mismatch, got {other}"),
    }
}

#[test]
fn missing_required_key_is_key_not_found() {
    let tree = MixedTypeField::from(json!({"name": "Rex", "age": 3, "weight": 1.0}));
    let err = from_mixed::<Pet>(&tree).unwrap_err();
    assert!(
        matches!(&err, CompatError::KeyNotFound { key, path } if key == "vaccinated" && path == "<root>"),
        "got {err}"
    );
}

#[test]
fn null_for_required_value_is_value_not_found() {
    let tree = MixedTypeField::from(json!({"name": null, "age": 3, "weight": 1.0, "vaccinated": true}));
    let err = from_mixed::<Pet>(&tree).unwrap_err();
    assert!(matches!(&err, CompatError::ValueNotFound { path, .. } if path == "name"), "got {err}");
}

#[test]
fn numeric_policy() {
    let big = MixedTypeField::Int(300);
    let err = from_mixed::<u8>(&big).unwrap_err();
    assert!(err.is_type_mismatch(), "narrowing out of range fails, got {err}");
    assert_eq!(from_mixed::<u16>(&big).unwrap(), 300);
    assert_eq!(from_mixed::<f32>(&big).unwrap(), 300.0);

    let fraction = MixedTypeField::Double(2.0);
    assert!(from_mixed::<i64>(&fraction).unwrap_err().is_type_mismatch(), "doubles never narrow");
    assert!(from_mixed::<String>(&MixedTypeField::Bool(true)).unwrap_err().is_type_mismatch());
}

#[test]
fn wide_unsigned_values_become_null() {
    let tree = to_mixed(&vec![1u64, u64::MAX]).unwrap();
    assert_eq!(tree, MixedTypeField::from(json!([1, null])));
    assert_eq!(to_mixed(&(i64::MAX as u128)).unwrap(), MixedTypeField::Int(i64::MAX));
}

#[test]
fn non_string_map_keys() {
    let mut by_id: BTreeMap<u32, &str> = BTreeMap::new();
    by_id.insert(10, "ten");
    let tree = to_mixed(&by_id).unwrap();
    assert_eq!(tree.get("10").and_then(MixedTypeField::as_str), Some("ten"));
    let back: BTreeMap<u32, String> = from_mixed(&tree).unwrap();
    assert_eq!(back.get(&10).map(String::as_str), Some("ten"));
    let as_text: BTreeMap<String, String> = from_mixed(&tree).unwrap();
    assert_eq!(as_text.get("10").map(String::as_str), Some("ten"));

    let mut flags: HashMap<bool, i32> = HashMap::new();
    flags.insert(true, 1);
    flags.insert(false, 0);
    let back: HashMap<bool, i32> = from_mixed(&to_mixed(&flags).unwrap()).unwrap();
    assert_eq!(back, flags);

    let mut initials: BTreeMap<char, i64> = BTreeMap::new();
    initials.insert('x', -4);
    let back: BTreeMap<char, i64> = from_mixed(&to_mixed(&initials).unwrap()).unwrap();
    assert_eq!(back, initials);

    let mut by_kind: BTreeMap<Species, u8> = BTreeMap::new();
    by_kind.insert(Species::Cat, 2);
    by_kind.insert(Species::Dog, 1);
    let back: BTreeMap<Species, u8> = from_mixed(&to_mixed(&by_kind).unwrap()).unwrap();
    assert_eq!(back, by_kind);

    let words = MixedTypeField::dictionary().field("ten", &10).build();
    let err = from_mixed::<BTreeMap<u32, i64>>(&words).unwrap_err();
    assert!(err.is_type_mismatch(), "got {err}");

    let mut by_pair: BTreeMap<(i32, i32), i32> = BTreeMap::new();
    by_pair.insert((1, 2), 3);
    assert_eq!(to_mixed(&by_pair).unwrap(), MixedTypeField::Null, "keys without string form drop the map");
}

#[test]
fn depth_limit_is_enforced() {
    let mut deep = json!(0);
    for _ in 0..20 {
        deep = json!([deep]);
    }
    let shallow = CodingOptions { max_depth: 8 };
    let err = to_mixed_with(&deep, shallow).unwrap_err();
    assert!(matches!(err, CompatError::DepthLimitExceeded { limit: 8, .. }), "got {err}");

    let tree = to_mixed(&deep).unwrap();
    let err = from_mixed_with::<serde_json::Value>(&tree, shallow).unwrap_err();
    assert!(matches!(err, CompatError::DepthLimitExceeded { limit: 8, .. }), "got {err}");
    assert_eq!(from_mixed::<serde_json::Value>(&tree).unwrap(), deep);
}

#[test]
fn coding_path_rendering() {
    let path = CodingPath::root()
        .child(CodingKey::Key("owner".into()))
        .child(CodingKey::Key("pets".into()))
        .child(CodingKey::Index(2))
        .child(CodingKey::Key("name".into()));
    assert_eq!(path.to_string(), "owner.pets[2].name");
    assert_eq!(path.depth(), 4);
    assert_eq!(CodingPath::root().to_string(), "<root>");
    assert_eq!(CodingPath::root().child(CodingKey::Index(0)).to_string(), "[0]");
}

#[test]
fn manual_encoding_containers() {
    let mut encoder = Encoder::new();
    {
        let mut keyed = encoder.keyed_container();
        keyed.encode("id", &7).unwrap();
        keyed.encode_nil("deleted_at");
        keyed.encode_if_present::<String>("alias", None).unwrap();
        keyed.encode_field("raw", MixedTypeField::Bool(true));
        keyed
            .nested_unkeyed("tags", |tags| {
                tags.encode("a")?;
                tags.encode_nil();
                tags.nested_keyed(|entry| entry.encode("k", &1))?;
                assert_eq!(tags.count(), 3);
                Ok(())
            })
            .unwrap();
        keyed.nested_keyed("meta", |meta| meta.encode("v", &2.5)).unwrap();
    }
    let tree = encoder.into_storage();
    assert_eq!(
        tree,
        MixedTypeField::from(json!({
            "id": 7, "deleted_at": null, "raw": true,
            "tags": ["a", null, {"k": 1}],
            "meta": {"v": 2.5}
        }))
    );
    assert_eq!(tree.get("alias"), None, "absent optional writes nothing");

    let mut single = Encoder::new();
    single.single_value_container().encode(&"only").unwrap();
    assert_eq!(single.storage(), &MixedTypeField::String("only".into()));

    let mut tagged = Encoder::new();
    tagged.single_value_container().encode_tagged(&vec![Some(1u8), None]).unwrap();
    assert_eq!(tagged.into_storage(), MixedTypeField::from(json!([1, null])));
    let mut fallback = Encoder::new();
    fallback.single_value_container().encode_tagged(&u64::MAX).unwrap();
    assert_eq!(fallback.into_storage(), MixedTypeField::Null, "no tagged form and no i64 form");
}

#[test]
fn manual_decoding_containers() {
    let tree = MixedTypeField::from(json!({
        "id": 7, "gone": null, "tags": ["a", null, {"k": 1}], "meta": {"v": 2.5}
    }));
    let decoder = Decoder::new(&tree);
    let keyed = decoder.keyed_container().unwrap();
    let mut keys: Vec<&str> = keyed.all_keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["gone", "id", "meta", "tags"]);
    assert!(keyed.contains("gone"));
    assert!(!keyed.contains("nope"));
    assert!(keyed.decode_nil("gone").unwrap());
    assert!(!keyed.decode_nil("id").unwrap());
    assert_eq!(keyed.decode::<i32>("id").unwrap(), 7);
    assert_eq!(keyed.decode_if_present::<i32>("gone").unwrap(), None);
    assert_eq!(keyed.decode_if_present::<i32>("nope").unwrap(), None);
    assert!(matches!(keyed.decode::<i32>("nope"), Err(CompatError::KeyNotFound { .. })));
    assert_eq!(keyed.nested_keyed("meta").unwrap().decode::<f64>("v").unwrap(), 2.5);

    let mut tags = keyed.nested_unkeyed("tags").unwrap();
    assert_eq!(tags.count(), 3);
    assert!(!tags.decode_nil().unwrap(), "non-null does not advance");
    assert!(tags.decode::<i32>().is_err());
    assert_eq!(tags.current_index(), 0, "failed decode does not advance");
    assert_eq!(tags.decode::<String>().unwrap(), "a");
    assert_eq!(tags.decode_if_present::<String>().unwrap(), None);
    let entry = tags.nested_keyed().unwrap();
    assert_eq!(entry.decode::<i64>("k").unwrap(), 1);
    assert!(tags.is_at_end());
    let err = tags.decode::<String>().unwrap_err();
    assert!(matches!(&err, CompatError::ValueNotFound { path, .. } if path == "tags[3]"), "got {err}");
    assert_eq!(tags.decode_if_present::<String>().unwrap(), None);

    let leaf = MixedTypeField::Null;
    let single = Decoder::new(&leaf).single_value_container();
    assert!(single.decode_nil());
    assert_eq!(single.decode::<Option<i32>>().unwrap(), None);
}

#[test]
fn ordered_dictionary_field_round_trips() {
    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Catalog {
        items: OrderedDictionary<String, u32>,
    }
    let catalog = Catalog {
        items: [("pear".to_string(), 2), ("apple".to_string(), 5)].into_iter().collect(),
    };
    let tree = to_mixed(&catalog).unwrap();
    assert_eq!(tree.get("items"), Some(&MixedTypeField::from(json!(["pear", 2, "apple", 5]))));
    assert_eq!(from_mixed::<Catalog>(&tree).unwrap(), catalog);
}
