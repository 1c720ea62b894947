//! The universal tagged value used as the intermediate form of the structural
//! encoder and decoder.
//!
//! A [`MixedTypeField`] is one of string, bool, int, double, null, a keyed
//! dictionary, or an array. Container slots hold `Option<MixedTypeField>` so that a
//! missing element (`None`) can be told apart from an explicit `Null`.
//!
//! Typed values become tagged values through [`ToMixedField`]. Each implementation
//! picks its variant at compile time, so booleans and integers are never captured
//! by the double or string rules and doubles never by the string rule. A value with
//! no representation yields `None` and a `warn!` diagnostic instead of an error.
//! Integers outside the i64 range are such values everywhere: through
//! [`ToMixedField`], through the encoder, and when read from JSON they become
//! `None` or `Null`, never a rounded double.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::hash::{BuildHasher, Hash};

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::ordered_dictionary::OrderedDictionary;

pub type MixedDictionary = OrderedDictionary<String, Option<MixedTypeField>>;
pub type MixedArray = Vec<Option<MixedTypeField>>;

#[derive(Debug, Clone)]
pub enum MixedTypeField {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Null,
    Dictionary(MixedDictionary),
    Array(MixedArray),
}

impl MixedTypeField {
    /// Best-effort conversion of any [`ToMixedField`] value.
    pub fn encoding<T: ToMixedField + ?Sized>(value: &T) -> Option<Self> {
        value.to_mixed_field()
    }
    pub fn dictionary() -> DictionaryBuilder {
        DictionaryBuilder::new()
    }
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Null => "null",
            Self::Dictionary(_) => "dictionary",
            Self::Array(_) => "array",
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Dictionary(_) | Self::Array(_))
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
    /// Doubles, and ints widened to a double.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
    pub fn as_dictionary(&self) -> Option<&MixedDictionary> {
        match self {
            Self::Dictionary(d) => Some(d),
            _ => None,
        }
    }
    pub fn as_array(&self) -> Option<&[Option<MixedTypeField>]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
    /// The value stored under `key` of a dictionary; `None` for absent keys,
    /// missing slots, and non-dictionaries.
    pub fn get(&self, key: &str) -> Option<&MixedTypeField> {
        self.as_dictionary()?.get(key)?.as_ref()
    }
    pub fn at(&self, index: usize) -> Option<&MixedTypeField> {
        self.as_array()?.get(index)?.as_ref()
    }
}

// Dictionaries compare as keyed maps (entry order is irrelevant), arrays in order.
impl PartialEq for MixedTypeField {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Dictionary(a), Self::Dictionary(b)) => {
                a.len() == b.len() && a.iter().all(|(key, value)| b.get(key.as_str()) == Some(value))
            }
            (Self::Array(a), Self::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MixedTypeField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl From<bool> for MixedTypeField {
    fn from(b: bool) -> Self { Self::Bool(b) }
}
impl From<i64> for MixedTypeField {
    fn from(i: i64) -> Self { Self::Int(i) }
}
impl From<f64> for MixedTypeField {
    fn from(d: f64) -> Self { Self::Double(d) }
}
impl From<&str> for MixedTypeField {
    fn from(s: &str) -> Self { Self::String(s.to_string()) }
}
impl From<String> for MixedTypeField {
    fn from(s: String) -> Self { Self::String(s) }
}
impl From<MixedDictionary> for MixedTypeField {
    fn from(d: MixedDictionary) -> Self { Self::Dictionary(d) }
}
impl From<MixedArray> for MixedTypeField {
    fn from(a: MixedArray) -> Self { Self::Array(a) }
}

// ------------- JSON interop -------------
impl From<serde_json::Value> for MixedTypeField {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(u)) => wide_json_integer(u),
                (None, None) => Self::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(|v| Some(Self::from(v))).collect())
            }
            serde_json::Value::Object(map) => Self::Dictionary(
                map.into_iter().map(|(k, v)| (k, Some(Self::from(v)))).collect(),
            ),
        }
    }
}

// Same policy as the encoder: integers past i64 are dropped, never rounded to a double.
fn wide_json_integer(value: u64) -> MixedTypeField {
    warn!(%value, "integer outside the i64 range stored as null");
    MixedTypeField::Null
}

// Missing slots and non-finite doubles have no JSON form and become null.
impl From<MixedTypeField> for serde_json::Value {
    fn from(field: MixedTypeField) -> Self {
        fn slot(field: Option<MixedTypeField>) -> serde_json::Value {
            field.map_or(serde_json::Value::Null, serde_json::Value::from)
        }
        match field {
            MixedTypeField::String(s) => serde_json::Value::String(s),
            MixedTypeField::Bool(b) => serde_json::Value::Bool(b),
            MixedTypeField::Int(i) => serde_json::Value::from(i),
            MixedTypeField::Double(d) => serde_json::Number::from_f64(d)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            MixedTypeField::Null => serde_json::Value::Null,
            MixedTypeField::Dictionary(d) => {
                serde_json::Value::Object(d.into_iter().map(|(k, v)| (k, slot(v))).collect())
            }
            MixedTypeField::Array(a) => serde_json::Value::Array(a.into_iter().map(slot).collect()),
        }
    }
}

// The tree serializes as the plain JSON-like value it stands for (a dictionary is
// a map here, not a flat pair list), so serde_json can write and read it as text.
impl Serialize for MixedTypeField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Double(d) => serializer.serialize_f64(*d),
            Self::Null => serializer.serialize_unit(),
            Self::Dictionary(d) => {
                let mut map = serializer.serialize_map(Some(d.len()))?;
                for (key, value) in d.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for element in a {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
        }
    }
}

struct MixedFieldVisitor;

impl<'de> Visitor<'de> for MixedFieldVisitor {
    type Value = MixedTypeField;
    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON-like value")
    }
    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Self::Value, E> {
        Ok(MixedTypeField::Bool(b))
    }
    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Self::Value, E> {
        Ok(MixedTypeField::Int(i))
    }
    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Self::Value, E> {
        Ok(match i64::try_from(u) {
            Ok(i) => MixedTypeField::Int(i),
            Err(_) => wide_json_integer(u),
        })
    }
    fn visit_f64<E: de::Error>(self, d: f64) -> Result<Self::Value, E> {
        Ok(MixedTypeField::Double(d))
    }
    fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
        Ok(MixedTypeField::String(s.to_string()))
    }
    fn visit_string<E: de::Error>(self, s: String) -> Result<Self::Value, E> {
        Ok(MixedTypeField::String(s))
    }
    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(MixedTypeField::Null)
    }
    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(MixedTypeField::Null)
    }
    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        MixedTypeField::deserialize(deserializer)
    }
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element::<MixedTypeField>()? {
            items.push(Some(item));
        }
        Ok(MixedTypeField::Array(items))
    }
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = MixedDictionary::with_capacity(map.size_hint().unwrap_or(0).min(4096));
        while let Some((key, value)) = map.next_entry::<String, MixedTypeField>()? {
            entries.insert(key, Some(value));
        }
        Ok(MixedTypeField::Dictionary(entries))
    }
}

impl<'de> Deserialize<'de> for MixedTypeField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MixedFieldVisitor)
    }
}

// ------------- ToMixedField -------------
pub trait ToMixedField {
    /// The tagged form of `self`, or `None` when it has no representation.
    fn to_mixed_field(&self) -> Option<MixedTypeField>;
}

fn unrepresentable<T: ?Sized>(reason: &str) -> Option<MixedTypeField> {
    warn!(type_name = std::any::type_name::<T>(), reason, "value dropped: no MixedTypeField representation");
    None
}

impl ToMixedField for MixedTypeField {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(self.clone())
    }
}
impl ToMixedField for bool {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(MixedTypeField::Bool(*self))
    }
}

macro_rules! widening_int {
    ($($t:ty),*) => {$(
        impl ToMixedField for $t {
            fn to_mixed_field(&self) -> Option<MixedTypeField> {
                Some(MixedTypeField::Int(i64::from(*self)))
            }
        }
    )*};
}
widening_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! checked_int {
    ($($t:ty),*) => {$(
        impl ToMixedField for $t {
            fn to_mixed_field(&self) -> Option<MixedTypeField> {
                match i64::try_from(*self) {
                    Ok(i) => Some(MixedTypeField::Int(i)),
                    Err(_) => unrepresentable::<$t>("integer does not fit in i64"),
                }
            }
        }
    )*};
}
checked_int!(isize, usize, u64, i128, u128);

impl ToMixedField for f32 {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(MixedTypeField::Double(f64::from(*self)))
    }
}
impl ToMixedField for f64 {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(MixedTypeField::Double(*self))
    }
}
impl ToMixedField for str {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(MixedTypeField::String(self.to_string()))
    }
}
impl ToMixedField for String {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(MixedTypeField::String(self.clone()))
    }
}
impl ToMixedField for char {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(MixedTypeField::String(self.to_string()))
    }
}
impl ToMixedField for serde_json::Value {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        Some(MixedTypeField::from(self.clone()))
    }
}
// An empty optional is an explicit null.
impl<T: ToMixedField> ToMixedField for Option<T> {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        match self {
            Some(value) => value.to_mixed_field(),
            None => Some(MixedTypeField::Null),
        }
    }
}
impl<T: ToMixedField + ?Sized> ToMixedField for &T {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        (**self).to_mixed_field()
    }
}
impl<T: ToMixedField + ?Sized> ToMixedField for Box<T> {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        (**self).to_mixed_field()
    }
}

// Elements that cannot be represented leave a missing slot, keeping positions.
fn array_of<'a, T, I>(items: I) -> Option<MixedTypeField>
where
    T: ToMixedField + 'a,
    I: IntoIterator<Item = &'a T>,
{
    Some(MixedTypeField::Array(items.into_iter().map(ToMixedField::to_mixed_field).collect()))
}
impl<T: ToMixedField> ToMixedField for [T] {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        array_of(self)
    }
}
impl<T: ToMixedField, const N: usize> ToMixedField for [T; N] {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        array_of(self)
    }
}
impl<T: ToMixedField> ToMixedField for Vec<T> {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        array_of(self)
    }
}
impl<T: ToMixedField> ToMixedField for VecDeque<T> {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        array_of(self)
    }
}

// ------------- MixedKey -------------
/// Dictionary keys that can become string keys without loss.
pub trait MixedKey {
    fn to_key_string(&self) -> Option<String>;
}

macro_rules! display_key {
    ($($t:ty),*) => {$(
        impl MixedKey for $t {
            fn to_key_string(&self) -> Option<String> {
                Some(self.to_string())
            }
        }
    )*};
}
display_key!(String, str, char, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl<T: MixedKey + ?Sized> MixedKey for &T {
    fn to_key_string(&self) -> Option<String> {
        (**self).to_key_string()
    }
}
// A missing key has no string form.
impl<T: MixedKey> MixedKey for Option<T> {
    fn to_key_string(&self) -> Option<String> {
        self.as_ref()?.to_key_string()
    }
}

// Any key without a string form fails the whole dictionary; values that cannot be
// represented leave a missing slot under their key.
fn dictionary_of<'a, K, V, I>(entries: I) -> Option<MixedTypeField>
where
    K: MixedKey + 'a,
    V: ToMixedField + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut dictionary = MixedDictionary::new();
    for (key, value) in entries {
        let key = match key.to_key_string() {
            Some(key) => key,
            None => return unrepresentable::<K>("dictionary key has no string form"),
        };
        dictionary.insert(key, value.to_mixed_field());
    }
    Some(MixedTypeField::Dictionary(dictionary))
}
impl<K: MixedKey, V: ToMixedField, S: BuildHasher> ToMixedField for HashMap<K, V, S> {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        dictionary_of(self)
    }
}
impl<K: MixedKey, V: ToMixedField> ToMixedField for BTreeMap<K, V> {
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        dictionary_of(self)
    }
}
impl<K, V> ToMixedField for OrderedDictionary<K, V>
where
    K: MixedKey + Eq + Hash + Clone,
    V: ToMixedField,
{
    fn to_mixed_field(&self) -> Option<MixedTypeField> {
        dictionary_of(self)
    }
}

// ------------- DictionaryBuilder -------------
/// Explicit field-by-field construction of a dictionary value.
///
/// ```
/// use compatkit::mixed::MixedTypeField;
/// let record = MixedTypeField::dictionary()
///     .field("name", "Alice")
///     .field("age", &42)
///     .field("nickname", &None::<String>)
///     .build();
/// assert_eq!(record.get("age"), Some(&MixedTypeField::Int(42)));
/// assert_eq!(record.get("nickname"), Some(&MixedTypeField::Null));
/// ```
#[derive(Debug, Default)]
pub struct DictionaryBuilder {
    fields: MixedDictionary,
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self {
            fields: MixedDictionary::new(),
        }
    }
    /// Registers a field. Unrepresentable values are left out of the dictionary.
    pub fn field<T: ToMixedField + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        let name = name.into();
        match value.to_mixed_field() {
            Some(field) => {
                self.fields.insert(name, Some(field));
            }
            None => warn!(field = %name, "field left out of dictionary"),
        }
        self
    }
    pub fn build(self) -> MixedTypeField {
        MixedTypeField::Dictionary(self.fields)
    }
}
