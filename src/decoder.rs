//! Structural decoder: a [`MixedTypeField`] tree back into any `Deserialize`
//! type, with the position of the failure reported on every error.

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, Deserialize, DeserializeSeed, Visitor};
use tracing::{debug, trace};

use crate::coding::{CodingKey, CodingOptions, CodingPath};
use crate::error::{CompatError, Result};
use crate::mixed::{MixedDictionary, MixedTypeField};

// Stands in for absent slots, which decode like a stored null.
static MISSING: MixedTypeField = MixedTypeField::Null;

pub fn from_mixed<'de, T: Deserialize<'de>>(field: &'de MixedTypeField) -> Result<T> {
    from_mixed_with(field, CodingOptions::default())
}

pub fn from_mixed_with<'de, T: Deserialize<'de>>(field: &'de MixedTypeField, options: CodingOptions) -> Result<T> {
    Decoder::with_options(field, options).decode().map_err(|e| {
        debug!(error = %e, "decode failed");
        e
    })
}

// ------------- Decoder -------------
#[derive(Clone)]
pub struct Decoder<'de> {
    storage: &'de MixedTypeField,
    path: CodingPath,
    options: CodingOptions,
}

impl<'de> Decoder<'de> {
    pub fn new(storage: &'de MixedTypeField) -> Self {
        Self::with_options(storage, CodingOptions::default())
    }
    pub fn with_options(storage: &'de MixedTypeField, options: CodingOptions) -> Self {
        Self {
            storage,
            path: CodingPath::root(),
            options,
        }
    }
    pub fn storage(&self) -> &'de MixedTypeField {
        self.storage
    }
    pub fn coding_path(&self) -> &CodingPath {
        &self.path
    }
    pub fn decode<T: Deserialize<'de>>(&self) -> Result<T> {
        T::deserialize(self.clone()).map_err(|e| e.placed(&self.path.to_string()))
    }
    pub fn keyed_container(&self) -> Result<KeyedDecodingContainer<'de>> {
        match self.storage {
            MixedTypeField::Dictionary(fields) => Ok(KeyedDecodingContainer {
                decoder: self.clone(),
                fields,
                cursor: 0,
            }),
            _ => Err(self.mismatch("dictionary")),
        }
    }
    pub fn unkeyed_container(&self) -> Result<UnkeyedDecodingContainer<'de>> {
        match self.storage {
            MixedTypeField::Array(elements) => Ok(UnkeyedDecodingContainer {
                decoder: self.clone(),
                elements,
                current_index: 0,
            }),
            _ => Err(self.mismatch("array")),
        }
    }
    pub fn single_value_container(&self) -> SingleValueDecodingContainer<'de> {
        SingleValueDecodingContainer { decoder: self.clone() }
    }

    fn nested(&self, slot: &'de Option<MixedTypeField>, key: CodingKey) -> Result<Decoder<'de>> {
        let path = self.path.child(key);
        self.options.check_depth(&path)?;
        Ok(Decoder {
            storage: slot.as_ref().unwrap_or(&MISSING),
            path,
            options: self.options,
        })
    }
    // A null where a value was required reads as a missing value rather than
    // a wrong one.
    fn mismatch(&self, expected: &str) -> CompatError {
        match self.storage {
            MixedTypeField::Null => CompatError::ValueNotFound {
                expected: expected.to_string(),
                path: self.path.to_string(),
            },
            other => CompatError::TypeMismatch {
                expected: expected.to_string(),
                found: other.type_name().to_string(),
                path: self.path.to_string(),
            },
        }
    }
    fn int(&self, expected: &str) -> Result<i64> {
        match self.storage {
            MixedTypeField::Int(int) => Ok(*int),
            _ => Err(self.mismatch(expected)),
        }
    }
    fn out_of_range(&self, expected: &str, int: i64) -> CompatError {
        CompatError::TypeMismatch {
            expected: expected.to_string(),
            found: format!("int {} (out of range)", int),
            path: self.path.to_string(),
        }
    }
    fn double(&self, expected: &str) -> Result<f64> {
        match self.storage {
            MixedTypeField::Double(double) => Ok(*double),
            // widening only; doubles never narrow to ints
            MixedTypeField::Int(int) => Ok(*int as f64),
            _ => Err(self.mismatch(expected)),
        }
    }
}

macro_rules! narrowing_int {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
                let int = self.int(stringify!($ty))?;
                match <$ty>::try_from(int) {
                    Ok(narrowed) => visitor.$visit(narrowed),
                    Err(_) => Err(self.out_of_range(stringify!($ty), int)),
                }
            }
        )*
    };
}

// ------------- Deserializer -------------
impl<'de> de::Deserializer<'de> for Decoder<'de> {
    type Error = CompatError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.storage {
            MixedTypeField::String(s) => visitor.visit_borrowed_str(s),
            MixedTypeField::Bool(b) => visitor.visit_bool(*b),
            MixedTypeField::Int(int) => visitor.visit_i64(*int),
            MixedTypeField::Double(double) => visitor.visit_f64(*double),
            MixedTypeField::Null => visitor.visit_unit(),
            MixedTypeField::Dictionary(_) => visitor.visit_map(self.keyed_container()?),
            MixedTypeField::Array(_) => visitor.visit_seq(self.unkeyed_container()?),
        }
    }
    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.storage {
            MixedTypeField::Bool(b) => visitor.visit_bool(*b),
            _ => Err(self.mismatch("bool")),
        }
    }
    narrowing_int! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_u128 => visit_u128: u128,
    }
    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_i64(self.int("i64")?)
    }
    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_i128(i128::from(self.int("i128")?))
    }
    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_f32(self.double("f32")? as f32)
    }
    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_f64(self.double("f64")?)
    }
    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if let MixedTypeField::String(s) = self.storage {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return visitor.visit_char(c);
            }
        }
        Err(self.mismatch("char"))
    }
    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.storage {
            MixedTypeField::String(s) => visitor.visit_borrowed_str(s),
            _ => Err(self.mismatch("string")),
        }
    }
    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }
    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let bytes = match self.storage {
            MixedTypeField::Array(elements) => elements
                .iter()
                .map(|slot| match slot {
                    Some(MixedTypeField::Int(int)) => u8::try_from(*int).ok(),
                    _ => None,
                })
                .collect::<Option<Vec<u8>>>(),
            _ => None,
        };
        match bytes {
            Some(bytes) => visitor.visit_byte_buf(bytes),
            None => Err(self.mismatch("bytes")),
        }
    }
    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.storage {
            MixedTypeField::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }
    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.storage {
            MixedTypeField::Null => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }
    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }
    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(self.unkeyed_container()?)
    }
    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }
    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }
    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_map(self.keyed_container()?)
    }
    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_map(visitor)
    }
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        match self.storage {
            MixedTypeField::String(s) => visitor.visit_enum(BorrowedStrDeserializer::<CompatError>::new(s)),
            MixedTypeField::Dictionary(tagged) if tagged.len() == 1 => {
                let variant = VariantDecoder::new(&self, tagged)?;
                visitor.visit_enum(variant)
            }
            _ => Err(self.mismatch("string or single-key dictionary")),
        }
    }
    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }
    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }
}

// ------------- KeyedDecodingContainer -------------
pub struct KeyedDecodingContainer<'de> {
    decoder: Decoder<'de>,
    fields: &'de MixedDictionary,
    cursor: usize,
}

impl<'de> KeyedDecodingContainer<'de> {
    pub fn coding_path(&self) -> &CodingPath {
        &self.decoder.path
    }
    pub fn all_keys(&self) -> impl Iterator<Item = &'de str> + use<'de> {
        let fields: &'de MixedDictionary = self.fields;
        fields.keys().iter().map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
    /// True for every stored key, including keys holding null.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
    pub fn decode_nil(&self, key: &str) -> Result<bool> {
        match self.slot(key)? {
            None | Some(MixedTypeField::Null) => Ok(true),
            Some(_) => Ok(false),
        }
    }
    pub fn decode<T: Deserialize<'de>>(&self, key: &str) -> Result<T> {
        let slot = self.slot(key)?;
        let decoded = self.decoder.nested(slot, CodingKey::Key(key.to_string()))?.decode();
        trace!(path = %self.decoder.path, key, ok = decoded.is_ok(), "decoded field");
        decoded
    }
    /// Absent keys and stored nulls both come back as `None`.
    pub fn decode_if_present<T: Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.fields.get(key) {
            None | Some(None) | Some(Some(MixedTypeField::Null)) => Ok(None),
            Some(slot) => self.decoder.nested(slot, CodingKey::Key(key.to_string()))?.decode().map(Some),
        }
    }
    pub fn nested_keyed(&self, key: &str) -> Result<KeyedDecodingContainer<'de>> {
        let slot = self.slot(key)?;
        self.decoder.nested(slot, CodingKey::Key(key.to_string()))?.keyed_container()
    }
    pub fn nested_unkeyed(&self, key: &str) -> Result<UnkeyedDecodingContainer<'de>> {
        let slot = self.slot(key)?;
        self.decoder.nested(slot, CodingKey::Key(key.to_string()))?.unkeyed_container()
    }

    fn slot(&self, key: &str) -> Result<&'de Option<MixedTypeField>> {
        self.fields.get(key).ok_or_else(|| CompatError::KeyNotFound {
            key: key.to_string(),
            path: self.decoder.path.to_string(),
        })
    }
}

impl<'de> de::MapAccess<'de> for KeyedDecodingContainer<'de> {
    type Error = CompatError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.fields.get_index(self.cursor) {
            Some((key, _)) => seed.deserialize(MapKeyDecoder { key: key.as_str() }).map(Some),
            None => Ok(None),
        }
    }
    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let (key, slot) = self
            .fields
            .get_index(self.cursor)
            .ok_or_else(|| CompatError::Message("map value requested past the last key".to_string()))?;
        self.cursor += 1;
        let nested = self.decoder.nested(slot, CodingKey::Key(key.clone()))?;
        let at = nested.path.clone();
        seed.deserialize(nested).map_err(|e| e.placed(&at.to_string()))
    }
    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len() - self.cursor)
    }
}

// ------------- MapKeyDecoder -------------
// Dictionary keys are strings; scalar keys stringified by the encoder parse back.
struct MapKeyDecoder<'de> {
    key: &'de str,
}

macro_rules! parsed_key {
    ($($method:ident => $visit:ident),* $(,)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            match self.key.parse() {
                Ok(value) => visitor.$visit(value),
                Err(_) => visitor.visit_borrowed_str(self.key),
            }
        }
    )*};
}

impl<'de> de::Deserializer<'de> for MapKeyDecoder<'de> {
    type Error = CompatError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.key)
    }
    parsed_key! {
        deserialize_bool => visit_bool,
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_i128 => visit_i128,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_u128 => visit_u128,
        deserialize_char => visit_char,
    }
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_some(self)
    }
    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_enum(BorrowedStrDeserializer::<CompatError>::new(self.key))
    }

    serde::forward_to_deserialize_any! {
        f32 f64 str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

// ------------- UnkeyedDecodingContainer -------------
pub struct UnkeyedDecodingContainer<'de> {
    decoder: Decoder<'de>,
    elements: &'de [Option<MixedTypeField>],
    current_index: usize,
}

impl<'de> UnkeyedDecodingContainer<'de> {
    pub fn coding_path(&self) -> &CodingPath {
        &self.decoder.path
    }
    pub fn count(&self) -> usize {
        self.elements.len()
    }
    pub fn is_at_end(&self) -> bool {
        self.current_index >= self.elements.len()
    }
    pub fn current_index(&self) -> usize {
        self.current_index
    }
    /// Advances past the element only when it is null.
    pub fn decode_nil(&mut self) -> Result<bool> {
        let slot = self.current("null")?;
        let nil = matches!(slot, None | Some(MixedTypeField::Null));
        if nil {
            self.current_index += 1;
        }
        Ok(nil)
    }
    /// Advances only on success, so a failed element can be retried as
    /// another type.
    pub fn decode<T: Deserialize<'de>>(&mut self) -> Result<T> {
        let slot = self.current(std::any::type_name::<T>())?;
        let value = self.decoder.nested(slot, CodingKey::Index(self.current_index))?.decode()?;
        self.current_index += 1;
        Ok(value)
    }
    pub fn decode_if_present<T: Deserialize<'de>>(&mut self) -> Result<Option<T>> {
        if self.is_at_end() || self.decode_nil()? {
            return Ok(None);
        }
        self.decode().map(Some)
    }
    pub fn nested_keyed(&mut self) -> Result<KeyedDecodingContainer<'de>> {
        let slot = self.current("dictionary")?;
        let container = self.decoder.nested(slot, CodingKey::Index(self.current_index))?.keyed_container()?;
        self.current_index += 1;
        Ok(container)
    }
    pub fn nested_unkeyed(&mut self) -> Result<UnkeyedDecodingContainer<'de>> {
        let slot = self.current("array")?;
        let container = self.decoder.nested(slot, CodingKey::Index(self.current_index))?.unkeyed_container()?;
        self.current_index += 1;
        Ok(container)
    }

    fn current(&self, expected: &str) -> Result<&'de Option<MixedTypeField>> {
        self.elements.get(self.current_index).ok_or_else(|| CompatError::ValueNotFound {
            expected: format!("{} (unkeyed container is at end)", expected),
            path: self.decoder.path.child(CodingKey::Index(self.current_index)).to_string(),
        })
    }
}

impl<'de> de::SeqAccess<'de> for UnkeyedDecodingContainer<'de> {
    type Error = CompatError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        let Some(slot) = self.elements.get(self.current_index) else {
            return Ok(None);
        };
        let nested = self.decoder.nested(slot, CodingKey::Index(self.current_index))?;
        let at = nested.path.clone();
        let value = seed.deserialize(nested).map_err(|e| e.placed(&at.to_string()))?;
        self.current_index += 1;
        Ok(Some(value))
    }
    fn size_hint(&self) -> Option<usize> {
        Some(self.elements.len().saturating_sub(self.current_index))
    }
}

// ------------- SingleValueDecodingContainer -------------
pub struct SingleValueDecodingContainer<'de> {
    decoder: Decoder<'de>,
}

impl<'de> SingleValueDecodingContainer<'de> {
    pub fn coding_path(&self) -> &CodingPath {
        &self.decoder.path
    }
    pub fn decode_nil(&self) -> bool {
        self.decoder.storage.is_null()
    }
    pub fn decode<T: Deserialize<'de>>(&self) -> Result<T> {
        self.decoder.decode()
    }
}

// ------------- VariantDecoder -------------
struct VariantDecoder<'de> {
    variant: &'de str,
    value: Decoder<'de>,
}

impl<'de> VariantDecoder<'de> {
    fn new(parent: &Decoder<'de>, tagged: &'de MixedDictionary) -> Result<Self> {
        let (variant, slot) = tagged
            .first()
            .ok_or_else(|| parent.mismatch("string or single-key dictionary"))?;
        Ok(Self {
            variant: variant.as_str(),
            value: parent.nested(slot, CodingKey::Key(variant.clone()))?,
        })
    }
}

impl<'de> de::EnumAccess<'de> for VariantDecoder<'de> {
    type Error = CompatError;
    type Variant = Decoder<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(BorrowedStrDeserializer::<CompatError>::new(self.variant))?;
        Ok((variant, self.value))
    }
}

impl<'de> de::VariantAccess<'de> for Decoder<'de> {
    type Error = CompatError;

    fn unit_variant(self) -> Result<()> {
        match self.storage {
            MixedTypeField::Null => Ok(()),
            _ => Err(self.mismatch("null")),
        }
    }
    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        let at = self.path.to_string();
        seed.deserialize(self).map_err(|e| e.placed(&at))
    }
    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        let at = self.path.to_string();
        de::Deserializer::deserialize_seq(self, visitor).map_err(|e| e.placed(&at))
    }
    fn struct_variant<V: Visitor<'de>>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        let at = self.path.to_string();
        de::Deserializer::deserialize_map(self, visitor).map_err(|e| e.placed(&at))
    }
}
