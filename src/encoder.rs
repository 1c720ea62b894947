//! Structural encoder: any `Serialize` value into a [`MixedTypeField`] tree.
//!
//! Structs and maps become dictionaries, sequences and tuples become arrays,
//! and scalars become the matching leaf. The encoder can also be driven by
//! hand through its keyed, unkeyed and single-value containers.

use serde::Serialize;
use serde::ser::{self, Impossible};
use tracing::{trace, warn};

use crate::coding::{CodingKey, CodingOptions, CodingPath};
use crate::error::{CompatError, Result};
use crate::mixed::{MixedArray, MixedDictionary, MixedTypeField, ToMixedField};

pub fn to_mixed<T: Serialize + ?Sized>(value: &T) -> Result<MixedTypeField> {
    to_mixed_with(value, CodingOptions::default())
}

pub fn to_mixed_with<T: Serialize + ?Sized>(value: &T, options: CodingOptions) -> Result<MixedTypeField> {
    let mut encoder = Encoder::with_options(options);
    encoder.encode(value)?;
    Ok(encoder.into_storage())
}

// ------------- Encoder -------------
pub struct Encoder {
    storage: MixedTypeField,
    path: CodingPath,
    options: CodingOptions,
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_options(CodingOptions::default())
    }
    pub fn with_options(options: CodingOptions) -> Self {
        Self {
            storage: MixedTypeField::Null,
            path: CodingPath::root(),
            options,
        }
    }
    pub fn storage(&self) -> &MixedTypeField {
        &self.storage
    }
    pub fn into_storage(self) -> MixedTypeField {
        self.storage
    }
    pub fn coding_path(&self) -> &CodingPath {
        &self.path
    }
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(self)
    }
    /// Switches the storage to a dictionary unless it already is one, in which
    /// case further fields are added to it.
    pub fn keyed_container(&mut self) -> KeyedEncodingContainer<'_> {
        if !matches!(self.storage, MixedTypeField::Dictionary(_)) {
            self.storage = MixedTypeField::Dictionary(MixedDictionary::new());
        }
        KeyedEncodingContainer {
            encoder: self,
            pending_key: None,
            poisoned: false,
        }
    }
    pub fn unkeyed_container(&mut self) -> UnkeyedEncodingContainer<'_> {
        if !matches!(self.storage, MixedTypeField::Array(_)) {
            self.storage = MixedTypeField::Array(MixedArray::new());
        }
        UnkeyedEncodingContainer { encoder: self }
    }
    pub fn single_value_container(&mut self) -> SingleValueEncodingContainer<'_> {
        SingleValueEncodingContainer { encoder: self }
    }

    fn nested(&self, key: CodingKey) -> Result<Encoder> {
        let path = self.path.child(key);
        self.options.check_depth(&path)?;
        Ok(Encoder {
            storage: MixedTypeField::Null,
            path,
            options: self.options,
        })
    }
    fn encode_nested<T: Serialize + ?Sized>(&self, key: CodingKey, value: &T) -> Result<MixedTypeField> {
        let mut nested = self.nested(key)?;
        value.serialize(&mut nested)?;
        trace!(path = %nested.path, kind = nested.storage.type_name(), "encoded");
        Ok(nested.storage)
    }
    fn fields(&mut self) -> &mut MixedDictionary {
        if !matches!(self.storage, MixedTypeField::Dictionary(_)) {
            self.storage = MixedTypeField::Dictionary(MixedDictionary::new());
        }
        match &mut self.storage {
            MixedTypeField::Dictionary(fields) => fields,
            _ => unreachable!("storage was just made a dictionary"),
        }
    }
    fn elements(&mut self) -> &mut MixedArray {
        if !matches!(self.storage, MixedTypeField::Array(_)) {
            self.storage = MixedTypeField::Array(MixedArray::new());
        }
        match &mut self.storage {
            MixedTypeField::Array(elements) => elements,
            _ => unreachable!("storage was just made an array"),
        }
    }
    // Integers outside the i64 range have no leaf to live in.
    fn store_wide_integer(&mut self, value: impl std::fmt::Display + Copy, narrowed: Option<i64>) {
        self.storage = match narrowed {
            Some(int) => MixedTypeField::Int(int),
            None => {
                warn!(path = %self.path, %value, "integer outside the i64 range stored as null");
                MixedTypeField::Null
            }
        };
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- KeyedEncodingContainer -------------
pub struct KeyedEncodingContainer<'a> {
    encoder: &'a mut Encoder,
    pending_key: Option<String>,
    poisoned: bool,
}

impl KeyedEncodingContainer<'_> {
    pub fn coding_path(&self) -> &CodingPath {
        &self.encoder.path
    }
    pub fn len(&self) -> usize {
        self.encoder.storage.as_dictionary().map_or(0, |fields| fields.len())
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn encode<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let field = self.encoder.encode_nested(CodingKey::Key(key.to_string()), value)?;
        self.encoder.fields().insert(key.to_string(), Some(field));
        Ok(())
    }
    pub fn encode_nil(&mut self, key: &str) {
        self.encoder.fields().insert(key.to_string(), Some(MixedTypeField::Null));
    }
    /// Writes nothing at all for `None`, unlike [`encode_nil`](Self::encode_nil).
    pub fn encode_if_present<T: Serialize + ?Sized>(&mut self, key: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(value) => self.encode(key, value),
            None => Ok(()),
        }
    }
    pub fn encode_field(&mut self, key: &str, field: MixedTypeField) {
        self.encoder.fields().insert(key.to_string(), Some(field));
    }
    pub fn nested_keyed<F>(&mut self, key: &str, build: F) -> Result<()>
    where
        F: FnOnce(&mut KeyedEncodingContainer<'_>) -> Result<()>,
    {
        let mut nested = self.encoder.nested(CodingKey::Key(key.to_string()))?;
        build(&mut nested.keyed_container())?;
        self.encoder.fields().insert(key.to_string(), Some(nested.storage));
        Ok(())
    }
    pub fn nested_unkeyed<F>(&mut self, key: &str, build: F) -> Result<()>
    where
        F: FnOnce(&mut UnkeyedEncodingContainer<'_>) -> Result<()>,
    {
        let mut nested = self.encoder.nested(CodingKey::Key(key.to_string()))?;
        build(&mut nested.unkeyed_container())?;
        self.encoder.fields().insert(key.to_string(), Some(nested.storage));
        Ok(())
    }
}

impl ser::SerializeStruct for KeyedEncodingContainer<'_> {
    type Ok = ();
    type Error = CompatError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.encode(key, value)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeMap for KeyedEncodingContainer<'_> {
    type Ok = ();
    type Error = CompatError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        if self.poisoned {
            return Ok(());
        }
        match key.serialize(MapKeySerializer) {
            Ok(key) => self.pending_key = Some(key),
            Err(e) => {
                warn!(path = %self.encoder.path, error = %e, "map key has no string form; map stored as null");
                self.poisoned = true;
            }
        }
        Ok(())
    }
    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.poisoned {
            return Ok(());
        }
        match self.pending_key.take() {
            Some(key) => self.encode(&key, value),
            None => Err(CompatError::Message("map value serialized before its key".to_string())),
        }
    }
    fn end(self) -> Result<()> {
        if self.poisoned {
            self.encoder.storage = MixedTypeField::Null;
        }
        Ok(())
    }
}

// ------------- UnkeyedEncodingContainer -------------
pub struct UnkeyedEncodingContainer<'a> {
    encoder: &'a mut Encoder,
}

impl UnkeyedEncodingContainer<'_> {
    pub fn coding_path(&self) -> &CodingPath {
        &self.encoder.path
    }
    pub fn count(&self) -> usize {
        self.encoder.storage.as_array().map_or(0, |elements| elements.len())
    }
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let index = self.count();
        let element = self.encoder.encode_nested(CodingKey::Index(index), value)?;
        self.encoder.elements().push(Some(element));
        Ok(())
    }
    pub fn encode_nil(&mut self) {
        self.encoder.elements().push(Some(MixedTypeField::Null));
    }
    pub fn encode_field(&mut self, field: MixedTypeField) {
        self.encoder.elements().push(Some(field));
    }
    pub fn nested_keyed<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut KeyedEncodingContainer<'_>) -> Result<()>,
    {
        let mut nested = self.encoder.nested(CodingKey::Index(self.count()))?;
        build(&mut nested.keyed_container())?;
        self.encoder.elements().push(Some(nested.storage));
        Ok(())
    }
    pub fn nested_unkeyed<F>(&mut self, build: F) -> Result<()>
    where
        F: FnOnce(&mut UnkeyedEncodingContainer<'_>) -> Result<()>,
    {
        let mut nested = self.encoder.nested(CodingKey::Index(self.count()))?;
        build(&mut nested.unkeyed_container())?;
        self.encoder.elements().push(Some(nested.storage));
        Ok(())
    }
}

impl ser::SerializeSeq for UnkeyedEncodingContainer<'_> {
    type Ok = ();
    type Error = CompatError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.encode(value)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTuple for UnkeyedEncodingContainer<'_> {
    type Ok = ();
    type Error = CompatError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.encode(value)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for UnkeyedEncodingContainer<'_> {
    type Ok = ();
    type Error = CompatError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.encode(value)
    }
    fn end(self) -> Result<()> {
        Ok(())
    }
}

// ------------- SingleValueEncodingContainer -------------
pub struct SingleValueEncodingContainer<'a> {
    encoder: &'a mut Encoder,
}

impl SingleValueEncodingContainer<'_> {
    pub fn coding_path(&self) -> &CodingPath {
        &self.encoder.path
    }
    /// Encodes in place, so the value takes over the whole storage of the
    /// encoder that handed out this container.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut *self.encoder)
    }
    /// Stores the [`ToMixedField`] form of `value`, falling back to a full
    /// structural encode when it has none.
    pub fn encode_tagged<T: ToMixedField + Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        match value.to_mixed_field() {
            Some(field) => {
                self.encoder.storage = field;
                Ok(())
            }
            None => self.encode(value),
        }
    }
    pub fn encode_nil(&mut self) {
        self.encoder.storage = MixedTypeField::Null;
    }
    pub fn encode_field(&mut self, field: MixedTypeField) {
        self.encoder.storage = field;
    }
}

// ------------- VariantContainer -------------
// Tuple and struct variants are stored as a one-key dictionary holding the
// variant's fields under its name.
pub struct VariantContainer<'a> {
    parent: &'a mut Encoder,
    variant: &'static str,
    inner: Encoder,
}

impl<'a> VariantContainer<'a> {
    fn open(parent: &'a mut Encoder, variant: &'static str, storage: MixedTypeField) -> Result<Self> {
        let mut inner = parent.nested(CodingKey::Key(variant.to_string()))?;
        inner.storage = storage;
        Ok(Self { parent, variant, inner })
    }
    fn close(self) -> Result<()> {
        let mut tagged = MixedDictionary::with_capacity(1);
        tagged.insert(self.variant.to_string(), Some(self.inner.storage));
        self.parent.storage = MixedTypeField::Dictionary(tagged);
        Ok(())
    }
}

impl ser::SerializeTupleVariant for VariantContainer<'_> {
    type Ok = ();
    type Error = CompatError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.inner.unkeyed_container().encode(value)
    }
    fn end(self) -> Result<()> {
        self.close()
    }
}

impl ser::SerializeStructVariant for VariantContainer<'_> {
    type Ok = ();
    type Error = CompatError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.inner.keyed_container().encode(key, value)
    }
    fn end(self) -> Result<()> {
        self.close()
    }
}

// ------------- Serializer -------------
impl<'a> ser::Serializer for &'a mut Encoder {
    type Ok = ();
    type Error = CompatError;
    type SerializeSeq = UnkeyedEncodingContainer<'a>;
    type SerializeTuple = UnkeyedEncodingContainer<'a>;
    type SerializeTupleStruct = UnkeyedEncodingContainer<'a>;
    type SerializeTupleVariant = VariantContainer<'a>;
    type SerializeMap = KeyedEncodingContainer<'a>;
    type SerializeStruct = KeyedEncodingContainer<'a>;
    type SerializeStructVariant = VariantContainer<'a>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.storage = MixedTypeField::Bool(v);
        Ok(())
    }
    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }
    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }
    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }
    fn serialize_i64(self, v: i64) -> Result<()> {
        self.storage = MixedTypeField::Int(v);
        Ok(())
    }
    fn serialize_i128(self, v: i128) -> Result<()> {
        self.store_wide_integer(v, i64::try_from(v).ok());
        Ok(())
    }
    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }
    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }
    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }
    fn serialize_u64(self, v: u64) -> Result<()> {
        self.store_wide_integer(v, i64::try_from(v).ok());
        Ok(())
    }
    fn serialize_u128(self, v: u128) -> Result<()> {
        self.store_wide_integer(v, i64::try_from(v).ok());
        Ok(())
    }
    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(f64::from(v))
    }
    fn serialize_f64(self, v: f64) -> Result<()> {
        self.storage = MixedTypeField::Double(v);
        Ok(())
    }
    fn serialize_char(self, v: char) -> Result<()> {
        self.storage = MixedTypeField::String(v.to_string());
        Ok(())
    }
    fn serialize_str(self, v: &str) -> Result<()> {
        self.storage = MixedTypeField::String(v.to_string());
        Ok(())
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        let bytes = v.iter().map(|&b| Some(MixedTypeField::Int(i64::from(b)))).collect();
        self.storage = MixedTypeField::Array(bytes);
        Ok(())
    }
    fn serialize_none(self) -> Result<()> {
        self.storage = MixedTypeField::Null;
        Ok(())
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<()> {
        self.storage = MixedTypeField::Null;
        Ok(())
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }
    fn serialize_unit_variant(self, _name: &'static str, _index: u32, variant: &'static str) -> Result<()> {
        self.serialize_str(variant)
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _name: &'static str, value: &T) -> Result<()> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()> {
        let field = self.encode_nested(CodingKey::Key(variant.to_string()), value)?;
        let mut tagged = MixedDictionary::with_capacity(1);
        tagged.insert(variant.to_string(), Some(field));
        self.storage = MixedTypeField::Dictionary(tagged);
        Ok(())
    }
    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.storage = MixedTypeField::Array(MixedArray::with_capacity(len.unwrap_or(0)));
        Ok(self.unkeyed_container())
    }
    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        VariantContainer::open(self, variant, MixedTypeField::Array(MixedArray::with_capacity(len)))
    }
    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        self.storage = MixedTypeField::Dictionary(MixedDictionary::with_capacity(len.unwrap_or(0)));
        Ok(self.keyed_container())
    }
    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeStruct> {
        self.serialize_map(Some(len))
    }
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        VariantContainer::open(
            self,
            variant,
            MixedTypeField::Dictionary(MixedDictionary::with_capacity(len)),
        )
    }
}

// ------------- MapKeySerializer -------------
// Dictionary keys are strings; scalar map keys are stringified the way they
// print, anything else has no key form.
struct MapKeySerializer;

fn key_rejected(kind: &str) -> CompatError {
    CompatError::Message(format!("{} cannot be used as a dictionary key", kind))
}

impl ser::Serializer for MapKeySerializer {
    type Ok = String;
    type Error = CompatError;
    type SerializeSeq = Impossible<String, CompatError>;
    type SerializeTuple = Impossible<String, CompatError>;
    type SerializeTupleStruct = Impossible<String, CompatError>;
    type SerializeTupleVariant = Impossible<String, CompatError>;
    type SerializeMap = Impossible<String, CompatError>;
    type SerializeStruct = Impossible<String, CompatError>;
    type SerializeStructVariant = Impossible<String, CompatError>;

    fn serialize_bool(self, v: bool) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_i8(self, v: i8) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_i16(self, v: i16) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_i32(self, v: i32) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_i64(self, v: i64) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_i128(self, v: i128) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_u8(self, v: u8) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_u16(self, v: u16) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_u32(self, v: u32) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_u64(self, v: u64) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_u128(self, v: u128) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_f32(self, _v: f32) -> Result<String> {
        Err(key_rejected("a float"))
    }
    fn serialize_f64(self, _v: f64) -> Result<String> {
        Err(key_rejected("a float"))
    }
    fn serialize_char(self, v: char) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_str(self, v: &str) -> Result<String> {
        Ok(v.to_string())
    }
    fn serialize_bytes(self, _v: &[u8]) -> Result<String> {
        Err(key_rejected("a byte string"))
    }
    fn serialize_none(self) -> Result<String> {
        Err(key_rejected("a missing value"))
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<String> {
        Err(key_rejected("a unit"))
    }
    fn serialize_unit_struct(self, name: &'static str) -> Result<String> {
        Err(key_rejected(name))
    }
    fn serialize_unit_variant(self, _name: &'static str, _index: u32, variant: &'static str) -> Result<String> {
        Ok(variant.to_string())
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _name: &'static str, value: &T) -> Result<String> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String> {
        Err(key_rejected(name))
    }
    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(key_rejected("a sequence"))
    }
    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(key_rejected("a tuple"))
    }
    fn serialize_tuple_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct> {
        Err(key_rejected(name))
    }
    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(key_rejected(name))
    }
    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(key_rejected("a map"))
    }
    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(key_rejected(name))
    }
    fn serialize_struct_variant(
        self,
        name: &'static str,
        _index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(key_rejected(name))
    }
}
