//! Insertion-ordered dictionary.
//!
//! Keys are held in an [`OrderedSet`] and values in a parallel `Vec`; position `i`
//! of one always belongs to position `i` of the other. All index bookkeeping is
//! delegated to the key set, every mutation touches both arrays before returning,
//! and reordering operations (sort, reverse, shuffle) apply one permutation to both.
//!
//! Through serde the dictionary is written as a flat `[k0, v0, k1, v1, ...]`
//! sequence rather than a map, so formats with unordered keyed containers cannot
//! reorder the entries. Decoding rejects repeated keys.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Index;
use std::{iter, mem, slice, vec};

use rand::Rng;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CompatError, Result};
use crate::ordered_set::OrderedSet;

pub type Iter<'a, K, V> = iter::Zip<slice::Iter<'a, K>, slice::Iter<'a, V>>;
pub type IterMut<'a, K, V> = iter::Zip<slice::Iter<'a, K>, slice::IterMut<'a, V>>;
pub type IntoIter<K, V> = iter::Zip<vec::IntoIter<K>, vec::IntoIter<V>>;

// ------------- OrderedDictionary -------------
#[derive(Clone)]
pub struct OrderedDictionary<K, V> {
    keys: OrderedSet<K>,
    values: Vec<V>,
}

impl<K, V> OrderedDictionary<K, V> {
    pub fn new() -> Self {
        Self {
            keys: OrderedSet::new(),
            values: Vec::new(),
        }
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: OrderedSet::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn keys(&self) -> &OrderedSet<K> {
        &self.keys
    }
    pub fn values(&self) -> &[V] {
        &self.values
    }
    // Values may be rewritten in place; keys may not, since that would bypass the index.
    pub fn values_mut(&mut self) -> &mut [V] {
        &mut self.values
    }
    pub fn get_index(&self, index: usize) -> Option<(&K, &V)> {
        Some((self.keys.get(index)?, self.values.get(index)?))
    }
    pub fn first(&self) -> Option<(&K, &V)> {
        self.get_index(0)
    }
    pub fn last(&self) -> Option<(&K, &V)> {
        self.get_index(self.len().checked_sub(1)?)
    }
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.keys.as_slice().iter().zip(self.values.iter())
    }
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.keys.as_slice().iter().zip(self.values.iter_mut())
    }
    pub fn into_keys(self) -> OrderedSet<K> {
        self.keys
    }
    pub fn into_values(self) -> Vec<V> {
        self.values
    }
    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
    }
    fn check_parity(&self) {
        assert_eq!(
            self.keys.len(),
            self.values.len(),
            "OrderedDictionary invariant violated: {} keys but {} values",
            self.keys.len(),
            self.values.len()
        );
    }
}

impl<K: Eq + Hash + Clone, V> OrderedDictionary<K, V> {
    /// Builds a dictionary from pairs whose keys must all be distinct.
    pub fn try_from_unique_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let pairs = pairs.into_iter();
        let mut dictionary = Self::with_capacity(pairs.size_hint().0);
        for (position, (key, value)) in pairs.enumerate() {
            if dictionary.contains_key(&key) {
                return Err(CompatError::corruption(format!(
                    "duplicate key in pair {position}"
                )));
            }
            dictionary.insert(key, value);
        }
        Ok(dictionary)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.keys.contains(key)
    }
    pub fn index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.keys.index_of(key)
    }
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.keys.index_of(key)?;
        self.values.get(index)
    }
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.keys.index_of(key)?;
        self.values.get_mut(index)
    }
    /// The defaulted read: the stored value, or `default` when `key` is absent.
    pub fn get_or<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).unwrap_or(default)
    }

    /// The subscript setter. `Some` updates in place or appends a new entry at
    /// the end; `None` removes the entry and shifts later entries left.
    pub fn set(&mut self, key: K, value: Option<V>) {
        match value {
            Some(value) => {
                self.insert(key, value);
            }
            None => {
                self.remove(&key);
            }
        }
    }

    /// Updates the value stored under `key` or appends a new entry, returning
    /// the value it replaced.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.keys.index_of(&key) {
            Some(index) => Some(mem::replace(&mut self.values[index], value)),
            None => {
                self.keys.append(key);
                self.values.push(value);
                None
            }
        }
    }
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.keys.index_of(key)?;
        let (_, value) = self.remove_at(index);
        Some(value)
    }
    /// # Panics
    /// If `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> (K, V) {
        let key = self.keys.remove_at(index);
        let value = self.values.remove(index);
        (key, value)
    }

    /// The defaulted subscript mutation: reads the stored value (or `default`),
    /// hands it to `update`, and writes the result back through [`Self::set`].
    /// New keys land at the end.
    pub fn update_or_insert<F: FnOnce(&mut V)>(&mut self, key: K, default: V, update: F) {
        let mut value = match self.keys.index_of(&key) {
            Some(index) => mem::replace(&mut self.values[index], default),
            None => default,
        };
        update(&mut value);
        self.set(key, Some(value));
    }

    /// Merges `other` into `self`. Existing keys keep their position and take
    /// `combine(existing, incoming)`; new keys are appended in the order they
    /// arrive. An error from `combine` stops the merge and is returned.
    pub fn merge<I, F, E>(&mut self, other: I, mut combine: F) -> std::result::Result<(), E>
    where
        I: IntoIterator<Item = (K, V)>,
        F: FnMut(&V, V) -> std::result::Result<V, E>,
    {
        for (key, value) in other {
            match self.keys.index_of(&key) {
                Some(index) => {
                    let combined = combine(&self.values[index], value)?;
                    self.values[index] = combined;
                }
                None => {
                    self.keys.append(key);
                    self.values.push(value);
                }
            }
        }
        Ok(())
    }

    pub fn retain<F: FnMut(&K, &V) -> bool>(&mut self, mut keep: F) {
        let dropped: Vec<bool> = self.iter().map(|(k, v)| !keep(k, v)).collect();
        self.keys.drop_flagged(&dropped);
        let mut flags = dropped.iter();
        self.values.retain(|_| !flags.next().copied().unwrap_or(false));
        self.check_parity();
    }

    pub fn map_values<U, F: FnMut(&V) -> U>(&self, transform: F) -> OrderedDictionary<K, U> {
        OrderedDictionary {
            keys: self.keys.clone(),
            values: self.values.iter().map(transform).collect(),
        }
    }
    /// Like [`Self::map_values`], dropping entries whose transform yields `None`.
    pub fn compact_map_values<U, F>(&self, mut transform: F) -> OrderedDictionary<K, U>
    where
        F: FnMut(&V) -> Option<U>,
    {
        let mut result = OrderedDictionary::with_capacity(self.len());
        for (key, value) in self.iter() {
            if let Some(mapped) = transform(value) {
                result.insert(key.clone(), mapped);
            }
        }
        result
    }

    // ---- reordering ----

    /// Stable sort of the entries with a comparator over `(key, value)` pairs.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut((&K, &V), (&K, &V)) -> Ordering,
    {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            compare((&self.keys[a], &self.values[a]), (&self.keys[b], &self.values[b]))
        });
        self.permute(&order);
    }
    pub fn reverse(&mut self) {
        self.keys.reverse();
        self.values.reverse();
    }
    pub fn swap_at(&mut self, i: usize, j: usize) {
        self.keys.swap_at(i, j);
        self.values.swap(i, j);
    }
    pub fn shuffle(&mut self) {
        self.shuffle_using(&mut rand::thread_rng());
    }
    /// Fisher–Yates over both arrays at once, so every swap moves a key together
    /// with its value.
    pub fn shuffle_using<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.swap_at(i, j);
        }
    }

    // Rebuilds both arrays so that new position `n` holds old entry `order[n]`.
    fn permute(&mut self, order: &[usize]) {
        let mut keys: Vec<Option<K>> = mem::take(&mut self.keys).into_vec().into_iter().map(Some).collect();
        let mut values: Vec<Option<V>> = mem::take(&mut self.values).into_iter().map(Some).collect();
        let mut rebuilt_keys = OrderedSet::with_capacity(order.len());
        let mut rebuilt_values = Vec::with_capacity(order.len());
        for &index in order {
            rebuilt_keys.append(take_slot(&mut keys, index));
            rebuilt_values.push(take_slot(&mut values, index));
        }
        self.keys = rebuilt_keys;
        self.values = rebuilt_values;
        self.check_parity();
    }
}

impl<K: Eq + Hash + Clone, V: Clone> OrderedDictionary<K, V> {
    pub fn merging<I, F, E>(&self, other: I, combine: F) -> std::result::Result<Self, E>
    where
        I: IntoIterator<Item = (K, V)>,
        F: FnMut(&V, V) -> std::result::Result<V, E>,
    {
        let mut result = self.clone();
        result.merge(other, combine)?;
        Ok(result)
    }
    pub fn filter<F: FnMut(&K, &V) -> bool>(&self, keep: F) -> Self {
        let mut result = self.clone();
        result.retain(keep);
        result
    }
    pub fn sorted_by<F>(&self, compare: F) -> Self
    where
        F: FnMut((&K, &V), (&K, &V)) -> Ordering,
    {
        let mut result = self.clone();
        result.sort_by(compare);
        result
    }
    pub fn reversed(&self) -> Self {
        let mut result = self.clone();
        result.reverse();
        result
    }
}

impl<K: Ord + Eq + Hash + Clone, V> OrderedDictionary<K, V> {
    /// Sorts the entries by key.
    pub fn sort(&mut self) {
        self.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
}
impl<K: Ord + Eq + Hash + Clone, V: Clone> OrderedDictionary<K, V> {
    pub fn sorted(&self) -> Self {
        let mut result = self.clone();
        result.sort();
        result
    }
}

fn take_slot<T>(slots: &mut [Option<T>], index: usize) -> T {
    match slots[index].take() {
        Some(item) => item,
        None => panic!("OrderedDictionary invariant violated: entry {index} placed twice while reordering"),
    }
}

impl<K, V> Default for OrderedDictionary<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for OrderedDictionary<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
// Ordered comparison, same as OrderedSet.
impl<K: PartialEq, V: PartialEq> PartialEq for OrderedDictionary<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys && self.values == other.values
    }
}
impl<K: Eq, V: Eq> Eq for OrderedDictionary<K, V> {}
impl<K: Hash, V: Hash> Hash for OrderedDictionary<K, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.values.len());
        for (key, value) in self.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}
impl<K, V, Q> Index<&Q> for OrderedDictionary<K, V>
where
    K: Eq + Hash + Clone + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    type Output = V;
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("OrderedDictionary: key not found"),
        }
    }
}
impl<K: Eq + Hash + Clone, V> Extend<(K, V)> for OrderedDictionary<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
// A repeated key keeps its first position and its last value.
impl<K: Eq + Hash + Clone, V> FromIterator<(K, V)> for OrderedDictionary<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dictionary = Self::new();
        dictionary.extend(iter);
        dictionary
    }
}
impl<K: Eq + Hash + Clone, V, const N: usize> From<[(K, V); N]> for OrderedDictionary<K, V> {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
impl<K, V> IntoIterator for OrderedDictionary<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_vec().into_iter().zip(self.values)
    }
}
impl<'a, K, V> IntoIterator for &'a OrderedDictionary<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Serialize, V: Serialize> Serialize for OrderedDictionary<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len() * 2))?;
        for (key, value) in self.iter() {
            seq.serialize_element(key)?;
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

struct FlatPairVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K, V> Visitor<'de> for FlatPairVisitor<K, V>
where
    K: Deserialize<'de> + Eq + Hash + Clone,
    V: Deserialize<'de>,
{
    type Value = OrderedDictionary<K, V>;
    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a flat sequence of alternating keys and values")
    }
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
        let capacity = seq.size_hint().unwrap_or(0).min(8192) / 2;
        let mut dictionary = OrderedDictionary::with_capacity(capacity);
        let mut position = 0usize;
        while let Some(key) = seq.next_element::<K>()? {
            let value = match seq.next_element::<V>()? {
                Some(value) => value,
                None => {
                    return Err(de::Error::custom(format!(
                        "key at position {position} has no value"
                    )));
                }
            };
            if dictionary.contains_key(&key) {
                return Err(de::Error::custom(format!(
                    "duplicate key at position {position}"
                )));
            }
            dictionary.insert(key, value);
            position += 2;
        }
        Ok(dictionary)
    }
}

impl<'de, K, V> Deserialize<'de> for OrderedDictionary<K, V>
where
    K: Deserialize<'de> + Eq + Hash + Clone,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_seq(FlatPairVisitor(PhantomData))
    }
}
