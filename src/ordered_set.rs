//! Insertion-ordered set of unique elements.
//!
//! Elements live in a `Vec` that defines iteration order, and a parallel hash
//! index maps each element to its position so membership and position lookups
//! are O(1). Every mutation keeps the two in sync.
//!
//! Equality and hashing are order-sensitive: `[a, b]` and `[b, a]` are different
//! sets under `==`. Use [`OrderedSet::is_equal_set`] for mathematical set equality.

// used for the position index
use core::hash::{BuildHasherDefault, Hash, Hasher};
use std::collections::HashMap;
use seahash::SeaHasher;

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;
use std::{slice, vec};

use rand::Rng;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type ElementHasher = BuildHasherDefault<SeaHasher>;

// ------------- OrderedSet -------------
#[derive(Clone)]
pub struct OrderedSet<T> {
    elements: Vec<T>,
    positions: HashMap<T, usize, ElementHasher>,
}

impl<T> OrderedSet<T> {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            positions: HashMap::default(),
        }
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity_and_hasher(capacity, ElementHasher::default()),
        }
    }
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<&T> {
        self.elements.get(index)
    }
    pub fn first(&self) -> Option<&T> {
        self.elements.first()
    }
    pub fn last(&self) -> Option<&T> {
        self.elements.last()
    }
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.elements.iter()
    }
    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }
    pub fn into_vec(self) -> Vec<T> {
        self.elements
    }
    pub fn clear(&mut self) {
        self.elements.clear();
        self.positions.clear();
    }
}

impl<T: Eq + Hash + Clone> OrderedSet<T> {
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.contains_key(item)
    }
    pub fn index_of<Q>(&self, item: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.get(item).copied()
    }
    /// Elements are unique, so this always agrees with [`Self::last_index_of`].
    pub fn first_index_of<Q>(&self, item: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index_of(item)
    }
    pub fn last_index_of<Q>(&self, item: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index_of(item)
    }

    /// Appends `item` unless an equal element is already present.
    ///
    /// Returns whether the element was inserted and the position it now occupies.
    /// An element that was already present keeps its original position.
    pub fn append(&mut self, item: T) -> (bool, usize) {
        if let Some(&index) = self.positions.get(&item) {
            return (false, index);
        }
        let index = self.elements.len();
        self.positions.insert(item.clone(), index);
        self.elements.push(item);
        (true, index)
    }

    /// Inserts `item` at `index` unless an equal element is already present,
    /// in which case nothing moves and the existing position is returned.
    ///
    /// # Panics
    /// If `index > len` and the element is not yet present.
    pub fn insert(&mut self, item: T, index: usize) -> (bool, usize) {
        if let Some(&existing) = self.positions.get(&item) {
            return (false, existing);
        }
        let len = self.elements.len();
        assert!(index <= len, "OrderedSet::insert index {index} out of bounds (len {len})");
        self.elements.insert(index, item.clone());
        self.positions.insert(item, index);
        self.reindex_from(index + 1);
        (true, index)
    }

    /// Removes and returns the element at `index`, shifting later elements left.
    ///
    /// # Panics
    /// If `index` is out of bounds.
    pub fn remove_at(&mut self, index: usize) -> T {
        let len = self.elements.len();
        assert!(index < len, "OrderedSet::remove_at index {index} out of bounds (len {len})");
        let item = self.elements.remove(index);
        self.positions.remove(&item);
        self.reindex_from(index);
        item
    }
    pub fn remove<Q>(&mut self, item: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.index_of(item)?;
        Some(self.remove_at(index))
    }
    pub fn swap_at(&mut self, i: usize, j: usize) {
        let len = self.elements.len();
        assert!(i < len && j < len, "swap ({i}, {j}) out of range for length {len}");
        if i == j {
            return;
        }
        self.elements.swap(i, j);
        for index in [i, j] {
            if let Some(position) = self.positions.get_mut(&self.elements[index]) {
                *position = index;
            }
        }
    }

    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut keep: F) {
        let dropped: Vec<bool> = self.elements.iter().map(|e| !keep(e)).collect();
        self.drop_flagged(&dropped);
    }
    pub fn filter<F: FnMut(&T) -> bool>(&self, mut keep: F) -> Self {
        let mut filtered = Self::new();
        for element in self.elements.iter().filter(|e| keep(*e)) {
            filtered.append(element.clone());
        }
        filtered
    }

    // ---- set algebra ----

    /// Drops every element found in `other`, keeping the order of `self`.
    pub fn subtract<I>(&mut self, other: I)
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let mut dropped = vec![false; self.elements.len()];
        for item in other {
            let item: &T = item.borrow();
            if let Some(index) = self.index_of(item) {
                dropped[index] = true;
            }
        }
        self.drop_flagged(&dropped);
    }
    pub fn subtracting<I>(&self, other: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let mut result = self.clone();
        result.subtract(other);
        result
    }
    /// Appends the elements of `other` that are not yet present, in their order.
    pub fn form_union<I: IntoIterator<Item = T>>(&mut self, other: I) {
        self.extend(other);
    }
    pub fn union<I: IntoIterator<Item = T>>(&self, other: I) -> Self {
        let mut result = self.clone();
        result.form_union(other);
        result
    }
    pub fn form_intersection(&mut self, other: &OrderedSet<T>) {
        self.retain(|e| other.contains(e));
    }
    pub fn intersection(&self, other: &OrderedSet<T>) -> Self {
        self.filter(|e| other.contains(e))
    }
    pub fn is_subset(&self, other: &OrderedSet<T>) -> bool {
        self.len() <= other.len() && self.iter().all(|e| other.contains(e))
    }
    pub fn is_disjoint(&self, other: &OrderedSet<T>) -> bool {
        self.iter().all(|e| !other.contains(e))
    }
    /// Order-independent equality, unlike `==`.
    pub fn is_equal_set(&self, other: &OrderedSet<T>) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }

    // ---- reordering ----

    pub fn sort_by<F: FnMut(&T, &T) -> Ordering>(&mut self, compare: F) {
        self.elements.sort_by(compare);
        self.reindex_from(0);
    }
    pub fn sorted_by<F: FnMut(&T, &T) -> Ordering>(&self, compare: F) -> Self {
        let mut result = self.clone();
        result.sort_by(compare);
        result
    }
    pub fn reverse(&mut self) {
        self.elements.reverse();
        self.reindex_from(0);
    }
    pub fn reversed(&self) -> Self {
        let mut result = self.clone();
        result.reverse();
        result
    }
    pub fn shuffle(&mut self) {
        self.shuffle_using(&mut rand::thread_rng());
    }
    /// Fisher–Yates shuffle driven by the supplied random source.
    pub fn shuffle_using<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.elements.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.elements.swap(i, j);
        }
        self.reindex_from(0);
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, element) in self.elements[start..].iter().enumerate() {
            if let Some(position) = self.positions.get_mut(element) {
                *position = start + offset;
            }
        }
    }
    pub(crate) fn drop_flagged(&mut self, dropped: &[bool]) {
        if !dropped.iter().any(|d| *d) {
            return;
        }
        for (element, _) in self.elements.iter().zip(dropped).filter(|(_, d)| **d) {
            self.positions.remove(element);
        }
        let mut flags = dropped.iter();
        self.elements.retain(|_| !flags.next().copied().unwrap_or(false));
        self.reindex_from(0);
    }
}

impl<T: Ord + Eq + Hash + Clone> OrderedSet<T> {
    /// Stable sort by the natural ordering of the elements.
    pub fn sort(&mut self) {
        self.sort_by(Ord::cmp);
    }
    pub fn sorted(&self) -> Self {
        self.sorted_by(Ord::cmp)
    }
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: fmt::Debug> fmt::Debug for OrderedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.elements.iter()).finish()
    }
}
// Ordered comparison: same elements in the same order.
impl<T: PartialEq> PartialEq for OrderedSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}
impl<T: Eq> Eq for OrderedSet<T> {}
impl<T: Hash> Hash for OrderedSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.elements.len());
        for element in &self.elements {
            element.hash(state);
        }
    }
}
impl<T> Index<usize> for OrderedSet<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        &self.elements[index]
    }
}
impl<T: Eq + Hash + Clone> Extend<T> for OrderedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.append(item);
        }
    }
}
// Keeps the first occurrence of each element.
impl<T: Eq + Hash + Clone> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
impl<T: Eq + Hash + Clone> From<Vec<T>> for OrderedSet<T> {
    fn from(elements: Vec<T>) -> Self {
        elements.into_iter().collect()
    }
}
impl<T> IntoIterator for OrderedSet<T> {
    type Item = T;
    type IntoIter = vec::IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}
impl<'a, T> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: Serialize> Serialize for OrderedSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.elements.len()))?;
        for element in &self.elements {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

struct OrderedSetVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for OrderedSetVisitor<T>
where
    T: Deserialize<'de> + Eq + Hash + Clone,
{
    type Value = OrderedSet<T>;
    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sequence of unique elements")
    }
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut set = OrderedSet::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(element) = seq.next_element()? {
            let position = set.len();
            let (inserted, first) = set.append(element);
            if !inserted {
                return Err(de::Error::custom(format!(
                    "duplicate element at position {position} (first seen at {first})"
                )));
            }
        }
        Ok(set)
    }
}

impl<'de, T> Deserialize<'de> for OrderedSet<T>
where
    T: Deserialize<'de> + Eq + Hash + Clone,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(OrderedSetVisitor(PhantomData))
    }
}
