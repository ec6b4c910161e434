//! Associative container that remembers insertion order

use std::{borrow::Borrow, collections::HashMap, hash::Hash};

/// Map whose entries are numbered in the order where keys were first seen
///
/// Entry numbers are contiguous starting from 0, and iteration follows them,
/// which makes everything that is derived from this map reproducible across
/// runs over the same input. Keys are stored twice, once in the lookup table
/// and once in the entry list, so cheaply cloneable keys like `Rc<str>` or
/// integers should be used.
#[derive(Clone, Debug)]
pub struct OrderedMap<K, V> {
    /// Entry number of each key
    indices: HashMap<K, usize>,

    /// Entries in order of first insertion
    entries: Vec<(K, V)>,
}
//
impl<K: Clone + Eq + Hash, V> OrderedMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            indices: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entry number of a key, if present
    pub fn index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.indices.get(key).copied()
    }

    /// Value associated with a key, if present
    #[cfg(test)]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.index_of(key).map(|idx| &self.entries[idx].1)
    }

    /// Entry number of a key, inserting it with a default value if absent
    ///
    /// The owned key is only built, using `make_key`, on first insertion.
    pub fn index_or_insert_with<Q>(&mut self, key: &Q, make_key: impl FnOnce(&Q) -> K) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Default,
    {
        if let Some(idx) = self.index_of(key) {
            return idx;
        }
        let idx = self.entries.len();
        let key = make_key(key);
        self.indices.insert(key.clone(), idx);
        self.entries.push((key, V::default()));
        idx
    }

    /// Entry with a certain number
    ///
    /// # Panics
    ///
    /// If there is no such entry
    pub fn entry_at(&self, idx: usize) -> (&K, &V) {
        let (key, value) = &self.entries[idx];
        (key, value)
    }

    /// Mutable access to the value of the entry with a certain number
    ///
    /// # Panics
    ///
    /// If there is no such entry
    pub fn value_at_mut(&mut self, idx: usize) -> &mut V {
        &mut self.entries[idx].1
    }

    /// Iterate over entries in order of first insertion
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter().map(|(key, value)| (key, value))
    }
}
//
impl<K: Clone + Eq + Hash, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
