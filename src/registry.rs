/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Keyed map with a stable insertion-ordered index.
//!
//! The ledger and the guard both track open-ended sets of names (protocols,
//! chains, registrants) that must be enumerable in the order they first
//! appeared. [`KeyedRegistry`] keeps the lookup map and the index together so
//! the two can never drift apart.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// KeyedRegistry
// ---------------------------------------------------------------------------

/// Map from `K` to `V` that remembers first-insertion order.
#[derive(Debug, Clone)]
pub struct KeyedRegistry<K, V> {
    entries: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Default for KeyedRegistry<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> KeyedRegistry<K, V> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `make()` under `key` if the key is absent, then return the entry.
    ///
    /// Existing entries are left untouched.
    pub fn insert_if_absent(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.entry(key).or_insert_with(make)
    }

    /// Insert or replace the value under `key`; the index position is kept.
    pub fn upsert(&mut self, key: K, value: V) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, value);
    }

    /// Look up `key`.
    #[inline(always)]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    /// Mutable lookup of `key`.
    #[inline(always)]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get_mut(key)
    }

    /// Return `true` if `key` is present.
    #[inline(always)]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Return `true` if nothing was ever inserted.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in first-insertion order.
    #[inline(always)]
    pub fn keys(&self) -> &[K] {
        &self.order
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .iter()
            .filter_map(move |k| self.entries.get(k).map(|v| (k, v)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
