// File: src/table.rs
//
// Open-addressed hash table used for string interning, globals, class
// method tables, and instance field tables (spec §4.4). Linear probing
// with tombstones, power-of-two capacity, load factor 0.75.

use crate::value::{ObjRef, Value};

const LOAD_FACTOR_MAX: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

/// FNV-1a, 32-bit. Used to precompute every string's hash once at
/// creation time so table probing never re-hashes.
pub fn fnv1a_hash(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

#[derive(Clone, Copy)]
struct Entry {
    key: Option<ObjRef>,
    hash: u32,
    value: Value,
}

impl Clone for Table {
    fn clone(&self) -> Self {
        Table { entries: self.entries.clone(), count: self.count }
    }
}

/// Sentinel marking a deleted slot: empty key, `Bool(true)` value.
/// Distinguishes "never used" (key None, value Nil) from "tombstone"
/// (key None, value Bool(true)) during probing.
fn is_tombstone(entry: &Entry) -> bool {
    entry.key.is_none() && matches!(entry.value, Value::Bool(true))
}

pub struct Table {
    entries: Vec<Entry>,
    /// Live entries plus tombstones — matches the count clox itself grows
    /// against, so occupied-looking tombstones still trigger a rehash.
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Table { entries: Vec::new(), count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Find the slot `key`/`hash` belongs in: an exact match if present,
    /// otherwise the first tombstone seen (for reuse on insert) or the
    /// first empty slot.
    fn find_entry(entries: &[Entry], key: Option<ObjRef>, hash: u32) -> usize {
        let capacity = entries.len();
        let mut index = (hash as usize) & (capacity - 1);
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            if entry.key.is_none() {
                if is_tombstone(entry) {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                } else {
                    return tombstone.unwrap_or(index);
                }
            } else if entry.key == key {
                return index;
            }
            index = (index + 1) & (capacity - 1);
        }
    }

    fn grow(&mut self, new_capacity: usize) {
        let mut new_entries = vec![Entry { key: None, hash: 0, value: Value::Nil }; new_capacity];
        let mut live_count = 0;
        for entry in &self.entries {
            if entry.key.is_none() {
                continue;
            }
            let idx = Self::find_entry(&new_entries, entry.key, entry.hash);
            new_entries[idx] = *entry;
            live_count += 1;
        }
        self.entries = new_entries;
        self.count = live_count;
    }

    fn ensure_capacity(&mut self) {
        if ((self.count + 1) as f64) > (self.capacity() as f64) * LOAD_FACTOR_MAX {
            let new_capacity = if self.capacity() == 0 { INITIAL_CAPACITY } else { self.capacity() * 2 };
            self.grow(new_capacity);
        }
    }

    /// Inserts or overwrites `key`. Returns `true` if this created a new
    /// entry (key wasn't already present).
    pub fn set(&mut self, key: ObjRef, hash: u32, value: Value) -> bool {
        self.ensure_capacity();
        let idx = Self::find_entry(&self.entries, Some(key), hash);
        let is_new = self.entries[idx].key.is_none();
        if is_new && !is_tombstone(&self.entries[idx]) {
            self.count += 1;
        }
        self.entries[idx] = Entry { key: Some(key), hash, value };
        is_new
    }

    pub fn get(&self, key: ObjRef, hash: u32) -> Option<Value> {
        if self.count == 0 {
            return None;
        }
        let idx = Self::find_entry(&self.entries, Some(key), hash);
        self.entries[idx].key.map(|_| self.entries[idx].value)
    }

    /// Deletes `key`, leaving a tombstone so probe chains through it stay
    /// intact.
    pub fn delete(&mut self, key: ObjRef, hash: u32) -> bool {
        if self.count == 0 {
            return false;
        }
        let idx = Self::find_entry(&self.entries, Some(key), hash);
        if self.entries[idx].key.is_none() {
            return false;
        }
        self.entries[idx] = Entry { key: None, hash: 0, value: Value::Bool(true) };
        true
    }

    /// Content-addressed lookup used only by the intern table: finds a
    /// canonical string whose bytes equal `chars`, without already having
    /// an `ObjRef` to compare against.
    pub fn find_string(&self, chars: &str, hash: u32, resolve: impl Fn(ObjRef) -> bool) -> Option<ObjRef> {
        if self.count == 0 {
            return None;
        }
        let capacity = self.capacity();
        let mut index = (hash as usize) & (capacity - 1);
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None if !is_tombstone(entry) => return None,
                Some(key) if entry.hash == hash && resolve(key) => {
                    let _ = chars; // comparison happens inside `resolve`
                    return Some(key);
                }
                _ => {}
            }
            index = (index + 1) & (capacity - 1);
        }
    }

    /// Copies every live key/value pair into a `Vec`. Used by `INHERIT`'s
    /// copy-down and by the GC's blackening pass — both need an owned
    /// snapshot rather than a live borrow of `self`.
    pub fn live_entries(&self) -> Vec<(ObjRef, Value)> {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value))).collect()
    }

    /// Copies every entry of `other` into `self`, overwriting on
    /// collision. Used by `INHERIT` to copy a superclass's methods down
    /// into a subclass at declaration time.
    pub fn add_all(&mut self, other: &Table) {
        for entry in &other.entries {
            if let Some(key) = entry.key {
                self.set(key, entry.hash, entry.value);
            }
        }
    }

    /// Deletes every entry whose key is not marked live by `is_marked`
    /// (the GC's weak-reference sweep over the intern table).
    pub fn remove_white(&mut self, is_marked: impl Fn(ObjRef) -> bool) {
        for entry in self.entries.iter_mut() {
            if let Some(key) = entry.key {
                if !is_marked(key) {
                    *entry = Entry { key: None, hash: 0, value: Value::Bool(true) };
                }
            }
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: usize) -> ObjRef {
        ObjRef(n)
    }

    #[test]
    fn set_and_get_roundtrip() {
        let mut t = Table::new();
        assert!(t.set(r(1), 10, Value::Number(42.0)));
        match t.get(r(1), 10) {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("expected Number(42)"),
        }
    }

    #[test]
    fn delete_leaves_probe_chain_intact() {
        let mut t = Table::new();
        // Force two keys into the same bucket by giving them equal hashes.
        t.set(r(1), 1, Value::Number(1.0));
        t.set(r(2), 1, Value::Number(2.0));
        assert!(t.delete(r(1), 1));
        match t.get(r(2), 1) {
            Some(Value::Number(n)) => assert_eq!(n, 2.0),
            _ => panic!("probe chain broke after delete"),
        }
    }

    #[test]
    fn grows_past_load_factor() {
        let mut t = Table::new();
        for i in 0..100 {
            t.set(r(i), i as u32, Value::Number(i as f64));
        }
        for i in 0..100 {
            match t.get(r(i), i as u32) {
                Some(Value::Number(n)) => assert_eq!(n, i as f64),
                _ => panic!("lost entry {i} across growth"),
            }
        }
    }
}
