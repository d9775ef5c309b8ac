//! Bounded, recency-ordered in-memory write buffer.
//!
//! The recency list is implemented as an arena of slab-indexed nodes with a
//! free-list for reclaimed slots, rather than an intrusive doubly-linked
//! list of boxed/`Rc` nodes — no back-pointer aliasing, and the whole thing
//! stays `Send`.
//!
//! `get` does not perform the usual LRU move-to-front: recency here only
//! ever matters for *write* replacement bookkeeping (it mirrors the
//! reference implementation's `container/list` structure), since this cache
//! never evicts under pressure — it rejects new writes instead. Moving an
//! entry to the front on every read would require mutating the list under
//! what is documented as a shared-access operation, so it is deliberately
//! skipped.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::record::Record;

struct Node {
    record: Record,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner {
    map: HashMap<String, usize>,
    slab: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    size: u64,
}

impl Inner {
    fn new() -> Inner {
        Inner {
            map: HashMap::new(),
            slab: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            size: 0,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slab[idx].as_ref().expect("detach of freed slot");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slab[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slab[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.slab[idx].as_mut().unwrap();
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.slab[h].as_mut().unwrap().prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slab[idx] = Some(node);
                idx
            }
            None => {
                self.slab.push(Some(node));
                self.slab.len() - 1
            }
        }
    }

    fn free_slot(&mut self, idx: usize) {
        self.slab[idx] = None;
        self.free.push(idx);
    }

    /// Apply a single record. `enforce_cap` gates the failure/retry contract
    /// used by `insert`/`erase`; bulk replay via `put` passes `false`.
    fn apply(&mut self, cap: u64, record: Record, enforce_cap: bool) -> bool {
        let new_fp = record.footprint();
        if let Some(&idx) = self.map.get(&record.key) {
            let old_fp = self.slab[idx].as_ref().unwrap().record.footprint();
            let new_size = self.size - old_fp + new_fp;
            if enforce_cap && new_size > cap {
                return false;
            }
            self.slab[idx].as_mut().unwrap().record = record;
            self.size = new_size;
            self.detach(idx);
            self.push_front(idx);
            true
        } else {
            let new_size = self.size + new_fp;
            if enforce_cap && new_size > cap {
                return false;
            }
            let key = record.key.clone();
            let idx = self.alloc(Node {
                record,
                prev: None,
                next: None,
            });
            self.map.insert(key, idx);
            self.push_front(idx);
            self.size = new_size;
            true
        }
    }
}

/// Bounded recency-ordered `key -> Record` map. Capacity is measured in the
/// estimated byte footprint of each record's key and value, not
/// entry count.
pub struct Cache {
    cap: u64,
    inner: RwLock<Inner>,
}

impl Cache {
    pub fn new(cap: u64) -> Cache {
        Cache {
            cap,
            inner: RwLock::new(Inner::new()),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.cap
    }

    pub fn size(&self) -> u64 {
        self.inner.read().expect("cache lock poisoned").size
    }

    /// Insert or replace `key`'s value. Fails (returns `false`, no mutation)
    /// if doing so would exceed capacity.
    pub fn insert(&self, key: &str, value: serde_json::Value) -> bool {
        let record = Record::new(key, value);
        self.inner
            .write()
            .expect("cache lock poisoned")
            .apply(self.cap, record, true)
    }

    /// Mark `key` as deleted. Same failure contract as `insert`.
    pub fn erase(&self, key: &str) -> bool {
        let record = Record::tombstone(key);
        self.inner
            .write()
            .expect("cache lock poisoned")
            .apply(self.cap, record, true)
    }

    /// Bulk-apply records without the failure/retry contract. Used by
    /// startup replay of the durability log, which was by construction
    /// sized for this cache.
    pub fn put(&self, records: Vec<Record>) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        for record in records {
            inner.apply(self.cap, record, false);
        }
    }

    /// Look up `key`. A tombstone hit is reported as `Some(record)` with
    /// `record.tombstone == true`; callers must treat that as "absent" and
    /// stop searching older levels.
    pub fn get(&self, key: &str) -> Option<Record> {
        let inner = self.inner.read().expect("cache lock poisoned");
        inner
            .map
            .get(key)
            .map(|&idx| inner.slab[idx].as_ref().unwrap().record.clone())
    }

    /// Atomically reset the cache to empty and return its contents sorted
    /// ascending by key. The recency list is discarded.
    pub fn drain_sorted(&self) -> Vec<Record> {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        let mut records: Vec<Record> = inner
            .map
            .values()
            .map(|&idx| inner.slab[idx].as_ref().unwrap().record.clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));

        let indices: Vec<usize> = inner.map.values().copied().collect();
        for idx in indices {
            inner.free_slot(idx);
        }
        inner.map.clear();
        inner.head = None;
        inner.tail = None;
        inner.size = 0;

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_then_get_roundtrips() {
        let cache = Cache::new(1024);
        assert!(cache.insert("a", json!("1")));
        let got = cache.get("a").unwrap();
        assert_eq!(got.value, json!("1"));
        assert!(!got.tombstone);
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn erase_shadows_with_tombstone() {
        let cache = Cache::new(1024);
        cache.insert("a", json!("1"));
        cache.erase("a");
        let got = cache.get("a").unwrap();
        assert!(got.tombstone);
    }

    #[test]
    fn insert_fails_past_capacity_without_mutating() {
        let cache = Cache::new(8);
        assert!(cache.insert("abc", json!("x")));
        let size_before = cache.size();
        assert!(!cache.insert("a-very-long-key-indeed", json!("y")));
        assert_eq!(cache.size(), size_before);
    }

    #[test]
    fn replacing_existing_key_adjusts_size_by_delta() {
        let cache = Cache::new(1024);
        cache.insert("a", json!("x"));
        let size1 = cache.size();
        cache.insert("a", json!("xx"));
        assert_eq!(cache.size(), size1 + 1);
    }

    #[test]
    fn put_applies_without_capacity_enforcement() {
        let cache = Cache::new(1);
        cache.put(vec![
            crate::record::Record::new("a", json!("long value")),
            crate::record::Record::new("b", json!("another long value")),
        ]);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn drain_sorted_empties_and_orders_by_key() {
        let cache = Cache::new(1024);
        cache.insert("banana", json!(1));
        cache.insert("apple", json!(2));
        cache.insert("cherry", json!(3));
        let drained = cache.drain_sorted();
        let keys: Vec<&str> = drained.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["apple", "banana", "cherry"]);
        assert_eq!(cache.size(), 0);
        assert!(cache.get("apple").is_none());
    }
}
