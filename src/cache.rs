//! # Bounded Cache
//! Fixed-capacity least-recently-used key/value store.
//!
//! Entries live in a slot arena threaded by a doubly linked recency list, so
//! `get`, `put` and `invalidate` are O(1). Reads reorder the list, which means
//! a shared instance must be wrapped in a lock by the caller.

use std::collections::HashMap;
use std::hash::Hash;

use anyhow::{bail, Result};

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    /// Most recently used slot.
    head: usize,
    /// Least recently used slot; evicted first.
    tail: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries. Zero is a configuration error.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            bail!("cache capacity must be at least 1");
        }
        Ok(Self {
            capacity,
            index: HashMap::with_capacity(capacity.min(4096)),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.detach(idx);
        self.push_front(idx);
        self.slots[idx].as_ref().map(|s| &s.value)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.slots[idx].as_ref().map(|s| &s.value)
    }

    /// Insert or update `key`, mark it most recently used and evict the
    /// least recently used entry if the cache grew past capacity.
    pub fn put(&mut self, key: K, value: V) {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(slot) = self.slots[idx].as_mut() {
                slot.value = value;
            }
            self.detach(idx);
            self.push_front(idx);
            return;
        }

        let slot = Slot {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(slot);
                i
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);

        if self.index.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Remove `key` if present. Missing keys are a no-op.
    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        self.detach(idx);
        self.free.push(idx);
        self.slots[idx].take().map(|s| s.value)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Keys ordered from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<&K> {
        let mut out = Vec::with_capacity(self.len());
        let mut cur = self.head;
        while cur != NIL {
            match self.slots[cur].as_ref() {
                Some(slot) => {
                    out.push(&slot.key);
                    cur = slot.next;
                }
                None => break,
            }
        }
        out
    }

    fn evict_lru(&mut self) {
        let idx = self.tail;
        if idx == NIL {
            return;
        }
        self.detach(idx);
        if let Some(slot) = self.slots[idx].take() {
            self.index.remove(&slot.key);
        }
        self.free.push(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(s) => (s.prev, s.next),
            None => return,
        };
        if prev != NIL {
            if let Some(p) = self.slots[prev].as_mut() {
                p.next = next;
            }
        } else {
            self.head = next;
        }
        if next != NIL {
            if let Some(n) = self.slots[next].as_mut() {
                n.prev = prev;
            }
        } else {
            self.tail = prev;
        }
        if let Some(s) = self.slots[idx].as_mut() {
            s.prev = NIL;
            s.next = NIL;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(s) = self.slots[idx].as_mut() {
            s.prev = NIL;
            s.next = old_head;
        }
        if old_head != NIL {
            if let Some(h) = self.slots[old_head].as_mut() {
                h.prev = idx;
            }
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(BoundedCache::<u32, u32>::new(0).is_err());
    }

    #[test]
    fn overflow_evicts_least_recently_touched() {
        for cap in 1..=8usize {
            let mut c = BoundedCache::new(cap).unwrap();
            for k in 0..=cap {
                c.put(k, k * 10);
            }
            assert_eq!(c.len(), cap, "capacity {cap}");
            assert!(!c.contains(&0), "key 0 should be evicted at capacity {cap}");
            for k in 1..=cap {
                assert_eq!(c.peek(&k), Some(&(k * 10)));
            }
        }
    }

    #[test]
    fn get_refreshes_recency() {
        let mut c = BoundedCache::new(2).unwrap();
        c.put("a", 1);
        c.put("b", 2);
        assert_eq!(c.get(&"a"), Some(&1));
        c.put("c", 3);
        assert!(c.contains(&"a"));
        assert!(!c.contains(&"b"));
        assert_eq!(c.keys_by_recency(), vec![&"c", &"a"]);
    }

    #[test]
    fn peek_does_not_refresh() {
        let mut c = BoundedCache::new(2).unwrap();
        c.put("a", 1);
        c.put("b", 2);
        assert_eq!(c.peek(&"a"), Some(&1));
        c.put("c", 3);
        assert!(!c.contains(&"a"));
    }

    #[test]
    fn update_keeps_size_and_refreshes() {
        let mut c = BoundedCache::new(2).unwrap();
        c.put("a", 1);
        c.put("b", 2);
        c.put("a", 11);
        assert_eq!(c.len(), 2);
        c.put("c", 3);
        assert_eq!(c.peek(&"a"), Some(&11));
        assert!(!c.contains(&"b"));
    }

    #[test]
    fn invalidate_missing_is_noop_and_slots_are_reused() {
        let mut c = BoundedCache::new(3).unwrap();
        assert_eq!(c.invalidate(&"nope"), None);
        c.put("a", 1);
        c.put("b", 2);
        assert_eq!(c.invalidate(&"a"), Some(1));
        assert_eq!(c.len(), 1);
        c.put("c", 3);
        c.put("d", 4);
        assert_eq!(c.len(), 3);
        assert_eq!(c.keys_by_recency(), vec![&"d", &"c", &"b"]);
        c.clear();
        assert!(c.is_empty());
        assert_eq!(c.get(&"d"), None);
    }
}
