use std::collections::HashMap;
use std::hash::Hash;

/// A bounded, insertion-ordered LRU map.
///
/// Entries live in a slab and are chained into a doubly linked list, most
/// recently used at the front. `put` past capacity evicts from the back and
/// hands the evicted value back to the caller, which owns its cleanup.
#[derive(Debug)]
pub struct BoundedLru<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    slots: Vec<Option<Entry<K, V>>>,
    free_slots: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<K, V> BoundedLru<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free_slots: vec![],
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up `key`, promoting it to most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.move_to_front(slot);
        self.slots[slot].as_ref().map(|entry| &entry.value)
    }

    /// Inserts `value` at the front.
    ///
    /// Returns the value this call displaced: either the previous value for
    /// `key`, or the least recently used value evicted to stay within capacity.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.index.get(&key) {
            self.move_to_front(slot);
            let entry = self.slots[slot].as_mut()?;
            return Some(std::mem::replace(&mut entry.value, value));
        }

        let entry = Entry {
            key: key.clone(),
            value,
            prev: None,
            next: self.head,
        };
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        if let Some(old_head) = self.head {
            if let Some(head_entry) = self.slots[old_head].as_mut() {
                head_entry.prev = Some(slot);
            }
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
        self.index.insert(key, slot);

        if self.index.len() > self.capacity {
            return self.evict_back();
        }
        None
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free_slots.clear();
        self.head = None;
        self.tail = None;
    }

    fn evict_back(&mut self) -> Option<V> {
        let slot = self.tail?;
        self.unlink(slot);
        let entry = self.slots[slot].take()?;
        self.free_slots.push(slot);
        self.index.remove(&entry.key);
        Some(entry.value)
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        let old_head = self.head;
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.prev = None;
            entry.next = old_head;
        }
        if let Some(old_head) = old_head {
            if let Some(head_entry) = self.slots[old_head].as_mut() {
                head_entry.prev = Some(slot);
            }
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.slots[slot].as_ref() {
            Some(entry) => (entry.prev, entry.next),
            None => return,
        };
        match prev {
            Some(prev) => {
                if let Some(prev_entry) = self.slots[prev].as_mut() {
                    prev_entry.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next) => {
                if let Some(next_entry) = self.slots[next].as_mut() {
                    next_entry.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.prev = None;
            entry.next = None;
        }
    }
}
