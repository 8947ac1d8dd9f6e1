use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Capacity used by the evaluator for its alias and deal caches.
pub const DEFAULT_CAPACITY: usize = 512;

/// Bounded least-recently-used map.
///
/// `get` refreshes an entry's recency; `set` evicts the oldest entry once the
/// map is full. The struct does no locking of its own: the evaluator keeps each
/// instance behind a `Mutex` so one engine can be shared across threads.
#[derive(Debug, Clone)]
pub struct Lru<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> Lru<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let value = self.map.get(key)?.clone();
        self.touch(key);
        Some(value)
    }

    pub fn set(&mut self, key: K, value: V) {
        if self.map.contains_key(&key) {
            self.touch(&key);
            self.map.insert(key, value);
            return;
        }

        while self.map.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }

        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    // Move key to the most-recent end
    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for Lru<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
