//! Reference counts keyed by content or instance hash.

use std::hash::Hash;

use hashbrown::HashMap;

#[derive(Clone, Debug)]
pub struct RefCounts<K> {
    counts: HashMap<K, u32>,
}

impl<K> Default for RefCounts<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> RefCounts<K> {
    /// Returns true when `key` was not referenced before.
    pub fn increment(&mut self, key: K) -> bool {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns true when the last reference to `key` was dropped. Unknown keys
    /// are ignored.
    pub fn decrement(&mut self, key: K) -> bool {
        match self.counts.get_mut(&key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, key: K) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: K) -> bool {
        self.counts.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.counts.keys().copied()
    }
}
