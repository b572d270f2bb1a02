//! Bounded LRU cache for query embeddings.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Least-recently-used cache keyed by exact input text.
///
/// Values are immutable once written; the only mutations are insertion,
/// recency updates and eviction, all under one lock.
#[derive(Debug)]
pub struct EmbeddingCache {
    inner: Mutex<LruState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct LruState {
    entries: HashMap<String, Arc<[f32]>>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(LruState {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                ..Default::default()
            }),
            capacity,
        }
    }

    /// Look up `text`, marking it most recently used on a hit.
    pub fn get(&self, text: &str) -> Option<Arc<[f32]>> {
        let mut state = self.lock();
        match state.entries.get(text).cloned() {
            Some(value) => {
                state.hits += 1;
                touch(&mut state.order, text);
                Some(value)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Insert `value` for `text`, evicting the least recently used entry when full.
    ///
    /// An existing entry is kept as-is so concurrent readers always observe
    /// the first value written for a key.
    pub fn insert(&self, text: String, value: Arc<[f32]>) -> Arc<[f32]> {
        let mut state = self.lock();

        if let Some(existing) = state.entries.get(&text).cloned() {
            touch(&mut state.order, &text);
            return existing;
        }

        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        state.order.push_back(text.clone());
        state.entries.insert(text, value.clone());
        value
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            size: state.entries.len(),
            capacity: self.capacity,
            hits: state.hits,
            misses: state.misses,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruState> {
        // Entries are never left half-written, so a poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn touch(order: &mut VecDeque<String>, text: &str) {
    if let Some(idx) = order.iter().position(|t| t == text)
        && let Some(key) = order.remove(idx)
    {
        order.push_back(key);
    }
}
