//! Dispatch cache.
//!
//! Chains are cached per [`CacheKey`]: the operation's effective version plus
//! the observed type signature. The cache only ever holds entries for one
//! version; seeing a newer version discards everything older before the
//! lookup, so a stale chain is never served.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::resolve::ResolutionChain;
use crate::shape::TypeSignature;

/// Key of a cached chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub version: u64,
    pub types: TypeSignature,
}

/// Counters, for tests and tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    version: u64,
    entries: FxHashMap<CacheKey, Arc<ResolutionChain>>,
}

/// Per-operation chain cache.
#[derive(Debug)]
pub struct DispatchCache {
    capacity: usize,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl DispatchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Return the cached chain for `key`, building it on a miss.
    ///
    /// `build` runs without holding the lock. If two threads miss on the same
    /// key, the first stored chain wins.
    pub fn get_or_build<F>(&self, key: CacheKey, build: F) -> Arc<ResolutionChain>
    where
        F: FnOnce(&TypeSignature) -> ResolutionChain,
    {
        if self.capacity > 0 {
            let state = self.state.read();
            if state.version == key.version {
                if let Some(chain) = state.entries.get(&key) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(types = %key.types, version = key.version, "dispatch cache hit");
                    return Arc::clone(chain);
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let chain = Arc::new(build(&key.types));
        if self.capacity == 0 {
            return chain;
        }

        let mut state = self.state.write();
        if key.version < state.version {
            // Built from a snapshot that has since been superseded.
            return chain;
        }
        if key.version > state.version {
            if !state.entries.is_empty() {
                self.invalidations.fetch_add(1, Ordering::Relaxed);
                debug!(
                    from = state.version,
                    to = key.version,
                    dropped = state.entries.len(),
                    "dispatch cache invalidated"
                );
            }
            state.entries.clear();
            state.version = key.version;
        }
        if state.entries.len() >= self.capacity && !state.entries.contains_key(&key) {
            debug!(capacity = self.capacity, "dispatch cache full, clearing");
            state.entries.clear();
        }
        Arc::clone(state.entries.entry(key).or_insert(chain))
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn clear(&self) {
        self.state.write().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
