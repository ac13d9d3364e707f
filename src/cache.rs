//! Process-wide catalog cache.
//!
//! The cache holds the most recently built catalog together with its two
//! selection layers. A request for the cached `N` is served without
//! recomputation; a request for another `N` builds a fresh catalog and, once
//! the build has succeeded, replaces the entry (dropping the old selections).
//!
//! # Concurrency
//!
//! - Builds for the same `N` are coalesced: one caller builds while the others
//!   wait on a per-`N` build lock and then read the finished entry.
//! - Builds for different `N` run in parallel; the last one to finish wins.
//! - The entry is only swapped in after a successful build, so a failed or
//!   abandoned build never exposes a partial catalog.
//! - Every mutation is persisted while the state lock is held, so stored
//!   documents follow the same order as in-memory updates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::catalog::{Catalog, CatalogConfig};
use crate::error::{Result, StoreError, Synced};
use crate::selection::Selections;
use crate::store::{CatalogRecord, Store};
use crate::types::{Edo, Layer};

/// A catalog together with a copy of its selection layers.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub catalog: Arc<Catalog>,
    pub selections: Selections,
}

struct Entry {
    catalog: Arc<Catalog>,
    selections: Selections,
}

impl Entry {
    fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            catalog: Arc::clone(&self.catalog),
            selections: self.selections.clone(),
        }
    }
}

#[derive(Default)]
struct CacheState {
    current: Option<Entry>,
    /// Build locks for catalogs currently being built.
    building: HashMap<Edo, Arc<Mutex<()>>>,
}

impl CacheState {
    fn entry_for(&self, edo: Edo) -> Option<&Entry> {
        self.current.as_ref().filter(|e| e.catalog.edo() == edo)
    }

    fn entry_for_mut(&mut self, edo: Edo) -> Option<&mut Entry> {
        self.current.as_mut().filter(|e| e.catalog.edo() == edo)
    }

    /// Drops one caller's handle on the build lock for `edo`, and the map's
    /// handle too once no other caller holds one. Handles are only cloned and
    /// dropped under the state lock, so the count cannot change underneath.
    fn release_build_lock(&mut self, edo: Edo, lock: Arc<Mutex<()>>) {
        if self
            .building
            .get(&edo)
            .is_some_and(|l| Arc::ptr_eq(l, &lock) && Arc::strong_count(l) == 2)
        {
            self.building.remove(&edo);
        }
    }
}

pub struct CatalogCache {
    config: CatalogConfig,
    store: Option<Arc<dyn Store>>,
    state: Mutex<CacheState>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    builds: AtomicUsize,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

impl CatalogCache {
    /// Creates an empty, memory-only cache.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            store: None,
            state: Mutex::new(CacheState::default()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            builds: AtomicUsize::new(0),
        }
    }

    /// Creates a cache backed by `store`, restoring the last persisted catalog.
    ///
    /// An unreadable or invalid stored record is reported in the result and
    /// otherwise ignored: the cache starts empty.
    pub fn open(config: CatalogConfig, store: Arc<dyn Store>) -> Synced<Self> {
        let mut cache = Self::new(config);
        let restored = store.load_catalog().and_then(|record| record.map(|r| r.restore()).transpose());
        let store_error = match restored {
            Ok(Some((catalog, selections))) => {
                info!("Restored catalog for {} from store", catalog.edo());
                cache.state_mut().current = Some(Entry {
                    catalog: Arc::new(catalog),
                    selections,
                });
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring stored catalog: {}", e);
                Some(e)
            }
        };
        cache.store = Some(store);
        Synced::with_error(cache, store_error)
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Number of requests served from the cached entry.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of requests that had to build.
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of catalogs successfully built.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Cycle length of the cached catalog, if any.
    pub fn current_edo(&self) -> Option<Edo> {
        self.lock_state().current.as_ref().map(|e| e.catalog.edo())
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        // Entries are swapped whole, so a poisoned lock still guards a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut CacheState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    fn hit(&self, entry: &Entry) -> Synced<CatalogSnapshot> {
        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!("cache hit for {}", entry.catalog.edo());
        Synced::ok(entry.snapshot())
    }

    /// Returns the catalog for `edo`, building (and persisting) it on a miss.
    pub fn get(&self, edo: Edo) -> Result<Synced<CatalogSnapshot>> {
        let build_lock = {
            let mut state = self.lock_state();
            if let Some(entry) = state.entry_for(edo) {
                return Ok(self.hit(entry));
            }
            Arc::clone(state.building.entry(edo).or_default())
        };

        let guard = build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut state = self.lock_state();
            if let Some(entry) = state.entry_for(edo) {
                // Another caller finished this build while we waited.
                let hit = self.hit(entry);
                drop(guard);
                state.release_build_lock(edo, build_lock);
                return Ok(hit);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("cache miss for {}, building", edo);
        let built = Catalog::build(edo, &self.config);

        let mut state = self.lock_state();
        drop(guard);
        state.release_build_lock(edo, build_lock);
        let catalog = built?;
        self.builds.fetch_add(1, Ordering::Relaxed);

        if let Some(old) = &state.current {
            info!("Evicting catalog for {}", old.catalog.edo());
        }
        let selections = Selections::for_catalog(&catalog);
        let entry = Entry {
            catalog: Arc::new(catalog),
            selections,
        };
        let store_error = self.persist(&entry);
        let snapshot = entry.snapshot();
        state.current = Some(entry);
        Ok(Synced::with_error(snapshot, store_error))
    }

    /// Returns just the catalog for `edo`.
    pub fn catalog(&self, edo: Edo) -> Result<Arc<Catalog>> {
        Ok(self.get(edo)?.into_inner().catalog)
    }

    /// Sets one selection flag of the catalog for `edo` and persists the layers
    /// before returning. Returns the previous flag value.
    ///
    /// The catalog is built first if it is not the cached one.
    pub fn set_selection(&self, edo: Edo, layer: Layer, size: usize, index: usize, value: bool) -> Result<Synced<bool>> {
        loop {
            {
                let mut state = self.lock_state();
                if let Some(entry) = state.entry_for_mut(edo) {
                    let old = entry.selections.set(layer, size, index, value)?;
                    debug!("{} ({}, {}) of {}: {} -> {}", layer, size, index, edo, old, value);
                    let store_error = self.persist(entry);
                    return Ok(Synced::with_error(old, store_error));
                }
            }
            // Build (or wait for) the catalog, then retry under the lock.
            let _ = self.get(edo)?;
        }
    }

    /// The `(size, index)` pairs selected in `layer` for `edo`.
    pub fn selected(&self, edo: Edo, layer: Layer) -> Result<Vec<(usize, usize)>> {
        Ok(self.get(edo)?.into_inner().selections.selected(layer))
    }

    fn persist(&self, entry: &Entry) -> Option<StoreError> {
        let store = self.store.as_ref()?;
        let record = CatalogRecord::new(&entry.catalog, &entry.selections);
        match store.save_catalog(&record) {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to persist catalog for {}: {}", entry.catalog.edo(), e);
                Some(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use test_log::test;

    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;

    fn edo(n: u32) -> Edo {
        Edo::new(n).unwrap()
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    impl Store for BrokenStore {
        fn load_catalog(&self) -> std::result::Result<Option<CatalogRecord>, StoreError> {
            Err(StoreError::Corrupt("unreadable".into()))
        }
        fn save_catalog(&self, _: &CatalogRecord) -> std::result::Result<(), StoreError> {
            Err(StoreError::Corrupt("read-only".into()))
        }
        fn load_symbols(&self) -> std::result::Result<Option<Vec<String>>, StoreError> {
            Ok(None)
        }
        fn save_symbols(&self, _: &[String]) -> std::result::Result<(), StoreError> {
            Err(StoreError::Corrupt("read-only".into()))
        }
    }

    #[test]
    fn test_hit_and_evict() {
        let cache = CatalogCache::default();
        let a = cache.catalog(edo(6)).unwrap();
        let b = cache.catalog(edo(6)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!((cache.hits(), cache.misses(), cache.builds()), (1, 1, 1));

        cache.catalog(edo(7)).unwrap();
        assert_eq!(cache.current_edo(), Some(edo(7)));
        let c = cache.catalog(edo(6)).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.builds(), 3);
    }

    #[test]
    fn test_selections_reset_on_new_edo() {
        let cache = CatalogCache::default();
        cache.set_selection(edo(6), Layer::First, 2, 0, true).unwrap().into_result().unwrap();
        assert_eq!(cache.selected(edo(6), Layer::First).unwrap(), vec![(2, 0)]);

        cache.catalog(edo(5)).unwrap();
        assert!(cache.selected(edo(6), Layer::First).unwrap().is_empty());
    }

    #[test]
    fn test_set_selection_out_of_range() {
        let cache = CatalogCache::default();
        let err = cache.set_selection(edo(4), Layer::Second, 2, 5, true).unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { size: 2, index: 5, len: 2 }));
    }

    #[test]
    fn test_failed_build_keeps_entry() {
        let config = CatalogConfig {
            max_work: 1 << 8,
            time_limit: None,
        };
        let cache = CatalogCache::new(config);
        cache.set_selection(edo(8), Layer::First, 1, 0, true).unwrap().into_inner();

        assert!(matches!(cache.get(edo(9)), Err(Error::ResourceExhausted { edo: 9, .. })));
        assert_eq!(cache.current_edo(), Some(edo(8)));
        assert_eq!(cache.selected(edo(8), Layer::First).unwrap(), vec![(1, 0)]);
    }

    #[test]
    fn test_persists_every_mutation() {
        let store = Arc::new(MemoryStore::new());
        let cache = CatalogCache::open(CatalogConfig::default(), store.clone()).into_result().unwrap();
        cache.catalog(edo(5)).unwrap();
        let record = store.load_catalog().unwrap().unwrap();
        assert_eq!(record.edo, edo(5));
        assert!(record.selections.layer1.iter().flatten().all(|&f| !f));

        cache.set_selection(edo(5), Layer::Second, 2, 1, true).unwrap().into_result().unwrap();
        let record = store.load_catalog().unwrap().unwrap();
        assert!(record.selections.layer2[2][1]);
    }

    #[test]
    fn test_restores_from_store() {
        let store = Arc::new(MemoryStore::new());
        {
            let cache = CatalogCache::open(CatalogConfig::default(), store.clone()).into_inner();
            cache.set_selection(edo(7), Layer::First, 3, 2, true).unwrap().into_inner();
        }
        let cache = CatalogCache::open(CatalogConfig::default(), store).into_result().unwrap();
        assert_eq!(cache.current_edo(), Some(edo(7)));
        assert_eq!(cache.selected(edo(7), Layer::First).unwrap(), vec![(3, 2)]);
        assert_eq!(cache.builds(), 0);
    }

    #[test]
    fn test_store_failure_is_separate() {
        let opened = CatalogCache::open(CatalogConfig::default(), Arc::new(BrokenStore));
        assert!(!opened.is_persisted());
        let cache = opened.into_inner();

        let synced = cache.get(edo(5)).unwrap();
        assert!(synced.store_error.is_some());
        assert_eq!(synced.value.catalog.total(), 8);

        let synced = cache.set_selection(edo(5), Layer::First, 2, 0, true).unwrap();
        assert!(matches!(synced.into_result(), Err(Error::Persistence(_))));
        // The in-memory mutation still happened.
        assert_eq!(cache.selected(edo(5), Layer::First).unwrap(), vec![(2, 0)]);
    }

    #[test]
    fn test_concurrent_requests_coalesce() {
        let cache = Arc::new(CatalogCache::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.catalog(edo(16)).unwrap())
            })
            .collect();
        let catalogs: Vec<Arc<Catalog>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.builds(), 1);
        assert!(catalogs.iter().all(|c| Arc::ptr_eq(c, &catalogs[0])));
        assert_eq!(cache.hits() + cache.misses(), 8);
        assert!(cache.lock_state().building.is_empty());
    }

    #[test]
    fn test_failed_build_leaves_lock_to_waiter() {
        let config = CatalogConfig {
            max_work: 1 << 8,
            time_limit: None,
        };
        let cache = CatalogCache::new(config);
        // A caller that has taken the build lock but not yet locked it.
        let waiter = Arc::clone(cache.lock_state().building.entry(edo(9)).or_default());

        assert!(matches!(cache.get(edo(9)), Err(Error::ResourceExhausted { edo: 9, .. })));
        assert!(cache
            .lock_state()
            .building
            .get(&edo(9))
            .is_some_and(|l| Arc::ptr_eq(l, &waiter)));

        cache.lock_state().release_build_lock(edo(9), waiter);
        assert!(cache.lock_state().building.is_empty());
    }

    #[test]
    fn test_concurrent_failures_release_lock() {
        let config = CatalogConfig {
            max_work: 1 << 8,
            time_limit: None,
        };
        let cache = Arc::new(CatalogCache::new(config));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get(edo(10)).is_err())
            })
            .collect();
        assert!(handles.into_iter().all(|h| h.join().unwrap()));
        assert_eq!(cache.builds(), 0);
        assert_eq!(cache.misses(), 8);
        assert!(cache.lock_state().building.is_empty());
    }
}
