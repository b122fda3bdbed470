//! Test-only, in-memory `FeatureStore` implementation used by unit and
//! behaviour tests.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    ExternalId, FeatureClass, FeatureRecord, FeatureSession, FeatureStore, FeatureStoreError,
    store::normalise_for_storage,
};

type Tables = BTreeMap<FeatureClass, BTreeMap<ExternalId, FeatureRecord>>;

/// In-memory `FeatureStore` that applies the same write rules as the SQLite
/// store and records session usage.
///
/// Writes for ids registered with [`MemoryFeatureStore::reject_writes_for`]
/// fail with [`FeatureStoreError::Rejected`]; once
/// [`MemoryFeatureStore::set_unavailable`] is called no session can be
/// acquired.
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    tables: Mutex<Tables>,
    rejected_ids: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryFeatureStore {
    /// Create a store pre-populated with records for one class.
    pub fn with_records<I>(class: FeatureClass, records: I) -> Self
    where
        I: IntoIterator<Item = FeatureRecord>,
    {
        let store = Self::default();
        {
            let mut tables = lock(&store.tables);
            let table = tables.entry(class).or_default();
            for record in records {
                table.insert(record.external_id.clone(), record);
            }
        }
        store
    }

    /// Make writes of the given external id fail.
    #[must_use]
    pub fn reject_writes_for(self, external_id: &str) -> Self {
        lock(&self.rejected_ids).insert(external_id.to_owned());
        self
    }

    /// Toggle whether sessions can be acquired.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of the stored records of a class, ordered by id.
    pub fn records(&self, class: FeatureClass) -> Vec<FeatureRecord> {
        lock(&self.tables)
            .get(&class)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of sessions opened over the store's lifetime.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of successful upserts.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl FeatureStore for MemoryFeatureStore {
    type Session<'s> = MemorySession<'s>;

    fn session(&self) -> Result<Self::Session<'_>, FeatureStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FeatureStoreError::Unavailable {
                reason: "test store marked unavailable".to_owned(),
            });
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession { store: self })
    }
}

/// Session over a [`MemoryFeatureStore`].
#[derive(Debug)]
pub struct MemorySession<'s> {
    store: &'s MemoryFeatureStore,
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        self.store.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FeatureSession for MemorySession<'_> {
    fn upsert(
        &mut self,
        class: FeatureClass,
        record: &FeatureRecord,
    ) -> Result<(), FeatureStoreError> {
        if lock(&self.store.rejected_ids).contains(record.external_id.as_str()) {
            return Err(FeatureStoreError::Rejected {
                class,
                external_id: record.external_id.clone(),
                reason: "write rejected by test store".to_owned(),
            });
        }
        let geometry = normalise_for_storage(class, record)?;
        let stored = FeatureRecord::new(
            record.external_id.clone(),
            geometry.to_interchange(),
            record.attributes.clone(),
        );
        lock(&self.store.tables)
            .entry(class)
            .or_default()
            .insert(stored.external_id.clone(), stored);
        self.store.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_all(&mut self, class: FeatureClass) -> Result<Vec<FeatureRecord>, FeatureStoreError> {
        Ok(self.store.records(class))
    }
}
