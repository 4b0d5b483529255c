//! Record store gateway
//!
//! The persistence collaborator behind the capture engine. Only the
//! insert/update contract lives here; how a backend lays records out on
//! disk is its own business.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;

use crate::record::HttpRecord;
use crate::{CaptureError, Result};

/// Persistence contract for captured records
///
/// Implementations must make `insert` and `update` individually atomic and
/// safe to call concurrently for different identities; records are
/// independent units and no cross-record transaction is required.
pub trait RecordStore: Send + Sync {
    /// Insert a not-yet-identified record and return its assigned identity
    ///
    /// # Errors
    ///
    /// Returns error if the record already carries an identity or the
    /// backend fails.
    fn insert(&self, record: &HttpRecord) -> Result<i64>;

    /// Replace the stored row with a newer snapshot
    ///
    /// Whole-record replacement; there are no partial-field updates.
    ///
    /// # Errors
    ///
    /// Returns error if the record carries no identity, the identity is
    /// unknown, or the backend fails.
    fn update(&self, record: &HttpRecord) -> Result<()>;
}

/// In-memory record store
///
/// Reference implementation of [`RecordStore`]: lock-free rows keyed by
/// identity, with identities handed out by an atomic counter starting at 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: DashMap<i64, HttpRecord>,
    next_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a snapshot by identity
    #[must_use]
    pub fn get(&self, id: i64) -> Option<HttpRecord> {
        self.rows.get(&id).map(|row| row.value().clone())
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All stored records in identity order
    #[must_use]
    pub fn records(&self) -> Vec<HttpRecord> {
        let mut records: Vec<HttpRecord> = self.rows.iter().map(|row| row.value().clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, record: &HttpRecord) -> Result<i64> {
        if record.id != 0 {
            return Err(CaptureError::AlreadyIdentified(record.id));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.rows.insert(id, record.clone().with_identity(id));
        Ok(id)
    }

    fn update(&self, record: &HttpRecord) -> Result<()> {
        if record.id == 0 {
            return Err(CaptureError::MissingIdentity);
        }

        match self.rows.get_mut(&record.id) {
            Some(mut row) => {
                *row = record.clone();
                Ok(())
            }
            None => Err(CaptureError::RecordNotFound(record.id)),
        }
    }
}
