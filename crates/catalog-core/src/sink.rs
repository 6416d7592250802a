//! The record sink capability: where validated products end up.
//!
//! The sink performs a plain insert. It does not de-duplicate, so crawling
//! the same URL twice stores two records; callers that need idempotency must
//! enforce it on their side (for example a unique index on `source_url`).

use std::future::Future;
use std::sync::Mutex;

use thiserror::Error;

use crate::products::ProductRecord;

/// Identifier assigned by the sink to a stored record.
pub type SinkId = i64;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write product record: {reason}")]
    Write { reason: String },

    #[error("record {0} not found")]
    NotFound(SinkId),
}

/// Persists one [`ProductRecord`] per call.
pub trait RecordSink: Send + Sync {
    /// Inserts `record` and returns the identifier the sink assigned to it.
    fn insert(
        &self,
        record: &ProductRecord,
    ) -> impl Future<Output = Result<SinkId, SinkError>> + Send;
}

impl<S: RecordSink> RecordSink for std::sync::Arc<S> {
    fn insert(
        &self,
        record: &ProductRecord,
    ) -> impl Future<Output = Result<SinkId, SinkError>> + Send {
        (**self).insert(record)
    }
}

/// Process-local sink used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ProductRecord>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record inserted so far, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<ProductRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Fetches a record back by the id [`RecordSink::insert`] returned.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::NotFound`] if no record has that id.
    pub fn get(&self, id: SinkId) -> Result<ProductRecord, SinkError> {
        let index = id
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(SinkError::NotFound(id))?;
        self.records
            .lock()
            .ok()
            .and_then(|guard| guard.get(index).cloned())
            .ok_or(SinkError::NotFound(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    async fn insert(&self, record: &ProductRecord) -> Result<SinkId, SinkError> {
        let mut guard = self.records.lock().map_err(|e| SinkError::Write {
            reason: format!("memory sink poisoned: {e}"),
        })?;
        guard.push(record.clone());
        SinkId::try_from(guard.len()).map_err(|e| SinkError::Write {
            reason: e.to_string(),
        })
    }
}
