//! In-memory store.

use crate::document::Document;
use crate::error::StoreError;
use crate::store::{GoldenStore, TraceStore};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use vigil_core::{CallRecord, ExecutionId, GoldenKey, TraceId, VigilResult};
use vigil_integrity::GoldenReference;

/// Store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: RwLock<Document>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with records in the given order
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = CallRecord>) -> Self {
        let mut doc = Document::new();
        for record in records {
            doc.put(record);
        }
        Self {
            doc: RwLock::new(doc),
        }
    }

    fn read(&self) -> VigilResult<RwLockReadGuard<'_, Document>> {
        Ok(self.doc.read().map_err(|_| StoreError::Poisoned("store"))?)
    }

    fn write(&self) -> VigilResult<RwLockWriteGuard<'_, Document>> {
        Ok(self.doc.write().map_err(|_| StoreError::Poisoned("store"))?)
    }
}

impl TraceStore for MemoryStore {
    fn get(&self, trace_id: &TraceId) -> VigilResult<CallRecord> {
        self.read()?.get(trace_id)
    }

    fn list_by_execution(&self, execution_id: &ExecutionId) -> VigilResult<Vec<CallRecord>> {
        self.read()?.list_by_execution(execution_id)
    }

    fn put(&self, record: CallRecord) -> VigilResult<()> {
        tracing::debug!(trace_id = %record.trace_id, execution_id = %record.execution_id, "stored record");
        self.write()?.put(record);
        Ok(())
    }

    fn delete(&self, trace_id: &TraceId) -> VigilResult<bool> {
        Ok(self.write()?.delete(trace_id))
    }

    fn list(&self) -> VigilResult<Vec<CallRecord>> {
        Ok(self.read()?.list())
    }

    fn list_executions(&self) -> VigilResult<Vec<ExecutionId>> {
        Ok(self.read()?.list_executions())
    }
}

impl GoldenStore for MemoryStore {
    fn golden(&self, key: &GoldenKey) -> VigilResult<Option<GoldenReference>> {
        Ok(self.read()?.golden(key))
    }

    fn goldens(&self) -> VigilResult<Vec<GoldenReference>> {
        Ok(self.read()?.goldens())
    }

    fn insert_golden(
        &self,
        golden: GoldenReference,
        force: bool,
    ) -> VigilResult<Option<GoldenReference>> {
        self.write()?.insert_golden(golden, force)
    }

    fn remove_golden(&self, key: &GoldenKey) -> VigilResult<GoldenReference> {
        self.write()?.remove_golden(key)
    }
}
