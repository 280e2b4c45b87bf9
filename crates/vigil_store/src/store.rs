//! Store traits and the state-changing golden operations built on them.

use vigil_core::{CallRecord, ExecutionId, GoldenKey, TraceId, VigilResult};
use vigil_integrity::{bless, GoldenReference};

/// Call-record persistence
pub trait TraceStore: Send + Sync {
    /// Record by trace id
    ///
    /// # Errors
    ///
    /// `TraceNotFound` or a storage failure
    fn get(&self, trace_id: &TraceId) -> VigilResult<CallRecord>;

    /// Records of one execution in recording order
    ///
    /// # Errors
    ///
    /// `ExecutionNotFound` or a storage failure
    fn list_by_execution(&self, execution_id: &ExecutionId) -> VigilResult<Vec<CallRecord>>;

    /// Insert or replace a record
    ///
    /// # Errors
    ///
    /// Storage failure
    fn put(&self, record: CallRecord) -> VigilResult<()>;

    /// Remove a record, returning whether it existed
    ///
    /// # Errors
    ///
    /// Storage failure
    fn delete(&self, trace_id: &TraceId) -> VigilResult<bool>;

    /// Every record in recording order
    ///
    /// # Errors
    ///
    /// Storage failure
    fn list(&self) -> VigilResult<Vec<CallRecord>>;

    /// Execution ids in order of first appearance
    ///
    /// # Errors
    ///
    /// Storage failure
    fn list_executions(&self) -> VigilResult<Vec<ExecutionId>>;
}

/// Golden persistence with per-key compare-and-set
pub trait GoldenStore: Send + Sync {
    /// Active golden for a key
    ///
    /// # Errors
    ///
    /// Storage failure
    fn golden(&self, key: &GoldenKey) -> VigilResult<Option<GoldenReference>>;

    /// Active goldens in key order
    ///
    /// # Errors
    ///
    /// Storage failure
    fn goldens(&self) -> VigilResult<Vec<GoldenReference>>;

    /// Install a golden atomically; without `force` an occupied key is
    /// rejected. Returns the replaced golden.
    ///
    /// # Errors
    ///
    /// `GoldenExists` or a storage failure
    fn insert_golden(
        &self,
        golden: GoldenReference,
        force: bool,
    ) -> VigilResult<Option<GoldenReference>>;

    /// Remove the golden for a key
    ///
    /// # Errors
    ///
    /// `GoldenNotFound` or a storage failure
    fn remove_golden(&self, key: &GoldenKey) -> VigilResult<GoldenReference>;
}

/// Bless a stored trace as the golden for its key
///
/// # Errors
///
/// - `TraceNotFound` if the trace is not stored
/// - `BlessWithoutPass` if its verdict is not PASS
/// - `GoldenExists` if the key is taken and `force` is false
pub fn bless_trace<S>(store: &S, trace_id: &TraceId, force: bool) -> VigilResult<GoldenReference>
where
    S: TraceStore + GoldenStore + ?Sized,
{
    let record = store.get(trace_id)?;
    let golden = bless(&record)?;
    let replaced = store.insert_golden(golden.clone(), force)?;
    tracing::info!(
        key = %golden.key,
        trace_id = %golden.trace_id,
        digest = %golden.digest,
        replaced = replaced.is_some(),
        "blessed golden reference"
    );
    Ok(golden)
}

/// Remove the golden for a key
///
/// # Errors
///
/// `GoldenNotFound` if the key has no golden
pub fn unbless<S>(store: &S, key: &GoldenKey) -> VigilResult<GoldenReference>
where
    S: GoldenStore + ?Sized,
{
    let removed = store.remove_golden(key)?;
    tracing::info!(key = %removed.key, trace_id = %removed.trace_id, "removed golden reference");
    Ok(removed)
}
