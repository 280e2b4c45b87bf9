//! Call recorder.
//!
//! Wraps one adapter call: resolves lineage from the active context, runs
//! the call in a child scope so nested recordings become its children,
//! judges the response against declared expectations and stores the record.

use crate::context::{lineage_for_new_call, scope, scope_async, ExecutionContext};
use std::future::Future;
use std::sync::Arc;
use vigil_core::{CallRecord, NodeId, Request, Response, Timestamp, VigilResult};
use vigil_expect::{Evaluator, ExpectationSet};
use vigil_store::TraceStore;

/// Records adapter calls into a trace store
#[derive(Debug)]
pub struct Recorder<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for Recorder<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> Recorder<S>
where
    S: TraceStore + ?Sized,
{
    /// Create a recorder over `store`
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Record a synchronous call
    ///
    /// With no expectations the record carries no verdict.
    ///
    /// # Errors
    ///
    /// - `NoExpectations` if `expectations` is given but declares nothing;
    ///   the call is not made
    /// - storage failures from `put`
    pub fn record<F>(
        &self,
        request: Request,
        expectations: Option<&ExpectationSet>,
        call: F,
    ) -> VigilResult<CallRecord>
    where
        F: FnOnce() -> Response,
    {
        let evaluator = expectations.cloned().map(Evaluator::new).transpose()?;
        let lineage = lineage_for_new_call();
        let node_id = NodeId::generate();
        let started = Timestamp::now();

        let response = scope(lineage.child(node_id.clone()), call);

        self.finish(lineage, node_id, started, request, response, evaluator.as_ref())
    }

    /// Record an asynchronous call
    ///
    /// # Errors
    ///
    /// As [`Recorder::record`]
    pub async fn record_async<F, Fut>(
        &self,
        request: Request,
        expectations: Option<&ExpectationSet>,
        call: F,
    ) -> VigilResult<CallRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Response>,
    {
        let evaluator = expectations.cloned().map(Evaluator::new).transpose()?;
        let lineage = lineage_for_new_call();
        let node_id = NodeId::generate();
        let started = Timestamp::now();

        let response = scope_async(lineage.child(node_id.clone()), call()).await;

        self.finish(lineage, node_id, started, request, response, evaluator.as_ref())
    }

    fn finish(
        &self,
        lineage: ExecutionContext,
        node_id: NodeId,
        started: Timestamp,
        request: Request,
        response: Response,
        evaluator: Option<&Evaluator>,
    ) -> VigilResult<CallRecord> {
        let mut record = CallRecord::new(lineage.execution_id, node_id, request, response)
            .with_timestamp(started);
        record.parent_node_id = lineage.parent_node_id;
        if let Some(evaluator) = evaluator {
            record.verdict = Some(evaluator.evaluate(&record));
        }

        tracing::debug!(
            trace_id = %record.trace_id,
            execution_id = %record.execution_id,
            node_id = %record.node_id,
            root = record.is_root(),
            "recorded call"
        );
        self.store.put(record.clone())?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{ErrorCode, ExecutionId, Status, TokenUsage};
    use vigil_store::MemoryStore;

    fn recorder() -> Recorder<MemoryStore> {
        Recorder::new(Arc::new(MemoryStore::new()))
    }

    fn reply(text: &str) -> Response {
        Response::new(text, 25, TokenUsage::new(4, 12))
    }

    #[test]
    fn test_unscoped_call_is_a_root_with_verdict() {
        let rec = recorder();
        let rules = ExpectationSet::new().must_include(["refund"]);
        let record = rec
            .record(Request::new("openai", "gpt-4o"), Some(&rules), || reply("no"))
            .unwrap();
        assert!(record.is_root());
        assert_eq!(record.verdict.as_ref().map(|v| v.status()), Some(Status::Fail));
        assert_eq!(rec.store().get(&record.trace_id).unwrap(), record);
    }

    #[test]
    fn test_no_expectations_means_no_verdict() {
        let record = recorder()
            .record(Request::new("openai", "gpt-4o"), None, || reply("x"))
            .unwrap();
        assert_eq!(record.verdict, None);
    }

    #[test]
    fn test_empty_expectations_refused_before_calling() {
        let mut called = false;
        let err = recorder()
            .record(Request::new("p", "m"), Some(&ExpectationSet::new()), || {
                called = true;
                reply("x")
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoExpectationsDeclared);
        assert!(!called);
    }

    #[test]
    fn test_nested_calls_become_children() {
        let rec = recorder();
        let inner = rec.clone();
        let exec = ExecutionId::from("agent-run");

        let outer = scope(ExecutionContext::for_execution(exec.clone()), || {
            rec.record(Request::new("p", "planner"), None, || {
                inner
                    .record(Request::new("p", "tool"), None, || reply("tool out"))
                    .unwrap();
                reply("plan")
            })
            .unwrap()
        });

        let records = rec.store().list_by_execution(&exec).unwrap();
        assert_eq!(records.len(), 2);
        let child = records.iter().find(|r| r.node_id != outer.node_id).unwrap();
        assert_eq!(child.parent_node_id.as_ref(), Some(&outer.node_id));
        assert!(outer.is_root());
    }

    #[tokio::test]
    async fn test_async_nesting_follows_the_task() {
        let rec = recorder();
        let inner = rec.clone();
        let exec = ExecutionId::from("async-run");

        let outer = scope_async(ExecutionContext::for_execution(exec.clone()), async {
            rec.record_async(Request::new("p", "planner"), None, || async {
                tokio::task::yield_now().await;
                inner
                    .record_async(Request::new("p", "tool"), None, || async { reply("t") })
                    .await
                    .unwrap();
                reply("plan")
            })
            .await
            .unwrap()
        })
        .await;

        let records = rec.store().list_by_execution(&exec).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .any(|r| r.parent_node_id.as_ref() == Some(&outer.node_id)));
    }
}
