//! Record builders shared by the graph tests.

use vigil_core::{
    CallRecord, ExecutionId, NodeId, Request, Response, RuleId, TokenUsage, Verdict,
};

pub(crate) fn pass() -> Verdict {
    Verdict::pass()
}

pub(crate) fn fail(rule: RuleId) -> Verdict {
    Verdict::from_violations(vec![rule])
}

pub(crate) fn record_in(
    execution: &str,
    id: &str,
    parent: Option<&str>,
    text: &str,
    latency_ms: u64,
) -> CallRecord {
    let record = CallRecord::new(
        ExecutionId::from(execution),
        NodeId::from(id),
        Request::new("openai", "gpt-4o").with_label(id),
        Response::new(text, latency_ms, TokenUsage::new(10, 20)),
    )
    .with_trace_id(format!("trace-{execution}-{id}"));
    match parent {
        Some(p) => record.with_parent(p),
        None => record,
    }
}

pub(crate) fn node(id: &str, parent: Option<&str>, verdict: Verdict) -> CallRecord {
    record_in("exec-1", id, parent, &format!("output of {id}"), 100).with_verdict(verdict)
}
