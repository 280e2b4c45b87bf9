//! Command implementations.
//!
//! Each command reads from a store, calls into the engine and returns a
//! JSON body plus whether the command's checks passed. Printing and exit
//! codes belong to `main`.

use serde::Serialize;
use serde_json::{json, Value};
use vigil_core::{CallRecord, ExecutionId, GoldenKey, Status, TraceId, VigilError, VigilResult};
use vigil_expect::{describe, to_markdown, ExpectationSet, ScopedExpectations, TemplateRegistry};
use vigil_graph::{
    aggregate, analyze as analyze_latency, build, diff as diff_graphs, investigation_path,
    ExecutionGraph, NodeKey,
};
use vigil_integrity::{check as check_goldens, snapshot, CheckOutcome, Integrity, Snapshot};
use vigil_store::{bless_trace, unbless as unbless_key, GoldenStore, TraceStore};

/// Whether a command's checks held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing failed
    Pass,
    /// A verdict failed, a digest mismatched or a regression was found
    Fail,
}

impl From<Status> for Outcome {
    fn from(status: Status) -> Self {
        match status {
            Status::Pass => Self::Pass,
            Status::Fail => Self::Fail,
        }
    }
}

/// Result of a command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// Pass or fail
    pub outcome: Outcome,
    /// Printed to stdout as JSON
    pub body: Value,
    /// One-line human summary for stderr
    pub summary: Option<String>,
}

impl CommandOutput {
    fn ok(body: Value) -> Self {
        Self {
            outcome: Outcome::Pass,
            body,
            summary: None,
        }
    }

    fn judged(outcome: Outcome, body: Value, summary: String) -> Self {
        Self {
            outcome,
            body,
            summary: Some(summary),
        }
    }
}

fn to_body<T: Serialize>(value: &T) -> VigilResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Parse records from a JSON array or from JSON lines
///
/// # Errors
///
/// `Encoding` if the text is neither
pub fn parse_records(text: &str) -> VigilResult<Vec<CallRecord>> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

/// Merge an expectation file with named templates; `None` when neither is given
///
/// # Errors
///
/// `UnknownExpectationOption` or `UnknownTemplate`
pub fn resolve_expectations(
    file: Option<&str>,
    templates: &[String],
) -> VigilResult<Option<ExpectationSet>> {
    if file.is_none() && templates.is_empty() {
        return Ok(None);
    }
    let from_file = file.map(ExpectationSet::from_json).transpose()?;
    let from_templates = TemplateRegistry::builtin().resolve(templates.iter().map(String::as_str))?;
    Ok(Some(match from_file {
        Some(set) => set.merge(&from_templates),
        None => from_templates,
    }))
}

/// Targeted expectations for ingest: a plain set or a list of scoped
/// entries from the file, plus templates as a global entry
///
/// # Errors
///
/// `UnknownExpectationOption`, `UnknownTemplate` or `NoExpectations`
pub fn resolve_selection(
    file: Option<&str>,
    templates: &[String],
) -> VigilResult<Option<ScopedExpectations>> {
    if file.is_none() && templates.is_empty() {
        return Ok(None);
    }
    let from_templates = TemplateRegistry::builtin().resolve(templates.iter().map(String::as_str))?;
    let selection = match file {
        Some(text) => ScopedExpectations::from_json(text)?.with_global(from_templates),
        None => ScopedExpectations::global(from_templates)?,
    };
    Ok(Some(selection))
}

/// Store records, judging them when expectations are given
///
/// A record no expectation applies to is stored as is.
///
/// # Errors
///
/// A storage failure
pub fn ingest<S>(
    store: &S,
    records: Vec<CallRecord>,
    expectations: Option<ScopedExpectations>,
    rejudge: bool,
) -> VigilResult<CommandOutput>
where
    S: TraceStore + ?Sized,
{
    let total = records.len();
    let mut judged = 0usize;
    let mut unmatched = 0usize;
    for mut record in records {
        if let Some(expectations) = &expectations {
            if rejudge || record.verdict.is_none() {
                match expectations.evaluate(&record) {
                    Some(verdict) => {
                        record.verdict = Some(verdict);
                        judged += 1;
                    }
                    None => unmatched += 1,
                }
            }
        }
        store.put(record)?;
    }
    tracing::info!(records = total, judged, unmatched, "ingested records");
    Ok(CommandOutput::ok(json!({
        "ingested": total,
        "judged": judged,
        "unmatched": unmatched,
    })))
}

#[derive(Serialize)]
struct RecordSummary<'a> {
    trace_id: &'a TraceId,
    execution_id: &'a ExecutionId,
    node_id: &'a str,
    parent_node_id: Option<&'a str>,
    provider: &'a str,
    model: &'a str,
    label: Option<&'a str>,
    status: Option<Status>,
    is_golden: bool,
}

impl<'a> From<&'a CallRecord> for RecordSummary<'a> {
    fn from(r: &'a CallRecord) -> Self {
        Self {
            trace_id: &r.trace_id,
            execution_id: &r.execution_id,
            node_id: r.node_id.as_str(),
            parent_node_id: r.parent_node_id.as_ref().map(|p| p.as_str()),
            provider: &r.request.provider,
            model: &r.request.model,
            label: r.request.label.as_deref(),
            status: r.verdict.as_ref().map(|v| v.status()),
            is_golden: r.is_golden,
        }
    }
}

/// Summaries of stored records, optionally for one execution
///
/// # Errors
///
/// `ExecutionNotFound` or a storage failure
pub fn list<S>(store: &S, execution: Option<&ExecutionId>) -> VigilResult<CommandOutput>
where
    S: TraceStore + ?Sized,
{
    let records = match execution {
        Some(id) => store.list_by_execution(id)?,
        None => store.list()?,
    };
    let summaries: Vec<RecordSummary<'_>> = records.iter().map(RecordSummary::from).collect();
    Ok(CommandOutput::ok(to_body(&summaries)?))
}

/// One record in full
///
/// # Errors
///
/// `TraceNotFound` or a storage failure
pub fn show<S>(store: &S, trace_id: &TraceId) -> VigilResult<CommandOutput>
where
    S: TraceStore + ?Sized,
{
    Ok(CommandOutput::ok(to_body(&store.get(trace_id)?)?))
}

fn load_graph<S>(store: &S, execution: &ExecutionId) -> VigilResult<ExecutionGraph>
where
    S: TraceStore + ?Sized,
{
    build(store.list_by_execution(execution)?)
}

/// The graph in canonical order with its aggregated verdict
///
/// # Errors
///
/// Any graph-construction or aggregation error
pub fn graph<S>(store: &S, execution: &ExecutionId) -> VigilResult<CommandOutput>
where
    S: TraceStore + ?Sized,
{
    let graph = load_graph(store, execution)?;
    let verdict = aggregate(&graph)?;
    let nodes: Vec<Value> = graph
        .nodes()
        .map(|n| {
            json!({
                "node_id": n.id(),
                "parent_node_id": n.parent(),
                "label": n.record.request.label,
                "position": n.position,
                "depth": n.depth,
                "children": n.children,
                "verdict": n.record.verdict,
            })
        })
        .collect();
    let summary = match &verdict.first_failing_node {
        Some(first) => format!(
            "{}: {} failed, {} tainted, first failure at {}",
            execution, verdict.failed_count, verdict.tainted_count, first
        ),
        None => format!("{}: {} node(s) passed", execution, graph.len()),
    };
    Ok(CommandOutput::judged(
        verdict.status.into(),
        json!({
            "execution_id": execution,
            "roots": graph.roots(),
            "nodes": nodes,
            "verdict": verdict,
        }),
        summary,
    ))
}

/// Evidence chain from a root to the first failing node
///
/// # Errors
///
/// Any graph-construction or aggregation error
pub fn investigate<S>(store: &S, execution: &ExecutionId) -> VigilResult<CommandOutput>
where
    S: TraceStore + ?Sized,
{
    let graph = load_graph(store, execution)?;
    let verdict = aggregate(&graph)?;
    let path = investigation_path(&graph, &verdict)?;
    Ok(CommandOutput::ok(json!({
        "execution_id": execution,
        "verdict": verdict,
        "path": path,
    })))
}

/// Latency facts for one execution
///
/// # Errors
///
/// Any graph-construction error
pub fn analyze<S>(store: &S, execution: &ExecutionId, top_n: usize) -> VigilResult<CommandOutput>
where
    S: TraceStore + ?Sized,
{
    let graph = load_graph(store, execution)?;
    Ok(CommandOutput::ok(to_body(&analyze_latency(&graph, top_n))?))
}

/// Diff two executions; any divergence fails
///
/// # Errors
///
/// Any graph-construction error or `DuplicateDiffKey`
pub fn diff<S>(
    store: &S,
    a: &ExecutionId,
    b: &ExecutionId,
    key: NodeKey,
) -> VigilResult<CommandOutput>
where
    S: TraceStore + ?Sized,
{
    let graph_a = load_graph(store, a)?;
    let graph_b = load_graph(store, b)?;
    let delta = diff_graphs(&graph_a, &graph_b, key)?;
    let outcome = if delta.has_divergence() {
        Outcome::Fail
    } else {
        Outcome::Pass
    };
    let summary = format!(
        "{} vs {}: {} verdict divergence(s), {} regression(s), {} only in A, {} only in B",
        a,
        b,
        delta.diverged.len(),
        delta.regressions().count(),
        delta.only_in_a.len(),
        delta.only_in_b.len()
    );
    Ok(CommandOutput::judged(outcome, to_body(&delta)?, summary))
}

/// Bless a stored trace
///
/// # Errors
///
/// `TraceNotFound`, `BlessWithoutPass` or `GoldenExists`
pub fn bless<S>(store: &S, trace_id: &TraceId, force: bool) -> VigilResult<CommandOutput>
where
    S: TraceStore + GoldenStore + ?Sized,
{
    let golden = bless_trace(store, trace_id, force)?;
    Ok(CommandOutput::ok(to_body(&golden)?))
}

/// Remove the golden for a key
///
/// # Errors
///
/// `GoldenNotFound`
pub fn unbless<S>(store: &S, key: &GoldenKey) -> VigilResult<CommandOutput>
where
    S: GoldenStore + ?Sized,
{
    Ok(CommandOutput::ok(to_body(&unbless_key(store, key)?)?))
}

/// Active goldens
///
/// # Errors
///
/// Storage failure
pub fn goldens<S>(store: &S) -> VigilResult<CommandOutput>
where
    S: GoldenStore + ?Sized,
{
    Ok(CommandOutput::ok(to_body(&store.goldens()?)?))
}

/// Compare every golden against the latest matching record
///
/// # Errors
///
/// `NoGoldens`, `ExecutionNotFound` or a storage failure
pub fn check<S>(store: &S, execution: Option<&ExecutionId>) -> VigilResult<CommandOutput>
where
    S: TraceStore + GoldenStore + ?Sized,
{
    let goldens = store.goldens()?;
    let candidates = match execution {
        Some(id) => store.list_by_execution(id)?,
        None => store.list()?,
    };
    let report = check_goldens(&goldens, &candidates)?;

    for entry in report.failures() {
        match &entry.outcome {
            CheckOutcome::Mismatch { evidence } => {
                let err = VigilError::GoldenHashMismatch {
                    expected: evidence.original,
                    actual: evidence.new,
                };
                tracing::warn!(key = %entry.key, "{}", err.report());
            }
            CheckOutcome::Failed { verdict, .. } => {
                tracing::warn!(key = %entry.key, verdict = %verdict, "candidate failed its expectations");
            }
            CheckOutcome::Missing => {
                tracing::warn!(key = %entry.key, "no candidate recorded for golden");
            }
            CheckOutcome::Match => {}
        }
    }

    let summary = format!(
        "{} golden(s) checked, {} failing",
        report.entries.len(),
        report.failures().count()
    );
    Ok(CommandOutput::judged(
        report.status().into(),
        to_body(&report)?,
        summary,
    ))
}

/// Seal an execution into a snapshot
///
/// # Errors
///
/// Any graph-construction or aggregation error
pub fn export<S>(store: &S, execution: &ExecutionId) -> VigilResult<Snapshot>
where
    S: TraceStore + ?Sized,
{
    let graph = load_graph(store, execution)?;
    let verdict = aggregate(&graph)?;
    snapshot(&graph, &verdict)
}

/// Verify an exported snapshot
///
/// # Errors
///
/// `Encoding` if the text is not a snapshot
pub fn verify(text: &str) -> VigilResult<CommandOutput> {
    let snap = Snapshot::from_json(text)?;
    let integrity = snap.verify();
    let outcome = if integrity.is_valid() {
        Outcome::Pass
    } else {
        Outcome::Fail
    };
    let summary = match &integrity {
        Integrity::Valid => format!("snapshot of {} is intact", snap.execution_id),
        Integrity::Tampered { .. } => {
            format!("snapshot of {} was modified after sealing", snap.execution_id)
        }
        Integrity::Mislabeled { claimed, sealed } => {
            format!("snapshot labeled {claimed} seals execution {sealed}")
        }
    };
    Ok(CommandOutput::judged(
        outcome,
        json!({
            "execution_id": snap.execution_id,
            "digest": snap.digest,
            "result": integrity,
        }),
        summary,
    ))
}

/// Built-in expectation templates
///
/// # Errors
///
/// `Encoding` if serialization fails
pub fn templates() -> VigilResult<CommandOutput> {
    let registry = TemplateRegistry::builtin();
    let listed: Vec<_> = registry.iter().collect();
    Ok(CommandOutput::ok(to_body(&listed)?))
}

/// Render declared expectations as text or Markdown
#[must_use]
pub fn describe_expectations(rules: &ExpectationSet, markdown: Option<&str>) -> String {
    match markdown {
        Some(title) => to_markdown(rules, title, ""),
        None => describe(rules),
    }
}
