//! The store's state and every rule that mutates it.
//!
//! Both backends hold a `Document` behind a lock; the file backend also
//! serializes it. Keeping the rules here means the two backends cannot
//! disagree on ordering or golden semantics.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vigil_core::{CallRecord, ExecutionId, GoldenKey, TraceId, VigilError, VigilResult};
use vigil_integrity::GoldenReference;

const DOCUMENT_VERSION: u32 = 1;

/// Records in recording order plus active goldens by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DocumentRepr", into = "DocumentRepr")]
pub struct Document {
    records: IndexMap<TraceId, CallRecord>,
    goldens: BTreeMap<GoldenKey, GoldenReference>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DocumentRepr {
    version: u32,
    records: Vec<CallRecord>,
    goldens: Vec<GoldenReference>,
}

impl TryFrom<DocumentRepr> for Document {
    type Error = String;

    fn try_from(repr: DocumentRepr) -> Result<Self, Self::Error> {
        if repr.version != DOCUMENT_VERSION {
            return Err(format!(
                "store document version {} is not supported (expected {})",
                repr.version, DOCUMENT_VERSION
            ));
        }
        let mut doc = Self::default();
        for record in repr.records {
            if doc.records.contains_key(&record.trace_id) {
                return Err(format!("trace {} appears more than once", record.trace_id));
            }
            doc.records.insert(record.trace_id.clone(), record);
        }
        for golden in repr.goldens {
            if doc.goldens.contains_key(&golden.key) {
                return Err(format!("more than one golden for {}", golden.key));
            }
            doc.goldens.insert(golden.key.clone(), golden);
        }
        Ok(doc)
    }
}

impl From<Document> for DocumentRepr {
    fn from(doc: Document) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            records: doc.records.into_values().collect(),
            goldens: doc.goldens.into_values().collect(),
        }
    }
}

impl Document {
    /// Empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record by trace id
    ///
    /// # Errors
    ///
    /// `TraceNotFound`
    pub fn get(&self, trace_id: &TraceId) -> VigilResult<CallRecord> {
        self.records
            .get(trace_id)
            .cloned()
            .ok_or_else(|| VigilError::TraceNotFound {
                trace_id: trace_id.clone(),
            })
    }

    /// Records of one execution in recording order
    ///
    /// # Errors
    ///
    /// `ExecutionNotFound` if no record belongs to the execution
    pub fn list_by_execution(&self, execution_id: &ExecutionId) -> VigilResult<Vec<CallRecord>> {
        let records: Vec<CallRecord> = self
            .records
            .values()
            .filter(|r| &r.execution_id == execution_id)
            .cloned()
            .collect();
        if records.is_empty() {
            return Err(VigilError::ExecutionNotFound {
                execution_id: execution_id.clone(),
            });
        }
        Ok(records)
    }

    /// Every record in recording order
    #[must_use]
    pub fn list(&self) -> Vec<CallRecord> {
        self.records.values().cloned().collect()
    }

    /// Execution ids in order of first appearance
    #[must_use]
    pub fn list_executions(&self) -> Vec<ExecutionId> {
        let seen: IndexSet<&ExecutionId> =
            self.records.values().map(|r| &r.execution_id).collect();
        seen.into_iter().cloned().collect()
    }

    /// Insert a record; a record with the same trace id keeps its position
    pub fn put(&mut self, mut record: CallRecord) {
        record.is_golden = self
            .goldens
            .get(&record.golden_key())
            .is_some_and(|g| g.trace_id == record.trace_id);
        self.records.insert(record.trace_id.clone(), record);
    }

    /// Remove a record, preserving the order of the rest
    pub fn delete(&mut self, trace_id: &TraceId) -> bool {
        self.records.shift_remove(trace_id).is_some()
    }

    /// Active golden for a key
    #[must_use]
    pub fn golden(&self, key: &GoldenKey) -> Option<GoldenReference> {
        self.goldens.get(key).cloned()
    }

    /// Active goldens in key order
    #[must_use]
    pub fn goldens(&self) -> Vec<GoldenReference> {
        self.goldens.values().cloned().collect()
    }

    /// Install a golden, refusing to replace one unless `force` is set
    ///
    /// Returns the golden that was replaced.
    ///
    /// # Errors
    ///
    /// `GoldenExists` if the key is taken and `force` is false
    pub fn insert_golden(
        &mut self,
        golden: GoldenReference,
        force: bool,
    ) -> VigilResult<Option<GoldenReference>> {
        if !force && self.goldens.contains_key(&golden.key) {
            return Err(VigilError::GoldenExists { key: golden.key });
        }
        let replaced = self.goldens.insert(golden.key.clone(), golden.clone());
        if let Some(old) = &replaced {
            self.set_golden_flag(&old.trace_id, false);
        }
        self.set_golden_flag(&golden.trace_id, true);
        Ok(replaced)
    }

    /// Remove the golden for a key
    ///
    /// # Errors
    ///
    /// `GoldenNotFound` if the key has no golden
    pub fn remove_golden(&mut self, key: &GoldenKey) -> VigilResult<GoldenReference> {
        let removed = self
            .goldens
            .remove(key)
            .ok_or_else(|| VigilError::GoldenNotFound { key: key.clone() })?;
        self.set_golden_flag(&removed.trace_id, false);
        Ok(removed)
    }

    fn set_golden_flag(&mut self, trace_id: &TraceId, value: bool) {
        if let Some(record) = self.records.get_mut(trace_id) {
            record.is_golden = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{ErrorCode, NodeId, Request, Response, TokenUsage, Verdict};
    use proptest::prelude::*;
    use vigil_integrity::bless;

    fn record(trace: &str, exec: &str) -> CallRecord {
        CallRecord::new(
            ExecutionId::from(exec),
            NodeId::from(trace),
            Request::new("openai", "gpt-4o"),
            Response::new(format!("text {trace}"), 10, TokenUsage::new(1, 1)),
        )
        .with_trace_id(trace)
        .with_verdict(Verdict::pass())
    }

    #[test]
    fn test_put_keeps_recording_order() {
        let mut doc = Document::new();
        doc.put(record("t3", "e1"));
        doc.put(record("t1", "e2"));
        doc.put(record("t2", "e1"));
        // re-put keeps original slot
        doc.put(record("t3", "e1"));

        let order: Vec<String> = doc.list().into_iter().map(|r| r.trace_id.into_inner()).collect();
        assert_eq!(order, vec!["t3", "t1", "t2"]);
        assert_eq!(
            doc.list_executions(),
            vec![ExecutionId::from("e1"), ExecutionId::from("e2")]
        );
        let e1: Vec<TraceId> = doc
            .list_by_execution(&ExecutionId::from("e1"))
            .unwrap()
            .into_iter()
            .map(|r| r.trace_id)
            .collect();
        assert_eq!(e1, vec![TraceId::from("t3"), TraceId::from("t2")]);
    }

    #[test]
    fn test_delete_preserves_order() {
        let mut doc = Document::new();
        for t in ["a", "b", "c"] {
            doc.put(record(t, "e"));
        }
        assert!(doc.delete(&TraceId::from("b")));
        assert!(!doc.delete(&TraceId::from("b")));
        let order: Vec<String> = doc.list().into_iter().map(|r| r.trace_id.into_inner()).collect();
        assert_eq!(order, vec!["a", "c"]);
    }

    #[test]
    fn test_missing_lookups() {
        let doc = Document::new();
        assert_eq!(
            doc.get(&TraceId::from("x")).unwrap_err().code(),
            ErrorCode::TraceNotFound
        );
        assert_eq!(
            doc.list_by_execution(&ExecutionId::from("x")).unwrap_err().code(),
            ErrorCode::ExecutionNotFound
        );
    }

    #[test]
    fn test_golden_compare_and_set() {
        let mut doc = Document::new();
        doc.put(record("t1", "e"));
        doc.put(record("t2", "e"));
        let first = bless(&doc.get(&TraceId::from("t1")).unwrap()).unwrap();
        let second = bless(&doc.get(&TraceId::from("t2")).unwrap()).unwrap();

        assert_eq!(doc.insert_golden(first.clone(), false).unwrap(), None);
        assert!(doc.get(&TraceId::from("t1")).unwrap().is_golden);

        let err = doc.insert_golden(second.clone(), false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::GoldenAlreadyExists);

        let replaced = doc.insert_golden(second.clone(), true).unwrap();
        assert_eq!(replaced, Some(first));
        assert!(!doc.get(&TraceId::from("t1")).unwrap().is_golden);
        assert!(doc.get(&TraceId::from("t2")).unwrap().is_golden);

        let removed = doc.remove_golden(&second.key).unwrap();
        assert_eq!(removed.trace_id, TraceId::from("t2"));
        assert!(!doc.get(&TraceId::from("t2")).unwrap().is_golden);
        assert_eq!(
            doc.remove_golden(&second.key).unwrap_err().code(),
            ErrorCode::GoldenNotFound
        );
    }

    #[test]
    fn test_serde_round_trip_and_version_check() {
        let mut doc = Document::new();
        doc.put(record("t1", "e"));
        let golden = bless(&doc.get(&TraceId::from("t1")).unwrap()).unwrap();
        doc.insert_golden(golden, false).unwrap();

        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);

        let bumped = json.replacen("\"version\":1", "\"version\":9", 1);
        assert!(serde_json::from_str::<Document>(&bumped).is_err());
    }

    proptest! {
        #[test]
        fn prop_listing_follows_first_put(puts in prop::collection::vec(0u8..12, 0..40)) {
            let mut doc = Document::new();
            let mut expected: Vec<String> = Vec::new();
            for n in &puts {
                let trace = format!("t{n}");
                if !expected.contains(&trace) {
                    expected.push(trace.clone());
                }
                doc.put(record(&trace, "e"));
            }
            let order: Vec<String> = doc.list().into_iter().map(|r| r.trace_id.into_inner()).collect();
            prop_assert_eq!(order, expected);
        }
    }
}
