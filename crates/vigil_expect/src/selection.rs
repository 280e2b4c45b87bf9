//! Selecting the expectations that apply to a call.
//!
//! Each entry pairs an expectation set with a scope and a list of
//! activation conditions. An entry applies to a record when its scope
//! matches and every condition holds. The sets of all applicable entries
//! are merged, stricter bound first, and the merge is evaluated as one set.
//! A record no entry applies to is left unjudged.
//!
//! Entries cannot be combined with AND/OR/NOT; the rule set stays closed.

use crate::condition::Condition;
use crate::evaluator::Evaluator;
use crate::rules::ExpectationSet;
use crate::scope::ExpectationScope;
use serde::{Deserialize, Serialize};
use vigil_core::{CallRecord, Verdict, VigilError, VigilResult};

/// One targeted expectation set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedExpectation {
    /// Where the set applies
    #[serde(default, skip_serializing_if = "ExpectationScope::is_global")]
    pub scope: ExpectationScope,
    /// Conditions that must all hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<Condition>,
    /// The expectations
    pub expect: ExpectationSet,
}

impl ScopedExpectation {
    /// A global, unconditional entry
    #[must_use]
    pub fn new(expect: ExpectationSet) -> Self {
        Self {
            scope: ExpectationScope::global(),
            when: Vec::new(),
            expect,
        }
    }

    /// Restrict the entry
    #[must_use]
    pub fn scoped(mut self, scope: ExpectationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Add an activation condition
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.when.push(condition);
        self
    }

    /// Whether the entry applies to the record
    #[must_use]
    pub fn applies_to(&self, record: &CallRecord) -> bool {
        self.scope.matches(record) && self.when.iter().all(|condition| condition.holds(record))
    }
}

// Entry shape on the wire; `expect` stays raw so option errors keep their code.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    #[serde(default)]
    scope: ExpectationScope,
    #[serde(default)]
    when: Vec<Condition>,
    expect: serde_json::Value,
}

/// Ordered list of targeted expectation sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopedExpectations {
    entries: Vec<ScopedExpectation>,
}

impl ScopedExpectations {
    /// Build from entries
    ///
    /// # Errors
    ///
    /// `NoExpectations` if there are no entries or an entry declares no rule
    pub fn new(entries: Vec<ScopedExpectation>) -> VigilResult<Self> {
        if entries.is_empty() || entries.iter().any(|entry| entry.expect.is_empty()) {
            return Err(VigilError::NoExpectations);
        }
        Ok(Self { entries })
    }

    /// A single global entry
    ///
    /// # Errors
    ///
    /// `NoExpectations` if the set declares no rule
    pub fn global(expect: ExpectationSet) -> VigilResult<Self> {
        Self::new(vec![ScopedExpectation::new(expect)])
    }

    /// Parse a document: one expectation object, or an array of entries
    ///
    /// # Errors
    ///
    /// `UnknownExpectationOption`, `NoExpectations` or `Encoding`
    pub fn from_json(text: &str) -> VigilResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        match value {
            serde_json::Value::Array(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    let raw: RawEntry = serde_json::from_value(item)?;
                    entries.push(ScopedExpectation {
                        scope: raw.scope,
                        when: raw.when,
                        expect: ExpectationSet::from_value(raw.expect)?,
                    });
                }
                Self::new(entries)
            }
            other => Self::global(ExpectationSet::from_value(other)?),
        }
    }

    /// Append a global entry, if it declares anything
    #[must_use]
    pub fn with_global(mut self, expect: ExpectationSet) -> Self {
        if !expect.is_empty() {
            self.entries.push(ScopedExpectation::new(expect));
        }
        self
    }

    /// The entries in declaration order
    #[must_use]
    pub fn entries(&self) -> &[ScopedExpectation] {
        &self.entries
    }

    /// Merged set of every entry that applies; empty when none does
    #[must_use]
    pub fn select(&self, record: &CallRecord) -> ExpectationSet {
        self.entries
            .iter()
            .filter(|entry| entry.applies_to(record))
            .fold(ExpectationSet::new(), |acc, entry| acc.merge(&entry.expect))
    }

    /// Verdict under the applicable expectations, `None` when none apply
    #[must_use]
    pub fn evaluate(&self, record: &CallRecord) -> Option<Verdict> {
        match Evaluator::new(self.select(record)) {
            Ok(evaluator) => Some(evaluator.evaluate(record)),
            Err(_) => {
                tracing::debug!(
                    trace_id = %record.trace_id,
                    node_id = %record.node_id,
                    "no expectation applies"
                );
                None
            }
        }
    }
}
