//! Golden references.
//!
//! A golden is the accepted baseline for a (provider, model) key: the BLAKE3
//! digest of a PASS response plus the trace it came from. Comparison is
//! exact; any byte difference is a mismatch.

use serde::{Deserialize, Serialize};
use vigil_core::{
    CallRecord, Digest, GoldenKey, HashEvidence, Response, Status, Timestamp, TraceId, Verdict,
    VigilError, VigilResult,
};

/// Accepted baseline for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenReference {
    /// (provider, model)
    pub key: GoldenKey,
    /// Digest of the blessed response text
    pub digest: Digest,
    /// Source trace
    pub trace_id: TraceId,
    /// When the trace was blessed
    pub blessed_at: Timestamp,
}

/// Digest of a response's exact text
#[must_use]
pub fn response_digest(response: &Response) -> Digest {
    Digest::compute(response.text.as_bytes())
}

/// Bless a PASS trace as the golden for its key
///
/// # Errors
///
/// `BlessWithoutPass` unless the record carries a PASS verdict
pub fn bless(record: &CallRecord) -> VigilResult<GoldenReference> {
    bless_at(record, Timestamp::now())
}

/// Bless with an explicit timestamp
///
/// # Errors
///
/// `BlessWithoutPass` unless the record carries a PASS verdict
pub fn bless_at(record: &CallRecord, blessed_at: Timestamp) -> VigilResult<GoldenReference> {
    if !record.verdict.as_ref().is_some_and(Verdict::is_pass) {
        tracing::warn!(trace_id = %record.trace_id, "refused to bless a trace without a passing verdict");
        return Err(VigilError::BlessWithoutPass {
            trace_id: record.trace_id.clone(),
        });
    }
    Ok(GoldenReference {
        key: record.golden_key(),
        digest: response_digest(&record.response),
        trace_id: record.trace_id.clone(),
        blessed_at,
    })
}

/// Result of comparing a response against a golden
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GoldenComparison {
    /// Digests are equal
    Match,
    /// Digests differ
    Mismatch {
        /// Golden and candidate digests
        evidence: HashEvidence,
    },
}

impl GoldenComparison {
    /// Whether the digests matched
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }

    /// Turn a mismatch into `GoldenHashMismatch`
    ///
    /// # Errors
    ///
    /// `GoldenHashMismatch` for `Mismatch`
    pub fn into_result(self) -> VigilResult<()> {
        match self {
            Self::Match => Ok(()),
            Self::Mismatch { evidence } => Err(VigilError::GoldenHashMismatch {
                expected: evidence.original,
                actual: evidence.new,
            }),
        }
    }
}

/// Compare a record's response against a golden
#[must_use]
pub fn compare(record: &CallRecord, golden: &GoldenReference) -> GoldenComparison {
    let evidence = HashEvidence::compare(golden.digest, response_digest(&record.response));
    if evidence.matched {
        GoldenComparison::Match
    } else {
        GoldenComparison::Mismatch { evidence }
    }
}

/// Per-golden check outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Candidate passed and matched the golden digest
    Match,
    /// Candidate passed its expectations but the digest differs
    Mismatch {
        /// Golden and candidate digests
        evidence: HashEvidence,
    },
    /// Candidate verdict is FAIL
    Failed {
        /// The failing verdict
        verdict: Verdict,
        /// Golden and candidate digests
        evidence: HashEvidence,
    },
    /// No candidate was recorded for the key
    Missing,
}

/// Check result for one golden
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    /// Golden key
    pub key: GoldenKey,
    /// Trace the golden came from
    pub golden_trace_id: TraceId,
    /// Candidate compared, if any
    pub candidate_trace_id: Option<TraceId>,
    /// What was found
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

/// Result of checking candidates against every golden
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// One entry per golden, in the order the goldens were given
    pub entries: Vec<CheckEntry>,
}

impl CheckReport {
    /// Every golden matched a passing candidate
    #[must_use]
    pub fn passed(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.outcome, CheckOutcome::Match))
    }

    /// Entries that did not match
    pub fn failures(&self) -> impl Iterator<Item = &CheckEntry> {
        self.entries
            .iter()
            .filter(|e| !matches!(e.outcome, CheckOutcome::Match))
    }

    /// Overall status
    #[must_use]
    pub fn status(&self) -> Status {
        if self.passed() {
            Status::Pass
        } else {
            Status::Fail
        }
    }
}

/// Compare every golden against the latest candidate with its key
///
/// Candidates are taken in recording order; the last one with a matching
/// key wins. The golden's own source trace is never its candidate.
///
/// # Errors
///
/// `NoGoldens` if `goldens` is empty
pub fn check(goldens: &[GoldenReference], candidates: &[CallRecord]) -> VigilResult<CheckReport> {
    if goldens.is_empty() {
        return Err(VigilError::NoGoldens);
    }

    let entries = goldens
        .iter()
        .map(|golden| {
            let candidate = candidates
                .iter()
                .rev()
                .find(|r| r.trace_id != golden.trace_id && r.golden_key() == golden.key);

            let outcome = match candidate {
                None => CheckOutcome::Missing,
                Some(record) => {
                    let evidence =
                        HashEvidence::compare(golden.digest, response_digest(&record.response));
                    match &record.verdict {
                        Some(verdict) if verdict.is_fail() => CheckOutcome::Failed {
                            verdict: verdict.clone(),
                            evidence,
                        },
                        _ if evidence.matched => CheckOutcome::Match,
                        _ => CheckOutcome::Mismatch { evidence },
                    }
                }
            };

            CheckEntry {
                key: golden.key.clone(),
                golden_trace_id: golden.trace_id.clone(),
                candidate_trace_id: candidate.map(|r| r.trace_id.clone()),
                outcome,
            }
        })
        .collect();

    let report = CheckReport { entries };
    tracing::debug!(
        goldens = goldens.len(),
        failures = report.failures().count(),
        "checked candidates against goldens"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{ErrorCode, ExecutionId, NodeId, Request, RuleId, TokenUsage};

    fn record(trace: &str, model: &str, text: &str, verdict: Option<Verdict>) -> CallRecord {
        let mut r = CallRecord::new(
            ExecutionId::from("exec"),
            NodeId::from(trace),
            Request::new("openai", model),
            Response::new(text, 120, TokenUsage::new(5, 9)),
        )
        .with_trace_id(trace);
        r.verdict = verdict;
        r
    }

    fn failing() -> Verdict {
        Verdict::from_violations(vec![RuleId::MustNotInclude])
    }

    #[test]
    fn test_bless_requires_pass() {
        let err = bless(&record("t1", "m", "x", Some(failing()))).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BlessWithoutPassingVerdict);

        let err = bless(&record("t2", "m", "x", None)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BlessWithoutPassingVerdict);
    }

    #[test]
    fn test_bless_pass_records_digest_and_source() {
        let golden = bless(&record("t1", "gpt-4o", "hello", Some(Verdict::pass()))).unwrap();
        assert_eq!(golden.key, GoldenKey::new("openai", "gpt-4o"));
        assert_eq!(golden.digest, Digest::compute(b"hello"));
        assert_eq!(golden.trace_id, TraceId::from("t1"));
    }

    #[test]
    fn test_compare_is_exact() {
        let golden = bless(&record("t1", "m", "Refund issued.", Some(Verdict::pass()))).unwrap();
        assert!(compare(&record("t2", "m", "Refund issued.", None), &golden).is_match());

        let cmp = compare(&record("t3", "m", "Refund issued", None), &golden);
        let GoldenComparison::Mismatch { evidence } = &cmp else {
            panic!("expected mismatch");
        };
        assert_eq!(evidence.original, golden.digest);
        assert!(!evidence.matched);
        assert_eq!(cmp.into_result().unwrap_err().code(), ErrorCode::GoldenHashMismatch);
    }

    #[test]
    fn test_check_without_goldens() {
        let err = check(&[], &[record("t", "m", "x", None)]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CheckWithoutAnyGolden);
    }

    #[test]
    fn test_check_outcomes() {
        let g_match = bless(&record("g1", "a", "same", Some(Verdict::pass()))).unwrap();
        let g_mismatch = bless(&record("g2", "b", "old", Some(Verdict::pass()))).unwrap();
        let g_failed = bless(&record("g3", "c", "ok", Some(Verdict::pass()))).unwrap();
        let g_missing = bless(&record("g4", "d", "gone", Some(Verdict::pass()))).unwrap();

        let candidates = vec![
            record("g1", "a", "same", Some(Verdict::pass())),
            record("c1", "a", "stale", Some(Verdict::pass())),
            record("c2", "a", "same", Some(Verdict::pass())),
            record("c3", "b", "new", Some(Verdict::pass())),
            record("c4", "c", "ok", Some(failing())),
        ];
        let report = check(&[g_match, g_mismatch, g_failed, g_missing], &candidates).unwrap();

        assert!(!report.passed());
        assert_eq!(report.status(), Status::Fail);
        assert_eq!(report.entries[0].outcome, CheckOutcome::Match);
        assert_eq!(report.entries[0].candidate_trace_id, Some(TraceId::from("c2")));
        assert!(matches!(report.entries[1].outcome, CheckOutcome::Mismatch { .. }));
        assert!(matches!(report.entries[2].outcome, CheckOutcome::Failed { .. }));
        assert_eq!(report.entries[3].outcome, CheckOutcome::Missing);
        assert_eq!(report.failures().count(), 3);
    }

    #[test]
    fn test_check_all_match_passes() {
        let golden = bless(&record("g", "a", "same", Some(Verdict::pass()))).unwrap();
        let report = check(&[golden], &[record("c", "a", "same", Some(Verdict::pass()))]).unwrap();
        assert!(report.passed());
    }

    #[test]
    fn test_check_entry_serializes_flat() {
        let entry = CheckEntry {
            key: GoldenKey::new("p", "m"),
            golden_trace_id: TraceId::from("g"),
            candidate_trace_id: None,
            outcome: CheckOutcome::Missing,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["outcome"], "missing");
    }
}
