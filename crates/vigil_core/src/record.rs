//! Recorded calls.
//!
//! A `CallRecord` is one completed call: what was asked (`Request`), what
//! came back (`Response`), where it sits in its execution group, and the
//! verdict computed against its declared expectations. Records are built
//! once and not mutated by the engine.

use crate::id::{ExecutionId, NodeId, TraceId};
use crate::time::Timestamp;
use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One message of a chat-shaped request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker role (`system`, `user`, `assistant`, ...)
    pub role: String,
    /// Message content
    pub content: String,
}

impl Message {
    /// Create a message
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Request descriptor. Opaque to the engine apart from the golden key and
/// the optional workflow label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Position of the call in its logical workflow, stable across executions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Request messages
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Sampling parameters as sent
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Caller metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Request {
    /// Create a request for a provider/model pair
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            label: None,
            messages: Vec::new(),
            parameters: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the workflow label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a message
    #[must_use]
    pub fn with_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(Message::new(role, content));
        self
    }

    /// Set a parameter
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Golden key of this request
    #[must_use]
    pub fn golden_key(&self) -> GoldenKey {
        GoldenKey::new(self.provider.clone(), self.model.clone())
    }
}

/// Token accounting reported by the call adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Create usage counts
    #[must_use]
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Input plus output tokens
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Response descriptor as produced by a call adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Response {
    /// Response text, exact bytes as received
    pub text: String,
    /// Observed latency
    pub latency_ms: u64,
    /// Token accounting
    pub token_usage: TokenUsage,
}

impl Response {
    /// Create a response
    #[must_use]
    pub fn new(text: impl Into<String>, latency_ms: u64, token_usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            latency_ms,
            token_usage,
        }
    }
}

/// One recorded call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Unique record id
    pub trace_id: TraceId,
    /// Execution group
    pub execution_id: ExecutionId,
    /// Node id, unique within the execution group
    pub node_id: NodeId,
    /// Parent node, `None` for a root
    #[serde(default)]
    pub parent_node_id: Option<NodeId>,
    /// When the call was recorded
    pub timestamp: Timestamp,
    /// What was asked
    pub request: Request,
    /// What came back
    pub response: Response,
    /// Verdict against the declared expectations, absent if none were declared
    #[serde(default)]
    pub verdict: Option<Verdict>,
    /// Whether this record is the active golden for its key
    #[serde(default)]
    pub is_golden: bool,
}

impl CallRecord {
    /// Create a root record with a fresh trace id, stamped now
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        node_id: NodeId,
        request: Request,
        response: Response,
    ) -> Self {
        Self {
            trace_id: TraceId::generate(),
            execution_id,
            node_id,
            parent_node_id: None,
            timestamp: Timestamp::now(),
            request,
            response,
            verdict: None,
            is_golden: false,
        }
    }

    /// Set the trace id
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Set the parent node
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_node_id = Some(parent.into());
        self
    }

    /// Set the timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a verdict
    #[must_use]
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    /// Whether this is a graph root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_node_id.is_none()
    }

    /// Golden key of the underlying request
    #[must_use]
    pub fn golden_key(&self) -> GoldenKey {
        self.request.golden_key()
    }
}

/// Key under which at most one golden reference is active
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GoldenKey {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
}

impl GoldenKey {
    /// Create a key
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for GoldenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::RuleId;

    fn sample() -> CallRecord {
        CallRecord::new(
            ExecutionId::from("exec-1"),
            NodeId::from("a"),
            Request::new("openai", "gpt-4").with_label("step1"),
            Response::new("hello", 120, TokenUsage::new(5, 3)),
        )
    }

    #[test]
    fn test_new_record_is_root_without_verdict() {
        let record = sample();
        assert!(record.is_root());
        assert!(record.verdict.is_none());
        assert!(!record.is_golden);
    }

    #[test]
    fn test_with_parent() {
        let record = sample().with_parent("root");
        assert!(!record.is_root());
        assert_eq!(record.parent_node_id, Some(NodeId::from("root")));
    }

    #[test]
    fn test_golden_key_display() {
        assert_eq!(sample().golden_key().to_string(), "openai/gpt-4");
    }

    #[test]
    fn test_token_total() {
        assert_eq!(TokenUsage::new(5, 3).total(), 8);
    }

    #[test]
    fn test_token_total_saturates() {
        assert_eq!(TokenUsage::new(u64::MAX, 1).total(), u64::MAX);
    }

    #[test]
    fn test_record_json_round_trip() {
        let record = sample()
            .with_trace_id("t-1")
            .with_verdict(Verdict::from_violations(vec![RuleId::MinTokens]));
        let json = serde_json::to_string(&record).unwrap();
        let back: CallRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
