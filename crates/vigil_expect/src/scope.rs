//! Structural targeting for expectations.
//!
//! A scope names where an expectation applies: a node, a provider, an
//! execution stage or a tool. Every field that is set must match (AND).
//! A scope with no field set is global. Matching is exact; there are no
//! patterns.

use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::{CallRecord, NodeId};

/// Request metadata key carrying the execution stage
pub const STAGE_KEY: &str = "stage";

/// Request metadata key carrying the tool name
pub const TOOL_KEY: &str = "tool";

/// Execution stage of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Input handling
    Input,
    /// Intermediate processing
    Processing,
    /// Output generation
    Output,
    /// Final answer
    Final,
}

impl Stage {
    /// Wire form, as found in request metadata
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Processing => "processing",
            Self::Output => "output",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an expectation applies
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationScope {
    /// Exact node id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Provider name, compared case-insensitively
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Stage from the `stage` request metadata entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Tool from the `tool` request metadata entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl ExpectationScope {
    /// The global scope
    #[must_use]
    pub fn global() -> Self {
        Self::default()
    }

    /// Restrict to one node
    #[must_use]
    pub fn node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Restrict to one provider
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Restrict to one stage
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Restrict to one tool
    #[must_use]
    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Whether no restriction is set
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.node_id.is_none() && self.provider.is_none() && self.stage.is_none() && self.tool.is_none()
    }

    /// Whether every restriction holds for the record
    #[must_use]
    pub fn matches(&self, record: &CallRecord) -> bool {
        let metadata = &record.request.metadata;
        if let Some(node_id) = &self.node_id {
            if record.node_id != *node_id {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            if provider.to_lowercase() != record.request.provider.to_lowercase() {
                return false;
            }
        }
        if let Some(stage) = self.stage {
            if metadata.get(STAGE_KEY).map(String::as_str) != Some(stage.as_str()) {
                return false;
            }
        }
        if let Some(tool) = &self.tool {
            if metadata.get(TOOL_KEY) != Some(tool) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for ExpectationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(node_id) = &self.node_id {
            parts.push(format!("node={node_id}"));
        }
        if let Some(provider) = &self.provider {
            parts.push(format!("provider={provider}"));
        }
        if let Some(stage) = self.stage {
            parts.push(format!("stage={stage}"));
        }
        if let Some(tool) = &self.tool {
            parts.push(format!("tool={tool}"));
        }
        if parts.is_empty() {
            f.write_str("global")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}
