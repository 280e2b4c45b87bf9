//! VIGIL Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Every type that participates in a digest serializes with a stable field
//! and key order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod evidence;
pub mod hash;
pub mod id;
pub mod record;
pub mod time;
pub mod verdict;

// Re-exports
pub use error::{ErrorCode, VigilError, VigilResult};
pub use evidence::{HashEvidence, LatencyEvidence, PathDivergence, PathEvidence};
pub use hash::{Digest, DigestError};
pub use id::{ExecutionId, NodeId, TraceId};
pub use record::{CallRecord, GoldenKey, Message, Request, Response, TokenUsage};
pub use time::Timestamp;
pub use verdict::{RuleId, Severity, Status, Verdict};
