//! VIGIL Integrity
//!
//! Content-hashed golden references and tamper-evident snapshots.
//!
//! - `golden`: bless PASS traces, compare new responses by exact digest,
//!   check a candidate set against every golden
//! - `snapshot`: seal a graph and its verdict, verify the seal later

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod golden;
pub mod snapshot;

pub use golden::{
    bless, check, compare, response_digest, CheckEntry, CheckOutcome, CheckReport,
    GoldenComparison, GoldenReference,
};
pub use snapshot::{snapshot, verify_bytes, Integrity, Snapshot, SnapshotContent, FORMAT_VERSION};
