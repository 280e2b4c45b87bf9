//! VIGIL Store
//!
//! Persistence for call records and golden references. The engine never
//! writes anything itself; callers load a batch of records from a store,
//! compute, and write back explicit state changes such as bless/unbless.
//!
//! Records are kept in recording order, which is the tie-break the graph
//! builder relies on. Golden insertion is compare-and-set per key.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{bless_trace, unbless, GoldenStore, TraceStore};
