//! Shared data model for the ConcordKV topology service.
//!
//! This crate holds the types every other crate in the workspace agrees on:
//! node and shard identifiers, the authoritative `Topology` record, the
//! versioned event stream that flows out of it, and the error taxonomy
//! every fallible operation in the system returns.
//!
//! Nothing here does I/O or holds a lock. It is pure data plus the few pure
//! functions (`Topology::config_hash`, invariant checks elsewhere) that need
//! to agree byte-for-byte across every replica.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod error;
pub mod event;
pub mod hash;
pub mod node;
pub mod shard;
pub mod topology;

pub use error::{CoreError, Result};
pub use event::{EventKind, EventPayload, TopologyEvent};
pub use hash::hash64;
pub use node::{CapacityHints, HealthStatus, NodeDescriptor, NodeHealth, NodeId, NodeRecord};
pub use shard::{HotKey, KeyRange, Shard, ShardId, ShardState};
pub use topology::Topology;
