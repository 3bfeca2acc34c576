//! ConcordKV topology store (C2).
//!
//! Owns the authoritative, Raft-replicated `Topology` state machine:
//! validated mutations (`mutations`), invariant enforcement
//! (`invariants`), a single-writer actor serializing proposals onto the
//! replicated log (`actor`), and the `ConsensusLog` abstraction over the
//! underlying Raft group (`consensus`).
//!
//! # Invariants
//!
//! - Every committed `Topology` version satisfies §3's structural
//!   invariants (`invariants::check`).
//! - `Topology.version` increases by exactly 1 per committed mutation.
//! - Mutations are applied in the same order on every replica, since they
//!   are only ever applied after the `ConsensusLog` reports them committed.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod actor;
pub mod config;
pub mod consensus;
pub mod error;
pub mod invariants;
pub mod metrics;
pub mod mutations;

pub use actor::{spawn, TopologyHandle};
pub use config::Config;
pub use consensus::{ConsensusLog, OpenRaftConsensus, StandaloneConsensus};
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use mutations::{apply, MutationOp};
