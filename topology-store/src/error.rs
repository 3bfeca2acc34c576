//! Error type for the topology store.
//!
//! Reuses the shared §7 taxonomy from `topology-types` rather than defining
//! a parallel enum: a `NotLeader` raised here and one raised by
//! `router-client`'s retry loop must compare equal and match the same `match`
//! arms in callers that span both crates.

pub use topology_types::CoreError as Error;
pub use topology_types::Result;
