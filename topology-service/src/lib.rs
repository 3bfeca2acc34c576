//! ConcordKV topology service (C3): the orchestration layer.
//!
//! Combines the consistent-hash ring (`hash-ring`) with a handle onto the
//! replicated topology store (`topology-store`): serves read operations
//! from a locally rebuilt ring, drives health probing and failover,
//! evaluates load-based rebalancing, and tracks hot keys.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod health;
pub mod hotkeys;
pub mod metrics;
pub mod migration;
pub mod rebalance;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
pub use health::{HealthMonitor, ProbeTransport};
pub use hotkeys::HotKeyTracker;
pub use metrics::Metrics;
pub use service::TopologyService;
