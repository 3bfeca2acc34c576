//! ConcordKV router/client cache (C5): maintains a local topology replica
//! and routes each request under the configured policy, with retry,
//! failover and a bounded per-node connection pool.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod pool;
pub mod router;
pub mod snapshot;
pub mod subscription;

pub use config::Config;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use policy::ReadPolicy;
pub use pool::{ConnectionFactory, ConnectionPool, PooledConnection};
pub use router::{Operation, Router, RoutingDecision};
pub use snapshot::LocalTopology;
