//! The §7 error taxonomy, shared across every crate in the workspace.
//!
//! Grounded on the teacher's one-`Error`-enum-per-crate convention
//! (`ledger_core::Error`, `consensus::Error`, `message_bus::Error`),
//! generalized to a single shared enum because the spec defines this
//! taxonomy once for the whole system rather than per-component: a
//! `StaleTopology` raised inside C2's mutation path and one raised inside
//! C5's retry loop are the same error, not merely similarly-named ones.

use thiserror::Error;

/// Result type used throughout the core crates.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The error taxonomy from §7.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Retryable: this replica is not the Raft leader. Carries a hint at the
    /// current leader, if known.
    #[error("not leader (leader hint: {leader_hint:?})")]
    NotLeader {
        /// Best-known current leader, if any.
        leader_hint: Option<String>,
    },

    /// Non-retryable: the proposed mutation would break a §3 invariant.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Retryable after a snapshot refresh: the caller's topology version is
    /// older than the server requires.
    #[error("stale topology: client version {client_version}, server requires >= {required_version}")]
    StaleTopology {
        /// Version the caller presented.
        client_version: u64,
        /// Minimum version the server will accept.
        required_version: u64,
    },

    /// The targeted shard is mid-migration; writes may be retried after
    /// completion.
    #[error("shard {0} is migrating")]
    ShardMigrating(u16),

    /// The targeted shard is fenced for writes during cut-over.
    #[error("shard {0} is read-only")]
    ShardReadOnly(u16),

    /// Retryable: the router should try the next replica candidate.
    #[error("node {0} unreachable")]
    NodeUnreachable(String),

    /// Retryable with backoff: a deadline was exceeded.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Transient infrastructure failure: lost Raft quorum, or every replica
    /// for a shard is down.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Terminal: the requested key/shard/node does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Terminal: caller error (malformed argument).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CoreError {
    /// Whether a caller may retry this error as-is (possibly after backoff
    /// or a topology refresh). Mirrors §7's propagation rules: `NotFound`
    /// and `InvalidArgument` are terminal, everything else admits some form
    /// of retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CoreError::NotFound(_) | CoreError::InvalidArgument(_) | CoreError::InvariantViolation(_)
        )
    }
}
