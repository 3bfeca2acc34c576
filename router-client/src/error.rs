//! Error type for the router/client-cache component. Reuses the shared §7
//! taxonomy so a `StaleTopology` raised in C2's mutation path and one
//! raised here, in the retry loop, are the same error rather than
//! similarly-named ones.

pub use topology_types::CoreError as Error;
pub use topology_types::Result;
