//! Error type for the topology service. Reuses the shared §7 taxonomy.

pub use topology_types::CoreError as Error;
pub use topology_types::Result;
