//! Error type for the change notifier. Reuses the shared §7 taxonomy.

pub use topology_types::CoreError as Error;
pub use topology_types::Result;
