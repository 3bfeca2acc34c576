//! ConcordKV change notifier (C4): fans out C2's ordered, versioned
//! topology events to subscribed clients over a long-lived stream, with
//! bounded per-subscriber memory and overflow handling via snapshot resync.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod framing;
pub mod metrics;
pub mod notifier;
pub mod subscription;

pub use config::Config;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use notifier::ChangeNotifier;
pub use subscription::Subscription;
