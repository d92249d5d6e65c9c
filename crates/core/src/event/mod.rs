//! Monitoring events as read from the monitoring platform.
//!
//! Events are never created by this crate; they are parsed from invocation
//! arguments or fetched from the platform and treated as immutable.

mod types;

pub use types::*;
