//! Correlation between monitoring events and tickets.
//!
//! The ticket id is kept as an acknowledgement on the monitoring event
//! itself, so no local state is needed to find the ticket on recovery.

mod detached;
mod marker;
mod store;
mod zabbix;

pub use detached::DetachedEventStore;
pub use marker::{
    decode_marker, encode_marker, CorrelationMarker, CLOSED_TAG, MAX_MESSAGE_CHARS, OPEN_TAG,
};
pub use store::{EventStore, StoreError};
pub use zabbix::ZabbixEventStore;
