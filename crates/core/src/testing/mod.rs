//! Testing utilities and mock implementations.
//!
//! This module provides in-memory implementations of the platform traits,
//! so the open and close flows can be exercised without a monitoring or
//! ticketing platform.
//!
//! # Example
//!
//! ```rust,ignore
//! use alertbridge_core::testing::{MockAuthenticator, MockEventStore, MockTicketClient};
//!
//! let store = MockEventStore::new();
//! let tickets = MockTicketClient::new();
//! tickets.set_next_ids(["T-9001"]).await;
//!
//! // Build a FlowContext around them...
//! ```

mod mock_authenticator;
mod mock_event_store;
mod mock_ticket_client;

pub use mock_authenticator::MockAuthenticator;
pub use mock_event_store::MockEventStore;
pub use mock_ticket_client::{MockTicketClient, RecordedTicketCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::event::{EventValue, MonitoringEvent};
    use crate::ticketing::CloseNote;

    /// A problem event on host `db-01`, raised by trigger `object_id`.
    pub fn problem_event(id: &str, name: &str, object_id: &str) -> MonitoringEvent {
        let mut event = MonitoringEvent::from_notice(id, EventValue::Problem, name);
        event.host = Some("db-01".to_string());
        event.object_id = Some(object_id.to_string());
        event
    }

    /// The recovery event of trigger `object_id`.
    pub fn recovery_event(id: &str, name: &str, object_id: &str) -> MonitoringEvent {
        let mut event = problem_event(id, name, object_id);
        event.value = EventValue::Ok;
        event
    }

    pub fn close_note() -> CloseNote {
        CloseNote::new(
            "<div>Problema resolvido automaticamente pelo Zabbix</div>",
            "<div>Trigger voltou ao estado OK</div>",
        )
    }
}
