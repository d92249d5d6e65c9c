use async_trait::async_trait;
use tracing::debug;

use crate::event::{Acknowledgement, EventId, EventValue, MonitoringEvent};
use crate::ticketing::{TicketId, TicketReference};

use super::marker::encode_marker;
use super::store::{EventStore, StoreError};

/// Event store used when no monitoring platform is involved.
///
/// Reads find nothing and writes are discarded, unless the store was seeded
/// with an operator-supplied ticket, in which case every event reads as
/// correlated with that open ticket.
#[derive(Debug, Default)]
pub struct DetachedEventStore {
    open_ticket: Option<TicketId>,
}

impl DetachedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_ticket(ticket_id: TicketId) -> Self {
        Self {
            open_ticket: Some(ticket_id),
        }
    }
}

#[async_trait]
impl EventStore for DetachedEventStore {
    fn name(&self) -> &str {
        "detached"
    }

    async fn fetch_event(&self, event_id: &EventId) -> Result<MonitoringEvent, StoreError> {
        let ticket_id = self
            .open_ticket
            .clone()
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))?;

        let mut event = MonitoringEvent::from_notice(event_id.clone(), EventValue::Ok, "");
        event.acknowledges.push(Acknowledgement::new(
            encode_marker(&TicketReference::open(ticket_id), ""),
            0,
        ));
        Ok(event)
    }

    async fn recent_problem_events(
        &self,
        _object_id: &str,
    ) -> Result<Vec<MonitoringEvent>, StoreError> {
        Ok(Vec::new())
    }

    async fn acknowledge(&self, event_id: &EventId, message: &str) -> Result<(), StoreError> {
        debug!(event_id = %event_id, message, "Detached store, annotation discarded");
        Ok(())
    }
}
