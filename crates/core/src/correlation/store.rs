use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::{EventId, MonitoringEvent};
use crate::ticketing::TicketReference;

use super::marker::{decode_marker, encode_marker, CorrelationMarker};

/// Errors returned by a monitoring event store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The platform could not be reached or answered with a server error.
    #[error("Monitoring platform unavailable: {0}")]
    Unavailable(String),

    /// The platform refused the request.
    #[error("Monitoring API error: {0}")]
    Api(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),
}

/// Access to monitoring events and their annotations.
///
/// Implementors provide the three platform primitives; marker reading and
/// writing are built on top of them.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Name of the monitoring backend.
    fn name(&self) -> &str;

    /// Load an event with its acknowledgements.
    async fn fetch_event(&self, event_id: &EventId) -> Result<MonitoringEvent, StoreError>;

    /// Recent problem events of a trigger, newest first.
    async fn recent_problem_events(
        &self,
        object_id: &str,
    ) -> Result<Vec<MonitoringEvent>, StoreError>;

    /// Append an acknowledgement message to an event.
    async fn acknowledge(&self, event_id: &EventId, message: &str) -> Result<(), StoreError>;

    /// Find the ticket correlated with an event.
    ///
    /// For a recovery event without its own marker, the trigger's recent
    /// problem events are searched and the marker is anchored on the problem
    /// event carrying it. A missing event reads as no marker.
    async fn read_marker(
        &self,
        event_id: &EventId,
    ) -> Result<Option<CorrelationMarker>, StoreError> {
        let event = match self.fetch_event(event_id).await {
            Ok(event) => event,
            Err(StoreError::EventNotFound(id)) => {
                warn!(event_id = %id, store = self.name(), "Event not found, treating as unmarked");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if let Some(ticket) = decode_marker(&event.acknowledges) {
            return Ok(Some(CorrelationMarker {
                event_id: event.id,
                ticket,
            }));
        }

        if event.value.is_problem() {
            return Ok(None);
        }
        let Some(object_id) = event.object_id.as_deref() else {
            return Ok(None);
        };

        for problem in self.recent_problem_events(object_id).await? {
            if problem.id == event.id {
                continue;
            }
            if let Some(ticket) = decode_marker(&problem.acknowledges) {
                debug!(
                    event_id = %event.id,
                    problem_event_id = %problem.id,
                    ticket_id = %ticket.id,
                    "Marker found on originating problem event"
                );
                return Ok(Some(CorrelationMarker {
                    event_id: problem.id,
                    ticket,
                }));
            }
        }
        Ok(None)
    }

    /// Record `ticket` on the event `anchor`.
    async fn write_marker(
        &self,
        anchor: &EventId,
        ticket: &TicketReference,
        note: &str,
    ) -> Result<(), StoreError> {
        self.acknowledge(anchor, &encode_marker(ticket, note)).await
    }
}
