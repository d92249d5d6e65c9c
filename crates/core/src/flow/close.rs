use tracing::{error, info, warn};

use crate::audit::{AuditAction, AuditOutcome, AuditReason, AuditRecord};
use crate::correlation::CorrelationMarker;
use crate::event::EventId;
use crate::ticketing::{CloseNote, TicketError};

use super::context::CallError;
use super::{FlowContext, FlowError, FlowOutcome};

/// Closes the ticket recorded for a recovered event.
pub struct CloseFlow {
    ctx: FlowContext,
    note: CloseNote,
}

impl CloseFlow {
    pub fn new(ctx: FlowContext, note: CloseNote) -> Self {
        Self { ctx, note }
    }

    pub async fn handle_recovery(&self, event_id: &EventId) -> Result<FlowOutcome, FlowError> {
        let marker = self.ctx.store.read_marker(event_id).await.map_err(|e| {
            error!(event_id = %event_id, error = %e, "Could not read event annotations");
            self.ctx.fail(
                AuditAction::Close,
                event_id,
                None,
                FlowError::Transient(e.to_string()),
            )
        })?;

        let Some(marker) = marker else {
            warn!(event_id = %event_id, "No ticket recorded for event, nothing to close");
            self.ctx.audit.record(
                AuditRecord::new(AuditAction::Close, AuditOutcome::Failure, event_id.clone())
                    .with_reason(AuditReason::NoMarker),
            );
            return Ok(FlowOutcome::NoMarker);
        };

        let ticket_id = marker.ticket.id.clone();
        if !marker.ticket.is_open() {
            info!(event_id = %event_id, ticket_id = %ticket_id, "Ticket already closed");
            self.ctx.audit.record(
                AuditRecord::new(AuditAction::Close, AuditOutcome::Noop, event_id.clone())
                    .with_ticket(ticket_id.clone())
                    .with_reason(AuditReason::AlreadyClosed),
            );
            return Ok(FlowOutcome::AlreadyClosed(ticket_id));
        }

        let tickets = &self.ctx.tickets;
        let note = &self.note;
        let target = &ticket_id;
        let closed = self
            .ctx
            .with_session(|session| async move { tickets.close_ticket(&session, target, note).await })
            .await;

        match closed {
            Ok(()) => {
                info!(event_id = %event_id, ticket_id = %ticket_id, "Ticket closed");
                self.mark_closed(event_id, &marker, "closed").await?;
                self.ctx.audit.record(
                    AuditRecord::new(AuditAction::Close, AuditOutcome::Success, event_id.clone())
                        .with_ticket(ticket_id.clone()),
                );
                Ok(FlowOutcome::Closed(ticket_id))
            }
            Err(CallError::Ticket(TicketError::NotFound(reason))) => {
                warn!(
                    event_id = %event_id,
                    ticket_id = %ticket_id,
                    %reason,
                    "Ticket not found on platform, marking closed"
                );
                self.mark_closed(event_id, &marker, "ticket not found").await?;
                self.ctx.audit.record(
                    AuditRecord::new(AuditAction::Close, AuditOutcome::Failure, event_id.clone())
                        .with_ticket(ticket_id.clone())
                        .with_reason(AuditReason::NotFound),
                );
                Ok(FlowOutcome::ForcedClosed(ticket_id))
            }
            Err(e) => {
                let e = FlowError::from(e);
                error!(event_id = %event_id, ticket_id = %ticket_id, error = %e, "Ticket close failed");
                Err(self.ctx.fail(AuditAction::Close, event_id, Some(&ticket_id), e))
            }
        }
    }

    /// Record the closure on the event that carries the marker.
    async fn mark_closed(
        &self,
        event_id: &EventId,
        marker: &CorrelationMarker,
        note: &str,
    ) -> Result<(), FlowError> {
        let closed = marker.ticket.clone().closed();
        self.ctx
            .store
            .write_marker(&marker.event_id, &closed, note)
            .await
            .map_err(|e| {
                error!(
                    event_id = %event_id,
                    anchor_event_id = %marker.event_id,
                    ticket_id = %closed.id,
                    error = %e,
                    "Could not record ticket closure on the event"
                );
                self.ctx.fail(
                    AuditAction::Close,
                    event_id,
                    Some(&closed.id),
                    FlowError::Persist {
                        ticket_id: closed.id.clone(),
                        reason: e.to_string(),
                    },
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;

    use crate::audit::{AuditFilter, AuditLog, SqliteAuditStore};
    use crate::correlation::{EventStore, StoreError};
    use crate::session::SessionManager;
    use crate::testing::fixtures::{close_note, problem_event, recovery_event};
    use crate::testing::{MockAuthenticator, MockEventStore, MockTicketClient};
    use crate::ticketing::{TicketId, TicketReference};

    struct Harness {
        store: Arc<MockEventStore>,
        tickets: Arc<MockTicketClient>,
        audit: AuditLog,
        flow: CloseFlow,
    }

    async fn harness_with_open_ticket(ticket: &str) -> Harness {
        let store = Arc::new(MockEventStore::new());
        let tickets = Arc::new(MockTicketClient::new());
        let auth = Arc::new(MockAuthenticator::new());
        let audit = AuditLog::new(Arc::new(SqliteAuditStore::in_memory().unwrap()));
        let sessions = Arc::new(SessionManager::new(auth, Duration::minutes(30)));
        let ctx = FlowContext::new(store.clone(), tickets.clone(), sessions, audit.clone());

        let problem = problem_event("12345", "CPU high", "777");
        store.insert_event(problem.clone()).await;
        store
            .write_marker(
                &problem.id,
                &TicketReference::open(TicketId::parse(ticket).unwrap()),
                "CPU high",
            )
            .await
            .unwrap();

        Harness {
            store,
            tickets,
            audit,
            flow: CloseFlow::new(ctx, close_note()),
        }
    }

    fn summaries(audit: &AuditLog) -> Vec<String> {
        audit
            .query(&AuditFilter::new())
            .unwrap()
            .iter()
            .map(|r| r.summary())
            .collect()
    }

    #[tokio::test]
    async fn test_closes_and_marks_closed() {
        let h = harness_with_open_ticket("T-9001").await;

        let outcome = h.flow.handle_recovery(&EventId::new("12345")).await.unwrap();
        assert_eq!(outcome, FlowOutcome::Closed(TicketId::parse("T-9001").unwrap()));
        assert_eq!(h.tickets.closed().await, vec![TicketId::parse("T-9001").unwrap()]);

        let marker = h.store.read_marker(&EventId::new("12345")).await.unwrap().unwrap();
        assert!(!marker.ticket.is_open());
        assert_eq!(summaries(&h.audit), vec!["CLOSE,SUCCESS,12345,T-9001"]);
    }

    #[tokio::test]
    async fn test_recovery_event_closes_problem_ticket() {
        let h = harness_with_open_ticket("52606").await;
        h.store
            .insert_event(recovery_event("12400", "CPU high", "777"))
            .await;

        let outcome = h.flow.handle_recovery(&EventId::new("12400")).await.unwrap();
        assert_eq!(outcome, FlowOutcome::Closed(TicketId::parse("52606").unwrap()));

        // The closure is written on the problem event that holds the marker.
        assert_eq!(
            h.store.messages("12345").await.last().map(String::as_str),
            Some("CITSmartTicketClosed=52606 | closed")
        );
        assert!(h.store.messages("12400").await.is_empty());
        assert_eq!(summaries(&h.audit), vec!["CLOSE,SUCCESS,12400,52606"]);
    }

    #[tokio::test]
    async fn test_not_found_forces_closed_marker() {
        let h = harness_with_open_ticket("T-9001").await;
        h.tickets
            .fail_next(TicketError::NotFound("T-9001".into()))
            .await;

        let outcome = h.flow.handle_recovery(&EventId::new("12345")).await.unwrap();
        assert_eq!(outcome, FlowOutcome::ForcedClosed(TicketId::parse("T-9001").unwrap()));
        assert_eq!(outcome.exit_code(), 0);

        let marker = h.store.read_marker(&EventId::new("12345")).await.unwrap().unwrap();
        assert!(!marker.ticket.is_open());
        assert_eq!(
            summaries(&h.audit),
            vec!["CLOSE,FAILURE,12345,T-9001,not_found"]
        );
    }

    #[tokio::test]
    async fn test_transient_failure_leaves_ticket_open() {
        let h = harness_with_open_ticket("T-9001").await;
        h.tickets
            .fail_next(TicketError::Transient("HTTP 503".into()))
            .await;

        let err = h.flow.handle_recovery(&EventId::new("12345")).await.unwrap_err();
        assert!(matches!(err, FlowError::Transient(_)));

        let marker = h.store.read_marker(&EventId::new("12345")).await.unwrap().unwrap();
        assert!(marker.ticket.is_open());
        assert_eq!(
            summaries(&h.audit),
            vec!["CLOSE,FAILURE,12345,T-9001,transient"]
        );
    }

    #[tokio::test]
    async fn test_no_marker_is_handled() {
        let h = harness_with_open_ticket("T-9001").await;
        h.store
            .insert_event(recovery_event("555", "Disk full", "888"))
            .await;

        let outcome = h.flow.handle_recovery(&EventId::new("555")).await.unwrap();
        assert_eq!(outcome, FlowOutcome::NoMarker);
        assert!(h.tickets.calls().await.is_empty());
        assert_eq!(summaries(&h.audit), vec!["CLOSE,FAILURE,555,,no_marker"]);
    }

    #[tokio::test]
    async fn test_closure_not_recorded_is_persist_failure() {
        let h = harness_with_open_ticket("T-9001").await;
        h.store
            .fail_next_write(StoreError::Unavailable("timeout".into()))
            .await;

        let err = h.flow.handle_recovery(&EventId::new("12345")).await.unwrap_err();
        assert!(matches!(err, FlowError::Persist { .. }));
        assert_eq!(
            summaries(&h.audit),
            vec!["CLOSE,FAILURE,12345,T-9001,persist"]
        );
    }
}
