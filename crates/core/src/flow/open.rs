use tracing::{error, info, warn};

use crate::audit::{AuditAction, AuditOutcome, AuditReason, AuditRecord};
use crate::config::TicketingConfig;
use crate::event::MonitoringEvent;
use crate::ticketing::NewTicket;

use super::{FlowContext, FlowError, FlowOutcome};

/// Opens a ticket for a problem event unless one is already open.
pub struct OpenFlow {
    ctx: FlowContext,
    activity_id: String,
    destination_group_id: String,
}

impl OpenFlow {
    pub fn new(ctx: FlowContext, config: &TicketingConfig) -> Self {
        Self {
            ctx,
            activity_id: config.activity_id.clone(),
            destination_group_id: config.destination_group_id.clone(),
        }
    }

    pub async fn handle_problem(&self, event: &MonitoringEvent) -> Result<FlowOutcome, FlowError> {
        if !event.value.is_problem() {
            info!(event_id = %event.id, "Event is not a problem, nothing to open");
            return Ok(FlowOutcome::Skipped);
        }

        let marker = self.ctx.store.read_marker(&event.id).await.map_err(|e| {
            error!(event_id = %event.id, error = %e, "Could not read event annotations");
            self.ctx.fail(
                AuditAction::Open,
                &event.id,
                None,
                FlowError::Transient(e.to_string()),
            )
        })?;

        if let Some(marker) = marker {
            if marker.ticket.is_open() {
                info!(event_id = %event.id, ticket_id = %marker.ticket.id, "Ticket already open");
                self.ctx.audit.record(
                    AuditRecord::new(AuditAction::Open, AuditOutcome::Noop, event.id.clone())
                        .with_ticket(marker.ticket.id.clone())
                        .with_reason(AuditReason::Duplicate),
                );
                return Ok(FlowOutcome::Duplicate(marker.ticket.id));
            }
            info!(
                event_id = %event.id,
                previous_ticket_id = %marker.ticket.id,
                "Previous ticket is closed, opening a new one"
            );
        }

        let new_ticket =
            NewTicket::for_event(event, &self.activity_id, &self.destination_group_id);
        let tickets = &self.ctx.tickets;
        let new_ticket = &new_ticket;
        let reference = self
            .ctx
            .with_session(|session| async move { tickets.create_ticket(&session, new_ticket).await })
            .await
            .map_err(|e| {
                let e = FlowError::from(e);
                error!(event_id = %event.id, error = %e, "Ticket creation failed");
                self.ctx.fail(AuditAction::Open, &event.id, None, e)
            })?;

        info!(event_id = %event.id, ticket_id = %reference.id, "Ticket created");

        if let Err(e) = self
            .ctx
            .store
            .write_marker(&event.id, &reference, &event.name)
            .await
        {
            warn!(
                event_id = %event.id,
                ticket_id = %reference.id,
                "Ticket exists but is not recorded on the event; a retry will open another"
            );
            return Err(self.ctx.fail(
                AuditAction::Open,
                &event.id,
                Some(&reference.id),
                FlowError::Persist {
                    ticket_id: reference.id.clone(),
                    reason: e.to_string(),
                },
            ));
        }

        self.ctx.audit.record(
            AuditRecord::new(AuditAction::Open, AuditOutcome::Success, event.id.clone())
                .with_ticket(reference.id.clone()),
        );
        Ok(FlowOutcome::Opened(reference.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;

    use crate::audit::{AuditFilter, AuditLog, SqliteAuditStore};
    use crate::correlation::{EventStore, StoreError};
    use crate::event::{EventId, EventValue};
    use crate::session::SessionManager;
    use crate::testing::fixtures::problem_event;
    use crate::testing::{MockAuthenticator, MockEventStore, MockTicketClient};
    use crate::ticketing::{TicketError, TicketId, TicketReference};

    struct Harness {
        store: Arc<MockEventStore>,
        tickets: Arc<MockTicketClient>,
        auth: Arc<MockAuthenticator>,
        audit: AuditLog,
        flow: OpenFlow,
    }

    fn harness() -> Harness {
        let store = Arc::new(MockEventStore::new());
        let tickets = Arc::new(MockTicketClient::new());
        let auth = Arc::new(MockAuthenticator::new());
        let audit = AuditLog::new(Arc::new(SqliteAuditStore::in_memory().unwrap()));
        let sessions = Arc::new(SessionManager::new(auth.clone(), Duration::minutes(30)));
        let ctx = FlowContext::new(store.clone(), tickets.clone(), sessions, audit.clone());
        let config: crate::config::Config = toml::from_str(crate::config::SAMPLE_TOML).unwrap();
        let flow = OpenFlow::new(ctx, &config.ticketing);
        Harness {
            store,
            tickets,
            auth,
            audit,
            flow,
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
    async fn test_opens_and_records_marker() {
        let h = harness();
        let event = problem_event("12345", "CPU high", "777");
        h.store.insert_event(event.clone()).await;

        let outcome = h.flow.handle_problem(&event).await.unwrap();
        assert_eq!(outcome, FlowOutcome::Opened(TicketId::parse("T-9001").unwrap()));

        let created = h.tickets.created().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, "[db-01] CPU high");
        assert_eq!(created[0].activity_id, "2001");
        assert_eq!(created[0].destination_group_id, "71");

        assert_eq!(h.store.messages("12345").await, vec!["CITSmartTicketID=T-9001 | CPU high"]);
        assert_eq!(summaries(&h.audit), vec!["OPEN,SUCCESS,12345,T-9001"]);
    }

    #[tokio::test]
    async fn test_ignores_non_problem_event() {
        let h = harness();
        let event = MonitoringEvent::from_notice("12345", EventValue::Ok, "CPU high");

        let outcome = h.flow.handle_problem(&event).await.unwrap();
        assert_eq!(outcome, FlowOutcome::Skipped);
        assert!(h.tickets.calls().await.is_empty());
        assert_eq!(h.auth.login_count(), 0);
        assert!(summaries(&h.audit).is_empty());
    }

    #[tokio::test]
    async fn test_reopens_after_closed_ticket() {
        let h = harness();
        let event = problem_event("12345", "CPU high", "777");
        h.store.insert_event(event.clone()).await;
        let old = TicketReference::open(TicketId::parse("T-1").unwrap()).closed();
        h.store.write_marker(&event.id, &old, "closed").await.unwrap();

        let outcome = h.flow.handle_problem(&event).await.unwrap();
        assert_eq!(outcome, FlowOutcome::Opened(TicketId::parse("T-9001").unwrap()));
        let marker = h.store.read_marker(&event.id).await.unwrap().unwrap();
        assert!(marker.ticket.is_open());
        assert_eq!(marker.ticket.id.as_str(), "T-9001");
    }

    #[tokio::test]
    async fn test_relogin_once_on_unauthorized() {
        let h = harness();
        let event = problem_event("12345", "CPU high", "777");
        h.store.insert_event(event.clone()).await;
        h.tickets
            .fail_next(TicketError::Unauthorized("HTTP 302 to login".into()))
            .await;

        let outcome = h.flow.handle_problem(&event).await.unwrap();
        assert!(matches!(outcome, FlowOutcome::Opened(_)));
        assert_eq!(h.auth.login_count(), 2);
        assert_eq!(h.tickets.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_auth_failure() {
        let h = harness();
        let event = problem_event("12345", "CPU high", "777");
        h.store.insert_event(event.clone()).await;
        h.tickets.fail_next(TicketError::Unauthorized("401".into())).await;
        h.tickets.fail_next(TicketError::Unauthorized("401".into())).await;

        let err = h.flow.handle_problem(&event).await.unwrap_err();
        assert!(matches!(err, FlowError::Auth(_)));
        assert_eq!(h.tickets.calls().await.len(), 2);
        assert_eq!(summaries(&h.audit), vec!["OPEN,FAILURE,12345,,auth"]);
    }

    #[tokio::test]
    async fn test_unreadable_annotations_are_transient() {
        let h = harness();
        let event = problem_event("12345", "CPU high", "777");
        h.store
            .fail_next_read(StoreError::Unavailable("connection refused".into()))
            .await;

        let err = h.flow.handle_problem(&event).await.unwrap_err();
        assert!(matches!(err, FlowError::Transient(_)));
        assert!(h.tickets.calls().await.is_empty());
        assert_eq!(summaries(&h.audit), vec!["OPEN,FAILURE,12345,,transient"]);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_ticket_id() {
        let h = harness();
        let event = problem_event("12345", "CPU high", "777");
        h.store.insert_event(event.clone()).await;
        h.store
            .fail_next_write(StoreError::Api("No permissions".into()))
            .await;

        let err = h.flow.handle_problem(&event).await.unwrap_err();
        match &err {
            FlowError::Persist { ticket_id, .. } => assert_eq!(ticket_id.as_str(), "T-9001"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.exit_code(), 1);
        assert!(h.store.read_marker(&EventId::new("12345")).await.unwrap().is_none());
        assert_eq!(summaries(&h.audit), vec!["OPEN,FAILURE,12345,T-9001,persist"]);
    }
}
