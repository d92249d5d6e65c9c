use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::audit::{AuditAction, AuditLog, AuditOutcome, AuditRecord};
use crate::correlation::EventStore;
use crate::event::EventId;
use crate::session::{Session, SessionManager};
use crate::ticketing::{TicketClient, TicketError, TicketId};

use super::FlowError;

/// Collaborators shared by the open and close flows.
#[derive(Clone)]
pub struct FlowContext {
    pub store: Arc<dyn EventStore>,
    pub tickets: Arc<dyn TicketClient>,
    pub sessions: Arc<SessionManager>,
    pub audit: AuditLog,
}

/// Failure of a ticketing call made through [`FlowContext::with_session`].
#[derive(Debug)]
pub(crate) enum CallError {
    Login(FlowError),
    Ticket(TicketError),
}

impl From<CallError> for FlowError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Login(e) => e,
            CallError::Ticket(e) => e.into(),
        }
    }
}

impl FlowContext {
    pub fn new(
        store: Arc<dyn EventStore>,
        tickets: Arc<dyn TicketClient>,
        sessions: Arc<SessionManager>,
        audit: AuditLog,
    ) -> Self {
        Self {
            store,
            tickets,
            sessions,
            audit,
        }
    }

    /// Run a ticketing call with the current session. When the platform
    /// refuses the session, log in again and retry exactly once.
    pub(crate) async fn with_session<T, F, Fut>(&self, op: F) -> Result<T, CallError>
    where
        F: Fn(Session) -> Fut,
        Fut: Future<Output = Result<T, TicketError>>,
    {
        let session = self
            .sessions
            .session()
            .await
            .map_err(|e| CallError::Login(e.into()))?;

        match op(session).await {
            Err(TicketError::Unauthorized(reason)) => {
                warn!(%reason, platform = self.tickets.name(), "Session refused, logging in again");
                self.sessions.invalidate().await;
                let session = self
                    .sessions
                    .session()
                    .await
                    .map_err(|e| CallError::Login(e.into()))?;
                op(session).await.map_err(CallError::Ticket)
            }
            other => other.map_err(CallError::Ticket),
        }
    }

    /// Audit a failed transition and hand the error back.
    pub(crate) fn fail(
        &self,
        action: AuditAction,
        event_id: &EventId,
        ticket_id: Option<&TicketId>,
        error: FlowError,
    ) -> FlowError {
        let mut record = AuditRecord::new(action, AuditOutcome::Failure, event_id.clone())
            .with_reason(error.reason());
        record.ticket_id = ticket_id.cloned();
        self.audit.record(record);
        error
    }
}
