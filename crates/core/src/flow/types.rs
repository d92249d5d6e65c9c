use std::fmt;

use thiserror::Error;

use crate::audit::AuditReason;
use crate::session::AuthError;
use crate::ticketing::{TicketError, TicketId};

/// Process exit code for a handled event, including benign no-ops.
pub const EXIT_HANDLED: u8 = 0;
/// Process exit code for a failure the caller may retry.
pub const EXIT_RETRY: u8 = 1;
/// Process exit code for bad arguments or configuration.
pub const EXIT_USAGE: u8 = 2;

/// How an event was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// A ticket was created and recorded on the event.
    Opened(TicketId),
    /// The event already has an open ticket.
    Duplicate(TicketId),
    /// The event is not a problem; nothing was attempted.
    Skipped,
    Closed(TicketId),
    /// The ticket was closed by an earlier invocation.
    AlreadyClosed(TicketId),
    /// No ticket is known for the event.
    NoMarker,
    /// The ticket no longer exists on the platform; the event was marked
    /// closed anyway.
    ForcedClosed(TicketId),
}

impl FlowOutcome {
    pub fn exit_code(&self) -> u8 {
        EXIT_HANDLED
    }
}

impl fmt::Display for FlowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowOutcome::Opened(id) => write!(f, "opened ticket {}", id),
            FlowOutcome::Duplicate(id) => write!(f, "ticket {} already open", id),
            FlowOutcome::Skipped => f.write_str("not a problem event, skipped"),
            FlowOutcome::Closed(id) => write!(f, "closed ticket {}", id),
            FlowOutcome::AlreadyClosed(id) => write!(f, "ticket {} already closed", id),
            FlowOutcome::NoMarker => f.write_str("no ticket recorded for event"),
            FlowOutcome::ForcedClosed(id) => {
                write!(f, "ticket {} not found on platform, marked closed", id)
            }
        }
    }
}

/// A transition that did not complete. Every variant has been written to the
/// audit log by the time the caller sees it.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network failure, timeout or server error on either platform.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The ticket exists but could not be recorded on the event.
    #[error("Ticket {ticket_id} could not be recorded on the event: {reason}")]
    Persist { ticket_id: TicketId, reason: String },

    #[error("Rejected by ticketing platform: {0}")]
    Rejected(String),
}

impl FlowError {
    pub fn reason(&self) -> AuditReason {
        match self {
            FlowError::Auth(_) => AuditReason::Auth,
            FlowError::Transient(_) => AuditReason::Transient,
            FlowError::Persist { .. } => AuditReason::Persist,
            FlowError::Rejected(_) => AuditReason::Rejected,
        }
    }

    pub fn exit_code(&self) -> u8 {
        EXIT_RETRY
    }
}

impl From<AuthError> for FlowError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ServiceUnavailable(msg) => FlowError::Transient(msg),
            other => FlowError::Auth(other.to_string()),
        }
    }
}

impl From<TicketError> for FlowError {
    fn from(e: TicketError) -> Self {
        match e {
            TicketError::Unauthorized(msg) => FlowError::Auth(msg),
            TicketError::Transient(msg) => FlowError::Transient(msg),
            TicketError::NotFound(msg) | TicketError::Rejected(msg) => FlowError::Rejected(msg),
        }
    }
}
