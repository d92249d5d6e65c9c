//! Types for ticket lifecycle operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::event::MonitoringEvent;

/// Errors returned by a ticketing platform.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Session missing, expired or refused. Retriable after a new login.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// The ticket does not exist on the platform. Never retriable.
    #[error("Ticket not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or 5xx.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The platform answered but refused or garbled the operation.
    #[error("Rejected by platform: {0}")]
    Rejected(String),
}

/// Ticket identifier assigned by the ticketing platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketId(String);

impl TicketId {
    /// Accepts ASCII letters, digits, `-` and `_` only, so the id survives the
    /// textual marker and audit formats unchanged.
    pub fn parse(id: &str) -> Option<Self> {
        let id = id.trim();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TicketId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid ticket id: {:?}", value))
    }
}

impl From<TicketId> for String {
    fn from(id: TicketId) -> Self {
        id.0
    }
}

/// Lifecycle state of a ticket as seen by this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    Open,
    Closed,
}

/// A ticket and its lifecycle state.
///
/// References only move OPEN → CLOSED; there is no way to reopen one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReference {
    pub id: TicketId,
    pub state: TicketState,
}

impl TicketReference {
    pub fn open(id: TicketId) -> Self {
        Self {
            id,
            state: TicketState::Open,
        }
    }

    pub fn closed(self) -> Self {
        Self {
            state: TicketState::Closed,
            ..self
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == TicketState::Open
    }
}

/// Fields of a ticket to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    /// Catalog activity, fixed per deployment
    pub activity_id: String,
    /// Support group the ticket is delegated to, fixed per deployment
    pub destination_group_id: String,
    pub title: String,
    pub description: String,
}

/// Maximum title length sent to the platform.
const MAX_TITLE_CHARS: usize = 200;

impl NewTicket {
    /// Map a monitoring event into ticket fields.
    pub fn for_event(
        event: &MonitoringEvent,
        activity_id: impl Into<String>,
        destination_group_id: impl Into<String>,
    ) -> Self {
        let name = if event.name.is_empty() {
            "Monitoring alert"
        } else {
            event.name.as_str()
        };

        let title: String = match &event.host {
            Some(host) => format!("[{}] {}", host, name),
            None => name.to_string(),
        }
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();

        let mut description = name.to_string();
        if let Some(host) = &event.host {
            description.push_str(&format!("\nHost: {}", host));
        }
        if !event.opdata.is_empty() {
            description.push_str(&format!("\nOperational data: {}", event.opdata));
        }
        description.push_str(&format!("\nEvent ID: {}", event.id));

        Self {
            activity_id: activity_id.into(),
            destination_group_id: destination_group_id.into(),
            title,
            description,
        }
    }
}

/// Resolution text recorded on the ticket when it is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseNote {
    pub solution_html: String,
    pub cause_html: String,
}

impl CloseNote {
    pub fn new(solution_html: impl Into<String>, cause_html: impl Into<String>) -> Self {
        Self {
            solution_html: solution_html.into(),
            cause_html: cause_html.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventValue;

    #[test]
    fn test_ticket_id_parse() {
        assert_eq!(TicketId::parse(" 52606 ").unwrap().as_str(), "52606");
        assert_eq!(TicketId::parse("T-9001").unwrap().as_str(), "T-9001");
        assert!(TicketId::parse("").is_none());
        assert!(TicketId::parse("12 34").is_none());
        assert!(TicketId::parse("12|34").is_none());
    }

    #[test]
    fn test_reference_only_closes() {
        let reference = TicketReference::open(TicketId::parse("T-1").unwrap());
        assert!(reference.is_open());
        let closed = reference.closed();
        assert_eq!(closed.state, TicketState::Closed);
        assert_eq!(closed.clone().closed(), closed);
    }

    #[test]
    fn test_new_ticket_for_event() {
        let mut event = MonitoringEvent::from_notice("12345", EventValue::Problem, "CPU high");
        event.host = Some("db-01".to_string());
        event.opdata = "load 9.1".to_string();

        let ticket = NewTicket::for_event(&event, "2001", "71");
        assert_eq!(ticket.title, "[db-01] CPU high");
        assert_eq!(
            ticket.description,
            "CPU high\nHost: db-01\nOperational data: load 9.1\nEvent ID: 12345"
        );
        assert_eq!(ticket.activity_id, "2001");
        assert_eq!(ticket.destination_group_id, "71");
    }

    #[test]
    fn test_new_ticket_title_is_truncated() {
        let event = MonitoringEvent::from_notice("1", EventValue::Problem, &"x".repeat(500));
        let ticket = NewTicket::for_event(&event, "a", "g");
        assert_eq!(ticket.title.chars().count(), 200);
    }

    #[test]
    fn test_ticket_id_serde() {
        let id: TicketId = serde_json::from_str("\"T-9001\"").unwrap();
        assert_eq!(id.as_str(), "T-9001");
        assert!(serde_json::from_str::<TicketId>("\"bad id\"").is_err());
    }
}
