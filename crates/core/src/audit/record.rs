use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EventId;
use crate::ticketing::TicketId;

/// Ticket transition that was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Open,
    Close,
}

/// How an attempted transition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    /// Nothing to do, the transition had already happened.
    Noop,
    Failure,
}

/// Why a transition was a no-op or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditReason {
    Duplicate,
    AlreadyClosed,
    NoMarker,
    NotFound,
    Transient,
    Auth,
    Persist,
    Rejected,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {}: {:?}", stringify!($ty), other)),
                }
            }
        }
    };
}

text_enum!(AuditAction { Open => "OPEN", Close => "CLOSE" });
text_enum!(AuditOutcome { Success => "SUCCESS", Noop => "NOOP", Failure => "FAILURE" });
text_enum!(AuditReason {
    Duplicate => "duplicate",
    AlreadyClosed => "already_closed",
    NoMarker => "no_marker",
    NotFound => "not_found",
    Transient => "transient",
    Auth => "auth",
    Persist => "persist",
    Rejected => "rejected",
});

/// One attempted ticket transition. Records are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    pub event_id: EventId,
    /// Empty when no ticket was involved (e.g. creation failed).
    pub ticket_id: Option<TicketId>,
    pub reason: Option<AuditReason>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, outcome: AuditOutcome, event_id: EventId) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            outcome,
            event_id,
            ticket_id: None,
            reason: None,
        }
    }

    pub fn with_ticket(mut self, ticket_id: TicketId) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn with_reason(mut self, reason: AuditReason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// The comma separated part of the log line, without timestamp.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{},{},{},{}",
            self.action,
            self.outcome,
            self.event_id,
            self.ticket_id.as_ref().map(TicketId::as_str).unwrap_or("")
        );
        if let Some(reason) = self.reason {
            line.push(',');
            line.push_str(reason.as_str());
        }
        line
    }

    /// Render as `<RFC3339> <ACTION>,<OUTCOME>,<event>,<ticket>[,<reason>]`.
    pub fn to_line(&self) -> String {
        format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.summary()
        )
    }

    /// Parse a line produced by [`AuditRecord::to_line`].
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (timestamp, rest) = line
            .split_once(' ')
            .ok_or_else(|| format!("missing timestamp: {:?}", line))?;

        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| format!("invalid timestamp {:?}: {}", timestamp, e))?
            .with_timezone(&Utc);

        let fields: Vec<&str> = rest.trim().split(',').collect();
        if fields.len() < 4 || fields.len() > 5 {
            return Err(format!("expected 4 or 5 fields: {:?}", rest));
        }

        let ticket_id = match fields[3] {
            "" => None,
            id => Some(TicketId::parse(id).ok_or_else(|| format!("invalid ticket id {:?}", id))?),
        };
        let reason = match fields.get(4) {
            Some(r) if !r.is_empty() => Some(r.parse()?),
            _ => None,
        };

        Ok(Self {
            timestamp,
            action: fields[0].parse()?,
            outcome: fields[1].parse()?,
            event_id: EventId::new(fields[2]),
            ticket_id,
            reason,
        })
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
