use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::EventId;

use super::{AuditAction, AuditOutcome, AuditRecord};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for querying audit records
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_id: Option<EventId>,
    pub action: Option<AuditAction>,
    pub outcome: Option<AuditOutcome>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of records, `None` for all.
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_id(mut self, event_id: impl Into<EventId>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_time_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` passes every condition except the limit.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.event_id.as_ref().map_or(true, |id| &record.event_id == id)
            && self.action.map_or(true, |a| record.action == a)
            && self.outcome.map_or(true, |o| record.outcome == o)
            && self.from.map_or(true, |from| record.timestamp >= from)
            && self.to.map_or(true, |to| record.timestamp <= to)
    }
}

/// Trait for audit record storage
pub trait AuditStore: Send + Sync {
    /// Append a record. Existing records are never touched.
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// Matching records, oldest first.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;
}
