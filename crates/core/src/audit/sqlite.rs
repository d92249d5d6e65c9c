use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use crate::event::EventId;
use crate::ticketing::TicketId;

use super::{AuditError, AuditFilter, AuditRecord, AuditStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    action TEXT NOT NULL,
    outcome TEXT NOT NULL,
    event_id TEXT NOT NULL,
    ticket_id TEXT,
    reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_records_event_id ON audit_records(event_id);
CREATE INDEX IF NOT EXISTS idx_audit_records_timestamp ON audit_records(timestamp);
"#;

/// SQLite-backed audit store
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Open the database file, creating it and the table if needed
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(|e| AuditError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite audit store (useful for testing)
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AuditError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref event_id) = filter.event_id {
            conditions.push("event_id = ?");
            params.push(Box::new(event_id.as_str().to_string()));
        }

        if let Some(action) = filter.action {
            conditions.push("action = ?");
            params.push(Box::new(action.as_str()));
        }

        if let Some(outcome) = filter.outcome {
            conditions.push("outcome = ?");
            params.push(Box::new(outcome.as_str()));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(to_db_time(from)));
        }

        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to_db_time(to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

/// Fixed-width UTC so text comparison orders by time.
fn to_db_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO audit_records (timestamp, action, outcome, event_id, ticket_id, reason) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                to_db_time(&record.timestamp),
                record.action.as_str(),
                record.outcome.as_str(),
                record.event_id.as_str(),
                record.ticket_id.as_ref().map(TicketId::as_str),
                record.reason.map(|r| r.as_str()),
            ],
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self.conn()?;

        let (where_clause, mut all_params) = Self::build_where_clause(filter);

        // SQLite treats a negative LIMIT as "no limit".
        let sql = format!(
            "SELECT timestamp, action, outcome, event_id, ticket_id, reason FROM audit_records {} ORDER BY timestamp ASC, id ASC LIMIT ?",
            where_clause
        );
        all_params.push(Box::new(filter.limit.map_or(-1, |l| l as i64)));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row_result in rows {
            let (timestamp, action, outcome, event_id, ticket_id, reason) =
                row_result.map_err(|e| AuditError::Database(e.to_string()))?;

            let invalid = |e: String| AuditError::Database(format!("Invalid row: {}", e));

            records.push(AuditRecord {
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| invalid(e.to_string()))?
                    .with_timezone(&Utc),
                action: action.parse().map_err(invalid)?,
                outcome: outcome.parse().map_err(invalid)?,
                event_id: EventId::new(event_id),
                ticket_id: ticket_id.as_deref().and_then(TicketId::parse),
                reason: reason.map(|r| r.parse()).transpose().map_err(invalid)?,
            });
        }

        Ok(records)
    }
}
