use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::{AuditBackend, AuditConfig};
use crate::event::EventId;

use super::{
    AuditAction, AuditError, AuditFilter, AuditOutcome, AuditRecord, AuditStore, FileAuditStore,
    SqliteAuditStore,
};

/// Handle for recording audit records
///
/// Cheaply cloneable. Recording never fails the caller: a store error is
/// logged and the record is dropped.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Open the store selected by the `[audit]` section.
    pub fn from_config(config: &AuditConfig) -> Result<Self, AuditError> {
        let store: Arc<dyn AuditStore> = match config.backend {
            AuditBackend::File => Arc::new(FileAuditStore::new(config.path.clone())),
            AuditBackend::Sqlite => Arc::new(SqliteAuditStore::new(&config.path)?),
        };
        Ok(Self::new(store))
    }

    pub fn record(&self, record: AuditRecord) {
        match self.store.append(&record) {
            Ok(()) => info!(audit = %record.summary(), "Audit record written"),
            Err(e) => error!(audit = %record.summary(), error = %e, "Failed to write audit record"),
        }
    }

    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        self.store.query(filter)
    }

    /// Records for one event, oldest first.
    pub fn history(&self, event_id: &EventId) -> Result<Vec<AuditRecord>, AuditError> {
        self.query(&AuditFilter::new().with_event_id(event_id.clone()))
    }

    /// Events with more than one successful ticket creation, with their
    /// OPEN/SUCCESS records.
    pub fn find_duplicate_opens(&self) -> Result<BTreeMap<EventId, Vec<AuditRecord>>, AuditError> {
        let opens = self.query(
            &AuditFilter::new()
                .with_action(AuditAction::Open)
                .with_outcome(AuditOutcome::Success),
        )?;

        let mut by_event: BTreeMap<EventId, Vec<AuditRecord>> = BTreeMap::new();
        for record in opens {
            by_event.entry(record.event_id.clone()).or_default().push(record);
        }
        by_event.retain(|_, records| records.len() > 1);
        Ok(by_event)
    }
}
