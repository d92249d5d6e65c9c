//! Mock monitoring event store for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::correlation::{EventStore, StoreError};
use crate::event::{Acknowledgement, EventId, EventValue, MonitoringEvent};

/// In-memory event store.
///
/// Acknowledgements are kept per event with an increasing clock, so markers
/// written through the trait read back exactly like on the real platform.
/// Unknown events are created on first acknowledgement.
#[derive(Debug)]
pub struct MockEventStore {
    events: Arc<RwLock<HashMap<EventId, MonitoringEvent>>>,
    /// Insertion order, used as event age.
    order: Arc<RwLock<Vec<EventId>>>,
    clock: Arc<RwLock<i64>>,
    read_error: Arc<RwLock<Option<StoreError>>>,
    write_error: Arc<RwLock<Option<StoreError>>>,
}

impl Default for MockEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEventStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(Vec::new())),
            clock: Arc::new(RwLock::new(1_700_000_000)),
            read_error: Arc::new(RwLock::new(None)),
            write_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Add or replace an event.
    pub async fn insert_event(&self, event: MonitoringEvent) {
        let mut events = self.events.write().await;
        if !events.contains_key(&event.id) {
            self.order.write().await.push(event.id.clone());
        }
        events.insert(event.id.clone(), event);
    }

    /// Acknowledgement messages of an event, oldest first.
    pub async fn messages(&self, event_id: &str) -> Vec<String> {
        self.events
            .read()
            .await
            .get(&EventId::new(event_id))
            .map(|e| e.acknowledges.iter().map(|a| a.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Make the next fetch fail.
    pub async fn fail_next_read(&self, error: StoreError) {
        *self.read_error.write().await = Some(error);
    }

    /// Make the next acknowledgement fail.
    pub async fn fail_next_write(&self, error: StoreError) {
        *self.write_error.write().await = Some(error);
    }

    async fn tick(&self) -> i64 {
        let mut clock = self.clock.write().await;
        *clock += 1;
        *clock
    }
}

#[async_trait]
impl EventStore for MockEventStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_event(&self, event_id: &EventId) -> Result<MonitoringEvent, StoreError> {
        if let Some(error) = self.read_error.write().await.take() {
            return Err(error);
        }
        self.events
            .read()
            .await
            .get(event_id)
            .cloned()
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))
    }

    async fn recent_problem_events(
        &self,
        object_id: &str,
    ) -> Result<Vec<MonitoringEvent>, StoreError> {
        let events = self.events.read().await;
        let order = self.order.read().await;
        Ok(order
            .iter()
            .rev()
            .filter_map(|id| events.get(id))
            .filter(|e| e.value.is_problem() && e.object_id.as_deref() == Some(object_id))
            .cloned()
            .collect())
    }

    async fn acknowledge(&self, event_id: &EventId, message: &str) -> Result<(), StoreError> {
        if let Some(error) = self.write_error.write().await.take() {
            return Err(error);
        }
        let clock = self.tick().await;

        let mut events = self.events.write().await;
        if !events.contains_key(event_id) {
            self.order.write().await.push(event_id.clone());
        }
        events
            .entry(event_id.clone())
            .or_insert_with(|| MonitoringEvent::from_notice(event_id.clone(), EventValue::Problem, ""))
            .acknowledges
            .push(Acknowledgement::new(message, clock));
        Ok(())
    }
}
