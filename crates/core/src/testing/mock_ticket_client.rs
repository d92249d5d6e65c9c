//! Mock ticket client for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::session::Session;
use crate::ticketing::{
    CloseNote, NewTicket, TicketClient, TicketError, TicketId, TicketReference,
};

/// A recorded ticketing call for test assertions.
#[derive(Debug, Clone)]
pub enum RecordedTicketCall {
    Create {
        ticket: NewTicket,
        session_cookie: String,
        timestamp: chrono::DateTime<Utc>,
    },
    Close {
        ticket_id: TicketId,
        note: CloseNote,
        session_cookie: String,
        timestamp: chrono::DateTime<Utc>,
    },
}

/// Mock implementation of the TicketClient trait.
///
/// Provides controllable behavior for testing:
/// - Track create/close calls for assertions
/// - Hand out predictable ticket ids
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTicketClient::new();
/// client.set_next_ids(["T-9001"]).await;
/// client.fail_next(TicketError::Transient("HTTP 503".into())).await;
/// ```
#[derive(Debug)]
pub struct MockTicketClient {
    calls: Arc<RwLock<Vec<RecordedTicketCall>>>,
    /// Ids handed out by `create_ticket`, in order.
    next_ids: Arc<RwLock<VecDeque<TicketId>>>,
    /// Queued errors; each operation consumes the front one if present.
    errors: Arc<RwLock<VecDeque<TicketError>>>,
    counter: Arc<RwLock<u32>>,
}

impl Default for MockTicketClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTicketClient {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            next_ids: Arc::new(RwLock::new(VecDeque::new())),
            errors: Arc::new(RwLock::new(VecDeque::new())),
            counter: Arc::new(RwLock::new(9000)),
        }
    }

    /// Ids returned by upcoming creations. Afterwards ids continue as `T-9001`, `T-9002`...
    pub async fn set_next_ids<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let mut next = self.next_ids.write().await;
        next.extend(ids.into_iter().filter_map(TicketId::parse));
    }

    /// Make the next operation fail. Several calls queue several failures.
    pub async fn fail_next(&self, error: TicketError) {
        self.errors.write().await.push_back(error);
    }

    pub async fn calls(&self) -> Vec<RecordedTicketCall> {
        self.calls.read().await.clone()
    }

    pub async fn created(&self) -> Vec<NewTicket> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedTicketCall::Create { ticket, .. } => Some(ticket.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn closed(&self) -> Vec<TicketId> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedTicketCall::Close { ticket_id, .. } => Some(ticket_id.clone()),
                _ => None,
            })
            .collect()
    }

    async fn take_error(&self) -> Option<TicketError> {
        self.errors.write().await.pop_front()
    }

    async fn next_id(&self) -> Result<TicketId, TicketError> {
        if let Some(id) = self.next_ids.write().await.pop_front() {
            return Ok(id);
        }
        let mut counter = self.counter.write().await;
        *counter += 1;
        let id = format!("T-{}", *counter);
        TicketId::parse(&id).ok_or_else(|| TicketError::Rejected(format!("bad mock id {}", id)))
    }
}

#[async_trait]
impl TicketClient for MockTicketClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_ticket(
        &self,
        session: &Session,
        ticket: &NewTicket,
    ) -> Result<TicketReference, TicketError> {
        self.calls.write().await.push(RecordedTicketCall::Create {
            ticket: ticket.clone(),
            session_cookie: session.cookie_header().to_string(),
            timestamp: Utc::now(),
        });

        if let Some(error) = self.take_error().await {
            return Err(error);
        }
        Ok(TicketReference::open(self.next_id().await?))
    }

    async fn close_ticket(
        &self,
        session: &Session,
        ticket_id: &TicketId,
        note: &CloseNote,
    ) -> Result<(), TicketError> {
        self.calls.write().await.push(RecordedTicketCall::Close {
            ticket_id: ticket_id.clone(),
            note: note.clone(),
            session_cookie: session.cookie_header().to_string(),
            timestamp: Utc::now(),
        });

        match self.take_error().await {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
