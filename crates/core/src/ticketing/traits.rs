use async_trait::async_trait;

use crate::session::Session;

use super::{CloseNote, NewTicket, TicketError, TicketId, TicketReference};

/// Ticket lifecycle operations on a ticketing platform.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Name of the ticketing backend.
    fn name(&self) -> &str;

    /// Open a ticket. Returns an OPEN reference on success.
    ///
    /// `Unauthorized` is only returned before a ticket number was obtained, so
    /// the caller may log in again and retry without risking a second ticket.
    async fn create_ticket(
        &self,
        session: &Session,
        ticket: &NewTicket,
    ) -> Result<TicketReference, TicketError>;

    /// Close a ticket. Closing a ticket that is already closed succeeds.
    async fn close_ticket(
        &self,
        session: &Session,
        ticket_id: &TicketId,
        note: &CloseNote,
    ) -> Result<(), TicketError>;
}
