//! Ticket lifecycle client.
//!
//! This module provides a `TicketClient` trait for opening and closing tickets
//! on a ticketing platform, and the CITSmart implementation.

mod citsmart;
mod http;
mod ticket_number;
mod traits;
mod types;

pub use citsmart::CitsmartClient;
pub use http::CitsmartHttp;
pub use ticket_number::extract_ticket_number;
pub use traits::TicketClient;
pub use types::*;
