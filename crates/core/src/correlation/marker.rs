//! Textual encoding of ticket references inside event acknowledgements.
//!
//! An open ticket is recorded as `CITSmartTicketID=<id>` and its closure as
//! `CITSmartTicketClosed=<id>`, each optionally followed by ` | <note>`.

use std::collections::HashSet;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::event::{Acknowledgement, EventId};
use crate::ticketing::{TicketId, TicketReference, TicketState};

pub const OPEN_TAG: &str = "CITSmartTicketID";
pub const CLOSED_TAG: &str = "CITSmartTicketClosed";

/// Longest acknowledgement message the monitoring platform accepts.
pub const MAX_MESSAGE_CHARS: usize = 2048;

const NOTE_SEPARATOR: &str = " | ";

/// Link between a monitoring event and its ticket.
///
/// `event_id` is the event the marker lives on (the problem event), which is
/// not necessarily the event a lookup started from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationMarker {
    pub event_id: EventId,
    pub ticket: TicketReference,
}

/// Render the acknowledgement message recording `ticket`.
pub fn encode_marker(ticket: &TicketReference, note: &str) -> String {
    let tag = match ticket.state {
        TicketState::Open => OPEN_TAG,
        TicketState::Closed => CLOSED_TAG,
    };
    let mut message = format!("{}={}", tag, ticket.id);

    let note = note.trim();
    if !note.is_empty() {
        let room = MAX_MESSAGE_CHARS.saturating_sub(message.chars().count() + NOTE_SEPARATOR.len());
        message.push_str(NOTE_SEPARATOR);
        message.extend(note.chars().take(room));
    }
    message
}

/// Recover the ticket reference from an event's acknowledgements.
///
/// Acknowledgements are replayed oldest first, ties keeping their input
/// order: the last open tag names the current ticket. A close tag is terminal
/// for its ticket id wherever it appears, since ids are never reused. Tags
/// without a usable id are skipped, so garbled history reads as "no marker".
pub fn decode_marker(acknowledges: &[Acknowledgement]) -> Option<TicketReference> {
    let re = Regex::new(r"CITSmartTicket(ID|Closed)\s*=\s*([A-Za-z0-9_-]+)").ok()?;

    let mut ordered: Vec<&Acknowledgement> = acknowledges.iter().collect();
    ordered.sort_by_key(|ack| ack.clock);

    let mut current: Option<TicketId> = None;
    let mut last_closed: Option<TicketId> = None;
    let mut closed: HashSet<TicketId> = HashSet::new();
    for ack in ordered {
        for caps in re.captures_iter(&ack.message) {
            let Some(id) = caps.get(2).and_then(|m| TicketId::parse(m.as_str())) else {
                continue;
            };
            if &caps[1] == "ID" {
                current = Some(id);
            } else {
                closed.insert(id.clone());
                last_closed = Some(id);
            }
        }
    }

    match current {
        Some(id) if closed.contains(&id) => Some(TicketReference::open(id).closed()),
        Some(id) => Some(TicketReference::open(id)),
        None => last_closed.map(|id| TicketReference::open(id).closed()),
    }
}
