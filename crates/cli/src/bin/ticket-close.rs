//! ticket-close - close the ticket of a recovered monitoring event.
//!
//! # Examples
//!
//! ```bash
//! # Close the ticket recorded on Zabbix event 12345 (or on the problem
//! # event of the trigger, when 12345 is the recovery event)
//! ticket-close zabbix 12345
//!
//! # Close ticket 52606 directly, with a custom resolution
//! ticket-close manual 52606 "Disk cleaned" "Log rotation disabled"
//! ```
//!
//! Exit status: 0 handled (including already closed, untracked and vanished
//! tickets), 1 failure worth retrying, 2 usage or configuration error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use alertbridge_cli::{
    close_note, event_id_arg, init_logging, load_validated, open_audit_log, report, Mode,
    Ticketing,
};
use alertbridge_core::correlation::{DetachedEventStore, EventStore, ZabbixEventStore};
use alertbridge_core::flow::{EXIT_HANDLED, EXIT_USAGE};
use alertbridge_core::{CloseFlow, EventId, TicketId};

/// Close the ticket of a recovered monitoring event.
#[derive(Parser)]
#[command(name = "ticket-close")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "ALERTBRIDGE_CONFIG", default_value = "alertbridge.toml")]
    config: PathBuf,

    /// Invocation mode
    #[arg(value_enum)]
    mode: Mode,

    /// Event id, or the ticket id in manual mode
    id: Option<String>,

    /// Solution text recorded on the ticket
    solution: Option<String>,

    /// Cause text recorded on the ticket
    cause: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_validated(&cli.config)?;
    let ticketing = Ticketing::connect(&config)?;

    if cli.mode == Mode::Token {
        return Ok(ticketing.check_login().await);
    }

    let id = cli
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .context("An event id (or ticket id in manual mode) is required")?;

    let (event_id, store) = match cli.mode {
        Mode::Zabbix => {
            let event_id = event_id_arg(Some(id))?;
            let store: Arc<dyn EventStore> = Arc::new(
                ZabbixEventStore::new(&config.monitoring)
                    .context("Failed to create monitoring client")?,
            );
            (event_id, store)
        }
        Mode::Manual => {
            let ticket_id = TicketId::parse(id)
                .with_context(|| format!("Invalid ticket id {:?}", id))?;
            let event_id = EventId::new(ticket_id.as_str());
            let store: Arc<dyn EventStore> =
                Arc::new(DetachedEventStore::with_open_ticket(ticket_id));
            (event_id, store)
        }
        Mode::Token => return Ok(EXIT_HANDLED),
    };

    let audit = open_audit_log(&config)?;
    let note = close_note(&config, cli.solution.as_deref(), cli.cause.as_deref());
    let flow = CloseFlow::new(ticketing.flow_context(store, audit), note);
    Ok(report(flow.handle_recovery(&event_id).await))
}
