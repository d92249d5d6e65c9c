//! ticket-open - open a ticket for a monitoring problem event.
//!
//! Meant to be called by the monitoring platform's alert action.
//!
//! # Examples
//!
//! ```bash
//! # Check the service account can log in
//! ticket-open token
//!
//! # Open a ticket correlated with Zabbix event 12345
//! ticket-open zabbix 12345 1 "CPU high on db-01"
//!
//! # Open a ticket without touching the monitoring platform
//! ticket-open manual 12345 1 "CPU high on db-01"
//! ```
//!
//! Exit status: 0 handled (including duplicates and non-problem events),
//! 1 failure worth retrying, 2 usage or configuration error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, warn};

use alertbridge_cli::{
    event_from_args, init_logging, load_validated, open_audit_log, report, Mode, Ticketing,
};
use alertbridge_core::correlation::{DetachedEventStore, EventStore, ZabbixEventStore};
use alertbridge_core::flow::{EXIT_HANDLED, EXIT_USAGE};
use alertbridge_core::{EventValue, OpenFlow};

/// Open a ticket for a monitoring problem event.
#[derive(Parser)]
#[command(name = "ticket-open")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "ALERTBRIDGE_CONFIG", default_value = "alertbridge.toml")]
    config: PathBuf,

    /// Invocation mode
    #[arg(value_enum)]
    mode: Mode,

    /// Monitoring event id
    event_id: Option<String>,

    /// Event value: 1/problem or 0/ok
    event_value: Option<EventValue>,

    /// Problem description, used when the platform has none
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    description: Vec<String>,
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

    let mut event =
        event_from_args(cli.event_id.as_deref(), cli.event_value, &cli.description)?;

    let store: Arc<dyn EventStore> = match cli.mode {
        Mode::Zabbix => {
            let zabbix = ZabbixEventStore::new(&config.monitoring)
                .context("Failed to create monitoring client")?;
            if event.value.is_problem() {
                match zabbix.fetch_event(&event.id).await {
                    Ok(fetched) => event = event.enriched_with(&fetched),
                    Err(e) => warn!(event_id = %event.id, error = %e, "Using event details from arguments"),
                }
            }
            Arc::new(zabbix)
        }
        Mode::Manual => Arc::new(DetachedEventStore::new()),
        Mode::Token => return Ok(EXIT_HANDLED),
    };

    let audit = open_audit_log(&config)?;
    let flow = OpenFlow::new(ticketing.flow_context(store, audit), &config.ticketing);
    Ok(report(flow.handle_problem(&event).await))
}
