//! ticket-audit - inspect the ticket audit log.
//!
//! # Examples
//!
//! ```bash
//! # Events that got more than one ticket
//! ticket-audit duplicates
//!
//! # Everything recorded for event 12345, as JSON lines
//! ticket-audit show 12345 --json
//!
//! # Last failures
//! ticket-audit list --outcome failure --limit 20
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;

use alertbridge_cli::{event_id_arg, init_logging, load_validated, open_audit_log};
use alertbridge_core::flow::{EXIT_HANDLED, EXIT_RETRY, EXIT_USAGE};
use alertbridge_core::{AuditAction, AuditFilter, AuditOutcome, AuditRecord};

/// Inspect the ticket audit log.
#[derive(Parser)]
#[command(name = "ticket-audit")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "ALERTBRIDGE_CONFIG", default_value = "alertbridge.toml")]
    config: PathBuf,

    /// Print records as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events with more than one successful ticket creation
    ///
    /// Exits with status 1 when duplicates exist.
    Duplicates,

    /// Show every record of one event
    Show {
        /// Monitoring event id
        event_id: String,
    },

    /// List records
    List {
        #[arg(long, value_enum)]
        action: Option<ActionArg>,

        #[arg(long, value_enum)]
        outcome: Option<OutcomeArg>,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Open,
    Close,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutcomeArg {
    Success,
    Noop,
    Failure,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let config = load_validated(&cli.config)?;
    let audit = open_audit_log(&config)?;

    match cli.command {
        Commands::Duplicates => {
            let duplicates = audit
                .find_duplicate_opens()
                .context("Failed to read audit log")?;
            for (event_id, records) in &duplicates {
                let tickets: Vec<String> = records
                    .iter()
                    .filter_map(|r| r.ticket_id.as_ref().map(|t| t.to_string()))
                    .collect();
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({ "event_id": event_id, "tickets": tickets })
                    );
                } else {
                    println!("{} {}", event_id, tickets.join(","));
                }
            }
            Ok(if duplicates.is_empty() {
                EXIT_HANDLED
            } else {
                EXIT_RETRY
            })
        }
        Commands::Show { event_id } => {
            let event_id = event_id_arg(Some(event_id.as_str()))?;
            let records = audit
                .history(&event_id)
                .context("Failed to read audit log")?;
            print_records(&records, cli.json)?;
            Ok(EXIT_HANDLED)
        }
        Commands::List {
            action,
            outcome,
            limit,
        } => {
            let mut filter = AuditFilter::new();
            if let Some(action) = action {
                filter = filter.with_action(match action {
                    ActionArg::Open => AuditAction::Open,
                    ActionArg::Close => AuditAction::Close,
                });
            }
            if let Some(outcome) = outcome {
                filter = filter.with_outcome(match outcome {
                    OutcomeArg::Success => AuditOutcome::Success,
                    OutcomeArg::Noop => AuditOutcome::Noop,
                    OutcomeArg::Failure => AuditOutcome::Failure,
                });
            }
            if let Some(limit) = limit {
                filter = filter.with_limit(limit);
            }
            let records = audit.query(&filter).context("Failed to read audit log")?;
            print_records(&records, cli.json)?;
            Ok(EXIT_HANDLED)
        }
    }
}

fn print_records(records: &[AuditRecord], json: bool) -> Result<()> {
    for record in records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{}", record.to_line());
        }
    }
    Ok(())
}
