//! Startup plumbing shared by the `ticket-*` binaries.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use alertbridge_core::correlation::EventStore;
use alertbridge_core::flow::EXIT_HANDLED;
use alertbridge_core::{
    load_config, validate_config, AuditLog, CitsmartAuthenticator, CitsmartClient, CitsmartHttp,
    CloseNote, Config, EventId, EventValue, FlowContext, FlowError, MonitoringEvent,
    SanitizedConfig, SessionManager,
};

/// Environment variable selecting the log format (`json` or text).
pub const LOG_FORMAT_ENV: &str = "ALERTBRIDGE_LOG_FORMAT";

/// What an invocation operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Log in to the ticketing platform and exit
    Token,
    /// Ticketing platform only, no event correlation
    #[value(alias = "test", alias = "fluxo")]
    Manual,
    /// Full flow, correlated through the monitoring platform
    #[value(alias = "platform")]
    Zabbix,
}

/// Initialise tracing on stderr. `RUST_LOG` controls the filter.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

/// Load and validate the configuration file.
pub fn load_validated(path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    info!(config = %sanitized, "Configuration loaded");
    Ok(config)
}

/// Ticketing side of an invocation: HTTP client, session cache and ticket client.
pub struct Ticketing {
    pub sessions: Arc<SessionManager>,
    pub client: Arc<CitsmartClient>,
}

impl Ticketing {
    pub fn connect(config: &Config) -> Result<Self> {
        let http = CitsmartHttp::new(&config.ticketing).context("Failed to create HTTP client")?;
        let authenticator = Arc::new(CitsmartAuthenticator::new(http.clone(), &config.ticketing));
        let sessions = Arc::new(SessionManager::new(
            authenticator,
            chrono::Duration::seconds(config.ticketing.session_ttl_secs as i64),
        ));
        let client = Arc::new(CitsmartClient::new(http, config.ticketing.clone()));
        Ok(Self { sessions, client })
    }

    /// `token` mode: a login round trip only.
    pub async fn check_login(&self) -> u8 {
        match self.sessions.session().await {
            Ok(_) => {
                info!("Login succeeded");
                EXIT_HANDLED
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                FlowError::from(e).exit_code()
            }
        }
    }

    pub fn flow_context(&self, store: Arc<dyn EventStore>, audit: AuditLog) -> FlowContext {
        FlowContext::new(store, self.client.clone(), self.sessions.clone(), audit)
    }
}

pub fn open_audit_log(config: &Config) -> Result<AuditLog> {
    AuditLog::from_config(&config.audit)
        .with_context(|| format!("Failed to open audit log {:?}", config.audit.path))
}

/// Event id argument, restricted to ASCII alphanumerics, `-` and `_`.
pub fn event_id_arg(raw: Option<&str>) -> Result<EventId> {
    let raw = raw.context("An event id is required")?;
    EventId::parse(raw).with_context(|| format!("Invalid event id {:?}", raw))
}

/// Event described by `ticket-open` arguments. Both the id and the value
/// are required.
pub fn event_from_args(
    event_id: Option<&str>,
    value: Option<EventValue>,
    description: &[String],
) -> Result<MonitoringEvent> {
    let event_id = event_id_arg(event_id)?;
    let value = value.context("An event value (1/problem or 0/ok) is required")?;
    Ok(MonitoringEvent::from_notice(
        event_id,
        value,
        &description.join(" "),
    ))
}

/// Resolution text for a close: arguments win over configured defaults.
pub fn close_note(config: &Config, solution: Option<&str>, cause: Option<&str>) -> CloseNote {
    let as_html = |text: &str| format!("<div>{}</div>", text.trim());
    let close = &config.ticketing.close;
    CloseNote::new(
        solution
            .filter(|s| !s.trim().is_empty())
            .map(as_html)
            .unwrap_or_else(|| close.solution_html.clone()),
        cause
            .filter(|s| !s.trim().is_empty())
            .map(as_html)
            .unwrap_or_else(|| close.cause_html.clone()),
    )
}

/// Exit code for a flow result, logging the result.
pub fn report<T: std::fmt::Display>(result: std::result::Result<T, FlowError>) -> u8 {
    match result {
        Ok(outcome) => {
            info!("Done: {}", outcome);
            EXIT_HANDLED
        }
        Err(e) => {
            error!(error = %e, "Flow failed");
            e.exit_code()
        }
    }
}
