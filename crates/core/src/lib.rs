pub mod audit;
pub mod config;
pub mod correlation;
pub mod event;
pub mod flow;
pub mod session;
pub mod testing;
pub mod ticketing;

pub use audit::{AuditAction, AuditFilter, AuditLog, AuditOutcome, AuditReason, AuditRecord};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use correlation::{CorrelationMarker, DetachedEventStore, EventStore, ZabbixEventStore};
pub use event::{EventId, EventValue, MonitoringEvent};
pub use flow::{CloseFlow, FlowContext, FlowError, FlowOutcome, OpenFlow};
pub use session::{Authenticator, CitsmartAuthenticator, Session, SessionManager};
pub use ticketing::{CitsmartClient, CitsmartHttp, CloseNote, TicketClient, TicketId};
