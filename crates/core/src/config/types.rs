use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub ticketing: TicketingConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Ticketing platform (CITSmart) configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct TicketingConfig {
    /// Base URL, e.g. "https://10.0.0.2" (the "/citsmart" context is appended per endpoint)
    pub base_url: String,
    /// Virtual host sent as `Host`/`Origin`/`Referer` when the base URL is an IP
    #[serde(default)]
    pub forced_host: Option<String>,
    /// Service account user name
    pub user: String,
    /// Service account password
    pub password: String,
    /// Login platform tag
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Activity (catalog item) every ticket is opened against
    pub activity_id: String,
    /// Human readable activity name, sent alongside the id
    #[serde(default = "default_activity_name")]
    pub activity_name: String,
    /// Support group the new ticket is delegated to
    pub destination_group_id: String,
    #[serde(default = "default_portfolio_id")]
    pub portfolio_id: String,
    #[serde(default = "default_portfolio_name")]
    pub portfolio_name: String,
    pub service_id: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    pub contract_id: String,
    /// Portal item uuid sent with the new request, empty when not required
    #[serde(default)]
    pub portal_item_uuid: String,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// How long a login is reused before re-authenticating
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u32,
    #[serde(default)]
    pub close: CloseConfig,
}

impl fmt::Debug for TicketingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketingConfig")
            .field("base_url", &self.base_url)
            .field("forced_host", &self.forced_host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("platform", &self.platform)
            .field("activity_id", &self.activity_id)
            .field("destination_group_id", &self.destination_group_id)
            .finish_non_exhaustive()
    }
}

/// Resolution fields applied when closing a ticket
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloseConfig {
    #[serde(default = "default_status_id")]
    pub status_id: u32,
    #[serde(default = "default_flow_action")]
    pub flow_action: String,
    #[serde(default = "default_solution_category_id")]
    pub solution_category_id: u32,
    #[serde(default = "default_incident_cause_id")]
    pub incident_cause_id: u32,
    #[serde(default = "default_solution_html")]
    pub solution_html: String,
    #[serde(default = "default_cause_html")]
    pub cause_html: String,
}

impl Default for CloseConfig {
    fn default() -> Self {
        Self {
            status_id: default_status_id(),
            flow_action: default_flow_action(),
            solution_category_id: default_solution_category_id(),
            incident_cause_id: default_incident_cause_id(),
            solution_html: default_solution_html(),
            cause_html: default_cause_html(),
        }
    }
}

/// Monitoring platform (Zabbix JSON-RPC) configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Full JSON-RPC endpoint, e.g. "https://zabbix/api_jsonrpc.php"
    pub api_url: String,
    pub api_token: String,
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// How many recent problem events of a trigger are scanned for a marker
    #[serde(default = "default_problem_lookup_limit")]
    pub problem_lookup_limit: u32,
}

impl fmt::Debug for MonitoringConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringConfig")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("problem_lookup_limit", &self.problem_lookup_limit)
            .finish_non_exhaustive()
    }
}

/// Audit log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub backend: AuditBackend,
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            backend: AuditBackend::default(),
            path: default_audit_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditBackend {
    /// Append-only text file, one line per record
    #[default]
    File,
    Sqlite,
}

fn default_platform() -> String {
    "WS".to_string()
}

fn default_activity_name() -> String {
    "Erro no Solicita".to_string()
}

fn default_portfolio_id() -> String {
    "1".to_string()
}

fn default_portfolio_name() -> String {
    "Central".to_string()
}

fn default_service_name() -> String {
    "Solicita".to_string()
}

fn default_connect_timeout() -> u32 {
    10
}

fn default_timeout() -> u32 {
    60
}

fn default_session_ttl() -> u32 {
    1800
}

fn default_status_id() -> u32 {
    4
}

fn default_flow_action() -> String {
    "E".to_string()
}

fn default_solution_category_id() -> u32 {
    13
}

fn default_incident_cause_id() -> u32 {
    6
}

fn default_solution_html() -> String {
    "<div>Problema resolvido automaticamente pelo Zabbix</div>".to_string()
}

fn default_cause_html() -> String {
    "<div>Trigger voltou ao estado OK</div>".to_string()
}

fn default_problem_lookup_limit() -> u32 {
    20
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("tickets.log")
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub ticketing: SanitizedTicketingConfig,
    pub monitoring: SanitizedMonitoringConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTicketingConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_host: Option<String>,
    pub user: String,
    pub password_configured: bool,
    pub platform: String,
    pub activity_id: String,
    pub destination_group_id: String,
    pub verify_tls: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMonitoringConfig {
    pub api_url: String,
    pub api_token_configured: bool,
    pub verify_tls: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let t = &config.ticketing;
        let m = &config.monitoring;
        Self {
            ticketing: SanitizedTicketingConfig {
                base_url: t.base_url.clone(),
                forced_host: t.forced_host.clone(),
                user: t.user.clone(),
                password_configured: !t.password.is_empty(),
                platform: t.platform.clone(),
                activity_id: t.activity_id.clone(),
                destination_group_id: t.destination_group_id.clone(),
                verify_tls: t.verify_tls,
            },
            monitoring: SanitizedMonitoringConfig {
                api_url: m.api_url.clone(),
                api_token_configured: !m.api_token.is_empty(),
                verify_tls: m.verify_tls,
            },
            audit: config.audit.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_TOML: &str = r#"
[ticketing]
base_url = "https://10.0.0.2"
forced_host = "itsm.example.org"
user = 'corp\svc.zabbix'
password = "s3cret"
activity_id = "2001"
destination_group_id = "71"
service_id = "1494"
contract_id = "2"

[monitoring]
api_url = "https://zabbix.example.org/api_jsonrpc.php"
api_token = "zbx-token"
"#;
