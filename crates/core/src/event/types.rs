use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a monitoring event, opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Parse an id taken from an invocation argument. Only ASCII
    /// alphanumerics, `-` and `_` are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Trigger state carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventValue {
    /// Trigger returned to a healthy state.
    Ok,
    /// Trigger entered a failing state.
    Problem,
}

impl EventValue {
    pub fn is_problem(&self) -> bool {
        matches!(self, EventValue::Problem)
    }
}

impl FromStr for EventValue {
    type Err = String;

    /// Accepts the platform's numeric form ("1"/"0") and the names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "problem" => Ok(EventValue::Problem),
            "0" | "ok" | "resolved" => Ok(EventValue::Ok),
            other => Err(format!("unknown event value: {}", other)),
        }
    }
}

/// An acknowledgement (annotation) attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub message: String,
    /// Unix seconds, as reported by the platform.
    pub clock: i64,
}

impl Acknowledgement {
    pub fn new(message: impl Into<String>, clock: i64) -> Self {
        Self {
            message: message.into(),
            clock,
        }
    }
}

/// A monitoring event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringEvent {
    pub id: EventId,
    pub value: EventValue,
    /// Trigger name (or the description passed on the command line).
    pub name: String,
    /// Operational data rendered by the platform, often empty.
    #[serde(default)]
    pub opdata: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Id of the trigger that produced the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acknowledges: Vec<Acknowledgement>,
}

impl MonitoringEvent {
    /// Event built from invocation arguments only.
    pub fn from_notice(id: impl Into<EventId>, value: EventValue, description: &str) -> Self {
        Self {
            id: id.into(),
            value,
            name: description.trim().to_string(),
            opdata: String::new(),
            host: None,
            object_id: None,
            acknowledges: Vec::new(),
        }
    }

    /// Fill name/opdata/host from a platform copy of the same event, keeping
    /// local values where the platform has none.
    pub fn enriched_with(mut self, fetched: &MonitoringEvent) -> Self {
        if !fetched.name.is_empty() {
            self.name = fetched.name.clone();
        }
        if !fetched.opdata.is_empty() {
            self.opdata = fetched.opdata.clone();
        }
        if fetched.host.is_some() {
            self.host = fetched.host.clone();
        }
        if fetched.object_id.is_some() {
            self.object_id = fetched.object_id.clone();
        }
        self
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_value_parse() {
        assert_eq!("1".parse::<EventValue>().unwrap(), EventValue::Problem);
        assert_eq!(" 0 ".parse::<EventValue>().unwrap(), EventValue::Ok);
        assert_eq!("PROBLEM".parse::<EventValue>().unwrap(), EventValue::Problem);
        assert!("2".parse::<EventValue>().is_err());
    }

    #[test]
    fn test_event_id_trims() {
        assert_eq!(EventId::new(" 12345\n").as_str(), "12345");
    }

    #[test]
    fn test_event_id_parse() {
        assert_eq!(EventId::parse(" 12345 ").unwrap().as_str(), "12345");
        assert!(EventId::parse("evt_01-a").is_some());
        assert!(EventId::parse("").is_none());
        assert!(EventId::parse("   ").is_none());
        assert!(EventId::parse("123,456").is_none());
        assert!(EventId::parse("123\nOPEN,SUCCESS").is_none());
        assert!(EventId::parse("12 34").is_none());
    }

    #[test]
    fn test_enriched_keeps_local_when_remote_empty() {
        let local = MonitoringEvent::from_notice("12345", EventValue::Problem, "CPU high");
        let remote = MonitoringEvent {
            id: EventId::new("12345"),
            value: EventValue::Problem,
            name: String::new(),
            opdata: "load 9.1".to_string(),
            host: Some("db-01".to_string()),
            object_id: Some("777".to_string()),
            acknowledges: vec![],
        };

        let merged = local.enriched_with(&remote);
        assert_eq!(merged.name, "CPU high");
        assert_eq!(merged.opdata, "load 9.1");
        assert_eq!(merged.host.as_deref(), Some("db-01"));
        assert_eq!(merged.object_id.as_deref(), Some("777"));
    }
}
