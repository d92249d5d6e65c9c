//! Zabbix JSON-RPC event store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::MonitoringConfig;
use crate::event::{Acknowledgement, EventId, EventValue, MonitoringEvent};

use super::store::{EventStore, StoreError};

const EVENT_OUTPUT: [&str; 6] = ["eventid", "objectid", "value", "clock", "name", "opdata"];

/// Acknowledge the event and add a message.
const ACTION_ACK_WITH_MESSAGE: u32 = 6;
/// Add a message only, for events that cannot be acknowledged again.
const ACTION_MESSAGE_ONLY: u32 = 4;

/// Event store backed by the Zabbix API.
pub struct ZabbixEventStore {
    client: Client,
    api_url: String,
    api_token: String,
    problem_lookup_limit: u32,
}

impl ZabbixEventStore {
    pub fn new(config: &MonitoringConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs as u64))
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim().to_string(),
            api_token: config.api_token.clone(),
            problem_lookup_limit: config.problem_lookup_limit,
        })
    }

    /// Perform one JSON-RPC call and return its `result`.
    async fn call(&self, method: &str, params: Value) -> Result<Value, StoreError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .client
            .post(&self.api_url)
            .header(CONTENT_TYPE, "application/json-rpc")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", method, e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(StoreError::Unavailable(format!("{}: HTTP {}", method, status)));
        }
        if !status.is_success() {
            return Err(StoreError::Api(format!("{}: HTTP {}", method, status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Api(format!("{}: invalid response: {}", method, e)))?;

        if let Some(error) = body.get("error") {
            return Err(StoreError::Api(format!("{}: {}", method, rpc_error_text(error))));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| StoreError::Api(format!("{}: response without result", method)))
    }

    async fn get_events(&self, params: Value) -> Result<Vec<MonitoringEvent>, StoreError> {
        let result = self.call("event.get", params).await?;
        let raw: Vec<RawEvent> = serde_json::from_value(result)
            .map_err(|e| StoreError::Api(format!("event.get: unexpected shape: {}", e)))?;
        Ok(raw.into_iter().filter_map(RawEvent::into_event).collect())
    }
}

#[async_trait]
impl EventStore for ZabbixEventStore {
    fn name(&self) -> &str {
        "zabbix"
    }

    async fn fetch_event(&self, event_id: &EventId) -> Result<MonitoringEvent, StoreError> {
        let events = self
            .get_events(json!({
                "eventids": [event_id.as_str()],
                "output": EVENT_OUTPUT,
                "select_acknowledges": ["acknowledgeid", "message", "clock"],
                "selectHosts": ["host", "name"],
            }))
            .await?;

        events
            .into_iter()
            .find(|e| &e.id == event_id)
            .ok_or_else(|| StoreError::EventNotFound(event_id.to_string()))
    }

    async fn recent_problem_events(
        &self,
        object_id: &str,
    ) -> Result<Vec<MonitoringEvent>, StoreError> {
        let events = self
            .get_events(json!({
                "source": 0,
                "object": 0,
                "objectids": [object_id],
                "value": 1,
                "output": EVENT_OUTPUT,
                "select_acknowledges": ["acknowledgeid", "message", "clock"],
                "sortfield": ["clock"],
                "sortorder": "DESC",
                "limit": self.problem_lookup_limit,
            }))
            .await?;

        debug!(object_id, count = events.len(), "Loaded recent problem events");
        Ok(events)
    }

    async fn acknowledge(&self, event_id: &EventId, message: &str) -> Result<(), StoreError> {
        let params = |action: u32| {
            json!({
                "eventids": [event_id.as_str()],
                "action": action,
                "message": message,
            })
        };

        match self
            .call("event.acknowledge", params(ACTION_ACK_WITH_MESSAGE))
            .await
        {
            Ok(_) => Ok(()),
            Err(StoreError::Api(e)) => {
                warn!(event_id = %event_id, error = %e, "Acknowledge refused, adding message only");
                self.call("event.acknowledge", params(ACTION_MESSAGE_ONLY))
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

fn rpc_error_text(error: &Value) -> String {
    let message = error.get("message").and_then(Value::as_str).unwrap_or("error");
    match error.get("data").and_then(Value::as_str) {
        Some(data) if !data.is_empty() => format!("{} {}", message, data),
        _ => message.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(deserialize_with = "lenient_string")]
    eventid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    objectid: String,
    #[serde(deserialize_with = "lenient_string")]
    value: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    opdata: String,
    #[serde(default)]
    hosts: Vec<RawHost>,
    #[serde(default)]
    acknowledges: Vec<RawAcknowledge>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    #[serde(default)]
    host: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawAcknowledge {
    #[serde(default, deserialize_with = "lenient_string")]
    acknowledgeid: String,
    #[serde(default)]
    message: String,
    #[serde(default, deserialize_with = "lenient_string")]
    clock: String,
}

impl RawEvent {
    fn into_event(self) -> Option<MonitoringEvent> {
        let value = match self.value.parse::<EventValue>() {
            Ok(v) => v,
            Err(e) => {
                warn!(event_id = %self.eventid, error = %e, "Skipping event");
                return None;
            }
        };

        let host = self.hosts.into_iter().next().and_then(|h| {
            if !h.name.is_empty() {
                Some(h.name)
            } else if !h.host.is_empty() {
                Some(h.host)
            } else {
                None
            }
        });

        Some(MonitoringEvent {
            id: EventId::new(self.eventid),
            value,
            name: self.name,
            opdata: self.opdata,
            host,
            object_id: Some(self.objectid).filter(|o| !o.is_empty() && o != "0"),
            acknowledges: ordered_acknowledges(self.acknowledges),
        })
    }
}

/// Oldest first. Clocks have one-second resolution, so ties fall back to the
/// acknowledgement id, which increases with insertion.
fn ordered_acknowledges(raw: Vec<RawAcknowledge>) -> Vec<Acknowledgement> {
    let mut keyed: Vec<(i64, u64, String)> = raw
        .into_iter()
        .map(|a| {
            (
                a.clock.parse().unwrap_or(0),
                a.acknowledgeid.parse().unwrap_or(0),
                a.message,
            )
        })
        .collect();
    keyed.sort_by_key(|(clock, id, _)| (*clock, *id));
    keyed
        .into_iter()
        .map(|(clock, _, message)| Acknowledgement::new(message, clock))
        .collect()
}

/// Zabbix sends numbers as strings; accept either.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_event_conversion() {
        let raw: RawEvent = serde_json::from_value(json!({
            "eventid": "12345",
            "objectid": "777",
            "value": "1",
            "clock": "1700000000",
            "name": "CPU high",
            "opdata": "load 9.1",
            "hosts": [{"hostid": "10084", "host": "db-01", "name": "Database 01"}],
            "acknowledges": [{"message": "CITSmartTicketID=52606", "clock": "1700000100"}]
        }))
        .unwrap();

        let event = raw.into_event().unwrap();
        assert_eq!(event.id.as_str(), "12345");
        assert_eq!(event.value, EventValue::Problem);
        assert_eq!(event.host.as_deref(), Some("Database 01"));
        assert_eq!(event.object_id.as_deref(), Some("777"));
        assert_eq!(event.acknowledges[0].clock, 1_700_000_100);
    }

    #[test]
    fn test_raw_event_numeric_fields() {
        let raw: RawEvent = serde_json::from_value(json!({
            "eventid": 12346,
            "objectid": 0,
            "value": 0,
            "name": "CPU high"
        }))
        .unwrap();

        let event = raw.into_event().unwrap();
        assert_eq!(event.value, EventValue::Ok);
        assert!(event.object_id.is_none());
        assert!(event.host.is_none());
    }

    #[test]
    fn test_raw_event_unknown_value_is_skipped() {
        let raw: RawEvent =
            serde_json::from_value(json!({"eventid": "1", "value": "7"})).unwrap();
        assert!(raw.into_event().is_none());
    }

    #[test]
    fn test_acknowledges_ordered_by_clock_then_id() {
        let raw: RawEvent = serde_json::from_value(json!({
            "eventid": "12345",
            "value": "1",
            "acknowledges": [
                {"acknowledgeid": "902", "message": "CITSmartTicketClosed=52606 | closed", "clock": "1700000000"},
                {"acknowledgeid": "901", "message": "CITSmartTicketID=52606 | CPU high", "clock": "1700000000"},
                {"acknowledgeid": "900", "message": "looking", "clock": "1699999990"}
            ]
        }))
        .unwrap();

        let event = raw.into_event().unwrap();
        let messages: Vec<&str> = event.acknowledges.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "looking",
                "CITSmartTicketID=52606 | CPU high",
                "CITSmartTicketClosed=52606 | closed"
            ]
        );
    }

    #[test]
    fn test_rpc_error_text() {
        let error = json!({"code": -32602, "message": "Invalid params.", "data": "No permissions."});
        assert_eq!(rpc_error_text(&error), "Invalid params. No permissions.");
        assert_eq!(rpc_error_text(&json!({"message": "Boom"})), "Boom");
    }
}
