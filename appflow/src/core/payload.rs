//! The data value threaded through a pipeline run.

use super::{AddEventRequest, Event, Metric};
use crate::errors::{AppflowError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;

/// A value passed between pipeline functions.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A decoded event.
    Event(Event),
    /// An event wrapped for ingestion elsewhere.
    EventRequest(AddEventRequest),
    /// A sequence of events, produced by batching event data.
    Events(Vec<Event>),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UTF-8 text.
    Text(String),
    /// Arbitrary JSON.
    Json(serde_json::Value),
    /// Accumulated items from a batch flush.
    Batch(Vec<Vec<u8>>),
    /// A metric record.
    Metric(Metric),
}

impl Payload {
    /// Converts the payload into bytes.
    ///
    /// Text becomes UTF-8, bytes pass through, and every other shape is
    /// encoded as JSON. Batch items are encoded as a JSON array of base64
    /// strings.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Event(event) => serde_json::to_vec(event)?,
            Self::EventRequest(request) => serde_json::to_vec(request)?,
            Self::Events(events) => serde_json::to_vec(events)?,
            Self::Metric(metric) => serde_json::to_vec(metric)?,
            Self::Json(value) => serde_json::to_vec(value)?,
            Self::Batch(items) => {
                let encoded: Vec<String> = items.iter().map(|item| BASE64.encode(item)).collect();
                serde_json::to_vec(&encoded)?
            }
        };
        Ok(bytes)
    }

    /// Consumes the payload, converting it into bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Text(text) => Ok(text.into_bytes()),
            other => other.to_bytes(),
        }
    }

    /// Returns the JSON form of the payload.
    ///
    /// Byte and text payloads must contain JSON.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Self::Json(value) => Ok(value.clone()),
            Self::Event(event) => Ok(serde_json::to_value(event)?),
            Self::EventRequest(request) => Ok(serde_json::to_value(request)?),
            Self::Events(events) => Ok(serde_json::to_value(events)?),
            Self::Metric(metric) => Ok(serde_json::to_value(metric)?),
            other => {
                let bytes = other.to_bytes()?;
                serde_json::from_slice(&bytes).map_err(|err| {
                    AppflowError::validation(format!("payload is not valid JSON: {err}"))
                })
            }
        }
    }

    /// Returns the event if this payload is one.
    #[must_use]
    pub const fn as_event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Returns a short name of the payload shape for logs and errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::EventRequest(_) => "event_request",
            Self::Events(_) => "events",
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
            Self::Batch(_) => "batch",
            Self::Metric(_) => "metric",
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

impl From<Event> for Payload {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

impl From<AddEventRequest> for Payload {
    fn from(request: AddEventRequest) -> Self {
        Self::EventRequest(request)
    }
}

impl From<Metric> for Payload {
    fn from(metric: Metric) -> Self {
        Self::Metric(metric)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_text_coerces_to_utf8() {
        assert_eq!(Payload::from("héllo").to_bytes().unwrap(), "héllo".as_bytes());
    }

    #[test]
    fn test_bytes_pass_through() {
        let payload = Payload::from(vec![0, 159, 146, 150]);
        assert_eq!(payload.into_bytes().unwrap(), vec![0, 159, 146, 150]);
    }

    #[test]
    fn test_event_coerces_to_json() {
        let event = Event::new("p", "d", "s");
        let bytes = Payload::from(event.clone()).to_bytes().unwrap();
        let back: Event = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_batch_coerces_to_base64_array() {
        let payload = Payload::Batch(vec![b"a".to_vec(), b"bc".to_vec()]);
        let value: serde_json::Value = serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap();
        assert_eq!(value, json!(["YQ==", "YmM="]));
    }

    #[test]
    fn test_to_json_from_text() {
        let payload = Payload::from(r#"{"a": 1}"#);
        assert_eq!(payload.to_json().unwrap(), json!({"a": 1}));
        assert!(Payload::from("plain").to_json().is_err());
    }

    #[test]
    fn test_as_event_and_kind() {
        let payload = Payload::from(Event::new("p", "d", "s"));
        assert!(payload.as_event().is_some());
        assert_eq!(payload.kind(), "event");
        assert!(Payload::from("x").as_event().is_none());
    }
}
