//! Event and reading records that enter a pipeline.

use crate::errors::{AppflowError, Result};
use crate::utils::{generate_id, now_nanos};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::debug;

/// API version stamped on events created by this crate.
pub const API_VERSION: &str = "v3";

/// Value type for binary readings.
pub const VALUE_TYPE_BINARY: &str = "Binary";
/// Value type for string readings.
pub const VALUE_TYPE_STRING: &str = "String";
/// Value type for object readings.
pub const VALUE_TYPE_OBJECT: &str = "Object";

/// Every value type a reading may carry, in canonical casing.
pub const VALUE_TYPES: &[&str] = &[
    "Bool", "String", "Uint8", "Uint16", "Uint32", "Uint64", "Int8", "Int16", "Int32", "Int64",
    "Float32", "Float64", "Binary", "BoolArray", "StringArray", "Uint8Array", "Uint16Array",
    "Uint32Array", "Uint64Array", "Int8Array", "Int16Array", "Int32Array", "Int64Array",
    "Float32Array", "Float64Array", "Object", "ObjectArray",
];

/// Normalizes a value type to its canonical casing.
pub fn normalize_value_type(value_type: &str) -> Result<&'static str> {
    VALUE_TYPES
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(value_type))
        .copied()
        .ok_or_else(|| {
            AppflowError::validation(format!("unable to normalize unknown value type '{value_type}'"))
        })
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

/// A single measurement carried by an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Reading identifier.
    #[serde(default)]
    pub id: String,
    /// Origin timestamp in nanoseconds.
    #[serde(default)]
    pub origin: i64,
    /// Device that produced the reading.
    #[serde(default)]
    pub device_name: String,
    /// Resource the reading measures.
    pub resource_name: String,
    /// Profile of the producing device.
    #[serde(default)]
    pub profile_name: String,
    /// Value type, e.g. `Int32` or `Binary`.
    pub value_type: String,
    /// Simple value rendered as text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// Units of the value.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub units: String,
    /// Binary payload, base64 on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub binary_value: Option<Vec<u8>>,
    /// Media type of the binary payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// Structured value for object readings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_value: Option<serde_json::Value>,
    /// Reading tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// The domain record that enters a pipeline.
///
/// Functions never mutate an `Event` in place; derived events are built as
/// new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// API version of the record.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Event identifier.
    #[serde(default)]
    pub id: String,
    /// Device that produced the event.
    pub device_name: String,
    /// Profile of the producing device.
    pub profile_name: String,
    /// Source (resource or command) that produced the event.
    pub source_name: String,
    /// Origin timestamp in nanoseconds.
    #[serde(default)]
    pub origin: i64,
    /// Ordered readings.
    #[serde(default)]
    pub readings: Vec<Reading>,
    /// Event tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Creates a new event with a generated id and the current origin.
    #[must_use]
    pub fn new(
        profile_name: impl Into<String>,
        device_name: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: default_api_version(),
            id: generate_id(),
            device_name: device_name.into(),
            profile_name: profile_name.into(),
            source_name: source_name.into(),
            origin: now_nanos(),
            readings: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Returns a copy of this event without its readings.
    #[must_use]
    pub fn header_copy(&self) -> Self {
        Self {
            api_version: self.api_version.clone(),
            id: self.id.clone(),
            device_name: self.device_name.clone(),
            profile_name: self.profile_name.clone(),
            source_name: self.source_name.clone(),
            origin: self.origin,
            readings: Vec::new(),
            tags: self.tags.clone(),
        }
    }

    fn base_reading(&self, resource_name: &str, value_type: &str) -> Reading {
        Reading {
            id: generate_id(),
            origin: now_nanos(),
            device_name: self.device_name.clone(),
            resource_name: resource_name.to_string(),
            profile_name: self.profile_name.clone(),
            value_type: value_type.to_string(),
            ..Reading::default()
        }
    }

    /// Adds a simple reading whose value is rendered as text.
    pub fn add_simple_reading(
        &mut self,
        resource_name: &str,
        value_type: &str,
        value: impl Into<String>,
    ) {
        let mut reading = self.base_reading(resource_name, value_type);
        reading.value = value.into();
        self.readings.push(reading);
    }

    /// Adds a binary reading.
    pub fn add_binary_reading(&mut self, resource_name: &str, value: Vec<u8>, media_type: &str) {
        let mut reading = self.base_reading(resource_name, VALUE_TYPE_BINARY);
        reading.binary_value = Some(value);
        reading.media_type = media_type.to_string();
        self.readings.push(reading);
    }

    /// Adds an object reading.
    pub fn add_object_reading(&mut self, resource_name: &str, value: serde_json::Value) {
        let mut reading = self.base_reading(resource_name, VALUE_TYPE_OBJECT);
        reading.object_value = Some(value);
        self.readings.push(reading);
    }

    /// Renders the event as an XML document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<Event>");
        push_element(&mut out, "ApiVersion", &self.api_version);
        push_element(&mut out, "Id", &self.id);
        push_element(&mut out, "DeviceName", &self.device_name);
        push_element(&mut out, "ProfileName", &self.profile_name);
        push_element(&mut out, "SourceName", &self.source_name);
        push_element(&mut out, "Origin", &self.origin.to_string());
        for reading in &self.readings {
            out.push_str("<Readings>");
            push_element(&mut out, "Id", &reading.id);
            push_element(&mut out, "Origin", &reading.origin.to_string());
            push_element(&mut out, "DeviceName", &reading.device_name);
            push_element(&mut out, "ResourceName", &reading.resource_name);
            push_element(&mut out, "ProfileName", &reading.profile_name);
            push_element(&mut out, "ValueType", &reading.value_type);
            push_element(&mut out, "Units", &reading.units);
            if let Some(ref binary) = reading.binary_value {
                push_element(&mut out, "BinaryValue", &BASE64.encode(binary));
            }
            push_element(&mut out, "MediaType", &reading.media_type);
            if let Some(ref object) = reading.object_value {
                push_element(&mut out, "ObjectValue", &object.to_string());
            }
            push_element(&mut out, "Value", &reading.value);
            push_tags(&mut out, &reading.tags);
            out.push_str("</Readings>");
        }
        push_tags(&mut out, &self.tags);
        out.push_str("</Event>");
        out
    }
}

fn push_tags(out: &mut String, tags: &BTreeMap<String, serde_json::Value>) {
    if tags.is_empty() {
        return;
    }
    out.push_str("<Tags>");
    for (key, value) in tags {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = write!(out, "<Tag key=\"{}\">{}</Tag>", escape_xml(key), escape_xml(&text));
    }
    out.push_str("</Tags>");
}

fn push_element(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, "<{name}>{}</{name}>", escape_xml(value));
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Envelope used when publishing an event for ingestion elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEventRequest {
    /// API version of the request.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Request identifier.
    #[serde(default)]
    pub request_id: String,
    /// The wrapped event.
    pub event: Event,
}

impl AddEventRequest {
    /// Wraps an event in a new request.
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self {
            api_version: default_api_version(),
            request_id: generate_id(),
            event,
        }
    }
}

/// Decodes an inbound payload into an [`Event`].
///
/// The payload may be an `AddEventRequest` or a bare `Event`, optionally
/// base64-wrapped.
pub fn decode_event(payload: &[u8]) -> Result<Event> {
    let unwrapped;
    let bytes = match decode_base64_json(payload) {
        Some(decoded) => {
            unwrapped = decoded;
            unwrapped.as_slice()
        }
        None => payload,
    };

    match serde_json::from_slice::<AddEventRequest>(bytes) {
        Ok(request) => return Ok(request.event),
        Err(err) => debug!(error = %err, "payload is not an AddEventRequest, trying bare Event"),
    }

    serde_json::from_slice::<Event>(bytes).map_err(|err| {
        AppflowError::validation(format!("failed to decode payload into Event: {err}"))
    })
}

fn decode_base64_json(payload: &[u8]) -> Option<Vec<u8>> {
    let trimmed = trim_whitespace(payload);
    if trimmed.first() == Some(&b'{') {
        return None;
    }
    let decoded = BASE64.decode(trimmed).ok()?;
    (trim_whitespace(&decoded).first() == Some(&b'{')).then_some(decoded)
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(text) if !text.is_empty() => BASE64
                .decode(text.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event_json() -> &'static str {
        r#"{
            "apiVersion": "v3",
            "id": "e-1",
            "deviceName": "Random-Integer-Device",
            "profileName": "Random-Integer-Device",
            "sourceName": "Int32",
            "origin": 1700000000000000000,
            "readings": [
                {"id": "r-1", "resourceName": "Int32", "valueType": "Int32", "value": "42"}
            ]
        }"#
    }

    #[test]
    fn test_decode_bare_event() {
        let event = decode_event(event_json().as_bytes()).unwrap();
        assert_eq!(event.device_name, "Random-Integer-Device");
        assert_eq!(event.readings.len(), 1);
        assert_eq!(event.readings[0].value, "42");
    }

    #[test]
    fn test_decode_add_event_request() {
        let payload = format!(
            r#"{{"apiVersion":"v3","requestId":"req-1","event":{}}}"#,
            event_json()
        );
        let event = decode_event(payload.as_bytes()).unwrap();
        assert_eq!(event.id, "e-1");
    }

    #[test]
    fn test_decode_base64_wrapped_event() {
        let encoded = BASE64.encode(event_json());
        let event = decode_event(encoded.as_bytes()).unwrap();
        assert_eq!(event.source_name, "Int32");
    }

    #[test]
    fn test_decode_malformed_payload() {
        let err = decode_event(b"{not json").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_decode_missing_required_field() {
        let err = decode_event(br#"{"deviceName":"d"}"#).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_binary_reading_serializes_as_base64() {
        let mut event = Event::new("p", "d", "s");
        event.add_binary_reading("image", vec![1, 2, 3], "image/png");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["readings"][0]["binaryValue"], "AQID");
        assert_eq!(json["readings"][0]["valueType"], "Binary");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back.readings[0].binary_value, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_to_xml_escapes_values() {
        let mut event = Event::new("p", "dev<1>", "s");
        event.add_simple_reading("temp", "Float64", "1.5");
        let xml = event.to_xml();
        assert!(xml.starts_with("<Event><ApiVersion>v3</ApiVersion>"));
        assert!(xml.contains("<DeviceName>dev&lt;1&gt;</DeviceName>"));
        assert!(xml.contains("<ResourceName>temp</ResourceName>"));
        assert!(xml.ends_with("</Event>"));
    }

    #[test]
    fn test_normalize_value_type() {
        assert_eq!(normalize_value_type("float64").unwrap(), "Float64");
        assert_eq!(normalize_value_type("BINARY").unwrap(), "Binary");
        assert!(normalize_value_type("decimal").is_err());
    }

    #[test]
    fn test_header_copy_drops_readings() {
        let mut event = Event::new("p", "d", "s");
        event.add_simple_reading("a", "Int8", "1");
        let copy = event.header_copy();
        assert!(copy.readings.is_empty());
        assert_eq!(copy.id, event.id);
    }
}
