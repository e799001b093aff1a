//! Metric records and their Line Protocol rendering.

use crate::errors::{AppflowError, Result};
use crate::utils::now_nanos;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::API_VERSION;

fn default_api_version() -> String {
    API_VERSION.to_string()
}

/// The value of one metric field.
///
/// Signed integers render with an `i` suffix and unsigned ones with `u`,
/// as Line Protocol expects. Untagged JSON numbers decode as signed when
/// they fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A float.
    Float(f64),
    /// A boolean.
    Bool(bool),
    /// Text.
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}i"),
            Self::UInt(value) => write!(f, "{value}u"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// A named field of a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: MetricValue,
}

impl MetricField {
    /// Creates a field.
    #[must_use]
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A tag attached to a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTag {
    /// Tag name.
    pub name: String,
    /// Tag value.
    pub value: String,
}

impl MetricTag {
    /// Creates a tag.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Measurement data for one named metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// API version of the record.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Measurement name.
    pub name: String,
    /// Fields, at least one.
    pub fields: Vec<MetricField>,
    /// Tags in output order.
    #[serde(default)]
    pub tags: Vec<MetricTag>,
    /// Timestamp in nanoseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl Metric {
    /// Creates a metric stamped with the current time.
    ///
    /// The name, every field name and every tag name must be non-blank, and
    /// there must be at least one field.
    pub fn new(name: impl Into<String>, fields: Vec<MetricField>, tags: Vec<MetricTag>) -> Result<Self> {
        let name = name.into();
        validate_metric_name(&name, "metric")?;
        if fields.is_empty() {
            return Err(AppflowError::validation("one or more metric fields are required"));
        }
        for field in &fields {
            validate_metric_name(&field.name, "field")?;
        }
        for tag in &tags {
            validate_metric_name(&tag.name, "tag")?;
        }
        Ok(Self {
            api_version: default_api_version(),
            name,
            fields,
            tags,
            timestamp: now_nanos(),
        })
    }

    /// Renders the metric as one Line Protocol line:
    /// `name[,tag=value...] field=value[,field=value...] timestamp`.
    #[must_use]
    pub fn to_line_protocol(&self) -> String {
        let tags: String = self
            .tags
            .iter()
            .map(|tag| format!(",{}={}", tag.name, tag.value))
            .collect();
        let fields = self
            .fields
            .iter()
            .map(|field| format!("{}={}", field.name, field.value))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}{tags} {fields} {}", self.name, self.timestamp)
    }
}

/// Rejects blank metric, field and tag names.
pub fn validate_metric_name(name: &str, kind: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppflowError::validation(format!("{kind} name can not be empty or blank")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit_test_metric() -> Metric {
        Metric {
            api_version: API_VERSION.to_string(),
            name: "UnitTestMetric".into(),
            fields: vec![
                MetricField::new("int", MetricValue::Int(12)),
                MetricField::new("float", MetricValue::Float(12.35)),
                MetricField::new("uint", MetricValue::UInt(99)),
            ],
            tags: vec![
                MetricTag::new("ServiceName", "UnitTestService"),
                MetricTag::new("SomeTag", "SomeValue"),
            ],
            timestamp: 1_556_813_561_098_000_000,
        }
    }

    #[test]
    fn test_line_protocol_layout() {
        assert_eq!(
            unit_test_metric().to_line_protocol(),
            "UnitTestMetric,ServiceName=UnitTestService,SomeTag=SomeValue \
             int=12i,float=12.35,uint=99u 1556813561098000000"
        );
    }

    #[test]
    fn test_line_protocol_without_tags() {
        let mut metric = unit_test_metric();
        metric.tags.clear();
        metric.fields = vec![MetricField::new("state", MetricValue::Text("on".into()))];
        assert_eq!(metric.to_line_protocol(), "UnitTestMetric state=on 1556813561098000000");
    }

    #[test]
    fn test_new_validates_names() {
        let field = || vec![MetricField::new("f", MetricValue::Bool(true))];
        assert!(Metric::new("m", field(), vec![]).unwrap().timestamp > 0);
        assert!(Metric::new(" ", field(), vec![]).is_err());
        assert!(Metric::new("m", vec![], vec![]).is_err());
        assert!(Metric::new("m", field(), vec![MetricTag::new("", "v")]).is_err());
    }

    #[test]
    fn test_decodes_from_json() {
        let metric: Metric = serde_json::from_str(
            r#"{"name":"cpu","fields":[{"name":"load","value":0.5},{"name":"cores","value":8}],"timestamp":7}"#,
        )
        .unwrap();
        assert_eq!(metric.api_version, API_VERSION);
        assert_eq!(metric.fields[0].value, MetricValue::Float(0.5));
        assert_eq!(metric.fields[1].value, MetricValue::Int(8));
        assert_eq!(metric.to_line_protocol(), "cpu load=0.5,cores=8i 7");
    }
}
