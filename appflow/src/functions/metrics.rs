//! Metric to Line Protocol conversion.

use super::Function;
use crate::context::FunctionContext;
use crate::core::{validate_metric_name, FunctionOutput, Metric, MetricTag, Payload};
use crate::errors::{ConfigurationError, FunctionError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Renders a metric as a Line Protocol string.
///
/// Configured tags are appended after the metric's own tags. The input is
/// a metric payload or JSON that decodes into one.
#[derive(Debug, Clone, Default)]
pub struct ToLineProtocolFunction {
    additional_tags: Vec<MetricTag>,
}

impl ToLineProtocolFunction {
    /// Creates the function with `tags` appended to every metric.
    pub fn new(tags: &BTreeMap<String, String>) -> Result<Self, ConfigurationError> {
        let additional_tags = tags
            .iter()
            .map(|(name, value)| {
                validate_metric_name(name, "tag")
                    .map(|()| MetricTag::new(name.as_str(), value.as_str()))
                    .map_err(|err| ConfigurationError::invalid_parameter("ToLineProtocol", "tags", err.to_string()))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { additional_tags })
    }

    /// Returns the tags appended to every metric.
    #[must_use]
    pub fn additional_tags(&self) -> &[MetricTag] {
        &self.additional_tags
    }

    fn metric(ctx: &FunctionContext, data: Payload) -> Result<Metric, FunctionError> {
        match data {
            Payload::Metric(metric) => Ok(metric),
            Payload::Event(_) | Payload::EventRequest(_) | Payload::Events(_) | Payload::Batch(_) => {
                Err(ctx.error(format!("type received is not a Metric (got {})", data.kind())))
            }
            other => {
                let value = other
                    .to_json()
                    .map_err(|err| ctx.error(format!("type received is not a Metric: {err}")))?;
                serde_json::from_value(value)
                    .map_err(|err| ctx.error(format!("type received is not a Metric: {err}")))
            }
        }
    }
}

#[async_trait]
impl Function for ToLineProtocolFunction {
    fn name(&self) -> &str {
        "ToLineProtocol"
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(pipeline_id = %ctx.pipeline_id(), "converting metric to line protocol");

        let mut metric = match Self::metric(ctx, data) {
            Ok(metric) => metric,
            Err(err) => return FunctionOutput::fail(err),
        };
        metric.tags.extend(self.additional_tags.iter().cloned());

        let line = metric.to_line_protocol();
        debug!(pipeline_id = %ctx.pipeline_id(), %line, "transformed metric");
        FunctionOutput::proceed(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MetricField, MetricValue, API_VERSION};
    use crate::functions::test_support::function_ctx;
    use crate::utils::parse_key_values;
    use pretty_assertions::assert_eq;

    fn metric() -> Metric {
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
            timestamp: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_appends_configured_tags() {
        let function = ToLineProtocolFunction::new(&parse_key_values("Tag1:value1").unwrap()).unwrap();
        let source = metric();
        let output = function.execute(&function_ctx("ToLineProtocol"), source.clone().into()).await;

        assert_eq!(
            output,
            FunctionOutput::proceed(
                "UnitTestMetric,ServiceName=UnitTestService,SomeTag=SomeValue,Tag1=value1 \
                 int=12i,float=12.35,uint=99u 1700000000000"
            )
        );
        assert_eq!(source.tags.len(), 2);
    }

    #[tokio::test]
    async fn test_decodes_json_input() {
        let function = ToLineProtocolFunction::default();
        let json = r#"{"name":"cpu","fields":[{"name":"load","value":1}],"timestamp":5}"#;
        let output = function.execute(&function_ctx("ToLineProtocol"), json.into()).await;
        assert_eq!(output, FunctionOutput::proceed("cpu load=1i 5"));
    }

    #[tokio::test]
    async fn test_rejects_non_metric_input() {
        let function = ToLineProtocolFunction::default();
        let ctx = function_ctx("ToLineProtocol");

        let output = function.execute(&ctx, crate::core::Event::new("p", "d", "s").into()).await;
        assert!(matches!(output, FunctionOutput::Fail(_)));

        let output = function.execute(&ctx, "not json".into()).await;
        assert!(matches!(output, FunctionOutput::Fail(_)));
    }

    #[test]
    fn test_no_tags_configured() {
        let function = ToLineProtocolFunction::new(&BTreeMap::new()).unwrap();
        assert!(function.additional_tags().is_empty());
    }
}
