//! JSONLogic rule evaluation and the function that filters on it.
//!
//! Rules are evaluated by `datalogic_rs`; this module only decides what a
//! result means for the run.

use super::Function;
use crate::context::FunctionContext;
use crate::core::{FunctionOutput, Payload};
use crate::errors::{AppflowError, ConfigurationError, Result};
use async_trait::async_trait;
use datalogic_rs::DataLogic;
use serde_json::Value;
use tracing::debug;

/// Evaluates `rule` against `data`.
pub fn evaluate_rule(rule: &Value, data: &Value) -> Result<Value> {
    let logic = DataLogic::new();
    logic
        .evaluate_json(rule, data)
        .map_err(|err| AppflowError::validation(format!("unable to evaluate JSON logic rule: {err}")))
}

/// Returns the JSONLogic truthiness of `value`.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Lets an input through only when a JSONLogic rule is truthy for it.
///
/// The rule sees the JSON form of the input. A falsy result stops the run
/// without an error; the input passes through unchanged otherwise.
#[derive(Debug, Clone)]
pub struct JsonLogicFunction {
    rule: Value,
}

impl JsonLogicFunction {
    /// Creates the function from a parsed rule.
    #[must_use]
    pub const fn new(rule: Value) -> Self {
        Self { rule }
    }

    /// Parses `rule` as JSON.
    pub fn from_rule_str(rule: &str) -> std::result::Result<Self, ConfigurationError> {
        serde_json::from_str::<Value>(rule)
            .map(Self::new)
            .map_err(|err| {
                ConfigurationError::invalid_parameter(
                    "JSONLogic",
                    "rule",
                    format!("unable to decode the JSON logic rule: {err}"),
                )
            })
    }

    /// Returns the rule.
    #[must_use]
    pub const fn rule(&self) -> &Value {
        &self.rule
    }
}

#[async_trait]
impl Function for JsonLogicFunction {
    fn name(&self) -> &str {
        "JSONLogic"
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(pipeline_id = %ctx.pipeline_id(), "evaluating JSON logic");

        let input = match data.to_json() {
            Ok(input) => input,
            Err(err) => {
                return FunctionOutput::fail(ctx.error(format!("JSONLogic input data should be JSON format: {err}")))
            }
        };

        match evaluate_rule(&self.rule, &input) {
            Ok(result) if is_truthy(&result) => {
                debug!(pipeline_id = %ctx.pipeline_id(), %result, "condition met");
                FunctionOutput::Proceed(data)
            }
            Ok(result) => {
                debug!(pipeline_id = %ctx.pipeline_id(), %result, "condition not met");
                FunctionOutput::stop()
            }
            Err(err) => FunctionOutput::fail(ctx.error(format!("unable to apply JSONLogic rule: {err}"))),
        }
    }
}
