//! Service configuration.
//!
//! The configuration is loaded once at startup, validated, and passed by
//! reference into the dispatcher and triggers. Keys are PascalCase to match
//! existing service configuration files:
//!
//! ```yaml
//! Trigger:
//!   Type: edgex-messagebus
//!   SubscribeTopics: events/#
//!   PublishTopic: export/{devicename}
//! MessageBus:
//!   BaseTopicPrefix: edgex
//! Writable:
//!   Pipeline:
//!     ExecutionOrder: FilterByDeviceName, Transform, SetResponseData
//!     Functions:
//!       FilterByDeviceName:
//!         Parameters:
//!           DeviceNames: Random-Integer-Device
//!       Transform:
//!         Parameters:
//!           Type: json
//! ```

use crate::context::InMemorySecretProvider;
use crate::errors::{ConfigurationError, ErrorInfo};
use crate::functions::FunctionParameters;
use crate::pipeline::{build_topic, PipelineBuilder, PipelineRegistry, DEFAULT_PIPELINE_ID, TOPIC_WILDCARD};
use crate::utils::{parse_duration, split_list};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Root service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub service: HttpConfig,
    /// Trigger selection and addressing.
    pub trigger: TriggerConfig,
    /// Message-bus settings shared by subscribe and publish.
    pub message_bus: MessageBusConfig,
    /// Settings that may change while the service runs.
    pub writable: WritableConfig,
    /// Concurrency policy.
    pub dispatcher: DispatcherConfig,
}

impl AppConfig {
    /// Parses a YAML document and validates it.
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Checks everything that can be checked without building functions.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let pipeline = &self.writable.pipeline;
        if pipeline.execution_order.trim().is_empty() && pipeline.per_topic_pipelines.is_empty() {
            return Err(ConfigurationError::empty_pipeline(DEFAULT_PIPELINE_ID).with_error_info(
                ErrorInfo::new("CONFIG-001-EMPTY-PIPELINE", "No pipeline is configured")
                    .with_fix_hint("Set Writable.Pipeline.ExecutionOrder or PerTopicPipelines"),
            ));
        }
        if self.trigger.trigger_type == TriggerType::MessageBus && self.subscribe_topics().is_empty() {
            return Err(ConfigurationError::new(
                "SubscribeTopics cannot be empty for a message-bus trigger",
            )
            .with_error_info(
                ErrorInfo::new("CONFIG-006-SUBSCRIBE-TOPICS", "No subscribe topic is configured")
                    .with_fix_hint("Set Trigger.SubscribeTopics to one or more comma-separated topics"),
            ));
        }
        self.service.request_timeout()?;
        self.dispatcher.processing_timeout()?;
        if self.dispatcher.max_concurrency == 0 {
            return Err(ConfigurationError::new("Dispatcher.MaxConcurrency must be at least 1"));
        }
        Ok(())
    }

    /// Returns the subscribe topics joined to the base topic prefix.
    #[must_use]
    pub fn subscribe_topics(&self) -> Vec<String> {
        split_list(&self.trigger.subscribe_topics)
            .iter()
            .map(|topic| build_topic(&self.message_bus.base_topic_prefix, topic))
            .collect()
    }

    /// Returns the publish topic joined to the base topic prefix, if set.
    #[must_use]
    pub fn publish_topic(&self) -> Option<String> {
        let topic = self.trigger.publish_topic.trim();
        (!topic.is_empty()).then(|| build_topic(&self.message_bus.base_topic_prefix, topic))
    }

    /// Builds every configured pipeline.
    ///
    /// The default execution order becomes `default-pipeline` on topic `#`;
    /// each per-topic entry becomes a pipeline on its own topics.
    pub fn build_registry(&self) -> Result<PipelineRegistry, ConfigurationError> {
        self.validate()?;
        let pipeline = &self.writable.pipeline;
        let parameters = pipeline.function_parameters();
        let mut registry = PipelineRegistry::new();

        if !pipeline.execution_order.trim().is_empty() {
            registry.register(
                PipelineBuilder::new(DEFAULT_PIPELINE_ID)
                    .topics(&[TOPIC_WILDCARD])
                    .catalog_functions(&split_list(&pipeline.execution_order), &parameters)?
                    .build()?,
            )?;
        }

        for (key, per_topic) in &pipeline.per_topic_pipelines {
            let id = if per_topic.id.trim().is_empty() { key.as_str() } else { per_topic.id.trim() };
            registry.register(
                PipelineBuilder::new(id)
                    .topics(&split_list(&per_topic.topics))
                    .catalog_functions(&split_list(&per_topic.execution_order), &parameters)?
                    .build()?,
            )?;
        }
        Ok(registry)
    }

    /// Builds a secret provider holding the configured insecure secrets.
    #[must_use]
    pub fn secret_provider(&self) -> InMemorySecretProvider {
        let provider = InMemorySecretProvider::new();
        for (key, secret) in &self.writable.insecure_secrets {
            let name = if secret.secret_name.is_empty() { key } else { &secret.secret_name };
            provider.store(name.clone(), secret.secret_data.clone());
        }
        provider
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HttpConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Deadline for one request, as a duration string.
    pub request_timeout: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 59700,
            request_timeout: "5s".to_string(),
        }
    }
}

impl HttpConfig {
    /// Returns the parsed request timeout.
    pub fn request_timeout(&self) -> Result<Duration, ConfigurationError> {
        parse_duration(&self.request_timeout).map_err(|err| {
            ConfigurationError::new(format!("Service.RequestTimeout is invalid: {err}"))
        })
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which trigger feeds the pipelines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TriggerType {
    /// One HTTP endpoint, request/response.
    #[default]
    Http,
    /// Subscribe to topics and publish results.
    MessageBus,
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "http" => Ok(Self::Http),
            "messagebus" | "message-bus" | "edgex-messagebus" | "external-mqtt" => Ok(Self::MessageBus),
            other => Err(format!("'{other}' is not a trigger type (expected http or messagebus)")),
        }
    }
}

impl TryFrom<String> for TriggerType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TriggerType> for String {
    fn from(value: TriggerType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::MessageBus => write!(f, "messagebus"),
        }
    }
}

/// Trigger selection and addressing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TriggerConfig {
    /// Trigger variant.
    #[serde(rename = "Type")]
    pub trigger_type: TriggerType,
    /// Comma-separated inbound topics.
    pub subscribe_topics: String,
    /// Outbound topic; may contain `{placeholders}`.
    pub publish_topic: String,
}

/// Message-bus settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MessageBusConfig {
    /// Prefix joined to every subscribe and publish topic.
    pub base_topic_prefix: String,
}

/// Settings that may change while the service runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WritableConfig {
    /// Pipeline definitions.
    pub pipeline: PipelineConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Secrets available to functions, keyed by name.
    pub insecure_secrets: BTreeMap<String, InsecureSecret>,
}

/// One insecure secret entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InsecureSecret {
    /// Secret name; defaults to the entry key.
    pub secret_name: String,
    /// Secret values.
    pub secret_data: HashMap<String, String>,
}

/// What the decoder produces from an inbound payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Decode into an event.
    #[default]
    #[serde(alias = "", alias = "Event")]
    Event,
    /// Pass the bytes through untouched.
    #[serde(alias = "Raw")]
    Raw,
}

/// Pipeline definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PipelineConfig {
    /// Comma-separated function names of the default pipeline.
    pub execution_order: String,
    /// Decoder target.
    pub target_type: TargetType,
    /// Function parameters keyed by function name.
    pub functions: HashMap<String, FunctionConfig>,
    /// Additional pipelines keyed by name.
    pub per_topic_pipelines: BTreeMap<String, TopicPipelineConfig>,
}

impl PipelineConfig {
    /// Returns the parameters of every function, keys lowercased.
    #[must_use]
    pub fn function_parameters(&self) -> HashMap<String, FunctionParameters> {
        self.functions
            .iter()
            .map(|(name, function)| (name.clone(), function.parameters.iter().collect()))
            .collect()
    }
}

/// Parameters of one configured function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FunctionConfig {
    /// Raw parameter values.
    pub parameters: HashMap<String, String>,
}

/// A pipeline bound to specific topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TopicPipelineConfig {
    /// Pipeline id; defaults to the entry key.
    pub id: String,
    /// Comma-separated topic filters.
    pub topics: String,
    /// Comma-separated function names.
    pub execution_order: String,
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoggingConfig {
    /// Filter directive such as `info` or `appflow=debug`. `RUST_LOG`
    /// takes precedence when set.
    #[serde(alias = "LogLevel")]
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

/// Concurrency policy of the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DispatcherConfig {
    /// Runs executing at once.
    pub max_concurrency: usize,
    /// Messages waiting for a worker before the subscription blocks.
    pub queue_capacity: usize,
    /// Deadline for one message-bus run, as a duration string.
    pub processing_timeout: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            queue_capacity: 256,
            processing_timeout: None,
        }
    }
}

impl DispatcherConfig {
    /// Returns the parsed processing timeout, if set.
    pub fn processing_timeout(&self) -> Result<Option<Duration>, ConfigurationError> {
        match self.processing_timeout.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => parse_duration(value).map(Some).map_err(|err| {
                ConfigurationError::new(format!("Dispatcher.ProcessingTimeout is invalid: {err}"))
            }),
        }
    }
}
