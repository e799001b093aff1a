//! Event filters by device, profile, source, or reading resource name.
//!
//! Filter values are regular expressions matched at the start of the name.
//! With `filter_out = false` only matching events pass; with
//! `filter_out = true` matching events are dropped. An empty value list
//! lets everything through.

use super::{require_event, Function};
use crate::context::FunctionContext;
use crate::core::{Event, FunctionOutput, Payload};
use crate::errors::ConfigurationError;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use tracing::debug;

/// The event property a filter inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterProperty {
    /// `Event::device_name`.
    DeviceName,
    /// `Event::profile_name`.
    ProfileName,
    /// `Event::source_name`.
    SourceName,
    /// `Reading::resource_name` of each reading.
    ResourceName,
}

impl FilterProperty {
    /// Returns the catalog name of the filter for this property.
    #[must_use]
    pub const fn function_name(self) -> &'static str {
        match self {
            Self::DeviceName => "FilterByDeviceName",
            Self::ProfileName => "FilterByProfileName",
            Self::SourceName => "FilterBySourceName",
            Self::ResourceName => "FilterByResourceName",
        }
    }

    fn event_value(self, event: &Event) -> Option<&str> {
        match self {
            Self::DeviceName => Some(&event.device_name),
            Self::ProfileName => Some(&event.profile_name),
            Self::SourceName => Some(&event.source_name),
            Self::ResourceName => None,
        }
    }
}

impl fmt::Display for FilterProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceName => write!(f, "DeviceName"),
            Self::ProfileName => write!(f, "ProfileName"),
            Self::SourceName => write!(f, "SourceName"),
            Self::ResourceName => write!(f, "ResourceName"),
        }
    }
}

/// Filters events by a name property.
#[derive(Debug, Clone)]
pub struct FilterFunction {
    property: FilterProperty,
    patterns: Vec<Regex>,
    filter_out: bool,
}

impl FilterFunction {
    /// Creates a filter for `property` over `values`.
    ///
    /// Each value is compiled as a regular expression anchored at the start.
    pub fn new<S: AsRef<str>>(
        property: FilterProperty,
        values: &[S],
        filter_out: bool,
    ) -> Result<Self, ConfigurationError> {
        let patterns = values
            .iter()
            .map(|value| {
                let value = value.as_ref();
                Regex::new(&format!("^(?:{value})")).map_err(|err| {
                    ConfigurationError::invalid_parameter(
                        property.function_name(),
                        "filter value",
                        format!("'{value}' is not a valid pattern: {err}"),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            property,
            patterns,
            filter_out,
        })
    }

    /// Filter passing only events from the given devices.
    pub fn by_device_name<S: AsRef<str>>(values: &[S], filter_out: bool) -> Result<Self, ConfigurationError> {
        Self::new(FilterProperty::DeviceName, values, filter_out)
    }

    /// Filter passing only events from the given profiles.
    pub fn by_profile_name<S: AsRef<str>>(values: &[S], filter_out: bool) -> Result<Self, ConfigurationError> {
        Self::new(FilterProperty::ProfileName, values, filter_out)
    }

    /// Filter passing only events from the given sources.
    pub fn by_source_name<S: AsRef<str>>(values: &[S], filter_out: bool) -> Result<Self, ConfigurationError> {
        Self::new(FilterProperty::SourceName, values, filter_out)
    }

    /// Filter keeping only readings for the given resources.
    pub fn by_resource_name<S: AsRef<str>>(values: &[S], filter_out: bool) -> Result<Self, ConfigurationError> {
        Self::new(FilterProperty::ResourceName, values, filter_out)
    }

    /// Returns the inspected property.
    #[must_use]
    pub const fn property(&self) -> FilterProperty {
        self.property
    }

    fn matches_any(&self, value: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(value))
    }

    fn accepts(&self, value: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        self.matches_any(value) != self.filter_out
    }

    fn filter_readings(&self, ctx: &FunctionContext, event: &Event) -> FunctionOutput {
        if self.patterns.is_empty() {
            return FunctionOutput::proceed(event.clone());
        }

        let mut kept = event.header_copy();
        for reading in &event.readings {
            if self.accepts(&reading.resource_name) {
                debug!(
                    pipeline_id = %ctx.pipeline_id(),
                    resource = %reading.resource_name,
                    "reading accepted"
                );
                kept.readings.push(reading.clone());
            } else {
                debug!(
                    pipeline_id = %ctx.pipeline_id(),
                    resource = %reading.resource_name,
                    "reading not accepted"
                );
            }
        }

        if kept.readings.is_empty() {
            FunctionOutput::stop()
        } else {
            FunctionOutput::proceed(kept)
        }
    }
}

#[async_trait]
impl Function for FilterFunction {
    fn name(&self) -> &str {
        self.property.function_name()
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        let event = match require_event(ctx, &data) {
            Ok(event) => event,
            Err(err) => return FunctionOutput::fail(err),
        };

        debug!(
            pipeline_id = %ctx.pipeline_id(),
            mode = if self.filter_out { "out" } else { "for" },
            property = %self.property,
            "filtering event"
        );

        let Some(value) = self.property.event_value(event) else {
            return self.filter_readings(ctx, event);
        };
        if self.accepts(value) {
            debug!(pipeline_id = %ctx.pipeline_id(), property = %self.property, value, "event accepted");
            FunctionOutput::Proceed(data)
        } else {
            debug!(pipeline_id = %ctx.pipeline_id(), property = %self.property, value, "event not accepted");
            FunctionOutput::stop()
        }
    }
}
