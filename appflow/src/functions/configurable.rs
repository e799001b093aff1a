//! Builds catalog functions from configuration.
//!
//! Function names and parameter keys are matched case-insensitively.

use super::{
    AddTagsFunction, AesProtection, BatchFunction, BatchMode, CompressFunction, CompressionAlgorithm,
    EncryptionKey, FilterFunction, FilterProperty, Function, JsonLogicFunction,
    SetResponseDataFunction, ToLineProtocolFunction, TransformFunction, TransformType,
    WrapIntoEventFunction,
};
use crate::errors::ConfigurationError;
use crate::utils::{parse_bool, parse_duration, parse_key_values, split_list};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Names of every function [`build_function`] knows.
pub const CATALOG: &[&str] = &[
    "FilterByDeviceName",
    "FilterByProfileName",
    "FilterBySourceName",
    "FilterByResourceName",
    "Batch",
    "Compress",
    "Encrypt",
    "Decrypt",
    "Transform",
    "JSONLogic",
    "SetResponseData",
    "WrapIntoEvent",
    "AddTags",
    "ToLineProtocol",
    "HTTPExport",
];

/// Parameters of one configured function, keyed by lowercased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionParameters {
    values: HashMap<String, String>,
}

impl FunctionParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_lowercase(), value.into());
    }

    /// Adds a parameter, builder style.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, function: &str, key: &str) -> Result<&str, ConfigurationError> {
        self.get(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigurationError::invalid_parameter(function, key, "parameter is required"))
    }

    fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).map_or(default, str::trim)
    }

    fn bool_or(&self, function: &str, key: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.get(key).map(str::trim).filter(|value| !value.is_empty()) {
            None => Ok(default),
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConfigurationError::invalid_parameter(function, key, format!("'{value}' is not a bool"))
            }),
        }
    }

    fn parsed<T>(&self, function: &str, key: &str) -> Result<T, ConfigurationError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.require(function, key)?
            .parse()
            .map_err(|err: T::Err| ConfigurationError::invalid_parameter(function, key, err.to_string()))
    }

    fn duration(&self, function: &str, key: &str) -> Result<Duration, ConfigurationError> {
        parse_duration(self.require(function, key)?)
            .map_err(|err| ConfigurationError::invalid_parameter(function, key, err.to_string()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for FunctionParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key.as_ref(), value);
        }
        params
    }
}

impl From<HashMap<String, String>> for FunctionParameters {
    fn from(values: HashMap<String, String>) -> Self {
        values.into_iter().collect()
    }
}

/// Builds the catalog function `name` from `params`.
///
/// Unknown names and invalid parameters are configuration errors.
pub fn build_function(name: &str, params: &FunctionParameters) -> Result<Arc<dyn Function>, ConfigurationError> {
    let function: Arc<dyn Function> = match name.trim().to_lowercase().as_str() {
        "filterbydevicename" => filter(FilterProperty::DeviceName, "devicenames", params)?,
        "filterbyprofilename" => filter(FilterProperty::ProfileName, "profilenames", params)?,
        "filterbysourcename" => filter(FilterProperty::SourceName, "sourcenames", params)?,
        "filterbyresourcename" => filter(FilterProperty::ResourceName, "resourcenames", params)?,
        "batch" => batch(params)?,
        "compress" => {
            let algorithm: CompressionAlgorithm = params.parsed("Compress", "algorithm")?;
            Arc::new(CompressFunction::new(algorithm))
        }
        "encrypt" => Arc::new(AesProtection::encrypt(encryption_key("Encrypt", params)?)),
        "decrypt" => Arc::new(AesProtection::decrypt(encryption_key("Decrypt", params)?)),
        "transform" => {
            let target: TransformType = params.parsed("Transform", "type")?;
            Arc::new(TransformFunction::new(target))
        }
        "jsonlogic" => Arc::new(JsonLogicFunction::from_rule_str(params.require("JSONLogic", "rule")?)?),
        "setresponsedata" => Arc::new(
            SetResponseDataFunction::new().with_content_type(params.get_or("responsecontenttype", "")),
        ),
        "wrapintoevent" => Arc::new(
            WrapIntoEventFunction::new(
                params.require("WrapIntoEvent", "profilename")?,
                params.require("WrapIntoEvent", "devicename")?,
                params.require("WrapIntoEvent", "resourcename")?,
                params.require("WrapIntoEvent", "valuetype")?,
            )?
            .with_media_type(params.get_or("mediatype", "")),
        ),
        "addtags" => Arc::new(AddTagsFunction::new(tags("AddTags", params.require("AddTags", "tags")?)?)),
        "tolineprotocol" => {
            let value = params.get("tags").ok_or_else(|| {
                ConfigurationError::invalid_parameter("ToLineProtocol", "tags", "parameter is required")
            })?;
            Arc::new(ToLineProtocolFunction::new(&tags("ToLineProtocol", value)?)?)
        }
        #[cfg(feature = "http-export")]
        "httpexport" => http_export(params)?,
        _ => return Err(ConfigurationError::unknown_function(name)),
    };
    Ok(function)
}

fn filter(
    property: FilterProperty,
    key: &str,
    params: &FunctionParameters,
) -> Result<Arc<dyn Function>, ConfigurationError> {
    let name = property.function_name();
    let values = split_list(params.get(key).ok_or_else(|| {
        ConfigurationError::invalid_parameter(name, key, "parameter is required")
    })?);
    let filter_out = params.bool_or(name, "filterout", false)?;
    Ok(Arc::new(FilterFunction::new(property, &values, filter_out)?))
}

fn tags(function: &str, value: &str) -> Result<BTreeMap<String, String>, ConfigurationError> {
    parse_key_values(value).map_err(|entry| {
        ConfigurationError::invalid_parameter(function, "tags", format!("'{entry}' is not a key:value pair"))
    })
}

fn batch(params: &FunctionParameters) -> Result<Arc<dyn Function>, ConfigurationError> {
    let mode: BatchMode = params.parsed("Batch", "mode")?;
    let threshold = || {
        params
            .parsed::<usize>("Batch", "batchthreshold")
            .map_err(|err| ConfigurationError::batch_threshold(err.message))
    };
    let interval = || {
        params
            .duration("Batch", "timeinterval")
            .map_err(|err| ConfigurationError::batch_threshold(err.message))
    };

    let function = match mode {
        BatchMode::ByCount => BatchFunction::by_count(threshold()?)?,
        BatchMode::ByTime => BatchFunction::by_time(interval()?)?,
        BatchMode::ByTimeCount => BatchFunction::by_time_and_count(interval()?, threshold()?)?,
    };
    Ok(Arc::new(
        function
            .with_event_data(params.bool_or("Batch", "iseventdata", false)?)
            .with_merge_on_send(params.bool_or("Batch", "mergeonsend", false)?),
    ))
}

fn encryption_key(function: &str, params: &FunctionParameters) -> Result<EncryptionKey, ConfigurationError> {
    let algorithm = params.get_or("algorithm", "aes256");
    if !algorithm.eq_ignore_ascii_case("aes256") {
        return Err(ConfigurationError::invalid_parameter(
            function,
            "algorithm",
            format!("'{algorithm}' is not supported (expected aes256)"),
        ));
    }

    let secret_name = params.get_or("secretname", "");
    let secret_value_key = params.get_or("secretvaluekey", "");
    if !secret_name.is_empty() && !secret_value_key.is_empty() {
        return Ok(EncryptionKey::Secret {
            name: secret_name.to_string(),
            value_key: secret_value_key.to_string(),
        });
    }
    match params.get_or("key", "") {
        "" => Err(ConfigurationError::invalid_parameter(
            function,
            "key",
            "either key or secretname and secretvaluekey must be set",
        )),
        key => Ok(EncryptionKey::Hex(key.to_string())),
    }
}

#[cfg(feature = "http-export")]
fn http_export(params: &FunctionParameters) -> Result<Arc<dyn Function>, ConfigurationError> {
    use super::{ExportMethod, HttpExportFunction};

    let method: ExportMethod = params.parsed("HTTPExport", "method")?;
    let mut function = HttpExportFunction::new(method, params.require("HTTPExport", "url")?)?
        .with_mime_type(params.get_or("mimetype", ""))
        .with_return_input_data(params.bool_or("HTTPExport", "returninputdata", false)?)
        .with_continue_on_send_error(params.bool_or("HTTPExport", "continueonsenderror", false)?);

    let header_name = params.get_or("headername", "");
    let secret_name = params.get_or("secretname", "");
    let secret_value_key = params.get_or("secretvaluekey", "");
    if !header_name.is_empty() || !secret_name.is_empty() || !secret_value_key.is_empty() {
        function = function.with_secret_header(header_name, secret_name, secret_value_key);
    }
    if params.get("timeout").is_some() {
        function = function.with_timeout(params.duration("HTTPExport", "timeout")?);
    }

    function.validate()?;
    Ok(Arc::new(function))
}
