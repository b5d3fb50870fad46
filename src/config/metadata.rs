//! Declared configuration variables.
//!
//! Every key the application reads must be declared here with a default
//! value. Declarations may also carry numeric bounds, a read-only flag, a
//! safemode value and a custom clamp function. Declarations can be loaded
//! from YAML:
//!
//! ```yaml
//! variables:
//!   Volume:
//!     default: 100
//!     type: int
//!     min: 0
//!     max: 200
//!     safemode: 50
//!     description: Master volume
//! ```

use super::source::StringMap;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Custom post-processing applied to a raw value on every read.
pub type ClampFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Declared value type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Int,
    Float,
    Bool,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Bool => write!(f, "bool"),
        }
    }
}

/// Parse the textual boolean forms accepted in config files.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Metadata for one configuration key.
#[derive(Clone)]
pub struct ConfigVariable {
    key: String,
    default: String,
    description: String,
    value_type: ValueType,
    min: Option<f64>,
    max: Option<f64>,
    read_only: bool,
    safemode: Option<String>,
    clamp_fn: Option<ClampFn>,
}

impl ConfigVariable {
    pub fn new(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default: default.into(),
            description: String::new(),
            value_type: ValueType::String,
            min: None,
            max: None,
            read_only: false,
            safemode: None,
            clamp_fn: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Value forced while running in safemode.
    pub fn safemode(mut self, value: impl Into<String>) -> Self {
        self.safemode = Some(value.into());
        self
    }

    pub fn clamp_with(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.clamp_fn = Some(Arc::new(f));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    pub fn get_value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.min, self.max)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn safemode_value(&self) -> Option<&str> {
        self.safemode.as_deref()
    }

    /// Validate and clamp a raw value read from a source.
    ///
    /// Values that do not parse as the declared type fall back to the
    /// default. Values already in range are returned unchanged.
    pub fn clamp(&self, raw: &str) -> String {
        let typed = match self.value_type {
            ValueType::String => raw.to_string(),
            ValueType::Int => self.clamp_int(raw),
            ValueType::Float => self.clamp_float(raw),
            ValueType::Bool => match parse_bool(raw) {
                Some(true) => "1".to_string(),
                Some(false) => "0".to_string(),
                None => self.default.clone(),
            },
        };

        match &self.clamp_fn {
            Some(f) => f(&typed),
            None => typed,
        }
    }

    fn clamp_int(&self, raw: &str) -> String {
        let Ok(value) = raw.trim().parse::<i64>() else {
            return self.default.clone();
        };

        let mut clamped = value;
        if let Some(min) = self.min {
            clamped = clamped.max(min.ceil() as i64);
        }
        if let Some(max) = self.max {
            clamped = clamped.min(max.floor() as i64);
        }

        if clamped == value {
            raw.to_string()
        } else {
            clamped.to_string()
        }
    }

    fn clamp_float(&self, raw: &str) -> String {
        let value = match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => return self.default.clone(),
        };

        let mut clamped = value;
        if let Some(min) = self.min {
            clamped = clamped.max(min);
        }
        if let Some(max) = self.max {
            clamped = clamped.min(max);
        }

        if clamped == value {
            raw.to_string()
        } else {
            clamped.to_string()
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if let (Some(min), Some(max)) = (self.min, self.max)
            && min > max
        {
            return Err(ConfigError::Schema(format!(
                "{}: min {} is greater than max {}",
                self.key, min, max
            )));
        }

        let parses = match self.value_type {
            ValueType::String => true,
            ValueType::Int => self.default.trim().parse::<i64>().is_ok(),
            ValueType::Float => self.default.trim().parse::<f64>().is_ok(),
            ValueType::Bool => parse_bool(&self.default).is_some(),
        };
        if !parses {
            return Err(ConfigError::Schema(format!(
                "{}: default '{}' is not a valid {}",
                self.key, self.default, self.value_type
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ConfigVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigVariable")
            .field("key", &self.key)
            .field("default", &self.default)
            .field("value_type", &self.value_type)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("read_only", &self.read_only)
            .field("safemode", &self.safemode)
            .field("clamp_fn", &self.clamp_fn.is_some())
            .finish()
    }
}

/// Registry of declared variables, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    vars: BTreeMap<String, ConfigVariable>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable, replacing any earlier declaration of the same key.
    pub fn register(&mut self, var: ConfigVariable) -> &mut Self {
        self.vars.insert(var.key.clone(), var);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, var: ConfigVariable) -> Self {
        self.register(var);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigVariable> {
        self.vars.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigVariable> {
        self.vars.values()
    }

    /// Default value of every declared variable.
    pub fn defaults(&self) -> StringMap {
        self.vars
            .values()
            .map(|v| (v.key.clone(), v.default.clone()))
            .collect()
    }

    /// Values forced in safemode, for variables that declare one.
    pub fn safemode_values(&self) -> StringMap {
        self.vars
            .values()
            .filter_map(|v| v.safemode.clone().map(|s| (v.key.clone(), s)))
            .collect()
    }

    pub fn is_read_only(&self, key: &str) -> bool {
        self.vars.get(key).is_some_and(ConfigVariable::is_read_only)
    }

    /// Parse a YAML schema document.
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        let schema: SchemaFile = serde_yaml::from_str(text)?;
        let mut registry = Self::new();

        for (key, decl) in schema.variables {
            let default = scalar_to_string(&key, "default", &decl.default)?;
            let mut var = ConfigVariable::new(key.clone(), default)
                .description(decl.description)
                .value_type(decl.value_type)
                .read_only(decl.read_only);
            var.min = decl.min;
            var.max = decl.max;
            if let Some(ref safemode) = decl.safemode {
                var.safemode = Some(scalar_to_string(&key, "safemode", safemode)?);
            }

            var.validate()?;
            registry.register(var);
        }

        Ok(registry)
    }

    pub fn load_yaml_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_yaml(&text)
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    variables: BTreeMap<String, VariableDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariableDecl {
    default: serde_yaml::Value,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "type")]
    value_type: ValueType,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    safemode: Option<serde_yaml::Value>,
}

/// Render a YAML scalar the way it would appear in a config file.
fn scalar_to_string(key: &str, field: &str, value: &serde_yaml::Value) -> ConfigResult<String> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(ConfigError::Schema(format!(
            "{key}: {field} must be a scalar"
        ))),
    }
}
