//! SCPI-backed parameters
//!
//! A `ScpiParameter` binds a name to a get command, a set command template,
//! a validator and an optional value mapping. Values are exchanged lazily:
//! nothing is sent to the instrument until `get()` or `set()` is awaited.
//!
//! # Architecture
//!
//! ```text
//! ScpiParameter
//!   ├─ value: Observable<Option<CachedValue>>  (last known value, subscriptions)
//!   ├─ endpoint: Arc<dyn ScpiEndpoint>         (shared instrument session)
//!   ├─ get_cmd / set_cmd                       ("FREQ:STAR?" / "FREQ:STAR {value}")
//!   ├─ validator: Option<Validator>            (checked before every write)
//!   └─ val_mapping: Option<ValMapping>         (user value <-> instrument token)
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rf_daq::adapters::MockScpiAdapter;
//! use rf_daq::parameter::{ScpiParameter, ValueKind};
//! use rf_daq::validators::Validator;
//!
//! # async fn example() -> rf_daq::error::AppResult<()> {
//! let mock = MockScpiAdapter::new("MOCK");
//! let stop = ScpiParameter::builder("stop", Arc::new(mock.clone()))
//!     .label("Stop")
//!     .unit("Hz")
//!     .get_cmd("FREQ:STOP?")
//!     .set_cmd("FREQ:STOP {value}")
//!     .kind(ValueKind::Float)
//!     .vals(Validator::numbers(10.0, 4e9))
//!     .build();
//!
//! stop.set(3e9).await?;
//! assert_eq!(mock.writes(), vec!["FREQ:STOP 3000000000"]);
//! # Ok(())
//! # }
//! ```

use crate::error::{AppResult, DaqError};
use crate::observable::{Observable, ParameterMetadata};
use crate::traits::ScpiEndpoint;
use crate::validators::Validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Placeholder substituted by the formatted value in set templates.
pub const VALUE_PLACEHOLDER: &str = "value";

// =============================================================================
// ParamValue
// =============================================================================

/// Dynamically typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer value (point counts, port counts, gains)
    Int(i64),
    /// Real value (frequencies, attenuation)
    Float(f64),
    /// Token value (trigger sources, ON/OFF)
    Str(String),
    /// List of tokens (installed options)
    List(Vec<String>),
}

impl ParamValue {
    /// Numeric view of the value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value; integral floats convert
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Equality that compares numbers by value, so `Int(5)` equals `Float(5.0)`
    pub fn loosely_equals(&self, other: &ParamValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => {
                let scale = a.abs().max(b.abs()).max(1.0);
                (a - b).abs() <= 1e-9 * scale
            }
            _ => self == other,
        }
    }

    /// Interpret free text as the narrowest matching value
    ///
    /// Integers first, then reals, otherwise a token.
    pub fn parse_loose(text: &str) -> ParamValue {
        let text = text.trim();
        if let Ok(v) = text.parse::<i64>() {
            ParamValue::Int(v)
        } else if let Ok(v) = text.parse::<f64>() {
            ParamValue::Float(v)
        } else {
            ParamValue::Str(text.to_string())
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(s) => write!(f, "{}", s),
            ParamValue::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v)
    }
}

// =============================================================================
// ValueKind
// =============================================================================

/// How a raw response is turned into a `ParamValue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Real number, e.g. `3.000000000E+09`
    Float,
    /// Integer; SCPI real notation with an integral value is accepted
    Int,
    /// Token, surrounding quotes removed
    Str,
    /// Comma-separated tokens
    List,
}

impl ValueKind {
    /// Parse `response` (the answer to `command`)
    pub fn parse(self, command: &str, response: &str) -> AppResult<ParamValue> {
        let trimmed = response.trim();
        let parse_error = || DaqError::ResponseParse {
            command: command.to_string(),
            response: response.to_string(),
        };

        match self {
            ValueKind::Float => trimmed
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|_| parse_error()),
            ValueKind::Int => match trimmed.parse::<i64>() {
                Ok(v) => Ok(ParamValue::Int(v)),
                Err(_) => ParamValue::Float(trimmed.parse::<f64>().map_err(|_| parse_error())?)
                    .as_i64()
                    .map(ParamValue::Int)
                    .ok_or_else(parse_error),
            },
            ValueKind::Str => Ok(ParamValue::Str(unquote(trimmed).to_string())),
            ValueKind::List => Ok(ParamValue::List(split_list(trimmed))),
        }
    }
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// Split a comma-separated SCPI response into trimmed, unquoted, non-empty items
pub fn split_list(response: &str) -> Vec<String> {
    response
        .trim()
        .split(',')
        .map(unquote)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

// =============================================================================
// ValMapping
// =============================================================================

/// Bidirectional mapping between user values and instrument tokens
///
/// `ValMapping::new([("ON", 1), ("OFF", 0)])` sends `1` for `"ON"` and turns a
/// response of `1` (or `1.0`) back into `"ON"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValMapping {
    pairs: Vec<(ParamValue, ParamValue)>,
}

impl ValMapping {
    /// Build a mapping from (user, instrument) pairs
    pub fn new<I, U, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, R)>,
        U: Into<ParamValue>,
        R: Into<ParamValue>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(user, raw)| (user.into(), raw.into()))
                .collect(),
        }
    }

    /// Instrument value for a user value
    pub fn instrument_value(&self, value: &ParamValue) -> Option<&ParamValue> {
        self.pairs
            .iter()
            .find(|(user, _)| user.loosely_equals(value))
            .map(|(_, raw)| raw)
    }

    /// User value for an instrument response
    pub fn user_value(&self, response: &str) -> Option<&ParamValue> {
        let parsed = ParamValue::parse_loose(unquote(response));
        self.pairs
            .iter()
            .find(|(_, raw)| match (raw, &parsed) {
                (ParamValue::Str(a), ParamValue::Str(b)) => a.eq_ignore_ascii_case(b),
                _ => raw.loosely_equals(&parsed),
            })
            .map(|(user, _)| user)
    }

    /// User-side values, in declaration order
    pub fn user_values(&self) -> Vec<ParamValue> {
        self.pairs.iter().map(|(user, _)| user.clone()).collect()
    }
}

// =============================================================================
// ScpiParameter
// =============================================================================

/// Last value seen on a parameter with the time it was observed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedValue {
    /// The value in user units (after reverse mapping)
    pub value: ParamValue,
    /// When the value was read or written
    pub updated: DateTime<Utc>,
}

/// Snapshot entry for one parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    /// Parameter name
    pub name: String,
    /// Display label
    pub label: String,
    /// Units, empty when dimensionless
    pub unit: String,
    /// Last known value
    pub value: Option<ParamValue>,
    /// Time of the last known value
    pub ts: Option<DateTime<Utc>>,
    /// Rendered validator, if any
    pub vals: Option<String>,
    /// Whether the parameter can be set
    pub read_only: bool,
}

/// Parameter bound to an SCPI endpoint
pub struct ScpiParameter {
    value: Observable<Option<CachedValue>>,
    endpoint: Arc<dyn ScpiEndpoint>,
    get_cmd: Option<String>,
    set_cmd: Option<String>,
    kind: ValueKind,
    validator: Option<Validator>,
    val_mapping: Option<ValMapping>,
    constant: bool,
}

impl fmt::Debug for ScpiParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScpiParameter")
            .field("name", &self.name())
            .field("get_cmd", &self.get_cmd)
            .field("set_cmd", &self.set_cmd)
            .field("kind", &self.kind)
            .field("validator", &self.validator)
            .finish()
    }
}

impl ScpiParameter {
    /// Start building a parameter bound to `endpoint`
    pub fn builder(name: impl Into<String>, endpoint: Arc<dyn ScpiEndpoint>) -> ScpiParameterBuilder {
        ScpiParameterBuilder::new(name, endpoint)
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        self.value.name()
    }

    /// Parameter metadata (label, unit, read-only flag)
    pub fn metadata(&self) -> &ParameterMetadata {
        self.value.metadata()
    }

    /// Attached validator
    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    /// Whether `get()` talks to the instrument or answers from the cache
    pub fn is_gettable(&self) -> bool {
        self.constant || self.get_cmd.is_some()
    }

    /// Whether `set()` is allowed
    pub fn is_settable(&self) -> bool {
        !self.metadata().read_only
    }

    /// Query the instrument and return the (reverse-mapped) value
    pub async fn get(&self) -> AppResult<ParamValue> {
        if self.constant {
            return self
                .cached()
                .ok_or_else(|| DaqError::NotGettable(self.name().to_string()));
        }

        let cmd = self
            .get_cmd
            .as_deref()
            .ok_or_else(|| DaqError::NotGettable(self.name().to_string()))?;

        let response = self.endpoint.query(cmd).await?;
        let value = match &self.val_mapping {
            Some(mapping) => mapping
                .user_value(&response)
                .cloned()
                .ok_or_else(|| DaqError::ResponseParse {
                    command: cmd.to_string(),
                    response: response.clone(),
                })?,
            None => self.kind.parse(cmd, &response)?,
        };

        debug!("{} -> {}", self.name(), value);
        self.store(value.clone());
        Ok(value)
    }

    /// Validate, map, format and write a new value
    ///
    /// Nothing is sent when validation or mapping fails.
    pub async fn set(&self, value: impl Into<ParamValue>) -> AppResult<()> {
        let value = value.into();
        let template = match (&self.set_cmd, self.is_settable()) {
            (Some(template), true) => template,
            _ => return Err(DaqError::ReadOnly(self.name().to_string())),
        };

        let value = match &self.validator {
            Some(validator) => {
                validator.validate(self.name(), &value)?;
                validator.canonical(&value)
            }
            None => value,
        };

        let raw = match &self.val_mapping {
            Some(mapping) => mapping
                .instrument_value(&value)
                .cloned()
                .ok_or_else(|| DaqError::InvalidChoice {
                    parameter: self.name().to_string(),
                    value: value.to_string(),
                    allowed: Validator::Enum(mapping.user_values()).describe(),
                })?,
            None => value.clone(),
        };

        let command = format_command(template, &raw)?;
        self.endpoint.write(&command).await?;
        debug!("{} <- {} ({})", self.name(), value, command);

        self.store(value);
        Ok(())
    }

    /// Last value read or written, without I/O
    pub fn cached(&self) -> Option<ParamValue> {
        self.value.get().map(|cached| cached.value)
    }

    /// Subscribe to cache updates
    pub fn subscribe(&self) -> watch::Receiver<Option<CachedValue>> {
        self.value.subscribe()
    }

    /// Snapshot entry, optionally refreshing from the instrument first
    ///
    /// A failed refresh is logged and the cached value is reported instead.
    pub async fn snapshot(&self, update: bool) -> ParameterSnapshot {
        if update && !self.constant && self.get_cmd.is_some() {
            if let Err(e) = self.get().await {
                warn!("Snapshot refresh of '{}' failed: {}", self.name(), e);
            }
        }

        let cached = self.value.get();
        let metadata = self.metadata();
        ParameterSnapshot {
            name: metadata.name.clone(),
            label: metadata.label.clone(),
            unit: metadata.units.clone().unwrap_or_default(),
            value: cached.as_ref().map(|c| c.value.clone()),
            ts: cached.map(|c| c.updated),
            vals: self.validator.as_ref().map(Validator::describe),
            read_only: metadata.read_only,
        }
    }

    fn store(&self, value: ParamValue) {
        self.value.replace(Some(CachedValue {
            value,
            updated: Utc::now(),
        }));
    }
}

/// Substitute `{value}` in an SCPI set template
pub fn format_command(template: &str, value: &ParamValue) -> AppResult<String> {
    let mut vars = HashMap::new();
    vars.insert(VALUE_PLACEHOLDER.to_string(), value.to_string());
    strfmt::strfmt(template, &vars)
        .map_err(|e| DaqError::Configuration(format!("Bad command template '{}': {}", template, e)))
}

// =============================================================================
// Builder (Fluent API)
// =============================================================================

/// Builder for `ScpiParameter`
///
/// A parameter without `set_cmd` is read-only.
pub struct ScpiParameterBuilder {
    metadata: ParameterMetadata,
    endpoint: Arc<dyn ScpiEndpoint>,
    get_cmd: Option<String>,
    set_cmd: Option<String>,
    kind: ValueKind,
    validator: Option<Validator>,
    val_mapping: Option<ValMapping>,
    initial: Option<ParamValue>,
    constant: bool,
}

impl ScpiParameterBuilder {
    fn new(name: impl Into<String>, endpoint: Arc<dyn ScpiEndpoint>) -> Self {
        Self {
            metadata: ParameterMetadata::new(name),
            endpoint,
            get_cmd: None,
            set_cmd: None,
            kind: ValueKind::Float,
            validator: None,
            val_mapping: None,
            initial: None,
            constant: false,
        }
    }

    /// Display label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.metadata.label = label.into();
        self
    }

    /// Unit of measurement
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.metadata.units = Some(unit.into());
        self
    }

    /// Longer description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    /// Query sent by `get()`
    pub fn get_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.get_cmd = Some(cmd.into());
        self
    }

    /// Template sent by `set()`, with a `{value}` placeholder
    pub fn set_cmd(mut self, template: impl Into<String>) -> Self {
        self.set_cmd = Some(template.into());
        self
    }

    /// Response parsing rule (default `Float`)
    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Validator checked before every write
    pub fn vals(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// User value <-> instrument token mapping
    pub fn val_mapping(mut self, mapping: ValMapping) -> Self {
        self.val_mapping = Some(mapping);
        self
    }

    /// Read-only parameter whose value is fixed at construction
    ///
    /// `get()` answers from the cache and never queries the instrument.
    pub fn constant(mut self, value: impl Into<ParamValue>) -> Self {
        self.initial = Some(value.into());
        self.constant = true;
        self
    }

    /// Build the parameter
    pub fn build(mut self) -> ScpiParameter {
        if self.constant || self.set_cmd.is_none() {
            self.metadata.read_only = true;
        }

        let parameter = ScpiParameter {
            value: Observable::with_metadata(self.metadata, None),
            endpoint: self.endpoint,
            get_cmd: self.get_cmd,
            set_cmd: self.set_cmd,
            kind: self.kind,
            validator: self.validator,
            val_mapping: self.val_mapping,
            constant: self.constant,
        };

        if let Some(initial) = self.initial {
            parameter.store(initial);
        }

        parameter
    }
}

// =============================================================================
// ParameterSet
// =============================================================================

/// Ordered collection of parameters belonging to one instrument or channel
#[derive(Default)]
pub struct ParameterSet {
    parameters: Vec<Arc<ScpiParameter>>,
}

impl fmt::Debug for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSet")
            .field("names", &self.names())
            .finish()
    }
}

impl ParameterSet {
    /// Create a new empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter, replacing any previous one with the same name
    pub fn register(&mut self, parameter: ScpiParameter) -> Arc<ScpiParameter> {
        let parameter = Arc::new(parameter);
        if let Some(slot) = self
            .parameters
            .iter_mut()
            .find(|p| p.name() == parameter.name())
        {
            warn!("Replacing already registered parameter '{}'", parameter.name());
            *slot = Arc::clone(&parameter);
        } else {
            self.parameters.push(Arc::clone(&parameter));
        }
        parameter
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<Arc<ScpiParameter>> {
        self.parameters.iter().find(|p| p.name() == name).cloned()
    }

    /// Look up a parameter by name or fail with `UnknownParameter`
    pub fn require(&self, name: &str) -> AppResult<Arc<ScpiParameter>> {
        self.get(name)
            .ok_or_else(|| DaqError::UnknownParameter(name.to_string()))
    }

    /// Whether a parameter is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name() == name)
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name()).collect()
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ScpiParameter>> {
        self.parameters.iter()
    }

    /// Number of registered parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Snapshot of every parameter, keyed by name
    pub async fn snapshot(&self, update: bool) -> BTreeMap<String, ParameterSnapshot> {
        let mut out = BTreeMap::new();
        for parameter in &self.parameters {
            out.insert(parameter.name().to_string(), parameter.snapshot(update).await);
        }
        out
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockScpiAdapter;

    fn endpoint(mock: &MockScpiAdapter) -> Arc<dyn ScpiEndpoint> {
        Arc::new(mock.clone())
    }

    #[test]
    fn test_param_value_display() {
        assert_eq!(ParamValue::Float(3e9).to_string(), "3000000000");
        assert_eq!(ParamValue::Float(7.5).to_string(), "7.5");
        assert_eq!(ParamValue::Int(201).to_string(), "201");
        assert_eq!(ParamValue::from("MAN").to_string(), "MAN");
        assert_eq!(
            ParamValue::List(vec!["B24".into(), "B25".into()]).to_string(),
            "B24,B25"
        );
    }

    #[test]
    fn test_parse_loose() {
        assert_eq!(ParamValue::parse_loose("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::parse_loose(" 1.5E+09 "), ParamValue::Float(1.5e9));
        assert_eq!(ParamValue::parse_loose("EXT"), ParamValue::from("EXT"));
    }

    #[test]
    fn test_value_kind_parse() {
        assert_eq!(
            ValueKind::Float.parse("FREQ:STAR?", "1.000000000E+07\n").unwrap(),
            ParamValue::Float(1e7)
        );
        assert_eq!(
            ValueKind::Int.parse("SYST:PORT:COUN?", "+4.00000E+00").unwrap(),
            ParamValue::Int(4)
        );
        assert!(ValueKind::Int.parse("SYST:PORT:COUN?", "4.5").is_err());
        assert_eq!(
            ValueKind::Str.parse("TRIG:SOUR?", "\"AUTO\"").unwrap(),
            ParamValue::from("AUTO")
        );
        assert!(matches!(
            ValueKind::Float.parse("FREQ:STAR?", "nope"),
            Err(DaqError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" B24, B25 ,\"K54\",,\n"), vec!["B24", "B25", "K54"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_val_mapping() {
        let mapping = ValMapping::new([("ON", 1), ("OFF", 0)]);
        assert_eq!(mapping.instrument_value(&"ON".into()), Some(&ParamValue::Int(1)));
        assert_eq!(mapping.instrument_value(&"MAYBE".into()), None);
        assert_eq!(mapping.user_value("0\n"), Some(&ParamValue::from("OFF")));
        assert_eq!(mapping.user_value("1.0"), Some(&ParamValue::from("ON")));
        assert_eq!(mapping.user_value("2"), None);
    }

    #[test]
    fn test_format_command() {
        assert_eq!(
            format_command("INP:ATT {value}dB", &ParamValue::Int(5)).unwrap(),
            "INP:ATT 5dB"
        );
        assert!(format_command("INP:ATT {val}", &ParamValue::Int(5)).is_err());
    }

    #[tokio::test]
    async fn test_parameter_set_and_get() {
        let mock = MockScpiAdapter::new("MOCK");
        let param = ScpiParameter::builder("stop", endpoint(&mock))
            .get_cmd("FREQ:STOP?")
            .set_cmd("FREQ:STOP {value}")
            .vals(Validator::numbers(10.0, 4e9))
            .build();

        assert_eq!(param.validator(), Some(&Validator::numbers(10.0, 4e9)));
        param.set(3e9).await.unwrap();
        assert_eq!(mock.writes(), vec!["FREQ:STOP 3000000000"]);
        assert_eq!(param.cached(), Some(ParamValue::Float(3e9)));

        assert_eq!(param.get().await.unwrap(), ParamValue::Float(3e9));
        assert_eq!(mock.queries(), vec!["FREQ:STOP?"]);
    }

    #[tokio::test]
    async fn test_parameter_rejects_before_write() {
        let mock = MockScpiAdapter::new("MOCK");
        let param = ScpiParameter::builder("stop", endpoint(&mock))
            .set_cmd("FREQ:STOP {value}")
            .vals(Validator::numbers(10.0, 4e9))
            .build();

        assert!(param.set(5e9).await.is_err());
        assert!(mock.call_log().is_empty());
        assert_eq!(param.cached(), None);
    }

    #[tokio::test]
    async fn test_parameter_read_only() {
        let mock = MockScpiAdapter::new("MOCK").with_response("SYST:PORT:COUN?", "4");
        let param = ScpiParameter::builder("port_count", endpoint(&mock))
            .get_cmd("SYST:PORT:COUN?")
            .kind(ValueKind::Int)
            .build();

        assert!(param.metadata().read_only);
        assert!(param.is_gettable());
        assert!(!param.is_settable());
        assert!(matches!(param.set(2).await, Err(DaqError::ReadOnly(_))));
        assert_eq!(param.get().await.unwrap(), ParamValue::Int(4));
    }

    #[tokio::test]
    async fn test_parameter_not_gettable() {
        let mock = MockScpiAdapter::new("MOCK");
        let param = ScpiParameter::builder("marker", endpoint(&mock))
            .set_cmd("CALC:MARK {value}")
            .build();
        assert!(!param.is_gettable());
        assert!(param.is_settable());
        assert!(param.validator().is_none());
        assert!(matches!(param.get().await, Err(DaqError::NotGettable(_))));
    }

    #[tokio::test]
    async fn test_parameter_mapping_roundtrip() {
        let mock = MockScpiAdapter::new("MOCK");
        let param = ScpiParameter::builder("preamp", endpoint(&mock))
            .get_cmd("INP:GAIN:STAT?")
            .set_cmd("INP:GAIN:STAT {value}")
            .kind(ValueKind::Str)
            .val_mapping(ValMapping::new([("ON", 1), ("OFF", 0)]))
            .vals(Validator::enumeration(["ON", "OFF"]))
            .build();

        param.set("ON").await.unwrap();
        assert_eq!(mock.writes(), vec!["INP:GAIN:STAT 1"]);
        assert_eq!(param.get().await.unwrap(), ParamValue::from("ON"));
    }

    #[tokio::test]
    async fn test_constant_parameter() {
        let mock = MockScpiAdapter::new("MOCK");
        let param = ScpiParameter::builder("options", endpoint(&mock))
            .kind(ValueKind::List)
            .constant(vec!["B24".to_string()])
            .build();

        assert_eq!(
            param.get().await.unwrap(),
            ParamValue::List(vec!["B24".to_string()])
        );
        assert!(param.set(vec!["B25".to_string()]).await.is_err());
        assert!(mock.call_log().is_empty());
    }

    #[tokio::test]
    async fn test_parameter_subscription() {
        let mock = MockScpiAdapter::new("MOCK");
        let param = ScpiParameter::builder("npts", endpoint(&mock))
            .set_cmd("SENS1:SWE:POIN {value}")
            .kind(ValueKind::Int)
            .build();
        let mut rx = param.subscribe();

        param.set(401).await.unwrap();
        rx.changed().await.unwrap();
        let cached = rx.borrow().clone().unwrap();
        assert_eq!(cached.value, ParamValue::Int(401));
    }

    #[tokio::test]
    async fn test_parameter_set_snapshot() {
        let mock = MockScpiAdapter::new("MOCK").with_response("FREQ:CENT?", "1000000");
        let mut set = ParameterSet::new();
        set.register(
            ScpiParameter::builder("center", endpoint(&mock))
                .label("Center")
                .unit("Hz")
                .get_cmd("FREQ:CENT?")
                .set_cmd("FREQ:CENT {value}")
                .build(),
        );
        set.register(
            ScpiParameter::builder("broken", endpoint(&mock))
                .get_cmd("NOPE?")
                .build(),
        );

        assert_eq!(set.names(), vec!["center", "broken"]);
        assert!(set.require("missing").is_err());

        let snapshot = set.snapshot(true).await;
        assert_eq!(snapshot["center"].value, Some(ParamValue::Float(1e6)));
        assert_eq!(snapshot["center"].unit, "Hz");
        assert_eq!(snapshot["broken"].value, None);
    }

    #[tokio::test]
    async fn test_register_replaces_duplicate() {
        let mock = MockScpiAdapter::new("MOCK");
        let mut set = ParameterSet::new();
        set.register(ScpiParameter::builder("span", endpoint(&mock)).label("A").build());
        set.register(ScpiParameter::builder("span", endpoint(&mock)).label("B").build());
        assert_eq!(set.len(), 1);
        assert_eq!(set.require("span").unwrap().metadata().label, "B");
    }
}
