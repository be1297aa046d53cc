//! Instrument drivers.
//!
//! Every driver is built on an `InstrumentCore`: the shared SCPI session, the
//! parsed `*IDN?` identity, the `*OPT?` option list, the model's frequency
//! bounds and a `ParameterSet`. Construction follows the same sequence for
//! every family:
//!
//! 1. `*IDN?`, model looked up in the family table (unknown model fails)
//! 2. `*OPT?`, split into option codes
//! 3. driver-specific setup and parameter registration
//!
//! Drivers are used through the `ScpiInstrument` trait so that the CLI and
//! registry can handle any family uniformly.

pub mod anritsu_ms464xb;
pub mod models;
pub mod ms464xb_channel;
pub mod rohde_schwarz_fsv3000;

pub use anritsu_ms464xb::{AnritsuMs464xB, ChannelOptions, DEFAULT_CHANNEL};
pub use models::{lookup_model, FrequencyBounds, ModelRange, FSV3000_MODELS, MS464XB_MODELS};
pub use ms464xb_channel::{Ms464xBChannel, SweepMagPhase};
pub use rohde_schwarz_fsv3000::RohdeSchwarzFsv3000;

use crate::error::{AppResult, DaqError};
use crate::parameter::{split_list, ParameterSet, ParameterSnapshot, ScpiParameter, ValueKind};
use crate::traits::ScpiEndpoint;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Identity fields parsed from `*IDN?`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdnInfo {
    /// Manufacturer
    pub vendor: Option<String>,
    /// Model string, matched against the family table
    pub model: Option<String>,
    /// Serial number
    pub serial: Option<String>,
    /// Firmware revision
    pub firmware: Option<String>,
}

impl IdnInfo {
    /// Parse an `*IDN?` response
    ///
    /// Fields are separated by the first of `,`, `;` or `:` present in the
    /// response and trimmed; missing or empty fields are `None`.
    pub fn parse(response: &str) -> Self {
        let response = response.trim();
        let separator = [',', ';', ':']
            .into_iter()
            .find(|sep| response.contains(*sep));

        let mut parts: Vec<Option<String>> = match separator {
            Some(sep) => response.splitn(4, sep).map(non_empty).collect(),
            None => vec![non_empty(response)],
        };
        parts.resize(4, None);

        let mut parts = parts.into_iter();
        Self {
            vendor: parts.next().flatten(),
            model: parts.next().flatten(),
            serial: parts.next().flatten(),
            firmware: parts.next().flatten(),
        }
    }
}

fn non_empty(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_string())
}

/// Snapshot of one instrument (and its channels)
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentSnapshot {
    /// Instrument name
    pub name: String,
    /// Driver family
    pub family: &'static str,
    /// Transport resource
    pub resource: String,
    /// Parsed identity
    pub idn: IdnInfo,
    /// Installed options
    pub options: Vec<String>,
    /// Frequency coverage of the model
    pub frequency_bounds: FrequencyBounds,
    /// Instrument-level parameters
    pub parameters: BTreeMap<String, ParameterSnapshot>,
    /// Channel submodules (network analyzers only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelSnapshot>,
}

/// Snapshot of one analyzer channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSnapshot {
    /// Channel name
    pub name: String,
    /// Instrument channel number (1-based)
    pub index: u32,
    /// Trace count, if known
    pub trace_count: Option<u32>,
    /// Channel parameters
    pub parameters: BTreeMap<String, ParameterSnapshot>,
}

/// State shared by every driver
pub struct InstrumentCore {
    name: String,
    family: &'static str,
    endpoint: Arc<dyn ScpiEndpoint>,
    idn: IdnInfo,
    options: Vec<String>,
    bounds: FrequencyBounds,
    parameters: ParameterSet,
}

impl std::fmt::Debug for InstrumentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentCore")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("resource", &self.endpoint.resource_name())
            .field("idn", &self.idn)
            .field("options", &self.options)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl InstrumentCore {
    /// Identify the instrument, check its model and read its options
    ///
    /// # Errors
    /// - `UnsupportedModel` when the `*IDN?` model is not in `table`
    /// - transport errors from either query
    pub async fn connect(
        name: impl Into<String>,
        endpoint: Arc<dyn ScpiEndpoint>,
        family: &'static str,
        table: &[ModelRange],
    ) -> AppResult<Self> {
        let name = name.into();
        let idn = IdnInfo::parse(&endpoint.identify().await?);
        let model = idn.model.clone().unwrap_or_default();
        let bounds = models::lookup_model(family, table, &model)?;

        info!(
            "{} '{}' on {} identified as {} ({} Hz - {} Hz)",
            family,
            name,
            endpoint.resource_name(),
            model,
            bounds.min_hz,
            bounds.max_hz
        );

        let options = split_list(&endpoint.query_options().await?);
        if options.is_empty() {
            warn!("{} '{}' reports no installed options", family, name);
        }

        let mut core = Self {
            name,
            family,
            endpoint,
            idn,
            options,
            bounds,
            parameters: ParameterSet::new(),
        };

        let options_param = ScpiParameter::builder("options", core.endpoint())
            .label("Options")
            .description("(ReadOnly) List of installed options.")
            .kind(ValueKind::List)
            .constant(core.options.clone())
            .build();
        core.parameters.register(options_param);

        Ok(core)
    }

    /// Instrument name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver family name
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Shared SCPI session
    pub fn endpoint(&self) -> Arc<dyn ScpiEndpoint> {
        Arc::clone(&self.endpoint)
    }

    /// Parsed identity
    pub fn idn(&self) -> &IdnInfo {
        &self.idn
    }

    /// Model string (always present after a successful connect)
    pub fn model(&self) -> &str {
        self.idn.model.as_deref().unwrap_or_default()
    }

    /// Installed option codes
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Whether option `code` (e.g. "B24") is installed
    pub fn has_option(&self, code: &str) -> bool {
        self.options.iter().any(|o| o == code)
    }

    /// Frequency bounds of the model
    pub fn bounds(&self) -> FrequencyBounds {
        self.bounds
    }

    /// Instrument-level parameters
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Register an instrument-level parameter
    pub fn register(&mut self, parameter: ScpiParameter) -> Arc<ScpiParameter> {
        self.parameters.register(parameter)
    }

    /// Snapshot without channels
    pub async fn snapshot(&self, update: bool) -> InstrumentSnapshot {
        InstrumentSnapshot {
            name: self.name.clone(),
            family: self.family,
            resource: self.endpoint.resource_name().to_string(),
            idn: self.idn.clone(),
            options: self.options.clone(),
            frequency_bounds: self.bounds,
            parameters: self.parameters.snapshot(update).await,
            channels: Vec::new(),
        }
    }
}

/// Uniform access to any driver in the crate
#[async_trait]
pub trait ScpiInstrument: Send + Sync {
    /// Shared driver state
    fn core(&self) -> &InstrumentCore;

    /// Instrument name
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Parsed identity
    fn idn(&self) -> &IdnInfo {
        self.core().idn()
    }

    /// Installed option codes
    fn options(&self) -> &[String] {
        self.core().options()
    }

    /// Frequency bounds of the model
    fn frequency_bounds(&self) -> FrequencyBounds {
        self.core().bounds()
    }

    /// Look up a parameter by path
    ///
    /// Plain names address instrument parameters; drivers with channels also
    /// accept `"<channel>.<parameter>"`.
    fn parameter(&self, path: &str) -> AppResult<Arc<ScpiParameter>> {
        self.core().parameters().require(path)
    }

    /// Every addressable parameter path
    fn parameter_names(&self) -> Vec<String> {
        self.core()
            .parameters()
            .names()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Reset the instrument to factory defaults (*RST)
    async fn reset(&self) -> AppResult<()> {
        self.core().endpoint().reset().await
    }

    /// Snapshot of all parameters, refreshed from hardware when `update`
    async fn snapshot(&self, update: bool) -> InstrumentSnapshot {
        self.core().snapshot(update).await
    }
}

/// Split `"channel1.start"` into `("channel1", "start")`
pub(crate) fn split_path(path: &str) -> Option<(&str, &str)> {
    path.split_once('.')
        .filter(|(module, member)| !module.is_empty() && !member.is_empty())
}

/// `UnknownParameter` for a dotted path whose first segment matched nothing
pub(crate) fn unknown_path(path: &str) -> DaqError {
    DaqError::UnknownParameter(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockScpiAdapter;
    use tracing_test::traced_test;

    #[test]
    fn test_idn_parse_full() {
        let idn = IdnInfo::parse("Rohde&Schwarz,FSV3044,1330.5000K44/101234,1.50\n");
        assert_eq!(idn.vendor.as_deref(), Some("Rohde&Schwarz"));
        assert_eq!(idn.model.as_deref(), Some("FSV3044"));
        assert_eq!(idn.serial.as_deref(), Some("1330.5000K44/101234"));
        assert_eq!(idn.firmware.as_deref(), Some("1.50"));
    }

    #[test]
    fn test_idn_parse_partial() {
        let idn = IdnInfo::parse("ANRITSU, MS4642B");
        assert_eq!(idn.vendor.as_deref(), Some("ANRITSU"));
        assert_eq!(idn.model.as_deref(), Some("MS4642B"));
        assert_eq!(idn.serial, None);
        assert_eq!(idn.firmware, None);

        assert_eq!(IdnInfo::parse(""), IdnInfo::default());
    }

    #[test]
    fn test_idn_firmware_keeps_separators() {
        let idn = IdnInfo::parse("ACME,X1,SN1,V1.2,build 7");
        assert_eq!(idn.firmware.as_deref(), Some("V1.2,build 7"));
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("channel1.start"), Some(("channel1", "start")));
        assert_eq!(split_path("start"), None);
        assert_eq!(split_path(".start"), None);
    }

    #[tokio::test]
    async fn test_core_connect() {
        let mock = MockScpiAdapter::new("MOCK")
            .with_response("*IDN?", "Rohde&Schwarz,FSV3007,1,1.0")
            .with_response("*OPT?", "B24, B25");
        let core = InstrumentCore::connect("fsv", Arc::new(mock.clone()), "FSV3000", FSV3000_MODELS)
            .await
            .unwrap();

        assert_eq!(core.model(), "FSV3007");
        assert_eq!(core.bounds().max_hz, 7.5e9);
        assert!(core.has_option("B25"));
        assert!(!core.has_option("B4"));
        assert_eq!(mock.queries(), vec!["*IDN?", "*OPT?"]);
        assert_eq!(core.parameters().names(), vec!["options"]);
    }

    #[tokio::test]
    async fn test_core_rejects_unknown_model_before_options() {
        let mock = MockScpiAdapter::new("MOCK")
            .with_response("*IDN?", "Rohde&Schwarz,FSW43,1,1.0")
            .with_response("*OPT?", "");
        let err = InstrumentCore::connect("fsv", Arc::new(mock.clone()), "FSV3000", FSV3000_MODELS)
            .await
            .unwrap_err();

        assert!(matches!(err, DaqError::UnsupportedModel { .. }));
        assert_eq!(mock.queries(), vec!["*IDN?"]);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_core_warns_on_empty_options() {
        let mock = MockScpiAdapter::new("MOCK")
            .with_response("*IDN?", "ANRITSU,MS4642B,1,V1")
            .with_response("*OPT?", "\n");
        let core = InstrumentCore::connect("vna", Arc::new(mock), "MS464xB", MS464XB_MODELS)
            .await
            .unwrap();

        assert!(core.options().is_empty());
        assert!(logs_contain("reports no installed options"));
    }
}
