//! Measurement channel of an MS464xB network analyzer.
//!
//! Channel `n` owns the `SENS{n}` (sweep) and `CALC{n}` (trace) command
//! subtrees. Channels share the instrument's SCPI session.

use super::{ChannelSnapshot, FrequencyBounds};
use crate::error::{AppResult, DaqError};
use crate::parameter::{ParameterSet, ScpiParameter, ValMapping, ValueKind};
use crate::traits::ScpiEndpoint;
use crate::validators::Validator;
use num_complex::Complex64;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Most sweep points the VectorStar firmware accepts
pub const MAX_POINTS: i64 = 100_001;
/// Most traces per channel
pub const MAX_TRACES: i64 = 16;

/// Magnitude and phase of one swept trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepMagPhase {
    /// Linear magnitude (dimensionless)
    pub magnitude: Vec<f64>,
    /// Phase in radians
    pub phase_rad: Vec<f64>,
}

impl SweepMagPhase {
    /// Units of (magnitude, phase)
    pub const UNITS: (&'static str, &'static str) = ("", "rad");

    /// Number of sweep points
    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    /// Whether the sweep has no points
    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }
}

/// One VNA channel
pub struct Ms464xBChannel {
    name: String,
    index: u32,
    endpoint: Arc<dyn ScpiEndpoint>,
    parameters: ParameterSet,
}

impl std::fmt::Debug for Ms464xBChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ms464xBChannel")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl Ms464xBChannel {
    pub(crate) fn new(
        name: impl Into<String>,
        index: u32,
        endpoint: Arc<dyn ScpiEndpoint>,
        bounds: FrequencyBounds,
    ) -> Self {
        let mut parameters = ParameterSet::new();
        let frequency = Validator::numbers(bounds.min_hz, bounds.max_hz);

        for (param, label, header) in [
            ("start", "Start frequency", "FREQ:STAR"),
            ("stop", "Stop frequency", "FREQ:STOP"),
            ("center", "Center frequency", "FREQ:CENT"),
            ("span", "Frequency span", "FREQ:SPAN"),
        ] {
            parameters.register(
                ScpiParameter::builder(param, Arc::clone(&endpoint))
                    .label(label)
                    .unit("Hz")
                    .get_cmd(format!("SENS{}:{}?", index, header))
                    .set_cmd(format!("SENS{}:{} {{value}}", index, header))
                    .kind(ValueKind::Float)
                    .vals(frequency.clone())
                    .build(),
            );
        }

        parameters.register(
            ScpiParameter::builder("npts", Arc::clone(&endpoint))
                .label("Number of points")
                .get_cmd(format!("SENS{}:SWE:POIN?", index))
                .set_cmd(format!("SENS{}:SWE:POIN {{value}}", index))
                .kind(ValueKind::Int)
                .vals(Validator::ints(2, MAX_POINTS))
                .build(),
        );
        parameters.register(
            ScpiParameter::builder("bandwidth", Arc::clone(&endpoint))
                .label("IF bandwidth")
                .unit("Hz")
                .get_cmd(format!("SENS{}:BAND?", index))
                .set_cmd(format!("SENS{}:BAND {{value}}", index))
                .kind(ValueKind::Float)
                .vals(Validator::numbers(1.0, 1e6))
                .build(),
        );
        parameters.register(
            ScpiParameter::builder("avg", Arc::clone(&endpoint))
                .label("Averages")
                .get_cmd(format!("SENS{}:AVER:COUN?", index))
                .set_cmd(format!("SENS{}:AVER:COUN {{value}}", index))
                .kind(ValueKind::Int)
                .vals(Validator::ints(1, 1024))
                .build(),
        );
        parameters.register(
            ScpiParameter::builder("averaging", Arc::clone(&endpoint))
                .label("Averaging")
                .get_cmd(format!("SENS{}:AVER?", index))
                .set_cmd(format!("SENS{}:AVER {{value}}", index))
                .kind(ValueKind::Str)
                .val_mapping(ValMapping::new([("ON", 1), ("OFF", 0)]))
                .vals(Validator::enumeration(["ON", "OFF"]))
                .build(),
        );
        parameters.register(
            ScpiParameter::builder("sweep_type", Arc::clone(&endpoint))
                .label("Sweep type")
                .get_cmd(format!("SENS{}:SWE:TYPE?", index))
                .set_cmd(format!("SENS{}:SWE:TYPE {{value}}", index))
                .kind(ValueKind::Str)
                .vals(Validator::enumeration(["LIN", "LOG"]))
                .build(),
        );
        parameters.register(
            ScpiParameter::builder("trace_count", Arc::clone(&endpoint))
                .label("Number of traces")
                .get_cmd(format!("CALC{}:PAR:COUN?", index))
                .set_cmd(format!("CALC{}:PAR:COUN {{value}}", index))
                .kind(ValueKind::Int)
                .vals(Validator::ints(1, MAX_TRACES))
                .build(),
        );

        Self {
            name: name.into(),
            index,
            endpoint,
            parameters,
        }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instrument channel number (1-based)
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Command prefix of the sweep subtree, e.g. `SENS2`
    pub fn sense_prefix(&self) -> String {
        format!("SENS{}", self.index)
    }

    /// Command prefix of the trace subtree, e.g. `CALC2`
    pub fn calc_prefix(&self) -> String {
        format!("CALC{}", self.index)
    }

    /// Channel parameters
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Look up a channel parameter
    pub fn parameter(&self, name: &str) -> AppResult<Arc<ScpiParameter>> {
        self.parameters.require(name)
    }

    /// Last known trace count, tracked through the `trace_count` parameter
    pub fn trace_count(&self) -> Option<u32> {
        self.parameters
            .get("trace_count")
            .and_then(|p| p.cached())
            .and_then(|v| v.as_i64())
            .and_then(|n| u32::try_from(n).ok())
    }

    /// Set the number of traces on this channel
    pub async fn set_trace_count(&self, count: u32) -> AppResult<()> {
        self.parameter("trace_count")?.set(count).await
    }

    /// Define trace `trace` as S-parameter `vna_parameter` (e.g. "S21")
    pub async fn define_trace(&self, trace: u32, vna_parameter: &str) -> AppResult<()> {
        validate_trace(trace)?;
        let vna_parameter = validate_s_parameter(vna_parameter)?;
        self.endpoint
            .write(&format!("{}:PAR{}:DEF {}", self.calc_prefix(), trace, vna_parameter))
            .await
    }

    /// Make an existing trace the active one
    pub async fn select_trace(&self, trace: u32) -> AppResult<()> {
        validate_trace(trace)?;
        self.endpoint
            .write(&format!("{}:PAR{}:SEL", self.calc_prefix(), trace))
            .await
    }

    /// Read the active trace as magnitude and phase
    ///
    /// The channel is configured for REIM data at creation, so the response
    /// is a flat list of real/imaginary pairs.
    pub async fn mag_phase(&self) -> AppResult<SweepMagPhase> {
        let command = format!("{}:DATA:SDAT?", self.calc_prefix());
        let response = self.endpoint.query(&command).await?;
        let sweep = parse_reim(&command, &response)?;
        debug!("{} read {} points", self.name, sweep.len());
        Ok(sweep)
    }

    /// Snapshot of the channel parameters
    pub async fn snapshot(&self, update: bool) -> ChannelSnapshot {
        let parameters = self.parameters.snapshot(update).await;
        ChannelSnapshot {
            name: self.name.clone(),
            index: self.index,
            trace_count: self.trace_count(),
            parameters,
        }
    }
}

fn validate_trace(trace: u32) -> AppResult<()> {
    if trace == 0 || i64::from(trace) > MAX_TRACES {
        return Err(DaqError::OutOfRange {
            parameter: "trace".to_string(),
            value: trace.to_string(),
            min: "1".to_string(),
            max: MAX_TRACES.to_string(),
        });
    }
    Ok(())
}

/// Accept `Sij` with port numbers 1..=4, case-insensitive
pub(crate) fn validate_s_parameter(name: &str) -> AppResult<String> {
    let upper = name.trim().to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let valid = bytes.len() == 3
        && bytes[0] == b'S'
        && (b'1'..=b'4').contains(&bytes[1])
        && (b'1'..=b'4').contains(&bytes[2]);
    if valid {
        Ok(upper)
    } else {
        Err(DaqError::InvalidChoice {
            parameter: "vna_parameter".to_string(),
            value: name.to_string(),
            allowed: "S11..S44".to_string(),
        })
    }
}

/// Parse a REIM response into magnitude and phase
pub(crate) fn parse_reim(command: &str, response: &str) -> AppResult<SweepMagPhase> {
    let parse_error = || DaqError::ResponseParse {
        command: command.to_string(),
        response: response.to_string(),
    };

    let values = response
        .trim()
        .split(',')
        .filter(|item| !item.trim().is_empty())
        .map(|item| item.trim().parse::<f64>().map_err(|_| parse_error()))
        .collect::<AppResult<Vec<f64>>>()?;

    if values.len() % 2 != 0 {
        return Err(parse_error());
    }

    let (magnitude, phase_rad) = values
        .chunks_exact(2)
        .map(|pair| Complex64::new(pair[0], pair[1]).to_polar())
        .unzip();

    Ok(SweepMagPhase {
        magnitude,
        phase_rad,
    })
}
