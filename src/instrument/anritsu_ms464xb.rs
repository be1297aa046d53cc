//! Anritsu MS464xB VectorStar network analyzer driver
//!
//! Supported models: MS4642B, MS4644B, MS4645B, MS4647B.
//!
//! Instrument-level parameters are `options`, `trig_source` and `port_count`.
//! Sweep settings live on channels (see `Ms464xBChannel`), addressed as
//! `"<channel>.<parameter>"`, e.g. `"channel1.npts"`.

use super::ms464xb_channel::{validate_s_parameter, Ms464xBChannel, MAX_TRACES};
use super::{
    models::MS464XB_MODELS, split_path, unknown_path, InstrumentCore, InstrumentSnapshot,
    ScpiInstrument,
};
use crate::error::{AppResult, DaqError};
use crate::parameter::{ScpiParameter, ValueKind};
use crate::traits::ScpiEndpoint;
use crate::validators::Validator;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Driver family name used in errors and snapshots
pub const FAMILY: &str = "MS464xB";

/// Name of the channel created during `init`
pub const DEFAULT_CHANNEL: &str = "channel1";

/// How a new channel sets up its first trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelOptions {
    /// S-parameter to define as trace 1 (e.g. "S21")
    pub vna_parameter: Option<String>,
    /// Select this existing trace instead of defining one
    pub existing_trace_to_bind_to: Option<u32>,
}

impl ChannelOptions {
    /// Define trace 1 as `vna_parameter`
    pub fn measuring(vna_parameter: impl Into<String>) -> Self {
        Self {
            vna_parameter: Some(vna_parameter.into()),
            existing_trace_to_bind_to: None,
        }
    }

    /// Bind to existing trace `trace`
    pub fn bound_to(trace: u32) -> Self {
        Self {
            vna_parameter: None,
            existing_trace_to_bind_to: Some(trace),
        }
    }
}

/// MS464xB vector network analyzer
#[derive(Debug)]
pub struct AnritsuMs464xB {
    core: InstrumentCore,
    channels: Vec<Arc<Ms464xBChannel>>,
}

impl AnritsuMs464xB {
    /// Identify the analyzer, optionally reset it and create `channel1`
    ///
    /// With `init == false` the instrument state is left untouched and no
    /// channel is created.
    ///
    /// # Errors
    /// `UnsupportedModel` if `*IDN?` reports a model outside the MS464xB table.
    pub async fn connect(
        name: impl Into<String>,
        endpoint: Arc<dyn ScpiEndpoint>,
        init: bool,
    ) -> AppResult<Self> {
        let core = InstrumentCore::connect(name, endpoint, FAMILY, MS464XB_MODELS).await?;
        let mut vna = Self {
            core,
            channels: Vec::new(),
        };

        if init {
            info!("Resetting {} '{}'", FAMILY, vna.core.name());
            vna.core.endpoint().reset().await?;
            vna.add_channel(DEFAULT_CHANNEL, ChannelOptions::default())
                .await?;
        }

        let trig_source = ScpiParameter::builder("trig_source", vna.core.endpoint())
            .label("Trigger source")
            .get_cmd("TRIG:SOUR?")
            .set_cmd("TRIG:SOUR {value}")
            .kind(ValueKind::Str)
            .vals(Validator::enumeration(["AUTO", "MAN", "EXTT", "EXT", "REM"]))
            .build();
        vna.core.register(trig_source);

        let port_count = ScpiParameter::builder("port_count", vna.core.endpoint())
            .label("Number of ports")
            .get_cmd("SYST:PORT:COUN?")
            .kind(ValueKind::Int)
            .build();
        vna.core.register(port_count);

        Ok(vna)
    }

    /// Create the next channel and configure it for REIM sweeps
    ///
    /// # Errors
    /// - `Configuration` if a channel called `name` already exists
    /// - `InvalidChoice`/`OutOfRange` for a malformed S-parameter or trace
    pub async fn add_channel(
        &mut self,
        name: impl Into<String>,
        options: ChannelOptions,
    ) -> AppResult<Arc<Ms464xBChannel>> {
        let name = name.into();
        let channel = self.next_channel(name)?;

        // Check options before anything reaches the instrument
        let vna_parameter = match (&options.existing_trace_to_bind_to, &options.vna_parameter) {
            (Some(trace), _) if *trace == 0 || i64::from(*trace) > MAX_TRACES => {
                return Err(DaqError::OutOfRange {
                    parameter: "existing_trace_to_bind_to".to_string(),
                    value: trace.to_string(),
                    min: "1".to_string(),
                    max: MAX_TRACES.to_string(),
                });
            }
            (None, Some(parameter)) => Some(validate_s_parameter(parameter)?),
            _ => None,
        };

        let index = channel.index();
        let endpoint = self.core.endpoint();
        match index {
            1 => endpoint.write("DISP:SPL R1C1").await?,
            2 => endpoint.write("DISP:SPL R1C2").await?,
            _ => {}
        }

        let sense = channel.sense_prefix();
        let calc = channel.calc_prefix();
        endpoint.write(&format!("{}:SWE:TYPE LIN", sense)).await?;
        endpoint.write(&format!("{}:SWE:TIME:AUTO ON", sense)).await?;
        endpoint.write(&format!("{}:PAR:FORM REIM", calc)).await?;

        match (options.existing_trace_to_bind_to, vna_parameter) {
            (Some(trace), _) => channel.select_trace(trace).await?,
            (None, Some(parameter)) => channel.define_trace(1, &parameter).await?,
            (None, None) => {}
        }

        // Registered only once the instrument accepted the whole setup
        let channel = Arc::new(channel);
        self.channels.push(Arc::clone(&channel));
        debug!(
            "{} '{}' added channel '{}' ({})",
            FAMILY,
            self.core.name(),
            channel.name(),
            index
        );
        Ok(channel)
    }

    /// Bind the next channel number to `name` without touching the instrument
    ///
    /// Used to reattach to an analyzer that was configured in an earlier
    /// session; nothing is written.
    pub fn attach_channel(&mut self, name: impl Into<String>) -> AppResult<Arc<Ms464xBChannel>> {
        let channel = Arc::new(self.next_channel(name.into())?);
        self.channels.push(Arc::clone(&channel));
        debug!(
            "{} '{}' attached channel '{}' ({})",
            FAMILY,
            self.core.name(),
            channel.name(),
            channel.index()
        );
        Ok(channel)
    }

    fn next_channel(&self, name: String) -> AppResult<Ms464xBChannel> {
        if self.channel(&name).is_some() {
            return Err(DaqError::Configuration(format!(
                "{} '{}' already has a channel named '{}'",
                FAMILY,
                self.core.name(),
                name
            )));
        }
        let index = u32::try_from(self.channels.len() + 1)
            .map_err(|_| DaqError::Configuration("Too many channels".to_string()))?;
        Ok(Ms464xBChannel::new(
            name,
            index,
            self.core.endpoint(),
            self.core.bounds(),
        ))
    }

    /// Channels in creation order
    pub fn channels(&self) -> &[Arc<Ms464xBChannel>] {
        &self.channels
    }

    /// Look up a channel by name
    pub fn channel(&self, name: &str) -> Option<Arc<Ms464xBChannel>> {
        self.channels.iter().find(|c| c.name() == name).cloned()
    }

    /// Look up a channel by instrument channel number
    pub fn channel_by_index(&self, index: u32) -> Option<Arc<Ms464xBChannel>> {
        self.channels.iter().find(|c| c.index() == index).cloned()
    }

    /// Look up a channel by name or fail with `UnknownChannel`
    pub fn require_channel(&self, name: &str) -> AppResult<Arc<Ms464xBChannel>> {
        self.channel(name)
            .ok_or_else(|| DaqError::UnknownChannel(name.to_string()))
    }

    /// Trigger source
    pub fn trig_source(&self) -> AppResult<Arc<ScpiParameter>> {
        self.core.parameters().require("trig_source")
    }

    /// Number of test ports (read-only)
    pub fn port_count(&self) -> AppResult<Arc<ScpiParameter>> {
        self.core.parameters().require("port_count")
    }
}

#[async_trait]
impl ScpiInstrument for AnritsuMs464xB {
    fn core(&self) -> &InstrumentCore {
        &self.core
    }

    fn parameter(&self, path: &str) -> AppResult<Arc<ScpiParameter>> {
        match split_path(path) {
            Some((channel, member)) => self
                .channel(channel)
                .ok_or_else(|| unknown_path(path))?
                .parameter(member)
                .map_err(|_| unknown_path(path)),
            None => self.core.parameters().require(path),
        }
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .core
            .parameters()
            .names()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        for channel in &self.channels {
            names.extend(
                channel
                    .parameters()
                    .names()
                    .into_iter()
                    .map(|member| format!("{}.{}", channel.name(), member)),
            );
        }
        names
    }

    async fn snapshot(&self, update: bool) -> InstrumentSnapshot {
        let mut snapshot = self.core.snapshot(update).await;
        for channel in &self.channels {
            snapshot.channels.push(channel.snapshot(update).await);
        }
        snapshot
    }
}
