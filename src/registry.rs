//! Opening configured instruments
//!
//! Maps an `InstrumentDefinition` to a transport and a driver. The VISA path
//! needs the `instrument_visa` feature; any other `ScpiEndpoint` can be
//! plugged in through `open_with_endpoint`.

use crate::config::{DriverKind, InstrumentDefinition};
use crate::error::AppResult;
use crate::hardware::VisaAdapterBuilder;
use crate::instrument::{
    AnritsuMs464xB, ChannelOptions, ModelRange, DEFAULT_CHANNEL, RohdeSchwarzFsv3000, ScpiInstrument,
    FSV3000_MODELS, MS464XB_MODELS,
};
use crate::traits::ScpiEndpoint;
use std::sync::Arc;
use tracing::info;

/// How a driver treats the instrument state it finds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Honour `init` and set up every configured channel
    Configure,
    /// Write nothing; rebind configured channels to their channel numbers
    Attach,
}

/// Open a VISA session for `definition` and configure its driver
pub async fn open_instrument(definition: &InstrumentDefinition) -> AppResult<Box<dyn ScpiInstrument>> {
    open_instrument_as(definition, OpenMode::Configure).await
}

/// Open a VISA session for `definition` in `mode`
pub async fn open_instrument_as(
    definition: &InstrumentDefinition,
    mode: OpenMode,
) -> AppResult<Box<dyn ScpiInstrument>> {
    let adapter = VisaAdapterBuilder::new(definition.resource.clone())
        .with_timeout(definition.timeout())
        .build()
        .await?;
    open_with_endpoint_as(definition, Arc::new(adapter), mode).await
}

/// Construct and configure the driver for `definition` on an existing transport
///
/// Network analyzers get every configured channel that `init` did not
/// already create.
pub async fn open_with_endpoint(
    definition: &InstrumentDefinition,
    endpoint: Arc<dyn ScpiEndpoint>,
) -> AppResult<Box<dyn ScpiInstrument>> {
    open_with_endpoint_as(definition, endpoint, OpenMode::Configure).await
}

/// Construct the driver for `definition` on an existing transport
///
/// In `Attach` mode a network analyzer gets the same channel names and
/// numbers that `Configure` would have produced, but nothing is written.
pub async fn open_with_endpoint_as(
    definition: &InstrumentDefinition,
    endpoint: Arc<dyn ScpiEndpoint>,
    mode: OpenMode,
) -> AppResult<Box<dyn ScpiInstrument>> {
    info!(
        "Opening {} '{}' on {} ({:?})",
        definition.driver, definition.id, definition.resource, mode
    );

    match definition.driver {
        DriverKind::Fsv3000 => {
            let fsv = RohdeSchwarzFsv3000::connect(definition.id.clone(), endpoint).await?;
            Ok(Box::new(fsv))
        }
        DriverKind::Ms464xB => {
            let init = mode == OpenMode::Configure && definition.init;
            let mut vna = AnritsuMs464xB::connect(definition.id.clone(), endpoint, init).await?;
            if mode == OpenMode::Attach && definition.init {
                vna.attach_channel(DEFAULT_CHANNEL)?;
            }
            for channel in &definition.channels {
                if vna.channel(channel).is_some() {
                    continue;
                }
                match mode {
                    OpenMode::Configure => {
                        vna.add_channel(channel.clone(), ChannelOptions::default())
                            .await?;
                    }
                    OpenMode::Attach => {
                        vna.attach_channel(channel.clone())?;
                    }
                }
            }
            Ok(Box::new(vna))
        }
    }
}

/// Model table of a driver
pub fn models_for(driver: DriverKind) -> &'static [ModelRange] {
    match driver {
        DriverKind::Fsv3000 => FSV3000_MODELS,
        DriverKind::Ms464xB => MS464XB_MODELS,
    }
}

/// Every supported (driver, model) pair with its frequency range
pub fn supported_models() -> Vec<(DriverKind, ModelRange)> {
    [DriverKind::Fsv3000, DriverKind::Ms464xB]
        .into_iter()
        .flat_map(|driver| models_for(driver).iter().map(move |row| (driver, *row)))
        .collect()
}
