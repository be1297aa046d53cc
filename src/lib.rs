//! Core library for the rf_daq instrument drivers.
//!
//! SCPI drivers for the Anritsu MS464xB VectorStar network analyzers and the
//! Rohde & Schwarz FSV3000 spectrum analyzers. Each driver exposes named,
//! validated parameters that translate into SCPI commands on a shared
//! `ScpiEndpoint` (VISA in production, `MockScpiAdapter` in tests).
//!
//! ```no_run
//! use rf_daq::hardware::VisaAdapterBuilder;
//! use rf_daq::instrument::{RohdeSchwarzFsv3000, ScpiInstrument};
//! use std::sync::Arc;
//!
//! # async fn example() -> rf_daq::error::AppResult<()> {
//! let adapter = VisaAdapterBuilder::new("TCPIP0::192.168.1.21::hislip0::INSTR")
//!     .build()
//!     .await?;
//! let fsv = RohdeSchwarzFsv3000::connect("fsv", Arc::new(adapter)).await?;
//! fsv.parameter("center")?.set(2.4e9).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod hardware;
pub mod instrument;
pub mod observable;
pub mod parameter;
pub mod registry;
pub mod traits;
pub mod validators;
