//! Per-model frequency tables.
//!
//! Each driver family recognises a fixed set of `*IDN?` model strings; the
//! matching row seeds the frequency validators of every frequency parameter.

use crate::error::{AppResult, DaqError};
use serde::Serialize;

/// One supported model and its frequency coverage in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelRange {
    /// Model string as reported by `*IDN?`
    pub model: &'static str,
    /// Lowest supported frequency
    pub min_hz: f64,
    /// Highest supported frequency
    pub max_hz: f64,
}

/// Frequency bounds resolved for a connected instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyBounds {
    /// Lowest supported frequency (Hz)
    pub min_hz: f64,
    /// Highest supported frequency (Hz)
    pub max_hz: f64,
}

/// Rohde & Schwarz FSV3000 signal and spectrum analyzers.
pub const FSV3000_MODELS: &[ModelRange] = &[
    ModelRange { model: "FSV3004", min_hz: 10.0, max_hz: 4e9 },
    ModelRange { model: "FSV3007", min_hz: 10.0, max_hz: 7.5e9 },
    ModelRange { model: "FSV3013", min_hz: 10.0, max_hz: 13.6e9 },
    ModelRange { model: "FSV3030", min_hz: 10.0, max_hz: 30e9 },
    ModelRange { model: "FSV3044", min_hz: 10.0, max_hz: 44e9 },
];

/// Anritsu MS464xB VectorStar network analyzers.
pub const MS464XB_MODELS: &[ModelRange] = &[
    ModelRange { model: "MS4642B", min_hz: 10e6, max_hz: 20e9 },
    ModelRange { model: "MS4644B", min_hz: 10e6, max_hz: 40e9 },
    ModelRange { model: "MS4645B", min_hz: 10e6, max_hz: 50e9 },
    ModelRange { model: "MS4647B", min_hz: 10e6, max_hz: 70e9 },
];

/// Resolve `model` in `table`, failing with `UnsupportedModel`
pub fn lookup_model(family: &str, table: &[ModelRange], model: &str) -> AppResult<FrequencyBounds> {
    table
        .iter()
        .find(|row| row.model == model)
        .map(|row| FrequencyBounds {
            min_hz: row.min_hz,
            max_hz: row.max_hz,
        })
        .ok_or_else(|| DaqError::UnsupportedModel {
            family: family.to_string(),
            model: model.to_string(),
        })
}
