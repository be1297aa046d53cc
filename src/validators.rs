//! Parameter validators
//!
//! A validator runs before any command is formatted, so a rejected value is
//! never sent to the instrument.

use crate::error::{AppResult, DaqError};
use crate::parameter::ParamValue;

/// Validation rule attached to a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Any real number in `[min, max]`
    Numbers {
        /// Minimum allowed value (inclusive)
        min: f64,
        /// Maximum allowed value (inclusive)
        max: f64,
    },
    /// Any integer in `[min, max]`
    Ints {
        /// Minimum allowed value (inclusive)
        min: i64,
        /// Maximum allowed value (inclusive)
        max: i64,
    },
    /// One of a fixed set of values
    Enum(Vec<ParamValue>),
    /// Any string
    Strings,
}

impl Validator {
    /// Real-number range validator
    pub fn numbers(min: f64, max: f64) -> Self {
        Validator::Numbers { min, max }
    }

    /// Integer range validator
    pub fn ints(min: i64, max: i64) -> Self {
        Validator::Ints { min, max }
    }

    /// Enumeration validator from anything convertible to `ParamValue`
    pub fn enumeration<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        Validator::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Enumeration of evenly spaced numbers `start, start + step, ..., <= stop`
    ///
    /// `Validator::stepped(0.0, 75.0, 5.0)` accepts 0, 5, 10, ..., 75.
    pub fn stepped(start: f64, stop: f64, step: f64) -> Self {
        if step <= 0.0 || stop < start {
            return Validator::Enum(vec![ParamValue::Float(start)]);
        }
        let count = ((stop - start) / step + 1e-9).floor() as usize + 1;
        Validator::Enum(
            (0..count)
                .map(|i| ParamValue::Float(start + i as f64 * step))
                .collect(),
        )
    }

    /// Check `value` for the parameter called `parameter`
    pub fn validate(&self, parameter: &str, value: &ParamValue) -> AppResult<()> {
        match self {
            Validator::Numbers { min, max } => {
                let number = value.as_f64().ok_or_else(|| DaqError::TypeMismatch {
                    parameter: parameter.to_string(),
                    value: value.to_string(),
                    expected: "number",
                })?;
                if number.is_nan() || number < *min || number > *max {
                    return Err(DaqError::OutOfRange {
                        parameter: parameter.to_string(),
                        value: value.to_string(),
                        min: ParamValue::Float(*min).to_string(),
                        max: ParamValue::Float(*max).to_string(),
                    });
                }
                Ok(())
            }

            Validator::Ints { min, max } => {
                let integer = value.as_i64().ok_or_else(|| DaqError::TypeMismatch {
                    parameter: parameter.to_string(),
                    value: value.to_string(),
                    expected: "integer",
                })?;
                if integer < *min || integer > *max {
                    return Err(DaqError::OutOfRange {
                        parameter: parameter.to_string(),
                        value: value.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                Ok(())
            }

            Validator::Enum(choices) => {
                if choices.iter().any(|choice| choice.loosely_equals(value)) {
                    Ok(())
                } else {
                    Err(DaqError::InvalidChoice {
                        parameter: parameter.to_string(),
                        value: value.to_string(),
                        allowed: self.describe(),
                    })
                }
            }

            Validator::Strings => match value {
                ParamValue::Str(_) => Ok(()),
                _ => Err(DaqError::TypeMismatch {
                    parameter: parameter.to_string(),
                    value: value.to_string(),
                    expected: "string",
                }),
            },
        }
    }

    /// Value to send for an accepted `value`
    ///
    /// For `Enum` this is the matching choice, so a near miss such as
    /// `10.000000001` goes out as `10`. Other validators pass `value` through.
    pub fn canonical(&self, value: &ParamValue) -> ParamValue {
        match self {
            Validator::Enum(choices) => choices
                .iter()
                .find(|choice| choice.loosely_equals(value))
                .cloned()
                .unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    }

    /// Human-readable rendering used in errors and snapshots
    pub fn describe(&self) -> String {
        match self {
            Validator::Numbers { min, max } => format!(
                "Numbers({}, {})",
                ParamValue::Float(*min),
                ParamValue::Float(*max)
            ),
            Validator::Ints { min, max } => format!("Ints({}, {})", min, max),
            Validator::Enum(choices) => {
                let items: Vec<String> = choices.iter().map(ToString::to_string).collect();
                format!("Enum({})", items.join(", "))
            }
            Validator::Strings => "Strings".to_string(),
        }
    }
}
