//! Hardware-agnostic traits
//!
//! Transport interface shared by every driver in the crate.

pub mod scpi_endpoint;

pub use self::scpi_endpoint::{with_deadline, ScpiEndpoint};
