//! Software adapters
//!
//! `ScpiEndpoint` implementations that do not touch hardware.

pub mod mock_adapter;

pub use mock_adapter::{MockCall, MockScpiAdapter};
