//! Hardware Communication Adapters
//!
//! VISA transport for physical instruments.

pub mod visa_adapter;

pub use visa_adapter::{VisaAdapter, VisaAdapterBuilder};
