//! VISA Hardware Adapter
//!
//! Builder-based VISA adapter for SCPI instruments over GPIB, USB or LAN
//! (VXI-11 / HiSLIP). Wraps the `visa-rs` library; the VISA calls are
//! blocking, so every exchange runs on Tokio's blocking pool.
//!
//! Supports resource strings like:
//! - "GPIB0::1::INSTR" (GPIB interface)
//! - "USB0::0x0B5B::0xFFF9::1234567::INSTR" (USB)
//! - "TCPIP::192.168.88.15::hislip0::INSTR" (Ethernet/HiSLIP)

use crate::error::{AppResult, DaqError};
use crate::traits::ScpiEndpoint;
use async_trait::async_trait;
use std::time::Duration;

#[cfg(feature = "instrument_visa")]
use crate::traits::with_deadline;
#[cfg(feature = "instrument_visa")]
use std::sync::Arc;
#[cfg(feature = "instrument_visa")]
use tokio::sync::Mutex;
#[cfg(feature = "instrument_visa")]
use tracing::{debug, info};
#[cfg(feature = "instrument_visa")]
use visa_rs::prelude::*;
#[cfg(feature = "instrument_visa")]
use visa_rs::{attribute::AttrTmoValue, HasAttribute};

/// Slack on top of the session timeout before the async deadline fires
///
/// The session's own timeout normally expires first; the deadline only
/// catches a VISA call that never returns.
pub const DEADLINE_MARGIN: Duration = Duration::from_secs(1);

/// Builder for constructing `VisaAdapter` with custom configuration
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use rf_daq::hardware::VisaAdapterBuilder;
///
/// # async fn example() -> rf_daq::error::AppResult<()> {
/// let adapter = VisaAdapterBuilder::new("TCPIP::192.168.88.15::hislip0::INSTR")
///     .with_timeout(Duration::from_millis(2000))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct VisaAdapterBuilder {
    resource_name: String,
    timeout: Duration,
    read_terminator: String,
    write_terminator: String,
}

impl VisaAdapterBuilder {
    /// Create a new builder with resource name
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            timeout: Duration::from_secs(5),
            read_terminator: "\n".to_string(),
            write_terminator: "\n".to_string(),
        }
    }

    /// Set timeout for VISA exchanges
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set read terminator character(s)
    pub fn with_read_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.read_terminator = terminator.into();
        self
    }

    /// Set write terminator character(s)
    pub fn with_write_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.write_terminator = terminator.into();
        self
    }

    /// Open the VISA session
    ///
    /// # Errors
    /// Returns error if the VISA resource manager or resource cannot be opened
    #[cfg(feature = "instrument_visa")]
    pub async fn build(self) -> AppResult<VisaAdapter> {
        let resource = self.resource_name.clone();
        let timeout = self.timeout;
        let instrument = tokio::task::spawn_blocking(move || open_resource(&resource, timeout))
            .await
            .map_err(|e| DaqError::Transport(format!("VISA open task panicked: {}", e)))??;

        info!(
            "VISA resource '{}' opened with {}ms timeout",
            self.resource_name,
            self.timeout.as_millis()
        );

        Ok(VisaAdapter {
            inner: Arc::new(Mutex::new(instrument)),
            resource_name: self.resource_name,
            timeout: self.timeout,
            read_terminator: self.read_terminator,
            write_terminator: self.write_terminator,
        })
    }

    /// VISA support not compiled in
    #[cfg(not(feature = "instrument_visa"))]
    pub async fn build(self) -> AppResult<VisaAdapter> {
        Err(DaqError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    /// Resource name the builder will open
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Timeout the built adapter will use
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(feature = "instrument_visa")]
fn open_resource(resource: &str, timeout: Duration) -> AppResult<Instrument> {
    let rm = DefaultRM::new()
        .map_err(|e| DaqError::Transport(format!("Failed to create VISA resource manager: {}", e)))?;
    let c_string = std::ffi::CString::new(resource)
        .map_err(|e| DaqError::Transport(format!("Invalid VISA resource '{}': {}", resource, e)))?;
    let visa_string = visa_rs::VisaString::from(c_string);
    let instrument = rm
        .open(&visa_string, AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
        .map_err(|e| DaqError::Transport(format!("Failed to open VISA resource '{}': {}", resource, e)))?;

    // Session I/O timeout (VI_ATTR_TMO_VALUE), in milliseconds
    let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
    let attribute = AttrTmoValue::new_checked(timeout_ms).ok_or_else(|| {
        DaqError::Transport(format!("Invalid VISA timeout {}ms for '{}'", timeout_ms, resource))
    })?;
    instrument.set_attr(attribute).map_err(|e| {
        DaqError::Transport(format!(
            "Failed to set VISA timeout to {}ms on '{}': {}",
            timeout_ms, resource, e
        ))
    })?;

    Ok(instrument)
}

/// Map a session I/O error, keeping VISA timeouts distinct from other failures
#[cfg_attr(not(feature = "instrument_visa"), allow(dead_code))]
fn io_error(command: &str, timeout: Duration, direction: &str, err: std::io::Error) -> DaqError {
    if err.kind() == std::io::ErrorKind::TimedOut {
        DaqError::Timeout {
            command: command.to_string(),
            timeout,
        }
    } else {
        DaqError::Transport(format!("VISA {} failed for '{}': {}", direction, command, err))
    }
}

/// VISA adapter for SCPI instruments
///
/// One session per adapter; exchanges are serialized by an internal mutex.
/// Share the adapter as `Arc<dyn ScpiEndpoint>`.
pub struct VisaAdapter {
    #[cfg(feature = "instrument_visa")]
    inner: Arc<Mutex<Instrument>>,
    resource_name: String,
    timeout: Duration,
    #[cfg_attr(not(feature = "instrument_visa"), allow(dead_code))]
    read_terminator: String,
    #[cfg_attr(not(feature = "instrument_visa"), allow(dead_code))]
    write_terminator: String,
}

impl VisaAdapter {
    /// Get current timeout setting
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(feature = "instrument_visa")]
    async fn exchange(&self, cmd: &str, expect_response: bool) -> AppResult<Option<String>> {
        use std::io::{BufRead, BufReader, Write};

        let instrument = Arc::clone(&self.inner);
        let payload = format!("{}{}", cmd, self.write_terminator);
        let command = cmd.to_string();
        let read_terminator = self.read_terminator.clone();
        let timeout = self.timeout;

        let task = tokio::task::spawn_blocking(move || {
            let guard = instrument.blocking_lock();
            let mut session: &Instrument = &guard;
            session
                .write_all(payload.as_bytes())
                .map_err(|e| io_error(&command, timeout, "write", e))?;

            if !expect_response {
                return Ok(None);
            }

            let mut reader = BufReader::new(session);
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .map_err(|e| io_error(&command, timeout, "read", e))?;

            Ok(Some(
                line.trim_end_matches('\0')
                    .trim_end_matches(read_terminator.as_str())
                    .trim()
                    .to_string(),
            ))
        });

        let joined = async {
            task.await
                .map_err(|e| DaqError::Transport(format!("VISA I/O task panicked: {}", e)))?
        };
        with_deadline(cmd, self.timeout + DEADLINE_MARGIN, joined).await
    }
}

#[async_trait]
impl ScpiEndpoint for VisaAdapter {
    #[cfg(feature = "instrument_visa")]
    async fn query(&self, cmd: &str) -> AppResult<String> {
        let response = self.exchange(cmd, true).await?.unwrap_or_default();
        debug!("VISA query '{}' -> '{}'", cmd, response);
        Ok(response)
    }

    #[cfg(not(feature = "instrument_visa"))]
    async fn query(&self, _cmd: &str) -> AppResult<String> {
        Err(DaqError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    #[cfg(feature = "instrument_visa")]
    async fn write(&self, cmd: &str) -> AppResult<()> {
        self.exchange(cmd, false).await?;
        debug!("VISA write sent: {}", cmd);
        Ok(())
    }

    #[cfg(not(feature = "instrument_visa"))]
    async fn write(&self, _cmd: &str) -> AppResult<()> {
        Err(DaqError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    fn resource_name(&self) -> &str {
        &self.resource_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = VisaAdapterBuilder::new("GPIB0::1::INSTR");
        assert_eq!(builder.resource_name(), "GPIB0::1::INSTR");
        assert_eq!(builder.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder_overrides() {
        let builder = VisaAdapterBuilder::new("TCPIP::192.168.88.15::hislip0::INSTR")
            .with_timeout(Duration::from_millis(2000))
            .with_read_terminator("\r\n")
            .with_write_terminator("\r\n");

        assert_eq!(builder.timeout(), Duration::from_millis(2000));
        assert_eq!(builder.read_terminator, "\r\n");
        assert_eq!(builder.write_terminator, "\r\n");
    }

    #[cfg(not(feature = "instrument_visa"))]
    #[tokio::test]
    async fn test_build_without_visa_feature() {
        let result = VisaAdapterBuilder::new("GPIB0::1::INSTR").build().await;
        assert!(matches!(result, Err(DaqError::FeatureNotEnabled(_))));
    }

    #[test]
    fn test_session_timeout_maps_to_timeout_error() {
        let timeout = Duration::from_secs(10);
        let err = io_error(
            "CALC1:DATA:SDAT?",
            timeout,
            "read",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "VI_ERROR_TMO"),
        );
        assert!(matches!(err, DaqError::Timeout { timeout: t, .. } if t == timeout));

        let err = io_error(
            "*IDN?",
            timeout,
            "write",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"),
        );
        assert!(matches!(err, DaqError::Transport(_)));
    }
}
