//! ScpiEndpoint transport trait
//!
//! Hardware-agnostic interface for SCPI command execution.
//! Implementations handle protocol-specific details (VISA, mock, ...).

use crate::error::{AppResult, DaqError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// SCPI endpoint transport trait
///
/// Every driver talks to its instrument exclusively through this trait, so a
/// `VisaAdapter` and a `MockScpiAdapter` are interchangeable.
///
/// ## Command Queuing
/// - Implementations serialize access internally (one exchange in flight)
/// - Commands are executed in the order they are awaited
///
/// ## Error Recovery
/// - Failed queries do NOT auto-clear instrument errors
/// - Callers use `clear_errors()` explicitly, or `reset()` for factory defaults
#[async_trait]
pub trait ScpiEndpoint: Send + Sync {
    /// Send command and read response
    ///
    /// # Arguments
    /// * `cmd` - SCPI command string (e.g., "*IDN?", "FREQ:STAR?")
    ///
    /// # Errors
    /// - Hardware communication error
    /// - Timeout
    async fn query(&self, cmd: &str) -> AppResult<String>;

    /// Send command without expecting response
    ///
    /// # Arguments
    /// * `cmd` - SCPI command string (e.g., "*RST", "FREQ:STOP 3000000000")
    async fn write(&self, cmd: &str) -> AppResult<()>;

    /// VISA resource (or mock identifier) this endpoint is bound to
    fn resource_name(&self) -> &str;

    /// Query instrument identity (*IDN?)
    async fn identify(&self) -> AppResult<String> {
        self.query("*IDN?").await
    }

    /// Query installed options (*OPT?), raw response
    async fn query_options(&self) -> AppResult<String> {
        self.query("*OPT?").await
    }

    /// Reset instrument to factory defaults (*RST)
    async fn reset(&self) -> AppResult<()> {
        self.write("*RST").await
    }

    /// Clear error queue and event status register (*CLS)
    async fn clear_errors(&self) -> AppResult<()> {
        self.write("*CLS").await
    }

    /// Query the Event Status Register (*ESR?)
    ///
    /// 0 = no error, non-zero = error condition
    async fn read_error(&self) -> AppResult<u8> {
        let response = self.query("*ESR?").await?;
        response
            .trim()
            .parse()
            .map_err(|_| DaqError::ResponseParse {
                command: "*ESR?".to_string(),
                response,
            })
    }
}

/// Run one exchange under a deadline, reporting expiry as `DaqError::Timeout`
pub async fn with_deadline<T, F>(command: &str, timeout: Duration, exchange: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(DaqError::Timeout {
            command: command.to_string(),
            timeout,
        }),
    }
}
