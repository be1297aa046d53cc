//! Mock SCPI adapter for testing
//!
//! Simulated SCPI endpoint for exercising drivers without physical hardware.
//! It provides:
//! - Scripted query responses (`*IDN?`, `*OPT?`, ...)
//! - Setter echo: writing `FREQ:STOP 3e9` makes `FREQ:STOP?` answer `3e9`
//! - Controllable failure injection
//! - Simulated latency, bounded by an optional exchange timeout
//! - Call logging for test verification

use crate::error::{AppResult, DaqError};
use crate::traits::{with_deadline, ScpiEndpoint};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// One recorded exchange with the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `write()` with the command sent
    Write(String),
    /// `query()` with the command sent
    Query(String),
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, String>,
    echoed: HashMap<String, String>,
    log: Vec<MockCall>,
    latency: Option<Duration>,
    timeout: Option<Duration>,
}

/// Mock SCPI adapter
///
/// Clones share state, so a test can keep a handle while the driver owns
/// another one behind `Arc<dyn ScpiEndpoint>`.
///
/// # Example
///
/// ```
/// use rf_daq::adapters::MockScpiAdapter;
///
/// let mock = MockScpiAdapter::new("MOCK::FSV")
///     .with_response("*IDN?", "Rohde&Schwarz,FSV3044,101234,1.50")
///     .with_response("*OPT?", "B24,B25");
/// assert!(mock.call_log().is_empty());
/// ```
#[derive(Clone)]
pub struct MockScpiAdapter {
    resource: String,
    state: Arc<Mutex<MockState>>,
    should_fail_next: Arc<AtomicBool>,
}

impl MockScpiAdapter {
    /// Create a mock with no scripted responses
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            state: Arc::new(Mutex::new(MockState::default())),
            should_fail_next: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Script a fixed response for a query
    pub fn with_response(self, query: impl Into<String>, response: impl Into<String>) -> Self {
        self.set_response(query, response);
        self
    }

    /// Script (or replace) a fixed response for a query
    pub fn set_response(&self, query: impl Into<String>, response: impl Into<String>) {
        self.lock().responses.insert(query.into(), response.into());
    }

    /// Inject a failure for the next operation
    pub fn inject_next_failure(&self) {
        self.should_fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> bool {
        self.should_fail_next.swap(false, Ordering::SeqCst)
    }

    /// Delay every exchange by `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    /// Bound every exchange by `timeout`, as `VisaAdapter` does
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.lock().timeout = Some(timeout);
        self
    }

    /// Log the call, consume an injected failure and wait out the latency
    async fn begin(&self, call: MockCall) -> AppResult<()> {
        let latency = {
            let mut state = self.lock();
            state.log.push(call);
            state.latency
        };

        if self.check_failure() {
            return Err(DaqError::Transport("Injected failure".to_string()));
        }
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, cmd: &str, exchange: F) -> AppResult<T>
    where
        F: std::future::Future<Output = AppResult<T>>,
    {
        let timeout = self.lock().timeout;
        match timeout {
            Some(timeout) => with_deadline(cmd, timeout, exchange).await,
            None => exchange.await,
        }
    }

    /// Get the full call log
    pub fn call_log(&self) -> Vec<MockCall> {
        self.lock().log.clone()
    }

    /// Commands passed to `write()`, in order
    pub fn writes(&self) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter_map(|call| match call {
                MockCall::Write(cmd) => Some(cmd.clone()),
                MockCall::Query(_) => None,
            })
            .collect()
    }

    /// Commands passed to `query()`, in order
    pub fn queries(&self) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .filter_map(|call| match call {
                MockCall::Query(cmd) => Some(cmd.clone()),
                MockCall::Write(_) => None,
            })
            .collect()
    }

    /// Clear the call log (scripted and echoed values are kept)
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not poison the other handles.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ScpiEndpoint for MockScpiAdapter {
    async fn query(&self, cmd: &str) -> AppResult<String> {
        let exchange = async {
            self.begin(MockCall::Query(cmd.to_string())).await?;

            let header = cmd.trim().trim_end_matches('?');
            let state = self.lock();
            let response = state
                .echoed
                .get(header)
                .or_else(|| state.responses.get(cmd.trim()))
                .cloned()
                .ok_or_else(|| {
                    DaqError::Transport(format!("No mock response scripted for '{}'", cmd))
                })?;

            debug!("Mock query '{}' -> '{}'", cmd, response);
            Ok(response)
        };
        self.bounded(cmd, exchange).await
    }

    async fn write(&self, cmd: &str) -> AppResult<()> {
        let exchange = async {
            self.begin(MockCall::Write(cmd.to_string())).await?;

            if let Some((header, argument)) = cmd.trim().split_once(' ') {
                self.lock()
                    .echoed
                    .insert(header.to_string(), argument.trim().to_string());
            }

            debug!("Mock write '{}'", cmd);
            Ok(())
        };
        self.bounded(cmd, exchange).await
    }

    fn resource_name(&self) -> &str {
        &self.resource
    }
}
