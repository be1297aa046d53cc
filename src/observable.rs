//! Observable values
//!
//! Reactive value cell using `tokio::sync::watch` for multi-subscriber
//! notifications. `ScpiParameter` composes one to hold the last value read
//! from or written to the instrument.
//!
//! # Example
//!
//! ```
//! use rf_daq::observable::Observable;
//!
//! let stop = Observable::new("stop", 3.0e9).with_units("Hz").with_label("Stop");
//! let rx = stop.subscribe();
//! stop.replace(4.0e9);
//! assert_eq!(*rx.borrow(), 4.0e9);
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Metadata shared by observables and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    /// Parameter name (unique within its instrument or channel)
    pub name: String,
    /// Human-readable label, defaults to the name
    pub label: String,
    /// Physical units (e.g., "Hz", "dB")
    pub units: Option<String>,
    /// Longer description for snapshots
    pub description: Option<String>,
    /// Whether this parameter is read-only
    pub read_only: bool,
}

impl ParameterMetadata {
    /// Metadata with only a name; label defaults to the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            units: None,
            description: None,
            read_only: false,
        }
    }
}

/// A thread-safe, observable value with change notifications.
pub struct Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The watch channel sender (holds current value)
    sender: watch::Sender<T>,
    metadata: ParameterMetadata,
}

impl<T: Clone + Send + Sync + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("metadata", &self.metadata)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(), // shares the same watch channel
            metadata: self.metadata.clone(),
        }
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new observable with an initial value.
    pub fn new(name: impl Into<String>, initial_value: T) -> Self {
        let (sender, _) = watch::channel(initial_value);
        Self {
            sender,
            metadata: ParameterMetadata::new(name),
        }
    }

    /// Create an observable from prepared metadata.
    pub fn with_metadata(metadata: ParameterMetadata, initial_value: T) -> Self {
        let (sender, _) = watch::channel(initial_value);
        Self { sender, metadata }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.metadata.label = label.into();
        self
    }

    /// Add units to this observable.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.metadata.units = Some(units.into());
        self
    }

    /// Add a description to this observable.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    /// Mark this observable as read-only.
    pub fn read_only(mut self) -> Self {
        self.metadata.read_only = true;
        self
    }

    /// Get the current value (clone).
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Get the parameter name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Get the metadata.
    pub fn metadata(&self) -> &ParameterMetadata {
        &self.metadata
    }

    /// Replace the value and notify all subscribers.
    ///
    /// No validation happens here; callers validate before talking to hardware.
    pub fn replace(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observable_basic() {
        let obs = Observable::new("npts", 201);
        assert_eq!(obs.get(), 201);
        assert_eq!(obs.name(), "npts");
        assert_eq!(obs.metadata().label, "npts");

        obs.replace(401);
        assert_eq!(obs.get(), 401);
    }

    #[test]
    fn test_observable_with_metadata() {
        let obs = Observable::new("att", 10.0)
            .with_label("Attenuator")
            .with_units("dB")
            .with_description("Input attenuation");

        assert_eq!(obs.metadata().units.as_deref(), Some("dB"));
        assert_eq!(obs.metadata().label, "Attenuator");
        assert!(obs.metadata().description.is_some());
        assert!(!obs.metadata().read_only);
        assert!(obs.clone().read_only().metadata().read_only);
    }

    #[tokio::test]
    async fn test_observable_subscription() {
        let obs = Observable::new("value", 0);
        let mut rx = obs.subscribe();
        assert_eq!(obs.subscriber_count(), 1);

        assert_eq!(*rx.borrow(), 0);

        obs.replace(42);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 42);
    }

    #[test]
    fn test_clone_shares_channel() {
        let obs = Observable::new("span", 1.0);
        let copy = obs.clone();
        copy.replace(2.0);
        assert_eq!(obs.get(), 2.0);
    }
}
