//! Advertiser configuration

use std::time::Duration;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the advertising controller and its platform backend
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AdvertiserConfig {
    /// Adapter to advertise on (Linux). `None` selects the default adapter.
    pub adapter_name: Option<String>,
    /// Power the adapter on at startup instead of waiting for the user to
    pub power_on_adapter: bool,
    /// Capacity of the controller's command mailbox
    pub mailbox_capacity: usize,
    /// Capacity of the session transition broadcast
    pub event_capacity: usize,
    /// How often the radio state is polled on platforms without callbacks
    pub radio_poll_interval: Duration,
    /// How long to wait for the platform to confirm advertising started
    pub start_confirmation_timeout: Duration,
}

impl Default for AdvertiserConfig {
    fn default() -> Self {
        Self {
            adapter_name: None,
            power_on_adapter: false,
            mailbox_capacity: 32,
            event_capacity: 64,
            radio_poll_interval: Duration::from_millis(250),
            start_confirmation_timeout: Duration::from_secs(5),
        }
    }
}

impl AdvertiserConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a specific adapter by name (e.g. `hci1`)
    pub fn with_adapter_name(mut self, name: impl Into<String>) -> Self {
        self.adapter_name = Some(name.into());
        self
    }

    /// Enable or disable powering the adapter on at startup
    pub fn with_power_on_adapter(mut self, enabled: bool) -> Self {
        self.power_on_adapter = enabled;
        self
    }

    /// Set the command mailbox capacity
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set the transition broadcast capacity
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the radio poll interval
    pub fn with_radio_poll_interval(mut self, interval: Duration) -> Self {
        self.radio_poll_interval = interval;
        self
    }

    /// Set the start confirmation timeout
    pub fn with_start_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.start_confirmation_timeout = timeout;
        self
    }

    /// Check that capacities and intervals are usable
    pub fn validate(&self) -> Result<(), String> {
        if self.mailbox_capacity == 0 {
            return Err("mailbox capacity must be greater than 0".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event capacity must be greater than 0".to_string());
        }
        if self.radio_poll_interval.is_zero() {
            return Err("radio poll interval must be greater than 0".to_string());
        }
        if self.start_confirmation_timeout < self.radio_poll_interval {
            return Err("start confirmation timeout must cover at least one poll".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AdvertiserConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.adapter_name.is_none());
        assert!(!config.power_on_adapter);
    }

    #[test]
    fn test_builder_overrides() {
        let config = AdvertiserConfig::new()
            .with_adapter_name("hci1")
            .with_power_on_adapter(true)
            .with_mailbox_capacity(4);
        assert_eq!(config.adapter_name.as_deref(), Some("hci1"));
        assert!(config.power_on_adapter);
        assert_eq!(config.mailbox_capacity, 4);
    }

    #[test]
    fn test_invalid_capacities_rejected() {
        assert!(AdvertiserConfig::new().with_mailbox_capacity(0).validate().is_err());
        assert!(AdvertiserConfig::new().with_event_capacity(0).validate().is_err());
        assert!(AdvertiserConfig::new()
            .with_start_confirmation_timeout(Duration::from_millis(10))
            .validate()
            .is_err());
    }

    #[test]
    fn test_poll_interval_bounds_confirmation_timeout() {
        let config = AdvertiserConfig::new()
            .with_radio_poll_interval(Duration::from_millis(100))
            .with_start_confirmation_timeout(Duration::from_millis(100));
        assert_eq!(config.radio_poll_interval, Duration::from_millis(100));
        assert!(config.validate().is_ok());

        assert!(AdvertiserConfig::new()
            .with_radio_poll_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(config
            .with_radio_poll_interval(Duration::from_millis(200))
            .validate()
            .is_err());
    }
}
