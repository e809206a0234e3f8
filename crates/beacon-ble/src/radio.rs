//! Radio readiness monitoring
//!
//! The [`RadioReporter`] half is owned by a platform backend and fed from
//! hardware callbacks or probes. The [`RadioMonitor`] half is read by the
//! controller, which registers interest while a session waits for power.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

// ----------------------------------------------------------------------------
// Radio State
// ----------------------------------------------------------------------------

/// Power state of the Bluetooth radio as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RadioState {
    Unknown,
    Unavailable,
    PoweredOn,
    PoweredOff,
}

impl std::fmt::Display for RadioState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RadioState::Unknown => "unknown",
            RadioState::Unavailable => "unavailable",
            RadioState::PoweredOn => "powered on",
            RadioState::PoweredOff => "powered off",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct Listener {
    id: u64,
    sender: mpsc::UnboundedSender<RadioState>,
}

#[derive(Debug)]
struct MonitorState {
    state: RadioState,
    listener: Option<Listener>,
    next_listener_id: u64,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<MonitorState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // State is a plain value; a panic elsewhere cannot leave it torn.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ----------------------------------------------------------------------------
// Monitor
// ----------------------------------------------------------------------------

/// Read side of the radio state
#[derive(Debug, Clone)]
pub struct RadioMonitor {
    shared: Arc<Shared>,
}

impl RadioMonitor {
    /// Create a monitor starting in [`RadioState::Unknown`] and its reporter
    pub fn new() -> (Self, RadioReporter) {
        let shared = Arc::new(Shared {
            inner: Mutex::new(MonitorState {
                state: RadioState::Unknown,
                listener: None,
                next_listener_id: 0,
            }),
        });
        (
            Self {
                shared: shared.clone(),
            },
            RadioReporter { shared },
        )
    }

    /// Most recently reported state
    pub fn current_state(&self) -> RadioState {
        self.shared.lock().state
    }

    /// Register the single listener for subsequent transitions
    ///
    /// Replaces any existing listener. The returned subscription records the
    /// state at registration, so nothing reported afterwards can be missed.
    pub fn on_state_changed(&self) -> RadioSubscription {
        let mut inner = self.shared.lock();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        if let Some(previous) = inner.listener.replace(Listener { id, sender }) {
            warn!("Radio listener {} replaced by {}", previous.id, id);
        }

        RadioSubscription {
            id,
            initial_state: inner.state,
            receiver,
            shared: self.shared.clone(),
        }
    }

    /// Number of registered listeners (0 or 1)
    pub fn listener_count(&self) -> usize {
        usize::from(self.shared.lock().listener.is_some())
    }
}

// ----------------------------------------------------------------------------
// Reporter
// ----------------------------------------------------------------------------

/// Write side of the radio state, held by the hardware binding
#[derive(Debug, Clone)]
pub struct RadioReporter {
    shared: Arc<Shared>,
}

impl RadioReporter {
    /// Record a state reported by the platform
    ///
    /// Repeats of the current state are not transitions and are dropped.
    pub fn report(&self, state: RadioState) {
        let mut inner = self.shared.lock();
        if inner.state == state {
            return;
        }

        debug!("Radio state {} -> {}", inner.state, state);
        inner.state = state;

        let delivered = match &inner.listener {
            Some(listener) => listener.sender.send(state).is_ok(),
            None => true,
        };
        if !delivered {
            inner.listener = None;
        }
    }
}

// ----------------------------------------------------------------------------
// Subscription
// ----------------------------------------------------------------------------

/// Registered interest in radio transitions; dropping it deregisters
#[derive(Debug)]
pub struct RadioSubscription {
    id: u64,
    initial_state: RadioState,
    receiver: mpsc::UnboundedReceiver<RadioState>,
    shared: Arc<Shared>,
}

impl RadioSubscription {
    /// State at the moment this subscription was registered
    pub fn initial_state(&self) -> RadioState {
        self.initial_state
    }

    /// Wait for the next transition
    pub async fn recv(&mut self) -> Option<RadioState> {
        self.receiver.recv().await
    }

    /// Take an already delivered transition without waiting
    pub fn try_recv(&mut self) -> Option<RadioState> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for RadioSubscription {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if inner.listener.as_ref().map(|l| l.id) == Some(self.id) {
            inner.listener = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_unknown() {
        let (monitor, _reporter) = RadioMonitor::new();
        assert_eq!(monitor.current_state(), RadioState::Unknown);
        assert_eq!(monitor.listener_count(), 0);
    }

    #[test]
    fn test_transitions_delivered_in_order() {
        let (monitor, reporter) = RadioMonitor::new();
        let mut subscription = monitor.on_state_changed();

        reporter.report(RadioState::PoweredOff);
        reporter.report(RadioState::PoweredOff);
        reporter.report(RadioState::PoweredOn);
        reporter.report(RadioState::PoweredOff);

        assert_eq!(subscription.try_recv(), Some(RadioState::PoweredOff));
        assert_eq!(subscription.try_recv(), Some(RadioState::PoweredOn));
        assert_eq!(subscription.try_recv(), Some(RadioState::PoweredOff));
        assert_eq!(subscription.try_recv(), None);
        assert_eq!(monitor.current_state(), RadioState::PoweredOff);
    }

    #[test]
    fn test_recv_yields_reported_transition() {
        let (monitor, reporter) = RadioMonitor::new();
        let mut subscription = monitor.on_state_changed();
        reporter.report(RadioState::PoweredOn);

        assert_eq!(
            tokio_test::block_on(subscription.recv()),
            Some(RadioState::PoweredOn)
        );
    }

    #[test]
    fn test_late_subscriber_sees_latest_state() {
        let (monitor, reporter) = RadioMonitor::new();
        reporter.report(RadioState::PoweredOff);
        reporter.report(RadioState::PoweredOn);

        let mut subscription = monitor.on_state_changed();
        assert_eq!(subscription.initial_state(), RadioState::PoweredOn);
        assert_eq!(subscription.try_recv(), None);
    }

    #[test]
    fn test_drop_deregisters() {
        let (monitor, reporter) = RadioMonitor::new();
        let subscription = monitor.on_state_changed();
        assert_eq!(monitor.listener_count(), 1);

        drop(subscription);
        assert_eq!(monitor.listener_count(), 0);

        reporter.report(RadioState::PoweredOn);
        assert_eq!(monitor.current_state(), RadioState::PoweredOn);
    }

    #[test]
    fn test_new_subscription_replaces_old() {
        let (monitor, reporter) = RadioMonitor::new();
        let mut first = monitor.on_state_changed();
        let mut second = monitor.on_state_changed();

        // Dropping the replaced subscription must not evict its successor
        reporter.report(RadioState::PoweredOn);
        assert_eq!(first.try_recv(), None);
        drop(first);
        assert_eq!(monitor.listener_count(), 1);
        assert_eq!(second.try_recv(), Some(RadioState::PoweredOn));
    }
}
