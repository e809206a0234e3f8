//! Advertising lifecycle controller
//!
//! Owns the single advertising session slot and reconciles three event
//! sources against it: start/stop commands, radio state transitions and
//! platform confirmations. The controller itself is not synchronized; it is
//! meant to be driven by exactly one task (see [`crate::service`]), which
//! makes every read-modify-write of the slot atomic with respect to the
//! others.

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::advertising::{AdvertiserEvent, BleAdvertiser, GateDecision, NativeHandle};
use crate::error::{AdvertiserError, StartError, StopError};
use crate::payload::{AdvertisementPayload, AdvertisingRequest};
use crate::radio::{RadioMonitor, RadioState, RadioSubscription};
use crate::session::{
    AdvertisingSession, SessionId, SessionSnapshot, SessionStatus, SessionTransition,
};

const DEFAULT_EVENT_CAPACITY: usize = 64;

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

pub struct AdvertisingController<A: BleAdvertiser> {
    advertiser: A,
    monitor: RadioMonitor,
    current: Option<AdvertisingSession>,
    next_session: u64,
    transitions: broadcast::Sender<SessionTransition>,
}

impl<A: BleAdvertiser> AdvertisingController<A> {
    pub fn new(advertiser: A, monitor: RadioMonitor) -> Self {
        let (transitions, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            advertiser,
            monitor,
            current: None,
            next_session: 0,
            transitions,
        }
    }

    /// Set how many unread transitions a lagging subscriber may fall behind
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        let (transitions, _) = broadcast::channel(capacity.max(1));
        self.transitions = transitions;
        self
    }

    pub fn advertiser(&self) -> &A {
        &self.advertiser
    }

    pub fn radio_state(&self) -> RadioState {
        self.monitor.current_state()
    }

    /// Observe every session status change
    pub fn subscribe(&self) -> broadcast::Receiver<SessionTransition> {
        self.transitions.subscribe()
    }

    pub(crate) fn transition_sender(&self) -> broadcast::Sender<SessionTransition> {
        self.transitions.clone()
    }

    pub fn session(&self) -> Option<&AdvertisingSession> {
        self.current.as_ref()
    }

    pub fn status(&self) -> Option<SessionSnapshot> {
        self.current.as_ref().map(AdvertisingSession::snapshot)
    }

    /// Radio subscription of a session waiting for power, if any
    pub fn radio_interest_mut(&mut self) -> Option<&mut RadioSubscription> {
        self.current
            .as_mut()
            .and_then(|session| session.radio_interest.as_mut())
    }

    // ---- Commands ----

    /// Accept a request to advertise
    ///
    /// Returns once the request is accepted into PENDING; on-air confirmation
    /// arrives later through [`Self::handle_advertiser_event`]. A native start
    /// that fails synchronously marks the new session FAILED but is still an
    /// accepted request.
    pub async fn start(&mut self, request: AdvertisingRequest) -> Result<(), StartError> {
        let payload = request.build()?;
        self.supersede().await;

        let gate = self.advertiser.readiness_gate();
        let mut radio = self.monitor.on_state_changed();
        let mut state = radio.initial_state();
        if state == RadioState::Unknown && gate.probes_unknown() {
            self.advertiser.probe_radio().await;
            // The probe's own report is already reflected in the monitor
            while radio.try_recv().is_some() {}
            state = self.monitor.current_state();
        }

        match gate.decide(state) {
            GateDecision::Reject => {
                warn!(
                    "Cannot advertise {}: Bluetooth radio is {}",
                    payload.service_uuid(),
                    state
                );
                Err(StartError::RadioUnavailable)
            }
            GateDecision::Issue => {
                drop(radio);
                self.open_session(payload, None);
                self.issue_native_start().await;
                Ok(())
            }
            GateDecision::Defer => {
                info!(
                    "Bluetooth radio is {}, advertising {} once it powers on",
                    state,
                    payload.service_uuid()
                );
                self.open_session(payload, Some(radio));
                Ok(())
            }
        }
    }

    /// Stop the current session
    ///
    /// Idempotent: with no session, or one already stopping, this succeeds
    /// without touching the platform.
    pub async fn stop(&mut self) -> Result<(), StopError> {
        let Some((id, status, native)) = self
            .current
            .as_ref()
            .map(|session| (session.id(), session.status(), session.native_handle()))
        else {
            debug!("Stop requested with no advertising session");
            return Ok(());
        };

        match (status, native) {
            (SessionStatus::Stopping, _) => Ok(()),
            (SessionStatus::Pending, None) => {
                info!("Cancelled pending advertising session {}", id);
                self.advance(SessionStatus::Stopped, None);
                Ok(())
            }
            (_, Some(handle)) => {
                match self.advertiser.stop_advertising(handle).await {
                    Ok(()) => {}
                    Err(AdvertiserError::UnknownHandle(_)) => {
                        // The platform already tore the set down
                        debug!("Advertising set {} already gone", handle);
                        self.advance(SessionStatus::Stopping, None);
                        self.advance(SessionStatus::Stopped, None);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("Platform rejected stop of session {}: {}", id, e);
                        return Err(StopError::NativeStopRejected(e.to_string()));
                    }
                }

                self.advance(SessionStatus::Stopping, None);
                if !self.advertiser.confirms_stop() {
                    self.advance(SessionStatus::Stopped, None);
                }
                Ok(())
            }
            (_, None) => {
                self.advance(SessionStatus::Stopping, None);
                self.advance(SessionStatus::Stopped, None);
                Ok(())
            }
        }
    }

    /// Best-effort stop before the controller goes away
    ///
    /// Always leaves the slot empty with a terminal transition published.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stop().await {
            warn!("Advertising not stopped cleanly on shutdown: {}", e);
        }

        let reason = Some("controller shut down".to_string());
        match self.current.as_ref().map(AdvertisingSession::status) {
            // A stop awaiting confirmation will never see it now
            Some(SessionStatus::Stopping) => {
                self.advance(SessionStatus::Stopped, reason);
            }
            Some(_) => {
                self.advance(SessionStatus::Failed, reason);
            }
            None => {}
        }
    }

    // ---- Events ----

    /// React to a radio transition delivered through the session's subscription
    ///
    /// Transitions queue up; a power-on that the radio has already left again
    /// keeps the session waiting for the next one.
    pub async fn handle_radio_state(&mut self, state: RadioState) {
        let latest = self.monitor.current_state();
        let Some(session) = self.current.as_mut() else {
            return;
        };
        if session.status() != SessionStatus::Pending || !session.is_awaiting_radio() {
            return;
        }

        match self.advertiser.readiness_gate().decide(state) {
            GateDecision::Issue if latest != RadioState::PoweredOn => {
                debug!(
                    "Session {} still waiting, radio went back to {}",
                    session.id(),
                    latest
                );
            }
            GateDecision::Issue => {
                info!("Bluetooth radio powered on, starting session {}", session.id());
                session.radio_interest = None;
                self.issue_native_start().await;
            }
            GateDecision::Reject => {
                warn!("Bluetooth radio became unavailable, session {} failed", session.id());
                self.advance(SessionStatus::Failed, Some(format!("radio {}", state)));
            }
            GateDecision::Defer => {
                debug!("Session {} still waiting, radio is {}", session.id(), state);
            }
        }
    }

    /// Apply a platform confirmation; confirmations for old handles are ignored
    pub fn handle_advertiser_event(&mut self, event: AdvertiserEvent) {
        let (handle, started, reason) = match event {
            AdvertiserEvent::Started { handle, outcome } => (handle, true, outcome.err()),
            AdvertiserEvent::Stopped { handle, reason } => (handle, false, reason),
        };

        let Some(status) = self.current_status_for(handle) else {
            debug!("Ignoring confirmation for stale advertising set {}", handle);
            return;
        };

        match (started, status, reason) {
            (true, SessionStatus::Pending, None) => {
                self.advance(SessionStatus::Active, None);
            }
            (true, _, None) => {
                debug!("Late start confirmation for {} while {}", handle, status);
            }
            (true, _, Some(status)) => {
                error!("Platform failed to start advertising set {}: {}", handle, status);
                self.advance(SessionStatus::Failed, Some(status));
            }
            (false, SessionStatus::Stopping, reason) => {
                self.advance(SessionStatus::Stopped, reason);
            }
            (false, _, reason) => {
                let reason = reason.unwrap_or_else(|| "stopped by platform".to_string());
                warn!("Advertising set {} stopped unexpectedly: {}", handle, reason);
                self.advance(SessionStatus::Failed, Some(reason));
            }
        }
    }

    // ---- Internals ----

    fn current_status_for(&self, handle: NativeHandle) -> Option<SessionStatus> {
        self.current
            .as_ref()
            .filter(|session| session.native_handle() == Some(handle))
            .map(AdvertisingSession::status)
    }

    fn open_session(
        &mut self,
        payload: AdvertisementPayload,
        radio_interest: Option<RadioSubscription>,
    ) {
        self.next_session += 1;
        let mut session = AdvertisingSession::new(SessionId::new(self.next_session), payload);
        session.radio_interest = radio_interest;

        debug!(
            "Session {} created for {}",
            session.id(),
            session.payload().service_uuid()
        );
        self.publish(SessionTransition {
            session: session.id(),
            service_uuid: *session.payload().service_uuid(),
            from: None,
            to: SessionStatus::Pending,
            reason: None,
        });
        self.current = Some(session);
    }

    async fn issue_native_start(&mut self) {
        let Some(session) = self.current.as_mut() else {
            return;
        };
        let id = session.id();

        match self.advertiser.start_advertising(session.payload()).await {
            Ok(handle) => {
                debug!("Session {} issued as advertising set {}", id, handle);
                session.native = Some(handle);
            }
            Err(e) => {
                error!("Native start for session {} failed: {}", id, e);
                self.advance(SessionStatus::Failed, Some(e.to_string()));
            }
        }
    }

    /// Discard the current session before a new one takes the slot
    async fn supersede(&mut self) {
        let Some(mut previous) = self.current.take() else {
            return;
        };
        info!("Superseding advertising session {}", previous.id());

        if previous.status() != SessionStatus::Stopping {
            if let Some(handle) = previous.native_handle() {
                if let Err(e) = self.advertiser.stop_advertising(handle).await {
                    warn!(
                        "Implicit stop of session {} ({}) failed: {}",
                        previous.id(),
                        handle,
                        e
                    );
                }
                self.apply(&mut previous, SessionStatus::Stopping, None);
            }
        }
        self.apply(&mut previous, SessionStatus::Stopped, Some("superseded".to_string()));
    }

    /// Move the current session, clearing the slot once it is terminal
    fn advance(&mut self, next: SessionStatus, reason: Option<String>) -> bool {
        let Some(mut session) = self.current.take() else {
            return false;
        };
        let moved = self.apply(&mut session, next, reason);
        if !session.status().is_terminal() {
            self.current = Some(session);
        }
        moved
    }

    fn apply(
        &self,
        session: &mut AdvertisingSession,
        next: SessionStatus,
        reason: Option<String>,
    ) -> bool {
        let Some(from) = session.transition(next) else {
            debug!(
                "Ignoring illegal transition {} -> {} for session {}",
                session.status(),
                next,
                session.id()
            );
            return false;
        };

        info!("Advertising session {}: {} -> {}", session.id(), from, next);
        self.publish(SessionTransition {
            session: session.id(),
            service_uuid: *session.payload().service_uuid(),
            from: Some(from),
            to: next,
            reason,
        });
        true
    }

    fn publish(&self, transition: SessionTransition) {
        // No subscribers is fine
        let _ = self.transitions.send(transition);
    }
}
