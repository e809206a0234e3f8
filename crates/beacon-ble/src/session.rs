//! Advertising session state

use serde::Serialize;
use uuid::Uuid;

use crate::advertising::NativeHandle;
use crate::payload::AdvertisementPayload;
use crate::radio::RadioSubscription;

// ----------------------------------------------------------------------------
// Identifiers and Status
// ----------------------------------------------------------------------------

/// Controller-assigned identifier, unique for the controller's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle status of an advertising session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Active,
    Stopping,
    Stopped,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Stopped | SessionStatus::Failed)
    }

    /// Whether `self -> next` is a legal step
    ///
    /// PENDING may reach STOPPING when a native start was issued but not yet
    /// confirmed, and STOPPED directly when nothing was issued.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Pending, Active) | (Pending, Stopping) | (Pending, Stopped) => true,
            (Active, Stopping) => true,
            (Stopping, Stopped) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionStatus::Pending => "PENDING",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Stopping => "STOPPING",
            SessionStatus::Stopped => "STOPPED",
            SessionStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// The controller's single advertising session
#[derive(Debug)]
pub struct AdvertisingSession {
    id: SessionId,
    payload: AdvertisementPayload,
    status: SessionStatus,
    /// Set once the native start call has been issued
    pub(crate) native: Option<NativeHandle>,
    /// Present while the session waits for the radio to power on
    pub(crate) radio_interest: Option<RadioSubscription>,
}

impl AdvertisingSession {
    pub(crate) fn new(id: SessionId, payload: AdvertisementPayload) -> Self {
        Self {
            id,
            payload,
            status: SessionStatus::Pending,
            native: None,
            radio_interest: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn payload(&self) -> &AdvertisementPayload {
        &self.payload
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.native
    }

    pub fn is_awaiting_radio(&self) -> bool {
        self.radio_interest.is_some()
    }

    /// Apply a transition, returning the previous status
    ///
    /// Illegal steps leave the session untouched and return `None`.
    pub(crate) fn transition(&mut self, next: SessionStatus) -> Option<SessionStatus> {
        if !self.status.can_transition_to(next) {
            return None;
        }
        let previous = self.status;
        self.status = next;
        if next != SessionStatus::Pending {
            self.radio_interest = None;
        }
        Some(previous)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.id,
            service_uuid: *self.payload.service_uuid(),
            status: self.status,
            native: self.native,
        }
    }
}

/// Point-in-time view of a session, safe to hand out of the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: SessionId,
    pub service_uuid: Uuid,
    pub status: SessionStatus,
    pub native: Option<NativeHandle>,
}

/// Published on every session status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTransition {
    pub session: SessionId,
    pub service_uuid: Uuid,
    /// `None` when the session was just created
    pub from: Option<SessionStatus>,
    pub to: SessionStatus,
    /// Diagnostic detail for failures and unsolicited stops
    pub reason: Option<String>,
}
