//! Controller task and its cloneable handle
//!
//! The controller runs inside one tokio task that multiplexes the command
//! mailbox, the current session's radio subscription and platform
//! confirmations. Hosts talk to it only through [`AdvertisingHandle`].

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::advertising::{AdvertiserEventReceiver, BleAdvertiser};
use crate::config::AdvertiserConfig;
use crate::controller::AdvertisingController;
use crate::error::{StartError, StopError};
use crate::payload::AdvertisingRequest;
use crate::radio::RadioState;
use crate::session::{SessionSnapshot, SessionTransition};

// ----------------------------------------------------------------------------
// Messages
// ----------------------------------------------------------------------------

enum ControllerMessage {
    Start {
        request: AdvertisingRequest,
        reply: oneshot::Sender<Result<(), StartError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), StopError>>,
    },
    Status {
        reply: oneshot::Sender<Option<SessionSnapshot>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ----------------------------------------------------------------------------
// Handle
// ----------------------------------------------------------------------------

/// Cloneable entry point to a spawned controller
#[derive(Debug, Clone)]
pub struct AdvertisingHandle {
    sender: mpsc::Sender<ControllerMessage>,
    transitions: broadcast::Sender<SessionTransition>,
}

impl AdvertisingHandle {
    /// Request advertising; resolves once the request is accepted
    pub async fn start(&self, request: AdvertisingRequest) -> Result<(), StartError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(ControllerMessage::Start { request, reply })
            .await
            .map_err(|_| StartError::ControllerClosed)?;
        response.await.map_err(|_| StartError::ControllerClosed)?
    }

    pub async fn stop(&self) -> Result<(), StopError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(ControllerMessage::Stop { reply })
            .await
            .map_err(|_| StopError::ControllerClosed)?;
        response.await.map_err(|_| StopError::ControllerClosed)?
    }

    /// Snapshot of the current session; `None` when idle or closed
    pub async fn status(&self) -> Option<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(ControllerMessage::Status { reply })
            .await
            .ok()?;
        response.await.ok().flatten()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionTransition> {
        self.transitions.subscribe()
    }

    /// Stop any live session and end the controller task
    pub async fn shutdown(&self) {
        let (reply, response) = oneshot::channel();
        if self
            .sender
            .send(ControllerMessage::Shutdown { reply })
            .await
            .is_ok()
        {
            let _ = response.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ----------------------------------------------------------------------------
// Task
// ----------------------------------------------------------------------------

struct ControllerTask<A: BleAdvertiser> {
    controller: AdvertisingController<A>,
    mailbox: mpsc::Receiver<ControllerMessage>,
    events: AdvertiserEventReceiver,
    running: bool,
}

impl<A: BleAdvertiser> ControllerTask<A> {
    async fn run(mut self) {
        info!("Advertising controller task starting");

        while self.running {
            tokio::select! {
                message = self.mailbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => {
                        debug!("All advertising handles dropped");
                        self.controller.shutdown().await;
                        break;
                    }
                },
                Some(state) = next_radio_state(&mut self.controller) => {
                    self.controller.handle_radio_state(state).await;
                }
                Some(event) = self.events.recv() => {
                    self.controller.handle_advertiser_event(event);
                }
            }
        }

        info!("Advertising controller task stopped");
    }

    async fn handle_message(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::Start { request, reply } => {
                let _ = reply.send(self.controller.start(request).await);
            }
            ControllerMessage::Stop { reply } => {
                let _ = reply.send(self.controller.stop().await);
            }
            ControllerMessage::Status { reply } => {
                let _ = reply.send(self.controller.status());
            }
            ControllerMessage::Shutdown { reply } => {
                self.controller.shutdown().await;
                self.running = false;
                let _ = reply.send(());
            }
        }
    }
}

/// Next transition for a session waiting on the radio; pends otherwise
async fn next_radio_state<A: BleAdvertiser>(
    controller: &mut AdvertisingController<A>,
) -> Option<RadioState> {
    match controller.radio_interest_mut() {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

/// Move the controller onto its own task
///
/// `events` must be the receiving half of the channel the controller's
/// advertiser was built with.
pub fn spawn<A: BleAdvertiser + 'static>(
    controller: AdvertisingController<A>,
    events: AdvertiserEventReceiver,
    config: &AdvertiserConfig,
) -> (AdvertisingHandle, JoinHandle<()>) {
    let (sender, mailbox) = mpsc::channel(config.mailbox_capacity.max(1));
    let handle = AdvertisingHandle {
        sender,
        transitions: controller.transition_sender(),
    };

    let task = ControllerTask {
        controller,
        mailbox,
        events,
        running: true,
    };
    (handle, tokio::spawn(task.run()))
}
