//! Beacon application wiring
//!
//! Builds the advertiser backend, spawns the controller task and exposes the
//! two host modes: a JSON line server and one-shot advertising.

use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use beacon_ble::advertising::simulated::{SimulatedAdvertiser, SimulatorControl};
use beacon_ble::{
    advertiser_events, spawn, AdvertisingController, AdvertisingHandle, AdvertisingRequest,
    CommandInterface, MethodCall, MethodResponse, PlatformAdvertiser, RadioMonitor, RadioState,
    ReadinessGate, SessionStatus,
};

use crate::config::AppConfig;
use crate::error::Result;

/// Error code for lines that are not a JSON method call
pub const BAD_REQUEST: &str = "BAD_REQUEST";

/// Which advertiser the application drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Platform,
    Simulated {
        gate: ReadinessGate,
        radio: RadioState,
        radio_on_after: Option<Duration>,
    },
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

pub struct BeaconApp {
    handle: AdvertisingHandle,
    interface: CommandInterface,
    simulator: Option<SimulatorControl>,
    controller_task: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
}

impl BeaconApp {
    pub async fn start(config: &AppConfig, backend: Backend) -> Result<Self> {
        let (monitor, reporter) = RadioMonitor::new();
        let (events_tx, events_rx) = advertiser_events();
        let mut background = Vec::new();

        let (advertiser, simulator) = match backend {
            Backend::Platform => {
                info!("Initializing platform BLE advertiser...");
                let advertiser =
                    PlatformAdvertiser::new(&config.advertiser, events_tx, reporter).await;
                (advertiser, None)
            }
            Backend::Simulated {
                gate,
                radio,
                radio_on_after,
            } => {
                info!("Using simulated radio ({:?}, initially {})", gate, radio);
                let advertiser =
                    SimulatedAdvertiser::new(gate, events_tx, reporter).with_auto_confirm(true);
                let control = advertiser.control();
                control.set_radio(radio);

                if let Some(delay) = radio_on_after {
                    let control = control.clone();
                    background.push(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        info!("Simulated radio powering on");
                        control.set_radio(RadioState::PoweredOn);
                    }));
                }
                (PlatformAdvertiser::Simulated(advertiser), Some(control))
            }
        };

        let controller = AdvertisingController::new(advertiser, monitor)
            .with_event_capacity(config.advertiser.event_capacity);
        let (handle, controller_task) = spawn(controller, events_rx, &config.advertiser);

        let mut transitions = handle.subscribe();
        background.push(tokio::spawn(async move {
            while let Ok(transition) = transitions.recv().await {
                match (transition.to, transition.reason.as_deref()) {
                    (SessionStatus::Failed, reason) => warn!(
                        "Advertising {} failed: {}",
                        transition.service_uuid,
                        reason.unwrap_or("unknown")
                    ),
                    (SessionStatus::Active, _) => {
                        info!("Advertising {} is on the air", transition.service_uuid)
                    }
                    (to, _) => debug!("Session {} is now {}", transition.session, to),
                }
            }
        }));

        Ok(Self {
            interface: CommandInterface::new(handle.clone()),
            handle,
            simulator,
            controller_task,
            background,
        })
    }

    pub fn handle(&self) -> &AdvertisingHandle {
        &self.handle
    }

    pub fn simulator(&self) -> Option<&SimulatorControl> {
        self.simulator.as_ref()
    }

    /// Answer one JSON method call per input line until input ends
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("reading request")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = self.respond(line).await;
            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            output.write_all(encoded.as_bytes()).await?;
            output.flush().await?;
        }

        debug!("Request stream ended");
        Ok(())
    }

    async fn respond(&self, line: &str) -> MethodResponse {
        match serde_json::from_str::<MethodCall>(line) {
            Ok(call) => self.interface.handle(&call).await,
            Err(e) => {
                warn!("Ignoring malformed request: {}", e);
                MethodResponse::error(BAD_REQUEST, e.to_string())
            }
        }
    }

    /// Advertise until the duration elapses or Ctrl-C, then stop
    pub async fn advertise(&self, uuid: &str, duration: Option<Duration>) -> Result<()> {
        self.handle.start(AdvertisingRequest::new(uuid)).await?;
        info!("Advertising {} requested, press Ctrl-C to stop", uuid);

        match duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {
                        info!("Advertising duration elapsed");
                    }
                    signal = tokio::signal::ctrl_c() => {
                        signal.context("waiting for Ctrl-C")?;
                    }
                }
            }
            None => {
                tokio::signal::ctrl_c()
                    .await
                    .context("waiting for Ctrl-C")?;
            }
        }

        self.handle.stop().await?;
        info!("Advertising {} stopped", uuid);
        Ok(())
    }

    /// Stop advertising and wait for the controller task to end
    pub async fn shutdown(self) {
        self.handle.shutdown().await;
        if let Err(e) = self.controller_task.await {
            warn!("Controller task ended abnormally: {}", e);
        }
        for task in self.background {
            task.abort();
        }
    }
}
