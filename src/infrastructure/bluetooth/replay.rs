//! Replay Transport
//!
//! In-memory [`Transport`] that plays back a recorded cube session:
//! a baseline value, a queue of state notifications and canned
//! responses to info requests. A [`ReplayHandle`] lets the caller feed
//! more traffic and inspect what the session wrote after the transport
//! has been handed over.

use crate::infrastructure::bluetooth::connection::{cube_services, ConnectionConfig};
use crate::infrastructure::bluetooth::transport::{
    CharacteristicId, GattService, Monitor, Notification, Transport, TransportError,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

/// Frame sent back on the info response characteristic when `command`
/// is written to the info request characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedResponse {
    pub command: u8,
    pub frame: Vec<u8>,
}

/// Recorded cube traffic, loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    /// Value of the state characteristic at connect time
    pub baseline: Vec<u8>,
    /// State notifications, in arrival order
    #[serde(default)]
    pub notifications: Vec<Vec<u8>>,
    #[serde(default)]
    pub info_responses: Vec<ScriptedResponse>,
}

impl Recording {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read recording {}", path.display()))?;
        let recording = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid recording {}", path.display()))?;
        Ok(recording)
    }
}

#[derive(Default)]
struct ReplayShared {
    services: Vec<GattService>,
    baseline: Vec<u8>,
    state_response: Uuid,
    info_response: Uuid,
    info_request: Uuid,

    fail_connect: Option<String>,
    connected: bool,
    cancelled: bool,

    queued_state: VecDeque<Notification>,
    state_sender: Option<mpsc::UnboundedSender<Notification>>,
    info_senders: Vec<mpsc::UnboundedSender<Notification>>,
    responses: HashMap<u8, Vec<Vec<u8>>>,
    disconnect: Option<oneshot::Sender<()>>,

    writes: Vec<(CharacteristicId, Vec<u8>)>,
}

impl ReplayShared {
    fn push_state(&mut self, notification: Notification) {
        match &self.state_sender {
            Some(sender) if !sender.is_closed() => {
                let _ = sender.send(notification);
            }
            _ => self.queued_state.push_back(notification),
        }
    }

    fn push_info(&mut self, notification: Notification) {
        self.info_senders.retain(|s| !s.is_closed());
        for sender in &self.info_senders {
            let _ = sender.send(notification.clone());
        }
    }

    fn drop_link(&mut self) {
        self.connected = false;
        if let Some(tx) = self.disconnect.take() {
            let _ = tx.send(());
        }
    }
}

fn lock(shared: &Mutex<ReplayShared>) -> MutexGuard<'_, ReplayShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory transport replaying recorded cube traffic
pub struct ReplayTransport {
    shared: Arc<Mutex<ReplayShared>>,
}

impl ReplayTransport {
    /// A cube exposing the standard services, reporting `baseline` when read
    pub fn new(config: &ConnectionConfig, baseline: Vec<u8>) -> Self {
        let shared = ReplayShared {
            services: cube_services(config),
            baseline,
            state_response: config.state_response,
            info_response: config.info_response,
            info_request: config.info_request,
            ..ReplayShared::default()
        };
        Self {
            shared: Arc::new(Mutex::new(shared)),
        }
    }

    pub fn from_recording(config: &ConnectionConfig, recording: &Recording) -> Self {
        let transport = Self::new(config, recording.baseline.clone());
        let handle = transport.handle();
        for frame in &recording.notifications {
            handle.push_state(frame.clone());
        }
        for response in &recording.info_responses {
            handle.respond_to(response.command, response.frame.clone());
        }
        transport
    }

    /// Replace the advertised services
    pub fn with_services(self, services: Vec<GattService>) -> Self {
        lock(&self.shared).services = services;
        self
    }

    /// Make `connect` fail with the given reason
    pub fn failing_connect(self, reason: &str) -> Self {
        lock(&self.shared).fail_connect = Some(reason.to_string());
        self
    }

    pub fn handle(&self) -> ReplayHandle {
        ReplayHandle {
            shared: self.shared.clone(),
        }
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if lock(&self.shared).connected {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl Transport for ReplayTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut shared = lock(&self.shared);
        if let Some(reason) = &shared.fail_connect {
            return Err(TransportError::Connect(reason.clone()));
        }
        shared.connected = true;
        shared.cancelled = false;
        info!("Replay transport connected");
        Ok(())
    }

    async fn discover_services(&mut self) -> Result<Vec<GattService>, TransportError> {
        self.ensure_connected()?;
        Ok(lock(&self.shared).services.clone())
    }

    async fn read(&mut self, characteristic: CharacteristicId) -> Result<Vec<u8>, TransportError> {
        self.ensure_connected()?;
        let shared = lock(&self.shared);
        if characteristic.characteristic == shared.state_response {
            Ok(shared.baseline.clone())
        } else {
            Err(TransportError::Read(
                characteristic.characteristic,
                "characteristic is not readable".to_string(),
            ))
        }
    }

    async fn write_without_response(
        &mut self,
        characteristic: CharacteristicId,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let mut shared = lock(&self.shared);
        shared.writes.push((characteristic, value.to_vec()));

        if characteristic.characteristic == shared.info_request {
            let frames = value
                .first()
                .and_then(|command| shared.responses.get(command))
                .cloned()
                .unwrap_or_default();
            debug!(
                "Replay answering write {:02X?} with {} frame(s)",
                value,
                frames.len()
            );
            for frame in frames {
                shared.push_info(Ok(frame));
            }
        }
        Ok(())
    }

    async fn monitor(
        &mut self,
        characteristic: CharacteristicId,
    ) -> Result<Monitor, TransportError> {
        self.ensure_connected()?;
        let mut shared = lock(&self.shared);
        let (tx, rx) = mpsc::unbounded_channel();

        if characteristic.characteristic == shared.state_response {
            for notification in shared.queued_state.drain(..) {
                let _ = tx.send(notification);
            }
            shared.state_sender = Some(tx);
        } else if characteristic.characteristic == shared.info_response {
            shared.info_senders.push(tx);
        } else {
            return Err(TransportError::Monitor(
                characteristic.characteristic,
                "characteristic does not notify".to_string(),
            ));
        }

        Ok(Monitor::new(rx))
    }

    fn on_disconnected(&mut self) -> Result<oneshot::Receiver<()>, TransportError> {
        self.ensure_connected()?;
        let (tx, rx) = oneshot::channel();
        lock(&self.shared).disconnect = Some(tx);
        Ok(rx)
    }

    async fn cancel_connection(&mut self) -> Result<(), TransportError> {
        let mut shared = lock(&self.shared);
        shared.cancelled = true;
        shared.drop_link();
        info!("Replay transport connection cancelled");
        Ok(())
    }
}

/// Shared view of a [`ReplayTransport`]
#[derive(Clone)]
pub struct ReplayHandle {
    shared: Arc<Mutex<ReplayShared>>,
}

impl ReplayHandle {
    /// Queue a state notification
    pub fn push_state(&self, frame: Vec<u8>) {
        lock(&self.shared).push_state(Ok(frame));
    }

    /// Queue a state notification that failed in the transport
    pub fn push_state_error(&self, reason: &str) {
        let characteristic = lock(&self.shared).state_response;
        lock(&self.shared).push_state(Err(TransportError::Monitor(
            characteristic,
            reason.to_string(),
        )));
    }

    /// Deliver a frame to every live info response monitor
    pub fn push_info(&self, frame: Vec<u8>) {
        lock(&self.shared).push_info(Ok(frame));
    }

    /// Answer every future write of `command` with `frame`
    pub fn respond_to(&self, command: u8, frame: Vec<u8>) {
        lock(&self.shared)
            .responses
            .entry(command)
            .or_default()
            .push(frame);
    }

    /// Simulate the cube dropping the link on its own
    pub fn drop_link(&self) {
        lock(&self.shared).drop_link();
    }

    pub fn writes(&self) -> Vec<(CharacteristicId, Vec<u8>)> {
        lock(&self.shared).writes.clone()
    }

    pub fn cancelled(&self) -> bool {
        lock(&self.shared).cancelled
    }

    /// Info response monitors the session still holds
    pub fn active_info_monitors(&self) -> usize {
        let mut shared = lock(&self.shared);
        shared.info_senders.retain(|s| !s.is_closed());
        shared.info_senders.len()
    }
}
