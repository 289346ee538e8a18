//! Transport Contract
//!
//! The cube is reached through a GATT-style transport owned by the host
//! platform. The session only needs the operations below; connection
//! establishment, pairing and notification plumbing are the
//! transport's business.

use std::future::Future;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("service discovery failed: {0}")]
    Discovery(String),

    #[error("read of {0} failed: {1}")]
    Read(Uuid, String),

    #[error("write to {0} failed: {1}")]
    Write(Uuid, String),

    #[error("monitor of {0} failed: {1}")]
    Monitor(Uuid, String),

    #[error("device disconnected")]
    Disconnected,
}

/// A characteristic within a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicId {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// A discovered service and the characteristics it exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

/// Value delivered by a monitored characteristic. An `Err` stands in for a
/// notification the transport could not deliver.
pub type Notification = Result<Vec<u8>, TransportError>;

/// Live subscription to a characteristic.
///
/// Dropping the monitor (or calling [`Monitor::remove`]) cancels it; the
/// transport observes the closed channel.
#[derive(Debug)]
pub struct Monitor {
    receiver: mpsc::UnboundedReceiver<Notification>,
}

impl Monitor {
    pub fn new(receiver: mpsc::UnboundedReceiver<Notification>) -> Self {
        Self { receiver }
    }

    /// Next notification, `None` once the transport stops delivering
    pub async fn next(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    pub fn remove(self) {}
}

/// Operations the session needs from the platform transport
pub trait Transport: Send {
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn discover_services(
        &mut self,
    ) -> impl Future<Output = Result<Vec<GattService>, TransportError>> + Send;

    fn read(
        &mut self,
        characteristic: CharacteristicId,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    fn write_without_response(
        &mut self,
        characteristic: CharacteristicId,
        value: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn monitor(
        &mut self,
        characteristic: CharacteristicId,
    ) -> impl Future<Output = Result<Monitor, TransportError>> + Send;

    /// Fires once when the link drops, whoever initiated it
    fn on_disconnected(&mut self) -> Result<oneshot::Receiver<()>, TransportError>;

    fn cancel_connection(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
