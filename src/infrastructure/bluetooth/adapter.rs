//! BLE Adapter seam
//!
//! The transport is an external collaborator: the surrounding application
//! owns the OS Bluetooth stack and hands the core an implementation of
//! [`BleAdapter`] plus the event channel its callbacks feed. The adapter
//! must deliver events for one peripheral serially; the session consumes
//! them in order on a single task.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// An error reported by the adapter itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("adapter: {message}")]
pub struct AdapterError {
    pub message: String,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Asynchronous callbacks from the adapter.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// Service discovery finished for the peripheral.
    ServicesDiscovered(Result<Vec<Uuid>, AdapterError>),
    /// Characteristic discovery finished for one service.
    CharacteristicsDiscovered {
        service: Uuid,
        result: Result<Vec<Uuid>, AdapterError>,
    },
    /// A read completed or a notification arrived.
    ValueUpdated {
        characteristic: Uuid,
        result: Result<Vec<u8>, AdapterError>,
    },
    /// The peripheral connection was lost.
    Disconnected,
}

/// Sender half handed to the adapter implementation.
pub type AdapterEventSender = mpsc::UnboundedSender<AdapterEvent>;
/// Receiver half handed to `SensorDevice::connect`.
pub type AdapterEvents = mpsc::UnboundedReceiver<AdapterEvent>;

/// Channel pair wiring an adapter implementation to a session.
pub fn event_channel() -> (AdapterEventSender, AdapterEvents) {
    mpsc::unbounded_channel()
}

/// GATT operations the core needs from the transport.
///
/// Calls request work; discovery and read results arrive later as
/// [`AdapterEvent`]s. The core implements no radio management, pairing or
/// scanning.
#[async_trait]
pub trait BleAdapter: Send + Sync + 'static {
    /// Whether a peripheral is currently connected behind this adapter.
    fn is_connected(&self) -> bool;

    /// Request discovery of the given services; the result arrives as
    /// [`AdapterEvent::ServicesDiscovered`].
    async fn discover_services(&self, services: &[Uuid]) -> Result<(), AdapterError>;

    /// Request discovery of characteristics on one service; the result
    /// arrives as [`AdapterEvent::CharacteristicsDiscovered`].
    async fn discover_characteristics(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> Result<(), AdapterError>;

    /// Read a characteristic; the value arrives as
    /// [`AdapterEvent::ValueUpdated`].
    async fn read_value(&self, characteristic: Uuid) -> Result<(), AdapterError>;

    /// Enable or disable notifications on a characteristic.
    async fn set_notify(&self, enabled: bool, characteristic: Uuid) -> Result<(), AdapterError>;

    /// Write a payload to a characteristic.
    async fn write_value(
        &self,
        value: &[u8],
        characteristic: Uuid,
        with_response: bool,
    ) -> Result<(), AdapterError>;
}
