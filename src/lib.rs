//! BLE GATT client core for the TI CC2650 SensorTag family.
//!
//! Connects to a multi-sensor peripheral through an application-supplied
//! [`BleAdapter`], drives the service/characteristic discovery handshake
//! with ready gating, and decodes the proprietary sensor payloads into
//! typed [`Measurement`] streams.
//!
//! The transport itself is not implemented here: the surrounding
//! application owns the OS Bluetooth stack, implements [`BleAdapter`] for
//! it, and forwards its callbacks through the [`event_channel`].
//!
//! ```no_run
//! use sensortag::{AdapterEvents, BleAdapter, Capability, SensorDevice, SessionConfig};
//!
//! async fn run(adapter: impl BleAdapter, events: AdapterEvents) -> Result<(), sensortag::DeviceError> {
//!     let device = SensorDevice::connect(adapter, events, SessionConfig::default()).await?;
//!     println!("connected to {}", device.device_info().await?.name);
//!
//!     let mut lux = device.stream(Capability::Optical).await?;
//!     while let Some(sample) = lux.next().await {
//!         println!("{:?}", sample.value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::capability::{Capability, CapabilitySet};
pub use domain::measurement::{
    BatteryStatus, ButtonLayout, DeviceButtons, DeviceInfo, Measurement, Value, Vector3,
};
pub use domain::settings::{LogSettings, SessionConfig};
pub use error::DeviceError;
pub use infrastructure::bluetooth::adapter::{
    event_channel, AdapterError, AdapterEvent, AdapterEventSender, AdapterEvents, BleAdapter,
};
pub use infrastructure::bluetooth::session::SensorDevice;
pub use infrastructure::bluetooth::stream::MeasurementStream;
