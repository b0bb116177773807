//! Bluetooth Module
//!
//! BLE GATT client core for the CC2650 SensorTag family.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      SensorDevice                        │
//! │   (public handle - connect, streams, device queries)     │
//! └─────────────────────────┬───────────────────────────────┘
//!                           │ commands
//!                           ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     session actor                        │
//! │  one task per connection, serializes adapter events and  │
//! │  client commands; owns discovery state and stream map    │
//! └───────┬──────────────────┬──────────────────┬───────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//! ┌─────────────┐  ┌──────────────────┐  ┌─────────────┐
//! │  discovery  │  │     protocol     │  │   decode    │
//! │             │  │                  │  │             │
//! │ - handshake │  │ - UUIDs          │  │ - payloads  │
//! │ - readiness │  │ - profiles       │  │ - codec     │
//! └─────────────┘  └──────────────────┘  └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`adapter`] - the external transport seam and its event types
//! - [`codec`] - fixed-width byte reinterpretation
//! - [`decode`] - per-capability measurement decoders
//! - [`discovery`] - the discovery state machine
//! - [`protocol`] - GATT identifiers, payloads and device profiles
//! - [`session`] - the per-connection actor and `SensorDevice`
//! - [`stream`] - cancelable measurement streams

pub mod adapter;
pub mod codec;
pub mod decode;
pub mod discovery;
pub mod protocol;
pub mod session;
pub mod stream;

pub use adapter::{AdapterError, AdapterEvent, BleAdapter};
pub use session::SensorDevice;
pub use stream::MeasurementStream;
