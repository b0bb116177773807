//! Infrastructure: the BLE client stack and logging setup.

pub mod bluetooth;
pub mod logging;
