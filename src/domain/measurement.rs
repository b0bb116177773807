//! Decoded measurement types.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::domain::capability::Capability;

/// A 3-axis sample in raw device units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Battery charge state as reported by the battery service.
///
/// The battery-level characteristic alone cannot detect charging;
/// [`BatteryStatus::Charging`] is reachable only from higher-level policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryStatus {
    Unavailable,
    Charging,
    /// Discharging, with the charge level as a 0..1 fraction.
    NotCharging(f64),
}

impl BatteryStatus {
    /// The charge level, or NaN when no level is known.
    pub fn level(self) -> f64 {
        match self {
            BatteryStatus::NotCharging(level) => level,
            _ => f64::NAN,
        }
    }
}

/// Which button bits are meaningful on a device revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonLayout {
    /// The two-key revision: user and power keys.
    TwoButton,
    /// The five-key revision.
    FiveButton,
}

impl ButtonLayout {
    pub const fn mask(self) -> u8 {
        match self {
            ButtonLayout::TwoButton => 0b0000_0011,
            ButtonLayout::FiveButton => 0b0001_1111,
        }
    }
}

/// Pressed buttons from the simple-key state byte.
///
/// Bits outside the device's [`ButtonLayout`] are dropped on decode.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceButtons(u8);

impl DeviceButtons {
    pub const NONE: DeviceButtons = DeviceButtons(0);
    pub const ONE: DeviceButtons = DeviceButtons(1 << 0);
    pub const TWO: DeviceButtons = DeviceButtons(1 << 1);
    pub const THREE: DeviceButtons = DeviceButtons(1 << 2);
    pub const FOUR: DeviceButtons = DeviceButtons(1 << 3);
    pub const FIVE: DeviceButtons = DeviceButtons(1 << 4);

    pub const fn from_bits(bits: u8, layout: ButtonLayout) -> Self {
        DeviceButtons(bits & layout.mask())
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: DeviceButtons) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for DeviceButtons {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceButtons({:#04x})", self.0)
    }
}

/// Device-information strings gathered by the initial reads.
///
/// Fields stay empty when the corresponding characteristic is absent or
/// has not been read yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name, taken from the model-number characteristic.
    pub name: String,
    pub system_id: String,
    pub model_number: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub hardware_revision: String,
    pub software_revision: String,
    pub manufacturer_name: String,
    pub regulatory_certification: String,
    pub pnp_id: String,
}

/// The decoded payload of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(f64),
    Vector(Vector3),
    Battery(BatteryStatus),
    Buttons(DeviceButtons),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

/// A decoded sensor value tagged with its capability and capture time.
///
/// Measurements are produced transiently and handed to stream consumers;
/// the core never stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub capability: Capability,
    pub value: Value,
    pub timestamp: SystemTime,
}

impl Measurement {
    pub fn now(capability: Capability, value: Value) -> Self {
        Measurement {
            capability,
            value,
            timestamp: SystemTime::now(),
        }
    }
}
