//! Sensor capabilities and the capability bitset.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A logical sensor function on the peripheral.
///
/// Each capability maps to one GATT service triple in the device profile
/// tables; which capabilities exist on a given device depends on its
/// revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Battery,
    Buttons,
    Humidity,
    Barometric,
    Optical,
    Gyroscope,
    IrTemperature,
    Magnetometer,
    Proximity,
    Gesture,
    DeviceInfo,
}

impl Capability {
    /// Every capability, in bit order.
    pub const ALL: [Capability; 11] = [
        Capability::Battery,
        Capability::Buttons,
        Capability::Humidity,
        Capability::Barometric,
        Capability::Optical,
        Capability::Gyroscope,
        Capability::IrTemperature,
        Capability::Magnetometer,
        Capability::Proximity,
        Capability::Gesture,
        Capability::DeviceInfo,
    ];

    const fn bit(self) -> u16 {
        match self {
            Capability::Battery => 1 << 0,
            Capability::Buttons => 1 << 1,
            Capability::Humidity => 1 << 2,
            Capability::Barometric => 1 << 3,
            Capability::Optical => 1 << 4,
            Capability::Gyroscope => 1 << 5,
            Capability::IrTemperature => 1 << 6,
            Capability::Magnetometer => 1 << 7,
            Capability::Proximity => 1 << 8,
            Capability::Gesture => 1 << 9,
            Capability::DeviceInfo => 1 << 10,
        }
    }
}

/// A set of capabilities, used both for "what the device offers" and
/// "what has completed discovery".
///
/// Readiness is decided by [`CapabilitySet::contains_all`] against a
/// profile's required-set constant, never by completion order.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    /// Const-friendly builder for the profile tables.
    pub const fn with(self, capability: Capability) -> Self {
        CapabilitySet(self.0 | capability.bit())
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Superset check: every capability in `other` is also in `self`.
    pub const fn contains_all(self, other: CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::EMPTY;
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}
