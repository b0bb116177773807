//! SensorTag Protocol
//!
//! Service and characteristic definitions for the CC2650 SensorTag GATT
//! profile, the per-capability descriptor tables for the two known device
//! revisions, and the config/period command payloads.

use uuid::Uuid;

use crate::domain::capability::{Capability, CapabilitySet};
use crate::domain::measurement::ButtonLayout;

/// Expand a 16-bit Bluetooth SIG assigned number into the full 128-bit
/// UUID under the SIG base `0000xxxx-0000-1000-8000-00805F9B34FB`.
const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_00805F_9B34FB | (short as u128) << 96)
}

/// Expand a 16-bit id under the TI vendor base
/// `F000xxxx-0451-4000-B000-000000000000`.
const fn ti_uuid(short: u16) -> Uuid {
    Uuid::from_u128(0xF000_0000_0451_4000_B000_000000_000000 | (short as u128) << 96)
}

/// Service carried in the SensorTag's advertisement, for application-side
/// scanners.
pub const ADVERTISED_SERVICE: Uuid = sig_uuid(0xAA80);

// Humidity service
pub const HUMIDITY_SERVICE: Uuid = ti_uuid(0xAA20);
pub const HUMIDITY_DATA: Uuid = ti_uuid(0xAA21);
pub const HUMIDITY_CONFIGURATION: Uuid = ti_uuid(0xAA22);
pub const HUMIDITY_PERIOD: Uuid = ti_uuid(0xAA23);

// Barometric pressure service
pub const BAROMETRIC_SERVICE: Uuid = ti_uuid(0xAA40);
pub const BAROMETRIC_DATA: Uuid = ti_uuid(0xAA41);
pub const BAROMETRIC_CONFIGURATION: Uuid = ti_uuid(0xAA42);
pub const BAROMETRIC_PERIOD: Uuid = ti_uuid(0xAA43);

// Optical (light) service
pub const OPTICAL_SERVICE: Uuid = ti_uuid(0xAA70);
pub const OPTICAL_DATA: Uuid = ti_uuid(0xAA71);
pub const OPTICAL_CONFIGURATION: Uuid = ti_uuid(0xAA72);
pub const OPTICAL_PERIOD: Uuid = ti_uuid(0xAA73);

// Movement service (accelerometer, gyroscope, magnetometer)
pub const MOVEMENT_SERVICE: Uuid = ti_uuid(0xAA80);
pub const MOVEMENT_DATA: Uuid = ti_uuid(0xAA81);
pub const MOVEMENT_CONFIGURATION: Uuid = ti_uuid(0xAA82);
pub const MOVEMENT_PERIOD: Uuid = ti_uuid(0xAA83);

// Simple key (buttons) service
pub const SIMPLE_KEY_SERVICE: Uuid = sig_uuid(0xFFE0);
pub const SIMPLE_KEY_STATE: Uuid = sig_uuid(0xFFE1);

// Battery service
pub const BATTERY_SERVICE: Uuid = sig_uuid(0x180F);
pub const BATTERY_LEVEL: Uuid = sig_uuid(0x2A19);

// Device information service
pub const DEVICE_INFORMATION_SERVICE: Uuid = sig_uuid(0x180A);
pub const SYSTEM_ID: Uuid = sig_uuid(0x2A23);
pub const MODEL_NUMBER: Uuid = sig_uuid(0x2A24);
pub const SERIAL_NUMBER: Uuid = sig_uuid(0x2A25);
pub const FIRMWARE_REVISION: Uuid = sig_uuid(0x2A26);
pub const HARDWARE_REVISION: Uuid = sig_uuid(0x2A27);
pub const SOFTWARE_REVISION: Uuid = sig_uuid(0x2A28);
pub const MANUFACTURER_NAME: Uuid = sig_uuid(0x2A29);
pub const REGULATORY_CERTIFICATION: Uuid = sig_uuid(0x2A2A);
pub const PNP_ID: Uuid = sig_uuid(0x2A50);

pub const DEVICE_INFORMATION_CHARACTERISTICS: [Uuid; 9] = [
    SYSTEM_ID,
    MODEL_NUMBER,
    SERIAL_NUMBER,
    FIRMWARE_REVISION,
    HARDWARE_REVISION,
    SOFTWARE_REVISION,
    MANUFACTURER_NAME,
    REGULATORY_CERTIFICATION,
    PNP_ID,
];

const BATTERY_CHARACTERISTICS: [Uuid; 1] = [BATTERY_LEVEL];
const SIMPLE_KEY_CHARACTERISTICS: [Uuid; 1] = [SIMPLE_KEY_STATE];
const OPTICAL_CHARACTERISTICS: [Uuid; 3] =
    [OPTICAL_DATA, OPTICAL_PERIOD, OPTICAL_CONFIGURATION];
const HUMIDITY_CHARACTERISTICS: [Uuid; 3] =
    [HUMIDITY_DATA, HUMIDITY_PERIOD, HUMIDITY_CONFIGURATION];
const BAROMETRIC_CHARACTERISTICS: [Uuid; 3] =
    [BAROMETRIC_DATA, BAROMETRIC_PERIOD, BAROMETRIC_CONFIGURATION];
const MOVEMENT_CHARACTERISTICS: [Uuid; 3] =
    [MOVEMENT_DATA, MOVEMENT_CONFIGURATION, MOVEMENT_PERIOD];

/// Single-byte config payload enabling a sensor.
pub const ENABLE: &[u8] = &[0x01];
/// Single-byte config payload disabling a sensor.
pub const DISABLE: &[u8] = &[0x00];
/// Movement config payload enabling the gyroscope on all three axes.
pub const ENABLE_ALL_MOTION: &[u8] = &[0x07];

/// Period payloads, one byte in 10 ms units.
pub const PERIOD_TENTH_SECOND: &[u8] = &[0x0A];
pub const PERIOD_ONE_SECOND: &[u8] = &[0x64];
pub const PERIOD_TWO_SECONDS: &[u8] = &[0xC8];

/// What the discovery machine does with a service right after its
/// characteristics resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDiscovery {
    /// Nothing until a stream is started.
    None,
    /// Issue an initial read of every discovered characteristic.
    ReadAll,
    /// Subscribe to the data characteristic immediately.
    Subscribe,
}

/// Static description of one capability's GATT footprint.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    pub capability: Capability,
    pub service: Uuid,
    /// Characteristics requested from the adapter for this service.
    pub characteristics: &'static [Uuid],
    /// Streaming data characteristic, when the capability has one.
    pub data: Option<Uuid>,
    /// Config characteristic accepting the enable/disable byte.
    pub configuration: Option<Uuid>,
    /// Period characteristic accepting the 10 ms-unit sample interval.
    pub period: Option<Uuid>,
    pub enable: &'static [u8],
    pub disable: &'static [u8],
    /// Default payload for the period characteristic.
    pub period_payload: &'static [u8],
    pub on_discovery: OnDiscovery,
}

/// One known wire-format revision of the SensorTag profile.
#[derive(Debug)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub button_layout: ButtonLayout,
    pub services: &'static [ServiceDescriptor],
    /// Capabilities that must complete discovery before the session is
    /// considered ready.
    pub required: CapabilitySet,
}

impl DeviceProfile {
    pub fn descriptor(&self, capability: Capability) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|d| d.capability == capability)
    }

    pub fn descriptor_for_service(&self, service: Uuid) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|d| d.service == service)
    }

    pub fn service_uuids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.services.iter().map(|d| d.service)
    }
}

/// The five-button environmental revision: optical, humidity and
/// barometric sensing alongside battery, buttons and device information.
pub static ENVIRONMENTAL: DeviceProfile = DeviceProfile {
    name: "environmental",
    button_layout: ButtonLayout::FiveButton,
    services: &[
        ServiceDescriptor {
            capability: Capability::DeviceInfo,
            service: DEVICE_INFORMATION_SERVICE,
            characteristics: &DEVICE_INFORMATION_CHARACTERISTICS,
            data: None,
            configuration: None,
            period: None,
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_ONE_SECOND,
            on_discovery: OnDiscovery::ReadAll,
        },
        ServiceDescriptor {
            capability: Capability::Battery,
            service: BATTERY_SERVICE,
            characteristics: &BATTERY_CHARACTERISTICS,
            data: Some(BATTERY_LEVEL),
            configuration: None,
            period: None,
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_ONE_SECOND,
            on_discovery: OnDiscovery::ReadAll,
        },
        ServiceDescriptor {
            capability: Capability::Buttons,
            service: SIMPLE_KEY_SERVICE,
            characteristics: &SIMPLE_KEY_CHARACTERISTICS,
            data: Some(SIMPLE_KEY_STATE),
            configuration: None,
            period: None,
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_ONE_SECOND,
            on_discovery: OnDiscovery::Subscribe,
        },
        ServiceDescriptor {
            capability: Capability::Optical,
            service: OPTICAL_SERVICE,
            characteristics: &OPTICAL_CHARACTERISTICS,
            data: Some(OPTICAL_DATA),
            configuration: Some(OPTICAL_CONFIGURATION),
            period: Some(OPTICAL_PERIOD),
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_TWO_SECONDS,
            on_discovery: OnDiscovery::None,
        },
        ServiceDescriptor {
            capability: Capability::Humidity,
            service: HUMIDITY_SERVICE,
            characteristics: &HUMIDITY_CHARACTERISTICS,
            data: Some(HUMIDITY_DATA),
            configuration: Some(HUMIDITY_CONFIGURATION),
            period: Some(HUMIDITY_PERIOD),
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_TWO_SECONDS,
            on_discovery: OnDiscovery::None,
        },
        // The barometric period characteristic is discovered but never
        // written; stream control is notify + config enable only.
        ServiceDescriptor {
            capability: Capability::Barometric,
            service: BAROMETRIC_SERVICE,
            characteristics: &BAROMETRIC_CHARACTERISTICS,
            data: Some(BAROMETRIC_DATA),
            configuration: Some(BAROMETRIC_CONFIGURATION),
            period: None,
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_TWO_SECONDS,
            on_discovery: OnDiscovery::None,
        },
    ],
    required: CapabilitySet::EMPTY
        .with(Capability::DeviceInfo)
        .with(Capability::Battery)
        .with(Capability::Buttons)
        .with(Capability::Optical)
        .with(Capability::Humidity)
        .with(Capability::Barometric),
};

/// The two-button motion revision: optical plus the movement service.
pub static MOTION: DeviceProfile = DeviceProfile {
    name: "motion",
    button_layout: ButtonLayout::TwoButton,
    services: &[
        ServiceDescriptor {
            capability: Capability::DeviceInfo,
            service: DEVICE_INFORMATION_SERVICE,
            characteristics: &DEVICE_INFORMATION_CHARACTERISTICS,
            data: None,
            configuration: None,
            period: None,
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_ONE_SECOND,
            on_discovery: OnDiscovery::ReadAll,
        },
        ServiceDescriptor {
            capability: Capability::Battery,
            service: BATTERY_SERVICE,
            characteristics: &BATTERY_CHARACTERISTICS,
            data: Some(BATTERY_LEVEL),
            configuration: None,
            period: None,
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_ONE_SECOND,
            on_discovery: OnDiscovery::ReadAll,
        },
        ServiceDescriptor {
            capability: Capability::Buttons,
            service: SIMPLE_KEY_SERVICE,
            characteristics: &SIMPLE_KEY_CHARACTERISTICS,
            data: Some(SIMPLE_KEY_STATE),
            configuration: None,
            period: None,
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_ONE_SECOND,
            on_discovery: OnDiscovery::Subscribe,
        },
        ServiceDescriptor {
            capability: Capability::Optical,
            service: OPTICAL_SERVICE,
            characteristics: &OPTICAL_CHARACTERISTICS,
            data: Some(OPTICAL_DATA),
            configuration: Some(OPTICAL_CONFIGURATION),
            period: Some(OPTICAL_PERIOD),
            enable: ENABLE,
            disable: DISABLE,
            period_payload: PERIOD_ONE_SECOND,
            on_discovery: OnDiscovery::None,
        },
        ServiceDescriptor {
            capability: Capability::Gyroscope,
            service: MOVEMENT_SERVICE,
            characteristics: &MOVEMENT_CHARACTERISTICS,
            data: Some(MOVEMENT_DATA),
            configuration: Some(MOVEMENT_CONFIGURATION),
            period: Some(MOVEMENT_PERIOD),
            enable: ENABLE_ALL_MOTION,
            disable: DISABLE,
            period_payload: PERIOD_TENTH_SECOND,
            on_discovery: OnDiscovery::None,
        },
    ],
    required: CapabilitySet::EMPTY
        .with(Capability::DeviceInfo)
        .with(Capability::Battery)
        .with(Capability::Buttons)
        .with(Capability::Optical)
        .with(Capability::Gyroscope),
};

/// Known profiles, newest first.
pub static PROFILES: [&DeviceProfile; 2] = [&ENVIRONMENTAL, &MOTION];

/// Pick the profile whose service set best matches a discovery response.
/// Ties favor the newer revision.
pub fn detect_profile(services: &[Uuid]) -> &'static DeviceProfile {
    let mut best = PROFILES[0];
    let mut best_matches = 0;
    for profile in PROFILES {
        let matches = profile
            .service_uuids()
            .filter(|s| services.contains(s))
            .count();
        if matches > best_matches {
            best = profile;
            best_matches = matches;
        }
    }
    best
}

/// Union of every service any known profile may probe; this is the list
/// requested from the adapter at connect time.
pub fn scan_services() -> Vec<Uuid> {
    let mut services = Vec::new();
    for profile in PROFILES {
        for service in profile.service_uuids() {
            if !services.contains(&service) {
                services.push(service);
            }
        }
    }
    services
}
