//! End-to-end session tests against a scripted adapter.
//!
//! The mock responds to discovery calls the way a real peripheral would
//! (services, then characteristics per service) and records every call,
//! so the tests can assert both the observable API behavior and the exact
//! writes that went over the wire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use sensortag::infrastructure::bluetooth::protocol;
use sensortag::{
    event_channel, AdapterError, AdapterEvent, AdapterEventSender, BleAdapter, Capability,
    DeviceButtons, DeviceError, SensorDevice, SessionConfig, Value,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    DiscoverServices(Vec<Uuid>),
    DiscoverCharacteristics(Uuid),
    Read(Uuid),
    SetNotify(bool, Uuid),
    Write(Vec<u8>, Uuid),
}

#[derive(Clone)]
struct MockAdapter {
    /// Services reported on discovery; `None` keeps the adapter silent.
    services: Option<Result<Vec<Uuid>, AdapterError>>,
    characteristics: HashMap<Uuid, Vec<Uuid>>,
    reads: HashMap<Uuid, Vec<u8>>,
    events: AdapterEventSender,
    calls: Arc<Mutex<Vec<Call>>>,
    connected: bool,
}

impl MockAdapter {
    fn new(events: AdapterEventSender) -> Self {
        Self {
            services: None,
            characteristics: HashMap::new(),
            reads: HashMap::new(),
            events,
            calls: Arc::new(Mutex::new(Vec::new())),
            connected: true,
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BleAdapter for MockAdapter {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn discover_services(&self, services: &[Uuid]) -> Result<(), AdapterError> {
        self.record(Call::DiscoverServices(services.to_vec()));
        if let Some(result) = &self.services {
            let _ = self
                .events
                .send(AdapterEvent::ServicesDiscovered(result.clone()));
        }
        Ok(())
    }

    async fn discover_characteristics(
        &self,
        service: Uuid,
        _characteristics: &[Uuid],
    ) -> Result<(), AdapterError> {
        self.record(Call::DiscoverCharacteristics(service));
        if let Some(found) = self.characteristics.get(&service) {
            let _ = self.events.send(AdapterEvent::CharacteristicsDiscovered {
                service,
                result: Ok(found.clone()),
            });
        }
        Ok(())
    }

    async fn read_value(&self, characteristic: Uuid) -> Result<(), AdapterError> {
        self.record(Call::Read(characteristic));
        if let Some(bytes) = self.reads.get(&characteristic) {
            let _ = self.events.send(AdapterEvent::ValueUpdated {
                characteristic,
                result: Ok(bytes.clone()),
            });
        }
        Ok(())
    }

    async fn set_notify(&self, enabled: bool, characteristic: Uuid) -> Result<(), AdapterError> {
        self.record(Call::SetNotify(enabled, characteristic));
        Ok(())
    }

    async fn write_value(
        &self,
        value: &[u8],
        characteristic: Uuid,
        _with_response: bool,
    ) -> Result<(), AdapterError> {
        self.record(Call::Write(value.to_vec(), characteristic));
        Ok(())
    }
}

fn environmental_adapter(events: AdapterEventSender) -> MockAdapter {
    use protocol::*;
    let mut adapter = MockAdapter::new(events);
    adapter.services = Some(Ok(vec![
        DEVICE_INFORMATION_SERVICE,
        BATTERY_SERVICE,
        SIMPLE_KEY_SERVICE,
        OPTICAL_SERVICE,
        HUMIDITY_SERVICE,
        BAROMETRIC_SERVICE,
    ]));
    adapter.characteristics.insert(
        DEVICE_INFORMATION_SERVICE,
        DEVICE_INFORMATION_CHARACTERISTICS.to_vec(),
    );
    adapter
        .characteristics
        .insert(BATTERY_SERVICE, vec![BATTERY_LEVEL]);
    adapter
        .characteristics
        .insert(SIMPLE_KEY_SERVICE, vec![SIMPLE_KEY_STATE]);
    adapter.characteristics.insert(
        OPTICAL_SERVICE,
        vec![OPTICAL_DATA, OPTICAL_PERIOD, OPTICAL_CONFIGURATION],
    );
    adapter.characteristics.insert(
        HUMIDITY_SERVICE,
        vec![HUMIDITY_DATA, HUMIDITY_PERIOD, HUMIDITY_CONFIGURATION],
    );
    adapter.characteristics.insert(
        BAROMETRIC_SERVICE,
        vec![BAROMETRIC_DATA, BAROMETRIC_PERIOD, BAROMETRIC_CONFIGURATION],
    );
    adapter
        .reads
        .insert(MODEL_NUMBER, b"CC2650 SensorTag".to_vec());
    adapter.reads.insert(BATTERY_LEVEL, vec![0x32]);
    adapter
}

fn motion_adapter(events: AdapterEventSender) -> MockAdapter {
    use protocol::*;
    let mut adapter = MockAdapter::new(events);
    adapter.services = Some(Ok(vec![
        DEVICE_INFORMATION_SERVICE,
        BATTERY_SERVICE,
        SIMPLE_KEY_SERVICE,
        OPTICAL_SERVICE,
        MOVEMENT_SERVICE,
    ]));
    adapter.characteristics.insert(
        DEVICE_INFORMATION_SERVICE,
        DEVICE_INFORMATION_CHARACTERISTICS.to_vec(),
    );
    adapter
        .characteristics
        .insert(BATTERY_SERVICE, vec![BATTERY_LEVEL]);
    adapter
        .characteristics
        .insert(SIMPLE_KEY_SERVICE, vec![SIMPLE_KEY_STATE]);
    adapter.characteristics.insert(
        OPTICAL_SERVICE,
        vec![OPTICAL_DATA, OPTICAL_PERIOD, OPTICAL_CONFIGURATION],
    );
    adapter.characteristics.insert(
        MOVEMENT_SERVICE,
        vec![MOVEMENT_DATA, MOVEMENT_CONFIGURATION, MOVEMENT_PERIOD],
    );
    adapter.reads.insert(BATTERY_LEVEL, vec![0x64]);
    adapter
}

async fn wait_for(calls: &Arc<Mutex<Vec<Call>>>, expected: Call) {
    for _ in 0..100 {
        if calls.lock().unwrap().contains(&expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "call never made: {expected:?}, saw {:?}",
        calls.lock().unwrap()
    );
}

fn notify(events: &AdapterEventSender, characteristic: Uuid, bytes: &[u8]) {
    let _ = events.send(AdapterEvent::ValueUpdated {
        characteristic,
        result: Ok(bytes.to_vec()),
    });
}

#[tokio::test]
async fn connect_reaches_ready_and_streams_lux() {
    let (sender, events) = event_channel();
    let adapter = environmental_adapter(sender.clone());
    let calls = adapter.calls.clone();

    let device = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .expect("discovery should complete");

    let capabilities = device.capabilities().await.unwrap();
    assert!(capabilities.contains_all(protocol::ENVIRONMENTAL.required));

    // Initial reads populated the snapshot state.
    assert_eq!(device.device_info().await.unwrap().name, "CC2650 SensorTag");
    assert!((device.battery().await.unwrap().level() - 0.5).abs() < 1e-9);

    let mut lux = device.stream(Capability::Optical).await.unwrap();
    assert_eq!(lux.capability(), Capability::Optical);
    let subscribes = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| **c == Call::SetNotify(true, protocol::OPTICAL_DATA))
        .count();
    assert_eq!(subscribes, 1);
    assert!(calls
        .lock()
        .unwrap()
        .contains(&Call::Write(vec![0x01], protocol::OPTICAL_CONFIGURATION)));
    assert!(calls
        .lock()
        .unwrap()
        .contains(&Call::Write(vec![0xC8], protocol::OPTICAL_PERIOD)));

    notify(&sender, protocol::OPTICAL_DATA, &[0x18, 0x4B]);
    let sample = lux.next().await.unwrap();
    assert_eq!(sample.capability, Capability::Optical);
    let value = sample.value.as_scalar().unwrap();
    assert!((value - 42.46).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn silent_peripheral_times_out() {
    let (sender, events) = event_channel();
    // No services scripted: the adapter never answers discovery.
    let adapter = MockAdapter::new(sender);

    let error = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap_err();
    assert_eq!(error, DeviceError::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn readiness_requires_every_characteristic() {
    let (sender, events) = event_channel();
    let mut adapter = environmental_adapter(sender);
    // Optical config never turns up; the capability stays undiscovered
    // and the required set is never covered.
    adapter.characteristics.insert(
        protocol::OPTICAL_SERVICE,
        vec![protocol::OPTICAL_DATA, protocol::OPTICAL_PERIOD],
    );

    let error = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap_err();
    assert_eq!(error, DeviceError::TimedOut);
}

#[tokio::test]
async fn empty_service_list_fails_with_no_services() {
    let (sender, events) = event_channel();
    let mut adapter = MockAdapter::new(sender);
    adapter.services = Some(Ok(Vec::new()));

    let error = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap_err();
    assert_eq!(error, DeviceError::NoServices);
}

#[tokio::test]
async fn adapter_error_surfaces_through_connect() {
    let (sender, events) = event_channel();
    let mut adapter = MockAdapter::new(sender);
    adapter.services = Some(Err(AdapterError::new("att timeout")));

    let error = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap_err();
    assert_eq!(error, DeviceError::Adapter(AdapterError::new("att timeout")));
}

#[tokio::test]
async fn unconnected_adapter_is_rejected() {
    let (sender, events) = event_channel();
    let mut adapter = MockAdapter::new(sender);
    adapter.connected = false;

    let error = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap_err();
    assert_eq!(error, DeviceError::InvalidPeripheral);
}

#[tokio::test]
async fn disconnect_resolves_a_pending_connect() {
    let (sender, events) = event_channel();
    let adapter = MockAdapter::new(sender.clone());

    let connect = tokio::spawn(SensorDevice::connect(
        adapter,
        events,
        SessionConfig::default(),
    ));
    let _ = sender.send(AdapterEvent::Disconnected);

    let error = connect.await.unwrap().unwrap_err();
    assert_eq!(error, DeviceError::Disconnected);
}

#[tokio::test]
async fn double_start_is_rejected_without_a_second_enable() {
    let (sender, events) = event_channel();
    let adapter = environmental_adapter(sender);
    let calls = adapter.calls.clone();

    let device = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap();

    let _lux = device.stream(Capability::Optical).await.unwrap();
    let error = device.stream(Capability::Optical).await.unwrap_err();
    assert_eq!(error, DeviceError::AlreadyStreaming(Capability::Optical));

    let enables = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| **c == Call::Write(vec![0x01], protocol::OPTICAL_CONFIGURATION))
        .count();
    assert_eq!(enables, 1);
}

#[tokio::test]
async fn dropping_a_stream_issues_exactly_one_disable() {
    let (sender, events) = event_channel();
    let adapter = environmental_adapter(sender);
    let calls = adapter.calls.clone();

    let device = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap();

    let lux = device.stream(Capability::Optical).await.unwrap();
    drop(lux);

    wait_for(
        &calls,
        Call::Write(vec![0x00], protocol::OPTICAL_CONFIGURATION),
    )
    .await;
    wait_for(&calls, Call::SetNotify(false, protocol::OPTICAL_DATA)).await;

    // A fresh start is a new logical subscription.
    let _lux = device.stream(Capability::Optical).await.unwrap();

    let disables = calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| **c == Call::Write(vec![0x00], protocol::OPTICAL_CONFIGURATION))
        .count();
    assert_eq!(disables, 1);
}

#[tokio::test]
async fn malformed_sample_emits_nan_and_the_stream_survives() {
    let (sender, events) = event_channel();
    let adapter = environmental_adapter(sender.clone());

    let device = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap();
    let mut lux = device.stream(Capability::Optical).await.unwrap();

    notify(&sender, protocol::OPTICAL_DATA, &[0x18]);
    let sample = lux.next().await.unwrap();
    assert!(sample.value.as_scalar().unwrap().is_nan());

    notify(&sender, protocol::OPTICAL_DATA, &[0x18, 0x4B]);
    let sample = lux.next().await.unwrap();
    assert!((sample.value.as_scalar().unwrap() - 42.46).abs() < 1e-9);
}

#[tokio::test]
async fn short_movement_payload_is_skipped_not_streamed() {
    let (sender, events) = event_channel();
    let adapter = motion_adapter(sender.clone());
    let calls = adapter.calls.clone();

    let device = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap();
    let capabilities = device.capabilities().await.unwrap();
    assert!(capabilities.contains(Capability::Gyroscope));

    let mut gyro = device.stream(Capability::Gyroscope).await.unwrap();
    assert!(calls
        .lock()
        .unwrap()
        .contains(&Call::Write(vec![0x07], protocol::MOVEMENT_CONFIGURATION)));
    assert!(calls
        .lock()
        .unwrap()
        .contains(&Call::Write(vec![0x0A], protocol::MOVEMENT_PERIOD)));

    // Too short: no measurement may be emitted for this payload.
    notify(&sender, protocol::MOVEMENT_DATA, &[0u8; 10]);

    let mut full = [0u8; 18];
    full[9..11].copy_from_slice(&42i16.to_le_bytes());
    notify(&sender, protocol::MOVEMENT_DATA, &full);

    let sample = gyro.next().await.unwrap();
    match sample.value {
        Value::Vector(v) => {
            assert_eq!(v.x, 42.0);
            assert_eq!(v.y, 0.0);
            assert_eq!(v.z, 0.0);
        }
        other => panic!("expected a vector, got {other:?}"),
    }
}

#[tokio::test]
async fn buttons_are_subscribed_during_discovery() {
    let (sender, events) = event_channel();
    let adapter = motion_adapter(sender.clone());
    let calls = adapter.calls.clone();

    let device = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap();
    assert!(calls
        .lock()
        .unwrap()
        .contains(&Call::SetNotify(true, protocol::SIMPLE_KEY_STATE)));

    let mut buttons = device.stream(Capability::Buttons).await.unwrap();
    notify(&sender, protocol::SIMPLE_KEY_STATE, &[0x03]);

    let sample = buttons.next().await.unwrap();
    match sample.value {
        Value::Buttons(pressed) => {
            assert!(pressed.contains(DeviceButtons::ONE));
            assert!(pressed.contains(DeviceButtons::TWO));
        }
        other => panic!("expected buttons, got {other:?}"),
    }
}

#[tokio::test]
async fn disconnect_ends_streams_and_later_calls() {
    let (sender, events) = event_channel();
    let adapter = environmental_adapter(sender);

    let device = SensorDevice::connect(adapter, events, SessionConfig::default())
        .await
        .unwrap();
    let mut lux = device.stream(Capability::Optical).await.unwrap();

    device.disconnect();
    assert_eq!(lux.next().await, None);
    assert_eq!(device.battery().await.unwrap_err(), DeviceError::Disconnected);
}

#[tokio::test]
async fn sample_period_override_applies_to_period_writes() {
    let (sender, events) = event_channel();
    let adapter = environmental_adapter(sender);
    let calls = adapter.calls.clone();

    let config = SessionConfig {
        sample_period: Some(0x64),
        ..SessionConfig::default()
    };
    let device = SensorDevice::connect(adapter, events, config).await.unwrap();

    let _humidity = device.stream(Capability::Humidity).await.unwrap();
    assert!(calls
        .lock()
        .unwrap()
        .contains(&Call::Write(vec![0x64], protocol::HUMIDITY_PERIOD)));
}
