//! Connection session
//!
//! One actor task per peripheral connection. The task is the single
//! execution context for discovery state, characteristic routing and
//! stream bookkeeping: adapter events and client commands merge into one
//! serialized loop, so session state has exactly one writer and needs no
//! locking.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::capability::{Capability, CapabilitySet};
use crate::domain::measurement::{
    BatteryStatus, ButtonLayout, DeviceInfo, Measurement, Value,
};
use crate::domain::settings::SessionConfig;
use crate::error::DeviceError;
use crate::infrastructure::bluetooth::adapter::{
    AdapterError, AdapterEvent, AdapterEvents, BleAdapter,
};
use crate::infrastructure::bluetooth::codec;
use crate::infrastructure::bluetooth::decode::{self, DecodeError};
use crate::infrastructure::bluetooth::discovery::{Discovery, DiscoveryAction};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::stream::MeasurementStream;

pub(crate) enum Command {
    Stream {
        capability: Capability,
        reply: oneshot::Sender<Result<MeasurementStream, DeviceError>>,
    },
    StopStream {
        capability: Capability,
    },
    DeviceInfo {
        reply: oneshot::Sender<DeviceInfo>,
    },
    Battery {
        reply: oneshot::Sender<BatteryStatus>,
    },
    Capabilities {
        reply: oneshot::Sender<CapabilitySet>,
    },
    Disconnect,
}

/// A connected, discovered and ready-to-use SensorTag.
///
/// Handed out by [`SensorDevice::connect`] only once every required
/// capability finished discovery, so the device is complete when you get
/// it. Active [`MeasurementStream`]s keep the session alive; dropping the
/// last handle or calling [`SensorDevice::disconnect`] tears it down.
pub struct SensorDevice {
    control: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for SensorDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorDevice").finish_non_exhaustive()
    }
}

impl SensorDevice {
    /// Connect to the peripheral behind `adapter` and drive the discovery
    /// handshake.
    ///
    /// Suspends until the device is ready, discovery fails, or the
    /// configured deadline passes; exactly one of those resolves this
    /// call, and a failure is terminal for the attempt.
    pub async fn connect<A: BleAdapter>(
        adapter: A,
        events: AdapterEvents,
        config: SessionConfig,
    ) -> Result<Self, DeviceError> {
        if !adapter.is_connected() {
            return Err(DeviceError::InvalidPeripheral);
        }

        let (control, commands) = mpsc::unbounded_channel();
        let (ready, waiter) = oneshot::channel();
        let session = Session {
            adapter,
            // Weak: the command channel closes, and the session with it,
            // once the device handle and every stream are gone.
            control: control.downgrade(),
            config,
            discovery: Discovery::new(),
            ready: Some(ready),
            info: DeviceInfo::default(),
            battery: BatteryStatus::Unavailable,
            streams: HashMap::new(),
        };
        tokio::spawn(session.run(events, commands));

        match waiter.await {
            Ok(Ok(())) => Ok(Self { control }),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(DeviceError::Disconnected),
        }
    }

    /// Start a measurement stream for one capability.
    ///
    /// Awaiting this performs the notify subscription and the
    /// config/period writes; it returns once those are acknowledged, not
    /// when the first sample arrives. A second stream for the same
    /// capability is rejected until the first one is dropped.
    pub async fn stream(&self, capability: Capability) -> Result<MeasurementStream, DeviceError> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(Command::Stream { capability, reply })
            .map_err(|_| DeviceError::Disconnected)?;
        response.await.map_err(|_| DeviceError::Disconnected)?
    }

    /// Device-information strings gathered by the initial reads.
    pub async fn device_info(&self) -> Result<DeviceInfo, DeviceError> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(Command::DeviceInfo { reply })
            .map_err(|_| DeviceError::Disconnected)?;
        response.await.map_err(|_| DeviceError::Disconnected)
    }

    /// Last battery status seen, from the initial read or a notification.
    pub async fn battery(&self) -> Result<BatteryStatus, DeviceError> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(Command::Battery { reply })
            .map_err(|_| DeviceError::Disconnected)?;
        response.await.map_err(|_| DeviceError::Disconnected)
    }

    /// Capabilities that completed discovery on this connection.
    pub async fn capabilities(&self) -> Result<CapabilitySet, DeviceError> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(Command::Capabilities { reply })
            .map_err(|_| DeviceError::Disconnected)?;
        response.await.map_err(|_| DeviceError::Disconnected)
    }

    /// Tear the session down. Pending operations resolve with
    /// [`DeviceError::Disconnected`] and every active stream ends.
    pub fn disconnect(&self) {
        let _ = self.control.send(Command::Disconnect);
    }
}

struct Session<A> {
    adapter: A,
    control: mpsc::WeakUnboundedSender<Command>,
    config: SessionConfig,
    discovery: Discovery,
    /// The single in-flight ready waiter; taken on resolution, so the
    /// ready signal fires at most once per connection attempt.
    ready: Option<oneshot::Sender<Result<(), DeviceError>>>,
    info: DeviceInfo,
    battery: BatteryStatus,
    streams: HashMap<Capability, mpsc::UnboundedSender<Measurement>>,
}

impl<A: BleAdapter> Session<A> {
    async fn run(
        mut self,
        mut events: AdapterEvents,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        self.discovery.start();
        let scan = protocol::scan_services();
        if let Err(error) = self.adapter.discover_services(&scan).await {
            self.fail_adapter(error);
            return;
        }

        let timeout = sleep_until(Instant::now() + self.config.discovery_timeout());
        tokio::pin!(timeout);

        loop {
            // Biased: adapter callbacks drain before client commands, so a
            // query observes every value that was delivered before it.
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => {
                        if !self.on_event(event).await {
                            return;
                        }
                    }
                    None => {
                        self.shutdown();
                        return;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.on_command(command).await {
                            return;
                        }
                    }
                    None => {
                        self.shutdown();
                        return;
                    }
                },
                () = &mut timeout, if self.ready.is_some() => {
                    warn!(state = ?self.discovery.state(), "discovery deadline passed");
                    self.discovery.abort(DeviceError::TimedOut);
                    self.resolve_ready(Err(DeviceError::TimedOut));
                    return;
                }
            }
        }
    }

    /// Returns `false` when the session must end.
    async fn on_event(&mut self, event: AdapterEvent) -> bool {
        match event {
            AdapterEvent::ServicesDiscovered(result) => {
                let actions = self.discovery.on_services(result);
                self.execute(actions).await
            }
            AdapterEvent::CharacteristicsDiscovered { service, result } => {
                let actions = self.discovery.on_characteristics(service, result);
                self.execute(actions).await
            }
            AdapterEvent::ValueUpdated {
                characteristic,
                result,
            } => match result {
                Ok(bytes) => {
                    self.route_value(characteristic, &bytes);
                    true
                }
                Err(error) => {
                    if self.ready.is_some() {
                        error!(%characteristic, %error, "value update failed during discovery");
                        self.fail_adapter(error);
                        false
                    } else {
                        warn!(%characteristic, %error, "value update failed");
                        true
                    }
                }
            },
            AdapterEvent::Disconnected => {
                self.shutdown();
                false
            }
        }
    }

    async fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Stream { capability, reply } => {
                let result = self.start_stream(capability).await;
                if let Err(rejected) = reply.send(result) {
                    // Caller gave up; the returned stream drops and its
                    // stop command cleans the subscription up.
                    drop(rejected);
                }
            }
            Command::StopStream { capability } => self.stop_stream(capability).await,
            Command::DeviceInfo { reply } => {
                let _ = reply.send(self.info.clone());
            }
            Command::Battery { reply } => {
                let _ = reply.send(self.battery);
            }
            Command::Capabilities { reply } => {
                let _ = reply.send(self.discovery.discovered());
            }
            Command::Disconnect => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Execute the side effects the discovery machine asked for.
    /// Returns `false` when the session must end.
    async fn execute(&mut self, actions: Vec<DiscoveryAction>) -> bool {
        for action in actions {
            let result = match action {
                DiscoveryAction::Resolve(Ok(())) => {
                    info!(discovered = ?self.discovery.discovered(), "device ready");
                    self.resolve_ready(Ok(()));
                    continue;
                }
                DiscoveryAction::Resolve(Err(error)) => {
                    self.resolve_ready(Err(error));
                    return false;
                }
                DiscoveryAction::DiscoverCharacteristics {
                    service,
                    characteristics,
                } => {
                    self.adapter
                        .discover_characteristics(service, &characteristics)
                        .await
                }
                DiscoveryAction::ReadValue { characteristic } => {
                    self.adapter.read_value(characteristic).await
                }
                DiscoveryAction::Subscribe { characteristic } => {
                    self.adapter.set_notify(true, characteristic).await
                }
            };
            if let Err(error) = result {
                self.fail_adapter(error);
                return false;
            }
        }
        true
    }

    /// Route a value update through the matching decoder and publish it.
    fn route_value(&mut self, characteristic: Uuid, bytes: &[u8]) {
        let Some(capability) = self.discovery.route(characteristic) else {
            warn!(%characteristic, payload = %codec::hex(bytes), "value for an unhandled characteristic");
            return;
        };

        match capability {
            Capability::DeviceInfo => self.update_info(characteristic, bytes),
            Capability::Battery => match decode::battery(bytes) {
                Ok(status) => {
                    self.battery = status;
                    self.emit(capability, Value::Battery(status));
                }
                Err(error) => warn!(%error, "battery decode failed"),
            },
            Capability::Buttons => {
                let layout = self
                    .discovery
                    .profile()
                    .map(|p| p.button_layout)
                    .unwrap_or(ButtonLayout::FiveButton);
                match decode::buttons(bytes, layout) {
                    Ok(pressed) => self.emit(capability, Value::Buttons(pressed)),
                    Err(error) => warn!(%error, "buttons decode failed"),
                }
            }
            Capability::Optical => self.emit_scalar(capability, decode::lux(bytes)),
            Capability::Humidity => self.emit_scalar(capability, decode::humidity(bytes)),
            Capability::Barometric => self.emit_scalar(capability, decode::barometric(bytes)),
            Capability::Gyroscope => match decode::gyroscope(bytes) {
                Ok(vector) => self.emit(capability, Value::Vector(vector)),
                // No measurement for a malformed movement payload.
                Err(error) => error!(%error, "movement decode failed"),
            },
            other => {
                debug!(?other, payload = %codec::hex(bytes), "no decoder wired for capability");
            }
        }
    }

    /// Scalar streams emit a NaN sentinel for a malformed sample; the
    /// stream itself stays open.
    fn emit_scalar(&mut self, capability: Capability, decoded: Result<f64, DecodeError>) {
        match decoded {
            Ok(value) => self.emit(capability, Value::Scalar(value)),
            Err(error) => {
                warn!(?capability, %error, "decode failed, emitting NaN");
                self.emit(capability, Value::Scalar(f64::NAN));
            }
        }
    }

    fn emit(&mut self, capability: Capability, value: Value) {
        let Some(sender) = self.streams.get(&capability) else {
            return;
        };
        if sender.send(Measurement::now(capability, value)).is_err() {
            // The receiver only closes when the stream is dropped, and
            // its drop hook has already queued the stop command.
            debug!(?capability, "measurement for a dropped stream");
        }
    }

    fn update_info(&mut self, characteristic: Uuid, bytes: &[u8]) {
        let text = decode::info_string(bytes);
        if characteristic == protocol::SYSTEM_ID {
            self.info.system_id = text;
        } else if characteristic == protocol::MODEL_NUMBER {
            self.info.name = text.clone();
            self.info.model_number = text;
        } else if characteristic == protocol::SERIAL_NUMBER {
            self.info.serial_number = text;
        } else if characteristic == protocol::FIRMWARE_REVISION {
            self.info.firmware_revision = text;
        } else if characteristic == protocol::HARDWARE_REVISION {
            self.info.hardware_revision = text;
        } else if characteristic == protocol::SOFTWARE_REVISION {
            self.info.software_revision = text;
        } else if characteristic == protocol::MANUFACTURER_NAME {
            self.info.manufacturer_name = text;
        } else if characteristic == protocol::REGULATORY_CERTIFICATION {
            self.info.regulatory_certification = text;
        } else if characteristic == protocol::PNP_ID {
            self.info.pnp_id = text;
        } else {
            debug!(%characteristic, "unrecognized device-information characteristic");
        }
    }

    async fn start_stream(
        &mut self,
        capability: Capability,
    ) -> Result<MeasurementStream, DeviceError> {
        if self.streams.contains_key(&capability) {
            return Err(DeviceError::AlreadyStreaming(capability));
        }
        let descriptor = self
            .discovery
            .profile()
            .and_then(|p| p.descriptor(capability))
            .ok_or(DeviceError::NoCharacteristics)?;
        if !self.discovery.discovered().contains(capability) {
            return Err(DeviceError::NoCharacteristics);
        }
        let resolved = self.discovery.resolved(capability).unwrap_or_default();
        let data = resolved.data.ok_or(DeviceError::NoCharacteristics)?;

        // The requester holds the device handle, so the upgrade succeeds
        // for as long as a stream can be asked for.
        let control = self
            .control
            .upgrade()
            .ok_or(DeviceError::Disconnected)?;

        self.adapter.set_notify(true, data).await?;
        if let Some(configuration) = resolved.configuration {
            self.adapter
                .write_value(descriptor.enable, configuration, true)
                .await?;
        }
        if let Some(period) = resolved.period {
            let payload = match self.config.sample_period {
                Some(period_byte) => vec![period_byte],
                None => descriptor.period_payload.to_vec(),
            };
            self.adapter.write_value(&payload, period, true).await?;
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        self.streams.insert(capability, sender);
        debug!(?capability, "stream started");
        Ok(MeasurementStream::new(capability, receiver, control))
    }

    /// Disable writes are issued exactly once per prior enable: the map
    /// entry is removed first, and any later stop request finds nothing.
    async fn stop_stream(&mut self, capability: Capability) {
        if self.streams.remove(&capability).is_none() {
            return;
        }
        let Some(descriptor) = self
            .discovery
            .profile()
            .and_then(|p| p.descriptor(capability))
        else {
            return;
        };
        let resolved = self.discovery.resolved(capability).unwrap_or_default();
        if let Some(data) = resolved.data {
            if let Err(error) = self.adapter.set_notify(false, data).await {
                warn!(?capability, %error, "unsubscribe failed");
            }
        }
        if let Some(configuration) = resolved.configuration {
            if let Err(error) = self
                .adapter
                .write_value(descriptor.disable, configuration, true)
                .await
            {
                warn!(?capability, %error, "disable write failed");
            }
        }
        debug!(?capability, "stream stopped");
    }

    fn fail_adapter(&mut self, error: AdapterError) {
        self.discovery.abort(DeviceError::Adapter(error.clone()));
        self.resolve_ready(Err(DeviceError::Adapter(error)));
    }

    /// Resolving the ready waiter is at-most-once: the sender is taken,
    /// so later resolution attempts are no-ops.
    fn resolve_ready(&mut self, result: Result<(), DeviceError>) {
        if let Some(waiter) = self.ready.take() {
            let _ = waiter.send(result);
        }
    }

    fn shutdown(&mut self) {
        info!("session closed");
        self.resolve_ready(Err(DeviceError::Disconnected));
        // Dropping the senders ends every consumer stream.
        self.streams.clear();
    }
}
