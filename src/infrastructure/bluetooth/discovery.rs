//! Discovery State Machine
//!
//! Drives service discovery, per-service characteristic discovery,
//! initial reads and immediate subscriptions, and decides readiness. The
//! machine is synchronous: each adapter event maps to a list of
//! [`DiscoveryAction`]s for the session to execute, which keeps it
//! testable without a transport.
//!
//! Characteristic-discovery completions may arrive in any relative order
//! across services; readiness is decided by a set-membership check
//! against the profile's required capabilities, never by sequence
//! position.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::capability::{Capability, CapabilitySet};
use crate::error::DeviceError;
use crate::infrastructure::bluetooth::adapter::AdapterError;
use crate::infrastructure::bluetooth::protocol::{
    self, DeviceProfile, OnDiscovery, ServiceDescriptor,
};

/// Connection-level discovery progress.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryState {
    Idle,
    /// Service discovery requested, response pending.
    ServicesRequested,
    /// Characteristic discovery in flight for `outstanding` services.
    CharacteristicsPending { outstanding: usize },
    Ready,
    Failed(DeviceError),
}

/// Side effects the session must perform for a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryAction {
    DiscoverCharacteristics {
        service: Uuid,
        characteristics: Vec<Uuid>,
    },
    ReadValue {
        characteristic: Uuid,
    },
    Subscribe {
        characteristic: Uuid,
    },
    /// Resolve the pending ready waiter. Emitted at most once.
    Resolve(Result<(), DeviceError>),
}

/// Characteristic handles resolved for one capability.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolvedCharacteristics {
    pub data: Option<Uuid>,
    pub configuration: Option<Uuid>,
    pub period: Option<Uuid>,
}

pub struct Discovery {
    state: DiscoveryState,
    profile: Option<&'static DeviceProfile>,
    discovered: CapabilitySet,
    characteristics: HashMap<Capability, ResolvedCharacteristics>,
    routes: HashMap<Uuid, Capability>,
}

impl Discovery {
    pub fn new() -> Self {
        Self {
            state: DiscoveryState::Idle,
            profile: None,
            discovered: CapabilitySet::EMPTY,
            characteristics: HashMap::new(),
            routes: HashMap::new(),
        }
    }

    pub fn state(&self) -> &DiscoveryState {
        &self.state
    }

    /// Capabilities whose required characteristics have all resolved.
    pub fn discovered(&self) -> CapabilitySet {
        self.discovered
    }

    /// The profile probed from the service-discovery response.
    pub fn profile(&self) -> Option<&'static DeviceProfile> {
        self.profile
    }

    pub fn resolved(&self, capability: Capability) -> Option<ResolvedCharacteristics> {
        self.characteristics.get(&capability).copied()
    }

    /// Capability owning a characteristic, for value routing.
    pub fn route(&self, characteristic: Uuid) -> Option<Capability> {
        self.routes.get(&characteristic).copied()
    }

    /// Mark service discovery as requested.
    pub fn start(&mut self) {
        self.state = DiscoveryState::ServicesRequested;
    }

    /// Force the machine into a terminal failure without emitting the
    /// resolve action; a no-op once the machine is terminal.
    pub fn abort(&mut self, error: DeviceError) {
        if !self.is_terminal() {
            self.state = DiscoveryState::Failed(error);
        }
    }

    pub fn on_services(&mut self, result: Result<Vec<Uuid>, AdapterError>) -> Vec<DiscoveryAction> {
        let services = match result {
            Ok(services) => services,
            Err(error) => return self.fail(DeviceError::Adapter(error)),
        };
        if services.is_empty() {
            return self.fail(DeviceError::NoServices);
        }

        let profile = protocol::detect_profile(&services);
        debug!(profile = profile.name, "probed device profile");
        self.profile = Some(profile);

        let mut actions = Vec::new();
        for descriptor in profile.services {
            if services.contains(&descriptor.service) {
                actions.push(DiscoveryAction::DiscoverCharacteristics {
                    service: descriptor.service,
                    characteristics: descriptor.characteristics.to_vec(),
                });
            }
        }
        if actions.is_empty() {
            return self.fail(DeviceError::NoServices);
        }

        self.state = DiscoveryState::CharacteristicsPending {
            outstanding: actions.len(),
        };
        actions
    }

    pub fn on_characteristics(
        &mut self,
        service: Uuid,
        result: Result<Vec<Uuid>, AdapterError>,
    ) -> Vec<DiscoveryAction> {
        let found = match result {
            Ok(found) => found,
            Err(error) => return self.fail(DeviceError::Adapter(error)),
        };
        if found.is_empty() {
            return self.fail(DeviceError::NoCharacteristics);
        }
        let Some(profile) = self.profile else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        match profile.descriptor_for_service(service) {
            Some(descriptor) => self.resolve_service(descriptor, &found, &mut actions),
            None => warn!(%service, "characteristics for an unexpected service"),
        }

        if let DiscoveryState::CharacteristicsPending { outstanding } = &mut self.state {
            *outstanding = outstanding.saturating_sub(1);
            if *outstanding == 0 && self.discovered.contains_all(profile.required) {
                self.state = DiscoveryState::Ready;
                actions.push(DiscoveryAction::Resolve(Ok(())));
            }
        }
        actions
    }

    /// Match one service's discovery response against its descriptor.
    ///
    /// A capability is marked discovered only when every characteristic
    /// the descriptor declares resolved to a handle. A partial response
    /// leaves the capability undiscovered but does not abort the session.
    fn resolve_service(
        &mut self,
        descriptor: &ServiceDescriptor,
        found: &[Uuid],
        actions: &mut Vec<DiscoveryAction>,
    ) {
        let capability = descriptor.capability;
        let pick = |wanted: Option<Uuid>| wanted.filter(|uuid| found.contains(uuid));
        let resolved = ResolvedCharacteristics {
            data: pick(descriptor.data),
            configuration: pick(descriptor.configuration),
            period: pick(descriptor.period),
        };

        let complete = resolved.data.is_some() == descriptor.data.is_some()
            && resolved.configuration.is_some() == descriptor.configuration.is_some()
            && resolved.period.is_some() == descriptor.period.is_some();
        if !complete {
            warn!(
                ?capability,
                "required characteristics missing, capability left undiscovered"
            );
            return;
        }

        self.characteristics.insert(capability, resolved);
        self.discovered.insert(capability);
        for characteristic in found {
            if descriptor.characteristics.contains(characteristic) {
                self.routes.insert(*characteristic, capability);
            }
        }

        match descriptor.on_discovery {
            OnDiscovery::ReadAll => {
                for characteristic in found {
                    if descriptor.characteristics.contains(characteristic) {
                        actions.push(DiscoveryAction::ReadValue {
                            characteristic: *characteristic,
                        });
                    }
                }
            }
            OnDiscovery::Subscribe => {
                if let Some(data) = resolved.data {
                    actions.push(DiscoveryAction::Subscribe {
                        characteristic: data,
                    });
                }
            }
            OnDiscovery::None => {}
        }
    }

    fn fail(&mut self, error: DeviceError) -> Vec<DiscoveryAction> {
        if self.is_terminal() {
            return Vec::new();
        }
        self.state = DiscoveryState::Failed(error.clone());
        vec![DiscoveryAction::Resolve(Err(error))]
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            DiscoveryState::Ready | DiscoveryState::Failed(_)
        )
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}
