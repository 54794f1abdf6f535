//! # In-Memory Host and Transport
//!
//! Deterministic stand-ins for the host simulation and the session layer,
//! used by unit tests, integration tests and benchmarks.
//!
//! ```text
//! LoopbackBus ─┬─ LoopbackTransport ("Val")
//!              ├─ LoopbackTransport ("Bob")
//!              └─ LoopbackTransport (anonymous)
//! ```
//!
//! Every send is recorded and relayed to every registered handler on the
//! channel, the sender's own included, the way a relay server echoes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use concord_protocol::{Delivery, Vector3d, VesselId};
use parking_lot::Mutex;

use crate::error::{HostError, HostResult, TransportError};
use crate::host::{
    PartKey, PartSample, SimulationHost, StructureCondition, StructureHandle, StructureSample,
    WeaponKey, WeaponSample,
};
use crate::identity::EntityAttributes;
use crate::transport::{InboundHandler, Transport};

/// Damage fraction at which a mock structure stops standing.
pub const MOCK_STRUCTURE_DESTROYED: f32 = 1.0;

struct MockStructure {
    handle: StructureHandle,
    attributes: EntityAttributes,
    damage_fraction: f32,
    collapsed: bool,
}

/// Mock implementation of [`SimulationHost`] for testing.
#[derive(Default)]
pub struct MockSimulation {
    structures: Vec<MockStructure>,
    faulty_structures: Vec<HostError>,
    next_handle: u64,
    parts: BTreeMap<PartKey, f32>,
    faulty_parts: Vec<HostError>,
    weapons: BTreeMap<WeaponKey, bool>,
    faulty_weapons: Vec<HostError>,
    destroyed_vessels: BTreeSet<VesselId>,
    explosions: Vec<(f32, Vector3d)>,
    write_fault: Option<HostError>,
}

impl MockSimulation {
    /// Creates an empty mock world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a structure and returns its handle.
    pub fn add_structure(&mut self, attributes: EntityAttributes, damage_fraction: f32) -> StructureHandle {
        let handle = StructureHandle(self.next_handle);
        self.next_handle += 1;
        self.structures.push(MockStructure {
            handle,
            attributes,
            damage_fraction,
            collapsed: false,
        });
        handle
    }

    /// Adds a structure that fails to be read.
    pub fn add_faulty_structure(&mut self, error: HostError) {
        self.faulty_structures.push(error);
    }

    /// Changes a structure's damage as local gameplay would.
    pub fn set_structure_damage_local(&mut self, handle: StructureHandle, damage_fraction: f32) {
        if let Some(structure) = self.structure_mut(handle) {
            structure.damage_fraction = damage_fraction;
        }
    }

    /// Current damage of a structure.
    #[must_use]
    pub fn structure_damage(&self, handle: StructureHandle) -> Option<f32> {
        self.structures
            .iter()
            .find(|s| s.handle == handle)
            .map(|s| s.damage_fraction)
    }

    /// True if the structure was collapsed.
    #[must_use]
    pub fn is_collapsed(&self, handle: StructureHandle) -> bool {
        self.structures.iter().any(|s| s.handle == handle && s.collapsed)
    }

    /// Adds a part with the given damage.
    pub fn add_part(&mut self, key: PartKey, damage: f32) {
        self.parts.insert(key, damage);
    }

    /// Adds a part that fails to be read.
    pub fn add_faulty_part(&mut self, error: HostError) {
        self.faulty_parts.push(error);
    }

    /// Changes a part's damage as local gameplay would.
    pub fn set_part_damage_local(&mut self, key: PartKey, damage: f32) {
        if let Some(value) = self.parts.get_mut(&key) {
            *value = damage;
        }
    }

    /// Current damage of a part.
    #[must_use]
    pub fn part_damage(&self, key: PartKey) -> Option<f32> {
        self.parts.get(&key).copied()
    }

    /// Unloads a vessel with all its parts and weapons.
    pub fn remove_vessel(&mut self, vessel: VesselId) {
        self.parts.retain(|key, _| key.vessel != vessel);
        self.weapons.retain(|key, _| key.vessel != vessel);
    }

    /// True if the vessel was marked for destruction.
    #[must_use]
    pub fn is_marked_for_destruction(&self, vessel: VesselId) -> bool {
        self.destroyed_vessels.contains(&vessel)
    }

    /// Declares a weapon.
    pub fn add_weapon(&mut self, key: WeaponKey, firing: bool) {
        self.weapons.insert(key, firing);
    }

    /// Adds a weapon that fails to be read.
    pub fn add_faulty_weapon(&mut self, error: HostError) {
        self.faulty_weapons.push(error);
    }

    /// Changes a weapon's firing state as local gameplay would.
    pub fn set_weapon_firing_local(&mut self, key: &WeaponKey, firing: bool) {
        if let Some(value) = self.weapons.get_mut(key) {
            *value = firing;
        }
    }

    /// Current firing state of a weapon.
    #[must_use]
    pub fn weapon_firing(&self, key: &WeaponKey) -> Option<bool> {
        self.weapons.get(key).copied()
    }

    /// Explosions spawned so far, in order.
    #[must_use]
    pub fn explosions(&self) -> &[(f32, Vector3d)] {
        &self.explosions
    }

    /// Makes every write fail with `error` until [`Self::clear_write_fault`].
    pub fn fail_writes(&mut self, error: HostError) {
        self.write_fault = Some(error);
    }

    /// Lets writes succeed again.
    pub fn clear_write_fault(&mut self) {
        self.write_fault = None;
    }

    fn check_writable(&self) -> HostResult<()> {
        self.write_fault.clone().map_or(Ok(()), Err)
    }

    fn structure_mut(&mut self, handle: StructureHandle) -> Option<&mut MockStructure> {
        self.structures.iter_mut().find(|s| s.handle == handle)
    }

    fn has_vessel(&self, vessel: VesselId) -> bool {
        self.parts.keys().any(|key| key.vessel == vessel)
            || self.weapons.keys().any(|key| key.vessel == vessel)
    }
}

impl SimulationHost for MockSimulation {
    fn sample_structures(&self) -> Vec<HostResult<StructureSample>> {
        self.structures
            .iter()
            .filter(|s| !s.collapsed)
            .map(|s| {
                Ok(StructureSample {
                    handle: s.handle,
                    attributes: s.attributes.clone(),
                    damage_fraction: s.damage_fraction,
                })
            })
            .chain(self.faulty_structures.iter().cloned().map(Err))
            .collect()
    }

    fn set_structure_damage(
        &mut self,
        handle: StructureHandle,
        damage_fraction: f32,
    ) -> HostResult<StructureCondition> {
        self.check_writable()?;
        let structure = self
            .structure_mut(handle)
            .ok_or(HostError::StructureNotFound(handle.0))?;
        structure.damage_fraction = damage_fraction;

        if damage_fraction >= MOCK_STRUCTURE_DESTROYED {
            Ok(StructureCondition::Destroyed)
        } else {
            Ok(StructureCondition::Intact)
        }
    }

    fn collapse_structure(&mut self, handle: StructureHandle) -> HostResult<()> {
        self.check_writable()?;
        let structure = self
            .structure_mut(handle)
            .ok_or(HostError::StructureNotFound(handle.0))?;
        structure.collapsed = true;
        Ok(())
    }

    fn sample_parts(&self) -> Vec<HostResult<PartSample>> {
        self.parts
            .iter()
            .map(|(key, damage)| {
                Ok(PartSample {
                    key: *key,
                    damage: *damage,
                })
            })
            .chain(self.faulty_parts.iter().cloned().map(Err))
            .collect()
    }

    fn set_part_damage(&mut self, key: PartKey, damage: f32, _explosive: bool) -> HostResult<()> {
        self.check_writable()?;
        if !self.has_vessel(key.vessel) {
            return Err(HostError::VesselNotFound(key.vessel));
        }
        let value = self.parts.get_mut(&key).ok_or(HostError::PartNotFound {
            vessel: key.vessel,
            part: key.part,
        })?;
        *value = damage;
        Ok(())
    }

    fn mark_vessel_for_destruction(&mut self, vessel: VesselId) -> HostResult<()> {
        self.check_writable()?;
        if !self.has_vessel(vessel) {
            return Err(HostError::VesselNotFound(vessel));
        }
        self.destroyed_vessels.insert(vessel);
        Ok(())
    }

    fn sample_weapons(&self) -> Vec<HostResult<WeaponSample>> {
        self.weapons
            .iter()
            .map(|(key, firing)| {
                Ok(WeaponSample {
                    key: key.clone(),
                    firing: *firing,
                })
            })
            .chain(self.faulty_weapons.iter().cloned().map(Err))
            .collect()
    }

    fn set_weapon_firing(&mut self, key: &WeaponKey, firing: bool) -> HostResult<()> {
        self.check_writable()?;
        if !self.has_vessel(key.vessel) {
            return Err(HostError::VesselNotFound(key.vessel));
        }
        let value = self.weapons.get_mut(key).ok_or_else(|| HostError::WeaponNotFound {
            vessel: key.vessel,
            name: key.weapon_name.clone(),
        })?;
        *value = firing;
        Ok(())
    }

    fn spawn_explosion(&mut self, power: f32, position: Vector3d) -> HostResult<()> {
        self.check_writable()?;
        self.explosions.push((power, position));
        Ok(())
    }
}

/// One payload handed to the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct SentDatagram {
    /// Name of the sending peer, if it had one.
    pub sender: Option<String>,
    /// Channel name.
    pub channel: String,
    /// Encoded message.
    pub payload: Vec<u8>,
    /// Requested delivery class.
    pub delivery: Delivery,
}

struct Registration {
    endpoint: u64,
    peer: Option<String>,
    channel: String,
    handler: InboundHandler,
}

#[derive(Default)]
struct BusState {
    registrations: Vec<Registration>,
    sent: Vec<SentDatagram>,
    next_endpoint: u64,
}

impl BusState {
    fn relay(&mut self, channel: &str, payload: &[u8]) -> usize {
        let mut delivered = 0;
        for registration in self.registrations.iter_mut().filter(|r| r.channel == channel) {
            (registration.handler)(payload);
            delivered += 1;
        }
        delivered
    }
}

/// Shared in-memory relay connecting any number of [`LoopbackTransport`]s.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

impl LoopbackBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a peer with the given display name.
    #[must_use]
    pub fn transport(&self, peer_name: &str) -> LoopbackTransport {
        self.attach(Some(peer_name.to_owned()))
    }

    /// Attaches a peer whose session has no display name.
    #[must_use]
    pub fn anonymous_transport(&self) -> LoopbackTransport {
        self.attach(None)
    }

    fn attach(&self, peer: Option<String>) -> LoopbackTransport {
        let mut state = self.state.lock();
        let endpoint = state.next_endpoint;
        state.next_endpoint += 1;
        LoopbackTransport {
            bus: Arc::clone(&self.state),
            endpoint,
            peer,
            rejected_channels: Vec::new(),
            fail_sends: false,
        }
    }

    /// Delivers a raw payload to every handler on `channel` without recording it.
    ///
    /// Returns the number of handlers reached.
    pub fn inject(&self, channel: &str, payload: &[u8]) -> usize {
        self.state.lock().relay(channel, payload)
    }

    /// True if the named peer has a handler on `channel`.
    #[must_use]
    pub fn has_handler(&self, peer_name: &str, channel: &str) -> bool {
        self.state
            .lock()
            .registrations
            .iter()
            .any(|r| r.peer.as_deref() == Some(peer_name) && r.channel == channel)
    }

    /// Number of registered handlers across all peers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.state.lock().registrations.len()
    }

    /// Every payload sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.state.lock().sent.clone()
    }

    /// Forgets the send log.
    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }
}

/// Mock implementation of [`Transport`] attached to a [`LoopbackBus`].
pub struct LoopbackTransport {
    bus: Arc<Mutex<BusState>>,
    endpoint: u64,
    peer: Option<String>,
    rejected_channels: Vec<String>,
    fail_sends: bool,
}

impl LoopbackTransport {
    /// Makes handler registration on `channel` fail.
    #[must_use]
    pub fn rejecting_channel(mut self, channel: &str) -> Self {
        self.rejected_channels.push(channel.to_owned());
        self
    }

    /// Makes every send fail.
    #[must_use]
    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Display name of this peer.
    #[must_use]
    pub fn peer_name(&self) -> Option<&str> {
        self.peer.as_deref()
    }
}

impl Transport for LoopbackTransport {
    fn register_channel_handler(
        &mut self,
        channel: &str,
        handler: InboundHandler,
    ) -> Result<(), TransportError> {
        if self.rejected_channels.iter().any(|c| c == channel) {
            return Err(TransportError::RegistrationRejected(channel.to_owned()));
        }

        let mut state = self.bus.lock();
        state
            .registrations
            .retain(|r| !(r.endpoint == self.endpoint && r.channel == channel));
        state.registrations.push(Registration {
            endpoint: self.endpoint,
            peer: self.peer.clone(),
            channel: channel.to_owned(),
            handler,
        });
        Ok(())
    }

    fn send(&mut self, channel: &str, payload: &[u8], delivery: Delivery) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::SendFailed {
                channel: channel.to_owned(),
                reason: "loopback configured to fail".to_owned(),
            });
        }

        let mut state = self.bus.lock();
        state.sent.push(SentDatagram {
            sender: self.peer.clone(),
            channel: channel.to_owned(),
            payload: payload.to_vec(),
            delivery,
        });
        state.relay(channel, payload);
        Ok(())
    }

    fn local_peer_name(&self) -> Option<String> {
        self.peer.clone()
    }
}
