//! Integration test for multi-peer convergence over the loopback transport.

use std::time::Duration;

use concord_protocol::{
    Delivery, MessageKind, PartId, SyncMessage, Vector3d, VesselDamage, VesselId, WeaponFire,
    PART_DESTROYED_DAMAGE,
};
use concord_sync::mock::{LoopbackBus, LoopbackTransport, MockSimulation};
use concord_sync::{EntityAttributes, PartKey, SyncConfig, SyncSession, WeaponKey};

const TICK: Duration = Duration::from_millis(20);

type Peer = SyncSession<MockSimulation, LoopbackTransport>;

fn join(bus: &LoopbackBus, name: &str, host: MockSimulation) -> Peer {
    SyncSession::start(&SyncConfig::default(), Some(bus.transport(name)), Some(host)).unwrap()
}

/// Ticks every peer in order, `ticks` times.
fn run(peers: &mut [Peer], ticks: usize) {
    for _ in 0..ticks {
        for peer in peers.iter_mut() {
            peer.tick(TICK);
        }
    }
}

fn sent_on(bus: &LoopbackBus, kind: MessageKind) -> Vec<SyncMessage> {
    bus.sent()
        .iter()
        .filter(|d| d.channel == kind.channel())
        .map(|d| SyncMessage::decode_as(kind, &d.payload).unwrap())
        .collect()
}

fn vessel() -> VesselId {
    VesselId::from_u128(0x5EED_0001)
}

fn hull() -> PartKey {
    PartKey::new(vessel(), PartId(1))
}

fn gun() -> WeaponKey {
    WeaponKey::new(vessel(), "bahaGau8")
}

/// A host with one vessel that has a hull part and a gun.
fn host_with_vessel() -> MockSimulation {
    let mut host = MockSimulation::new();
    host.add_part(hull(), 0.0);
    host.add_weapon(gun(), false);
    host
}

#[test]
fn test_structure_damage_converges_despite_position_jitter() {
    let bus = LoopbackBus::new();

    let mut val_host = MockSimulation::new();
    let val_vab = val_host.add_structure(
        EntityAttributes::new("17", "VAB", Vector3d::new(100.2, 5.0, -3.4)),
        0.40,
    );
    let mut bob_host = MockSimulation::new();
    let bob_vab = bob_host.add_structure(
        EntityAttributes::new("17", "VAB", Vector3d::new(99.8, 4.9, -3.1)),
        0.40,
    );

    let mut peers = vec![join(&bus, "Val", val_host), join(&bus, "Bob", bob_host)];

    // First structure pass: baselines only.
    run(&mut peers, 50);
    assert!(bus.sent().is_empty());

    peers[0].host_mut().set_structure_damage_local(val_vab, 0.55);
    run(&mut peers, 50);

    assert_eq!(peers[1].host().structure_damage(bob_vab), Some(0.55));
    let sent = sent_on(&bus, MessageKind::StructureDamage);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].player_name(), "Val");

    // Bob already tracks the applied value, so nothing bounces back.
    run(&mut peers, 100);
    assert_eq!(sent_on(&bus, MessageKind::StructureDamage).len(), 1);
    assert_eq!(peers[0].host().structure_damage(val_vab), Some(0.55));
}

#[test]
fn test_small_structure_change_is_not_sent() {
    let bus = LoopbackBus::new();
    let mut host = MockSimulation::new();
    let vab = host.add_structure(EntityAttributes::new("17", "VAB", Vector3d::default()), 0.55);
    let mut peers = vec![join(&bus, "Val", host), join(&bus, "Bob", MockSimulation::new())];

    run(&mut peers, 50);
    peers[0].host_mut().set_structure_damage_local(vab, 0.56);
    run(&mut peers, 100);

    assert!(sent_on(&bus, MessageKind::StructureDamage).is_empty());
}

#[test]
fn test_structure_destruction_collapses_remote_copy() {
    let bus = LoopbackBus::new();
    let attributes = EntityAttributes::new("9", "Tower", Vector3d::new(10.0, 0.0, 10.0));

    let mut val_host = MockSimulation::new();
    let val_tower = val_host.add_structure(attributes.clone(), 0.2);
    let mut bob_host = MockSimulation::new();
    let bob_tower = bob_host.add_structure(attributes, 0.2);

    let mut peers = vec![join(&bus, "Val", val_host), join(&bus, "Bob", bob_host)];
    run(&mut peers, 50);

    peers[0].host_mut().set_structure_damage_local(val_tower, 1.0);
    run(&mut peers, 50);

    assert!(peers[1].host().is_collapsed(bob_tower));
    assert_eq!(peers[1].stats().structures_collapsed, 1);
}

#[test]
fn test_reported_part_damage_reaches_remote_once() {
    let bus = LoopbackBus::new();
    let mut peers = vec![
        join(&bus, "Val", host_with_vessel()),
        join(&bus, "Bob", host_with_vessel()),
    ];

    peers[0].host_mut().set_part_damage_local(hull(), 50.0);
    peers[0].report_part_damage(vessel(), PartId(1), 50.0, true);

    // One batch window.
    run(&mut peers, 5);

    assert_eq!(peers[1].host().part_damage(hull()), Some(50.0));
    let sent = sent_on(&bus, MessageKind::VesselDamage);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        SyncMessage::VesselDamage(damage) => {
            assert!(damage.explosive);
            assert_eq!(damage.player_name, "Val");
        }
        other => panic!("unexpected {other:?}"),
    }

    run(&mut peers, 50);
    assert_eq!(sent_on(&bus, MessageKind::VesselDamage).len(), 1);
}

#[allow(clippy::cast_precision_loss)]
fn damage_for(part: u32) -> f32 {
    (part * 10) as f32
}

#[test]
fn test_sampled_part_damage_is_batched() {
    let bus = LoopbackBus::new();
    let mut val_host = host_with_vessel();
    for part in 2..6 {
        val_host.add_part(PartKey::new(vessel(), PartId(part)), 0.0);
    }
    let mut bob_host = host_with_vessel();
    for part in 2..6 {
        bob_host.add_part(PartKey::new(vessel(), PartId(part)), 0.0);
    }
    let mut peers = vec![join(&bus, "Val", val_host), join(&bus, "Bob", bob_host)];

    // Baseline every part on the first tick.
    run(&mut peers, 1);
    for part in 1..6 {
        peers[0]
            .host_mut()
            .set_part_damage_local(PartKey::new(vessel(), PartId(part)), damage_for(part));
    }
    run(&mut peers, 1);
    assert_eq!(peers[0].pending_deltas(), 5);
    assert!(sent_on(&bus, MessageKind::VesselDamage).is_empty());

    run(&mut peers, 3);
    assert_eq!(sent_on(&bus, MessageKind::VesselDamage).len(), 5);
    for part in 1..6 {
        assert_eq!(
            peers[1].host().part_damage(PartKey::new(vessel(), PartId(part))),
            Some(damage_for(part))
        );
    }
}

#[test]
fn test_part_destruction_marks_remote_vessel() {
    let bus = LoopbackBus::new();
    let mut peers = vec![
        join(&bus, "Val", host_with_vessel()),
        join(&bus, "Bob", host_with_vessel()),
    ];

    peers[0].host_mut().set_part_damage_local(hull(), PART_DESTROYED_DAMAGE);
    peers[0].report_part_destroyed(vessel(), PartId(1), true);
    run(&mut peers, 5);

    assert!(peers[1].host().is_marked_for_destruction(vessel()));
    assert_eq!(peers[1].host().part_damage(hull()), Some(PART_DESTROYED_DAMAGE));
    assert_eq!(peers[1].stats().vessels_destroyed, 1);
    assert!(!peers[0].host().is_marked_for_destruction(vessel()));
}

#[test]
fn test_weapon_firing_mirrors_on_remote() {
    let bus = LoopbackBus::new();
    let mut peers = vec![
        join(&bus, "Val", host_with_vessel()),
        join(&bus, "Bob", host_with_vessel()),
    ];

    // First weapon pass at 0.2s is the baseline.
    run(&mut peers, 10);
    peers[0].host_mut().set_weapon_firing_local(&gun(), true);
    run(&mut peers, 10);
    assert_eq!(peers[1].host().weapon_firing(&gun()), Some(true));

    peers[0].host_mut().set_weapon_firing_local(&gun(), false);
    run(&mut peers, 10);
    assert_eq!(peers[1].host().weapon_firing(&gun()), Some(false));

    let weapon_datagrams: Vec<_> = bus
        .sent()
        .into_iter()
        .filter(|d| d.channel == MessageKind::WeaponFire.channel())
        .collect();
    assert_eq!(weapon_datagrams.len(), 2);
    assert!(weapon_datagrams.iter().all(|d| d.delivery == Delivery::BEST_EFFORT));
    assert!(weapon_datagrams.iter().all(|d| d.sender.as_deref() == Some("Val")));
}

#[test]
fn test_explosion_reaches_remote_host_only() {
    let bus = LoopbackBus::new();
    let mut peers = vec![
        join(&bus, "Val", MockSimulation::new()),
        join(&bus, "Bob", MockSimulation::new()),
        join(&bus, "Carol", MockSimulation::new()),
    ];

    let position = Vector3d::new(-1203.4, 65.0, 2280.6);
    assert!(peers[0].broadcast_explosion(12.5, position));
    run(&mut peers, 1);

    assert!(peers[0].host().explosions().is_empty());
    assert_eq!(peers[1].host().explosions(), &[(12.5, position)]);
    assert_eq!(peers[2].host().explosions(), &[(12.5, position)]);
    assert_eq!(peers[0].gateway_stats().echoes_suppressed, 1);
}

#[test]
fn test_three_peers_converge() {
    let bus = LoopbackBus::new();
    let attributes = EntityAttributes::new("3", "Hangar", Vector3d::new(0.0, 0.0, 0.0));

    let mut handles = Vec::new();
    let mut peers = Vec::new();
    for name in ["Val", "Bob", "Carol"] {
        let mut host = host_with_vessel();
        handles.push(host.add_structure(attributes.clone(), 0.0));
        peers.push(join(&bus, name, host));
    }
    run(&mut peers, 50);

    // Bob damages the hangar, Carol's gun starts firing.
    peers[1].host_mut().set_structure_damage_local(handles[1], 0.3);
    peers[2].host_mut().set_weapon_firing_local(&gun(), true);
    // Val ticks before Bob, so it hears Bob's structure pass one tick later.
    run(&mut peers, 51);

    for (peer, handle) in peers.iter().zip(&handles) {
        assert_eq!(peer.host().structure_damage(*handle), Some(0.3));
        assert_eq!(peer.host().weapon_firing(&gun()), Some(true));
    }
    assert_eq!(sent_on(&bus, MessageKind::StructureDamage).len(), 1);
    assert_eq!(sent_on(&bus, MessageKind::WeaponFire).len(), 1);
}

#[test]
fn test_missing_target_is_discarded() {
    let bus = LoopbackBus::new();
    let mut peers = vec![
        join(&bus, "Val", host_with_vessel()),
        join(&bus, "Bob", MockSimulation::new()),
    ];

    peers[0].host_mut().set_part_damage_local(hull(), 25.0);
    peers[0].report_part_damage(vessel(), PartId(1), 25.0, false);
    run(&mut peers, 5);

    assert_eq!(peers[1].stats().targets_missing, 1);
    assert_eq!(peers[1].stats().applied, 0);
    assert_eq!(peers[1].host().part_damage(hull()), None);
}

#[test]
fn test_duplicate_delivery_is_idempotent() {
    let bus = LoopbackBus::new();
    let mut peers = vec![join(&bus, "Bob", host_with_vessel())];

    let payload = SyncMessage::from(VesselDamage {
        vessel_id: vessel(),
        part_id: PartId(1),
        damage: 33.0,
        explosive: false,
        player_name: "Carol".into(),
    })
    .encode()
    .unwrap();

    let channel = MessageKind::VesselDamage.channel();
    bus.inject(channel, &payload);
    run(&mut peers, 1);
    bus.inject(channel, &payload);
    run(&mut peers, 1);

    assert_eq!(peers[0].host().part_damage(hull()), Some(33.0));
    assert_eq!(peers[0].parts().tracked().get(&hull()), Some(33.0));
    assert_eq!(peers[0].stats().applied, 2);
    assert!(bus.sent().is_empty());
}

#[test]
fn test_malformed_payloads_are_dropped() {
    let bus = LoopbackBus::new();
    let mut peers = vec![join(&bus, "Bob", host_with_vessel())];

    let weapon = SyncMessage::from(WeaponFire {
        vessel_id: vessel(),
        weapon_name: "bahaGau8".into(),
        firing: true,
        player_name: "Carol".into(),
    })
    .encode()
    .unwrap();

    let structure_channel = MessageKind::StructureDamage.channel();
    bus.inject(structure_channel, &weapon);
    bus.inject(structure_channel, &[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    bus.inject(MessageKind::Explosion.channel(), &[]);
    run(&mut peers, 1);

    let stats = peers[0].gateway_stats();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.decode_failures, 3);
    assert_eq!(peers[0].stats().applied, 0);
    assert_eq!(peers[0].host().weapon_firing(&gun()), Some(false));
}

#[test]
fn test_anonymous_peer_uses_fallback_name() {
    let bus = LoopbackBus::new();
    let mut anonymous =
        SyncSession::start(&SyncConfig::default(), Some(bus.anonymous_transport()), Some(MockSimulation::new()))
            .unwrap();
    let mut bob = join(&bus, "Bob", MockSimulation::new());

    assert_eq!(anonymous.gateway().peer().as_str(), "Unknown");
    assert!(anonymous.broadcast_explosion(1.0, Vector3d::default()));
    anonymous.tick(TICK);
    bob.tick(TICK);

    let sent = sent_on(&bus, MessageKind::Explosion);
    assert_eq!(sent[0].player_name(), "Unknown");
    assert_eq!(bob.host().explosions().len(), 1);
}
