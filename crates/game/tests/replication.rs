use std::sync::Arc;

use glam::Vec3;

use sidearm::weapon::kinds;
use sidearm::{
    Armory, CharacterConfig, CombatError, ConnectionId, CueKind, DamageEvent, Damageable,
    EntityId, Envelope, Message, NetMode, ObserverScope, Outgoing, RemoteCall, SimpleScene, World,
};

/// One dedicated server and its clients, wired through the wire codec.
struct Session {
    server: World,
    clients: Vec<(ConnectionId, World)>,
}

impl Session {
    fn new() -> Self {
        Self {
            server: World::new(
                NetMode::DedicatedServer,
                Arc::new(Armory::standard()),
                Arc::new(CharacterConfig::default()),
                Box::new(SimpleScene::new()),
            ),
            clients: Vec::new(),
        }
    }

    fn join(&mut self, connection: ConnectionId) {
        let client = World::new(
            NetMode::Client,
            Arc::new(Armory::standard()),
            Arc::new(CharacterConfig::default()),
            Box::new(SimpleScene::new()),
        )
        .with_local_connection(connection);
        self.server.add_viewer(connection);
        self.clients.push((connection, client));
    }

    fn client(&self, connection: ConnectionId) -> &World {
        &self.clients.iter().find(|(c, _)| *c == connection).unwrap().1
    }

    fn client_mut(&mut self, connection: ConnectionId) -> &mut World {
        &mut self
            .clients
            .iter_mut()
            .find(|(c, _)| *c == connection)
            .unwrap()
            .1
    }

    /// Moves queued calls both ways, then sends each client its frame.
    fn deliver(&mut self) {
        let Self { server, clients } = self;

        for (connection, client) in clients.iter_mut() {
            for outgoing in client.drain_outgoing() {
                let Outgoing::ToAuthority(envelope) = outgoing else {
                    panic!("client queued an observer call");
                };
                let envelope = wire_call(envelope);
                let _ = server.receive_call(Some(*connection), envelope);
            }
        }

        for outgoing in server.drain_outgoing() {
            let Outgoing::ToObservers { envelope, scope } = outgoing else {
                panic!("server queued an authority call");
            };
            let owner = server.owning_connection(envelope.entity);
            for (connection, client) in clients.iter_mut() {
                let addressed = match scope {
                    ObserverScope::All => true,
                    ObserverScope::OwnerOnly => owner == Some(*connection),
                    ObserverScope::SkipOwner => owner != Some(*connection),
                };
                if addressed {
                    let _ = client.receive_call(None, wire_call(envelope.clone()));
                }
            }
        }

        for (connection, client) in clients.iter_mut() {
            let frame = server.build_frame(*connection);
            let bytes = Message::Frame(frame).encode().unwrap();
            let Message::Frame(frame) = Message::decode(&bytes).unwrap() else {
                panic!("frame decoded as a call");
            };
            client.apply_frame(&frame);
        }
    }

    fn run_for(&mut self, duration: f32) {
        let dt = self.server.clock().dt();
        let mut elapsed = 0.0;
        while elapsed + dt * 0.5 < duration {
            self.server.advance(dt);
            for (_, client) in &mut self.clients {
                client.advance(dt);
            }
            self.deliver();
            elapsed += dt;
        }
    }
}

fn wire_call(envelope: Envelope) -> Envelope {
    let bytes = Message::Call(envelope).encode().unwrap();
    match Message::decode(&bytes).unwrap() {
        Message::Call(envelope) => envelope,
        Message::Frame(_) => panic!("call decoded as a frame"),
    }
}

/// Client 1 drives a character at the origin; a server bot stands ten
/// metres down its aim.
fn duel() -> (Session, EntityId, EntityId) {
    let mut session = Session::new();
    session.join(1);
    let shooter = session
        .server
        .spawn_character(Some(1), 0, Vec3::ZERO, Vec3::NEG_Z)
        .unwrap();
    let victim = session
        .server
        .spawn_character(None, 1, Vec3::new(0.0, 0.0, -10.0), Vec3::Z)
        .unwrap();
    session.run_for(0.6);
    (session, shooter, victim)
}

fn rifle_of(world: &World, character: EntityId) -> EntityId {
    world.character(character).unwrap().current_weapon().unwrap()
}

#[test]
fn test_client_fire_spends_server_ammo() {
    let (mut session, shooter, victim) = duel();
    let rifle = rifle_of(&session.server, shooter);
    assert_eq!(rifle_of(session.client(1), shooter), rifle);

    let client = session.client_mut(1);
    client.start_weapon_fire(shooter).unwrap();
    client.stop_weapon_fire(shooter).unwrap();
    session.deliver();

    assert_eq!(session.server.weapon(rifle).unwrap().current_ammo_in_clip(), 29);
    assert_eq!(session.client(1).weapon(rifle).unwrap().current_ammo_in_clip(), 29);
    assert_eq!(session.server.character(victim).unwrap().health(), 85.0);
    assert_eq!(session.client(1).character(victim).unwrap().health(), 85.0);
}

#[test]
fn test_duplicate_fire_confirmation_is_ignored() {
    let (mut session, shooter, _) = duel();
    let rifle = rifle_of(&session.server, shooter);
    let call = |call: RemoteCall| Envelope::new(rifle, call);

    session.server.receive_call(Some(1), call(RemoteCall::StartFire)).unwrap();
    session
        .server
        .receive_call(Some(1), call(RemoteCall::HandleFiring { sequence: 1 }))
        .unwrap();
    session
        .server
        .receive_call(Some(1), call(RemoteCall::HandleFiring { sequence: 1 }))
        .unwrap();
    assert_eq!(session.server.weapon(rifle).unwrap().current_ammo_in_clip(), 29);

    session
        .server
        .receive_call(Some(1), call(RemoteCall::HandleFiring { sequence: 2 }))
        .unwrap();
    assert_eq!(session.server.weapon(rifle).unwrap().current_ammo_in_clip(), 28);
}

#[test]
fn test_shot_without_a_confirmed_fire_tick_is_rejected() {
    let (mut session, shooter, victim) = duel();
    let rifle = rifle_of(&session.server, shooter);

    let result = session.server.receive_call(
        Some(1),
        Envelope::new(
            rifle,
            RemoteCall::FireShot {
                origin: [0.0, 0.7, 0.0],
                direction: [0.0, 0.0, -1.0],
            },
        ),
    );
    assert!(matches!(result, Err(CombatError::Rejected { .. })));
    assert_eq!(session.server.character(victim).unwrap().health(), 100.0);
}

#[test]
fn test_calls_from_another_connection_are_rejected() {
    let (mut session, shooter, _) = duel();
    let rifle = rifle_of(&session.server, shooter);

    let result = session
        .server
        .receive_call(Some(2), Envelope::new(rifle, RemoteCall::StartFire));
    assert!(matches!(result, Err(CombatError::Rejected { .. })));
    assert!(!session.server.weapon(rifle).unwrap().wants_to_fire());
}

#[test]
fn test_malformed_movement_is_rejected() {
    let (mut session, shooter, _) = duel();
    let result = session.server.receive_call(
        Some(1),
        Envelope::new(
            shooter,
            RemoteCall::Move {
                position: [0.0, 0.0, 0.0],
                velocity: [0.0, 0.0, 0.0],
                aim: [0.0, 0.0, 0.0],
            },
        ),
    );
    assert!(matches!(result, Err(CombatError::Rejected { .. })));
}

#[test]
fn test_observer_calls_are_refused_by_the_authority() {
    let (mut session, shooter, _) = duel();
    let rifle = rifle_of(&session.server, shooter);
    let result = session
        .server
        .receive_call(Some(1), Envelope::new(rifle, RemoteCall::ClientStartReload));
    assert!(matches!(result, Err(CombatError::Rejected { .. })));
}

#[test]
fn test_client_equip_goes_through_the_authority() {
    let (mut session, shooter, _) = duel();
    let pistol = session.server.character(shooter).unwrap().inventory().weapons()[1];

    session.client_mut(1).equip_weapon(shooter, pistol).unwrap();
    assert_ne!(
        session.client(1).character(shooter).unwrap().current_weapon(),
        Some(pistol)
    );

    session.deliver();
    assert_eq!(
        session.server.character(shooter).unwrap().current_weapon(),
        Some(pistol)
    );
    assert_eq!(
        session.client(1).character(shooter).unwrap().current_weapon(),
        Some(pistol)
    );
}

#[test]
fn test_late_joiner_gets_no_stale_hit() {
    let (mut session, shooter, victim) = duel();
    session
        .server
        .take_damage(victim, DamageEvent::new(40.0, 1).from_weapon(shooter, shooter))
        .unwrap();
    session.deliver();
    session.run_for(1.0);

    session.join(2);
    session.deliver();

    let early = session.client(1);
    assert_eq!(
        early
            .cues()
            .count(|k| matches!(k, CueKind::HitReaction { .. })),
        1
    );
    assert_eq!(early.character(victim).unwrap().last_hit().serial, 1);

    let late = session.client(2);
    let mirrored = late.character(victim).unwrap();
    assert_eq!(mirrored.health(), 60.0);
    assert_eq!(mirrored.last_hit().serial, 0);
    assert_eq!(
        late.cues()
            .count(|k| matches!(k, CueKind::HitReaction { .. })),
        0
    );
}

#[test]
fn test_death_plays_once_on_clients() {
    let (mut session, shooter, victim) = duel();
    session
        .server
        .take_damage(victim, DamageEvent::new(150.0, 1).from_weapon(shooter, shooter))
        .unwrap();
    session.run_for(0.5);

    let client = session.client(1);
    let mirrored = client.character(victim).unwrap();
    assert!(mirrored.is_dying());
    assert!(mirrored.last_hit().killed);
    assert_eq!(client.cues().count(|k| matches!(k, CueKind::Death { .. })), 1);
    assert_eq!(mirrored.current_weapon(), None);
}

#[test]
fn test_explosion_replays_once_for_a_late_joiner() {
    let mut session = Session::new();
    session.join(1);
    let gunner = session
        .server
        .spawn_character(None, 0, Vec3::ZERO, Vec3::NEG_Z)
        .unwrap();
    session
        .server
        .spawn_character(None, 1, Vec3::new(0.0, 0.0, -10.0), Vec3::Z)
        .unwrap();
    let launcher = session.server.spawn_weapon(kinds::ROCKET_LAUNCHER).unwrap();
    session.server.add_weapon(gunner, launcher).unwrap();
    session.server.equip_weapon(gunner, launcher).unwrap();
    session.run_for(0.7);

    session.server.start_weapon_fire(gunner).unwrap();
    session.server.stop_weapon_fire(gunner).unwrap();
    session.run_for(0.6);
    let rocket = session.server.arena().projectiles().next().unwrap();
    assert!(rocket.has_exploded());

    session.join(2);
    session.run_for(0.5);

    let explosions = |world: &World| {
        world
            .cues()
            .count(|k| matches!(k, CueKind::Explosion { .. }))
    };
    assert_eq!(explosions(session.client(1)), 1);
    assert_eq!(explosions(session.client(2)), 1);

    session.run_for(2.0);
    assert_eq!(session.client(2).arena().projectiles().count(), 0);
    assert_eq!(explosions(session.client(2)), 1);
}
