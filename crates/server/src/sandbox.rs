use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Result;
use glam::Vec3;

use sidearm::{
    Armory, CharacterConfig, ConnectionId, CueKind, Damageable, EntityId, Message, NetMode,
    ObserverScope, Outgoing, PhysicsWorld, ScoreLine, Scoreboard, Scorekeeper, SimpleScene, World,
};

use crate::config::SandboxConfig;
use crate::events::{SandboxEvent, SeatRole};
use crate::link::{LatencyLink, LinkStats};

/// Connection id of the observer node.
const PLAYER_CONNECTION: ConnectionId = 1;
/// Characters stand with their centre at the origin height.
const FLOOR_Y: f32 = -0.9;
const STRAFE_AMPLITUDE: f32 = 2.5;
const MELEE_DISTANCE: f32 = 4.0;
const MAX_EVENTS: usize = 256;

#[derive(Debug)]
struct Seat {
    role: SeatRole,
    team: u8,
    home: Vec3,
    facing: Vec3,
    character: Option<EntityId>,
    respawn_at: Option<f32>,
    phase: f32,
    next_think: f32,
    fire_until: Option<f32>,
}

impl Seat {
    fn new(role: SeatRole, team: u8, home: Vec3, facing: Vec3) -> Self {
        Self {
            role,
            team,
            home,
            facing,
            character: None,
            respawn_at: None,
            phase: 0.0,
            next_think: 0.0,
            fire_until: None,
        }
    }

    fn controller(&self) -> Option<ConnectionId> {
        match self.role {
            SeatRole::Player => Some(PLAYER_CONNECTION),
            SeatRole::Bot => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CharacterRow {
    pub id: EntityId,
    pub role: SeatRole,
    pub team: u8,
    pub health: f32,
    /// Health as the observer node currently sees it.
    pub mirror_health: Option<f32>,
    pub weapon: String,
    pub weapon_state: &'static str,
    pub clip: i32,
    pub ammo: i32,
    pub lunging: bool,
    pub dying: bool,
    pub score: ScoreLine,
}

#[derive(Debug, Clone)]
pub struct SandboxStats {
    pub tick: u32,
    pub sim_time: f32,
    pub uptime_secs: u64,
    pub paused: bool,
    pub latency_ms: u32,
    pub entity_count: usize,
    pub mirrored_count: usize,
    pub kills: u32,
    pub uplink: LinkStats,
    pub downlink: LinkStats,
    pub characters: Vec<CharacterRow>,
}

/// One authority node and one observer node joined by a simulated link.
/// The observer drives the player seat; bots run on the authority.
pub struct Sandbox {
    config: SandboxConfig,
    authority: World,
    observer: World,
    uplink: LatencyLink,
    downlink: LatencyLink,
    rng: fastrand::Rng,
    seats: Vec<Seat>,
    running: Arc<AtomicBool>,
    paused: bool,
    last_tick_time: Instant,
    start_time: Instant,
    pending_events: VecDeque<SandboxEvent>,
    kills: u32,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let (authority, observer) = build_nodes(&config);
        let mut sandbox = Self {
            uplink: LatencyLink::new(config.latency_ms, config.jitter_ms),
            downlink: LatencyLink::new(config.latency_ms, config.jitter_ms),
            rng: fastrand::Rng::with_seed(config.seed),
            seats: build_seats(config.bots),
            running: Arc::new(AtomicBool::new(true)),
            paused: false,
            last_tick_time: Instant::now(),
            start_time: Instant::now(),
            pending_events: VecDeque::new(),
            kills: 0,
            authority,
            observer,
            config,
        };
        sandbox.spawn_all()?;
        Ok(sandbox)
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SandboxEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        log::info!("sandbox {}", if self.paused { "paused" } else { "resumed" });
    }

    /// Throws both nodes away and starts the duel over.
    pub fn reset(&mut self) -> Result<()> {
        let (authority, observer) = build_nodes(&self.config);
        self.authority = authority;
        self.observer = observer;
        self.uplink.clear();
        self.downlink.clear();
        self.rng = fastrand::Rng::with_seed(self.config.seed);
        self.seats = build_seats(self.config.bots);
        self.kills = 0;
        log::info!("duel reset");
        self.spawn_all()
    }

    /// Runs as fast as possible until `duration` simulated seconds passed.
    pub fn run_headless(&mut self, duration: f32) -> Result<()> {
        while self.running.load(Ordering::SeqCst) && self.authority.now() < duration {
            self.step()?;
            for event in self.pending_events.drain(..) {
                if event.is_warning() {
                    log::warn!("{}", event.describe());
                } else {
                    log::info!("{}", event.describe());
                }
            }
        }

        let stats = self.stats();
        log::info!(
            "ran {:.1}s in {} ticks: {} kills, {} bytes up, {} bytes down",
            stats.sim_time,
            stats.tick,
            stats.kills,
            stats.uplink.bytes_sent,
            stats.downlink.bytes_sent
        );
        Ok(())
    }

    /// Takes as many fixed steps as wall time allows.
    pub fn tick_once(&mut self) -> Result<()> {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        if self.paused {
            return Ok(());
        }

        let clock = self.authority.clock_mut();
        clock.accumulate(delta.as_secs_f32());
        let steps = clock.pending_steps();
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    pub fn step(&mut self) -> Result<()> {
        let dt = self.authority.clock().dt();
        self.drive_seats()?;
        self.authority.advance(dt);
        self.observer.advance(dt);
        self.pump()?;
        self.collect_cues();
        self.respawn_seats()
    }

    fn spawn_all(&mut self) -> Result<()> {
        for index in 0..self.seats.len() {
            self.spawn_seat(index)?;
        }
        Ok(())
    }

    fn spawn_seat(&mut self, index: usize) -> Result<()> {
        let Some(seat) = self.seats.get_mut(index) else {
            return Ok(());
        };
        let id = self
            .authority
            .spawn_character(seat.controller(), seat.team, seat.home, seat.facing)?;
        seat.character = Some(id);
        seat.respawn_at = None;
        seat.phase = 0.0;
        seat.fire_until = None;
        let role = seat.role;
        self.push_event(SandboxEvent::Spawned {
            character: id,
            role,
        });
        Ok(())
    }

    fn respawn_seats(&mut self) -> Result<()> {
        let now = self.authority.now();
        for index in 0..self.seats.len() {
            let seat = &mut self.seats[index];
            if let Some(id) = seat.character {
                if self.authority.character(id).is_none() {
                    seat.character = None;
                    seat.respawn_at = Some(now + self.config.respawn_delay);
                }
            }
            if seat.respawn_at.is_some_and(|at| at <= now) {
                self.spawn_seat(index)?;
            }
        }
        Ok(())
    }

    fn drive_seats(&mut self) -> Result<()> {
        let dt = self.authority.clock().dt();
        let player = self.seats.iter().find(|s| s.role == SeatRole::Player).and_then(|s| s.character);
        let bots: Vec<EntityId> = self
            .seats
            .iter()
            .filter(|s| s.role == SeatRole::Bot)
            .filter_map(|s| s.character)
            .collect();

        for seat in &mut self.seats {
            match seat.role {
                SeatRole::Player => {
                    let target = nearest(&self.observer, seat, &bots);
                    think(&mut self.observer, seat, target, &mut self.rng, dt)?;
                }
                SeatRole::Bot => {
                    let target = player.and_then(|p| alive_position(&self.authority, p));
                    think(&mut self.authority, seat, target, &mut self.rng, dt)?;
                }
            }
        }
        Ok(())
    }

    /// Moves everything both nodes queued across the link and applies
    /// what has arrived.
    fn pump(&mut self) -> Result<()> {
        let now = self.authority.now();

        for outgoing in self.observer.drain_outgoing() {
            match outgoing {
                Outgoing::ToAuthority(envelope) => {
                    self.uplink.send(now, &Message::Call(envelope), &mut self.rng)?;
                }
                Outgoing::ToObservers { envelope, .. } => {
                    log::warn!("observer tried to multicast {}", envelope.call.name());
                }
            }
        }

        for outgoing in self.authority.drain_outgoing() {
            let Outgoing::ToObservers { envelope, scope } = outgoing else {
                continue;
            };
            let owned = self.authority.owning_connection(envelope.entity) == Some(PLAYER_CONNECTION);
            let addressed = match scope {
                ObserverScope::All => true,
                ObserverScope::OwnerOnly => owned,
                ObserverScope::SkipOwner => !owned,
            };
            if addressed {
                self.downlink.send(now, &Message::Call(envelope), &mut self.rng)?;
            }
        }

        let frame = self.authority.build_frame(PLAYER_CONNECTION);
        if !frame.is_empty() {
            self.downlink.send(now, &Message::Frame(frame), &mut self.rng)?;
        }

        for message in self.uplink.receive(now) {
            match message {
                Ok(Message::Call(envelope)) => {
                    if let Err(err) = self.authority.receive_call(Some(PLAYER_CONNECTION), envelope) {
                        self.push_event(SandboxEvent::CallRejected {
                            message: err.to_string(),
                        });
                    }
                }
                Ok(Message::Frame(_)) => log::warn!("authority received a replication frame"),
                Err(err) => self.push_event(SandboxEvent::Error {
                    message: err.to_string(),
                }),
            }
        }

        for message in self.downlink.receive(now) {
            match message {
                Ok(Message::Call(envelope)) => {
                    if let Err(err) = self.observer.receive_call(None, envelope) {
                        log::debug!("observer dropped call: {}", err);
                    }
                }
                Ok(Message::Frame(frame)) => self.observer.apply_frame(&frame),
                Err(err) => self.push_event(SandboxEvent::Error {
                    message: err.to_string(),
                }),
            }
        }
        Ok(())
    }

    fn collect_cues(&mut self) {
        for cue in self.authority.drain_cues() {
            let event = match cue.kind {
                CueKind::Death { killer } => {
                    self.kills += 1;
                    SandboxEvent::Killed {
                        victim: cue.entity,
                        killer,
                    }
                }
                CueKind::Explosion { .. } => SandboxEvent::Exploded {
                    projectile: cue.entity,
                },
                CueKind::WeaponDropped { pickup } => SandboxEvent::WeaponDropped {
                    character: cue.entity,
                    pickup,
                },
                CueKind::WeaponPickedUp { weapon } => SandboxEvent::WeaponPickedUp {
                    character: cue.entity,
                    weapon,
                },
                _ => continue,
            };
            self.push_event(event);
        }
        for cue in self.observer.drain_cues() {
            log::trace!("observer cue {:?} on {}", cue.kind, cue.entity);
        }
    }

    fn push_event(&mut self, event: SandboxEvent) {
        if self.pending_events.len() >= MAX_EVENTS {
            self.pending_events.pop_front();
        }
        self.pending_events.push_back(event);
    }

    pub fn stats(&self) -> SandboxStats {
        let characters = self
            .seats
            .iter()
            .filter_map(|seat| {
                let id = seat.character?;
                let character = self.authority.character(id)?;
                let weapon = character.current_weapon().and_then(|w| self.authority.weapon(w));
                Some(CharacterRow {
                    id,
                    role: seat.role,
                    team: character.team(),
                    health: character.health(),
                    mirror_health: self.observer.character(id).map(|c| c.health()),
                    weapon: weapon.map_or_else(|| "-".to_string(), |w| w.config().name.clone()),
                    weapon_state: weapon.map_or("-", |w| w.state().as_str()),
                    clip: weapon.map_or(0, |w| w.current_ammo_in_clip()),
                    ammo: weapon.map_or(0, |w| w.current_ammo()),
                    lunging: character.is_lunging(),
                    dying: character.is_dying(),
                    score: self
                        .authority
                        .rules()
                        .and_then(|rules| rules.score(id))
                        .unwrap_or_default(),
                })
            })
            .collect();

        SandboxStats {
            tick: self.authority.clock().tick(),
            sim_time: self.authority.now(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            paused: self.paused,
            latency_ms: self.config.latency_ms,
            entity_count: self.authority.arena().len(),
            mirrored_count: self.observer.arena().len(),
            kills: self.kills,
            uplink: self.uplink.stats(),
            downlink: self.downlink.stats(),
            characters,
        }
    }
}

fn build_nodes(config: &SandboxConfig) -> (World, World) {
    let armory = Arc::new(Armory::standard());
    let character_config = Arc::new(CharacterConfig {
        health_regen: config.health_regen,
        ..CharacterConfig::default()
    });

    let mut physics = PhysicsWorld::new();
    physics.add_ground(FLOOR_Y, config.arena_half_size);
    physics.add_static_box(Vec3::new(-4.0, -0.4, -4.0), Vec3::new(1.5, 0.5, 0.3), true);
    physics.add_static_box(Vec3::new(4.0, -0.4, -4.0), Vec3::new(1.5, 0.5, 0.3), false);

    let mut authority = World::new(
        NetMode::DedicatedServer,
        Arc::clone(&armory),
        Arc::clone(&character_config),
        Box::new(physics),
    )
    .with_rules(Box::new(Scoreboard::default()))
    .with_tick_rate(config.tick_rate);
    authority.add_viewer(PLAYER_CONNECTION);

    let mut scene = SimpleScene::new();
    scene.add_floor(FLOOR_Y, config.arena_half_size);
    let observer = World::new(NetMode::Client, armory, character_config, Box::new(scene))
        .with_local_connection(PLAYER_CONNECTION)
        .with_tick_rate(config.tick_rate);

    (authority, observer)
}

fn build_seats(bots: usize) -> Vec<Seat> {
    let mut seats = vec![Seat::new(SeatRole::Player, 0, Vec3::new(0.0, 0.0, 6.0), Vec3::NEG_Z)];
    let spread = 5.0;
    for index in 0..bots {
        let x = (index as f32 - (bots as f32 - 1.0) * 0.5) * spread;
        seats.push(Seat::new(SeatRole::Bot, 1, Vec3::new(x, 0.0, -12.0), Vec3::Z));
    }
    seats
}

fn alive_position(world: &World, id: EntityId) -> Option<Vec3> {
    world
        .character(id)
        .filter(|c| c.is_alive() && !c.is_dying())
        .map(|c| c.position())
}

fn nearest(world: &World, seat: &Seat, candidates: &[EntityId]) -> Option<Vec3> {
    let from = seat.home;
    candidates
        .iter()
        .filter_map(|id| alive_position(world, *id))
        .min_by(|a, b| a.distance(from).total_cmp(&b.distance(from)))
}

/// Scripted input for one seat: strafe around home, face the target and
/// fire in short bursts, now and then with a grenade or a knife.
fn think(
    world: &mut World,
    seat: &mut Seat,
    target: Option<Vec3>,
    rng: &mut fastrand::Rng,
    dt: f32,
) -> Result<()> {
    let Some(id) = seat.character else {
        return Ok(());
    };
    let Some(character) = world.character(id) else {
        return Ok(());
    };
    if character.is_dying() || character.is_lunging() {
        return Ok(());
    }

    seat.phase += dt;
    let offset = Vec3::X * (seat.phase * 0.8).sin() * STRAFE_AMPLITUDE;
    let velocity = Vec3::X * (seat.phase * 0.8).cos() * 0.8 * STRAFE_AMPLITUDE;
    let position = seat.home + offset;
    let aim = target
        .and_then(|t| (t - position).try_normalize())
        .unwrap_or(seat.facing);
    world.move_character(id, position, velocity, aim)?;

    let now = world.now();
    if seat.fire_until.is_some_and(|until| until <= now) {
        seat.fire_until = None;
        world.stop_weapon_fire(id)?;
    }
    let Some(target) = target else {
        return Ok(());
    };
    if now < seat.next_think {
        return Ok(());
    }
    seat.next_think = now + 0.5 + rng.f32();

    let roll = rng.f32();
    if target.distance(position) < MELEE_DISTANCE {
        world.melee(id)?;
    } else if roll < 0.1 {
        world.throw_grenade(id)?;
    } else if roll < 0.15 {
        world.next_weapon(id)?;
    } else if seat.fire_until.is_none() {
        world.start_weapon_fire(id)?;
        seat.fire_until = Some(now + 0.2 + rng.f32() * 0.6);
    }
    Ok(())
}
