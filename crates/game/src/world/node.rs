use std::sync::Arc;

use glam::Vec3;

use crate::character::{Character, CharacterConfig, CheatFlags, DamageEvent};
use crate::context::Ctx;
use crate::error::CombatError;
use crate::event::{Cue, CueKind, CueQueue};
use crate::net::{
    AuthorityOracle, ConnectionId, NetMode, NetRole, Outbox, Outgoing, RemoteCall, RemoteChannel,
    Replicator,
};
use crate::physics::TraceService;
use crate::rules::GameRules;
use crate::time::{GameClock, TimerKey, TimerQueue};
use crate::weapon::{Armory, FireKind, OwnerView, ShotRequest, Weapon, WeaponKind};

use super::arena::Arena;
use super::capability::Tickable;
use super::entity::{EntityId, EntityKind};

/// One simulation node: the entities it holds, the services they share and
/// the host-facing queues (outgoing calls, cues).
///
/// The same type runs the authority and every observer; `mode` decides
/// which branch each operation takes.
pub struct World {
    pub(crate) mode: NetMode,
    pub(crate) local_connection: Option<ConnectionId>,
    pub(crate) clock: GameClock,
    pub(crate) step_dt: f32,
    pub(crate) timers: TimerQueue,
    pub(crate) outbox: Outbox,
    pub(crate) cues: CueQueue,
    pub(crate) shots: Vec<ShotRequest>,
    pub(crate) arena: Arena,
    pub(crate) armory: Arc<Armory>,
    pub(crate) character_config: Arc<CharacterConfig>,
    pub(crate) trace: Box<dyn TraceService>,
    pub(crate) rules: Option<Box<dyn GameRules>>,
    pub(crate) replicator: Replicator,
    next_id: EntityId,
}

impl World {
    pub fn new(
        mode: NetMode,
        armory: Arc<Armory>,
        character_config: Arc<CharacterConfig>,
        trace: Box<dyn TraceService>,
    ) -> Self {
        log::debug!("world created as {}", mode.as_str());
        Self {
            mode,
            local_connection: None,
            clock: GameClock::default(),
            step_dt: 0.0,
            timers: TimerQueue::new(),
            outbox: Outbox::new(),
            cues: CueQueue::default(),
            shots: Vec::new(),
            arena: Arena::new(),
            armory,
            character_config,
            trace,
            rules: None,
            replicator: Replicator::new(),
            next_id: 1,
        }
    }

    /// Connection whose inputs this node applies locally.
    pub fn with_local_connection(mut self, connection: ConnectionId) -> Self {
        self.local_connection = Some(connection);
        self
    }

    pub fn with_rules(mut self, rules: Box<dyn GameRules>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.clock = GameClock::new(tick_rate);
        self
    }

    pub fn mode(&self) -> NetMode {
        self.mode
    }

    pub fn has_authority(&self) -> bool {
        self.mode.is_server()
    }

    pub fn local_connection(&self) -> Option<ConnectionId> {
        self.local_connection
    }

    pub fn now(&self) -> f32 {
        self.clock.now()
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut GameClock {
        &mut self.clock
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn armory(&self) -> &Armory {
        &self.armory
    }

    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.arena.character(id)
    }

    pub fn weapon(&self, id: EntityId) -> Option<&Weapon> {
        self.arena.weapon(id)
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn cues(&self) -> &CueQueue {
        &self.cues
    }

    pub fn drain_cues(&mut self) -> Vec<Cue> {
        self.cues.drain().collect()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        self.outbox.drain().collect()
    }

    pub fn rules(&self) -> Option<&dyn GameRules> {
        self.rules.as_deref()
    }

    pub fn trace(&self) -> &dyn TraceService {
        self.trace.as_ref()
    }

    pub fn trace_mut(&mut self) -> &mut dyn TraceService {
        self.trace.as_mut()
    }

    pub fn owning_connection(&self, entity: EntityId) -> Option<ConnectionId> {
        self.arena.owning_connection(entity)
    }

    pub fn is_locally_controlled(&self, character: EntityId) -> bool {
        self.arena
            .character(character)
            .is_some_and(|c| c.is_locally_controlled(self.mode, self.local_connection))
    }

    pub fn set_cheats(&mut self, character: EntityId, cheats: CheatFlags) -> Result<(), CombatError> {
        self.expect_character(character)?;
        if let Some(target) = self.arena.character_mut(character) {
            target.set_cheats(cheats);
        }
        log::info!("character {} cheats set to {:?}", character, cheats);
        Ok(())
    }

    /// Borrows the entity storage and a call context side by side.
    pub(crate) fn split(&mut self) -> (&mut Arena, Ctx<'_>) {
        (
            &mut self.arena,
            Ctx {
                now: self.clock.now(),
                dt: self.step_dt,
                mode: self.mode,
                timers: &mut self.timers,
                remote: &mut self.outbox,
                cues: &mut self.cues,
                shots: &mut self.shots,
            },
        )
    }

    pub(crate) fn cue(&mut self, entity: EntityId, kind: CueKind) {
        let (_, mut ctx) = self.split();
        ctx.cue(entity, kind);
    }

    pub(crate) fn alloc_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    pub(crate) fn require_authority(&self, call: &'static str) -> Result<(), CombatError> {
        if self.has_authority() {
            Ok(())
        } else {
            Err(CombatError::Rejected {
                call,
                reason: "only the authority may do this",
            })
        }
    }

    pub(crate) fn expect_character(&self, id: EntityId) -> Result<&Character, CombatError> {
        match self.arena.character(id) {
            Some(character) => Ok(character),
            None if self.arena.contains(id) => Err(CombatError::WrongKind {
                id,
                expected: EntityKind::Character.as_str(),
            }),
            None => Err(CombatError::UnknownEntity(id)),
        }
    }

    pub(crate) fn expect_weapon(&self, id: EntityId) -> Result<&Weapon, CombatError> {
        match self.arena.weapon(id) {
            Some(weapon) => Ok(weapon),
            None if self.arena.contains(id) => Err(CombatError::WrongKind {
                id,
                expected: EntityKind::Weapon.as_str(),
            }),
            None => Err(CombatError::UnknownEntity(id)),
        }
    }

    /// Snapshot of the character carrying a weapon, as the weapon sees it.
    pub(crate) fn owner_view(&self, weapon: EntityId) -> OwnerView {
        let Some(owner) = self.arena.weapon(weapon).and_then(Weapon::owner) else {
            return OwnerView::default();
        };
        let Some(holder) = self.arena.character(owner) else {
            return OwnerView {
                id: Some(owner),
                ..OwnerView::default()
            };
        };
        OwnerView {
            id: Some(owner),
            alive: holder.health > 0.0 && !holder.dying,
            dying: holder.dying,
            locally_controlled: holder.is_locally_controlled(self.mode, self.local_connection),
            holds_this: holder.current_weapon() == Some(weapon),
            infinite_ammo: holder.cheats.contains(CheatFlags::INFINITE_AMMO),
            infinite_clip: holder.cheats.contains(CheatFlags::INFINITE_CLIP),
        }
    }

    /// Runs a weapon operation with its owner view and a call context.
    pub(crate) fn with_weapon<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Weapon, &OwnerView, &mut Ctx<'_>) -> R,
    ) -> Option<R> {
        let owner = self.owner_view(id);
        let (arena, mut ctx) = self.split();
        let weapon = arena.weapons.get_mut(&id)?;
        Some(f(weapon, &owner, &mut ctx))
    }

    pub fn spawn_weapon(&mut self, kind: WeaponKind) -> Result<EntityId, CombatError> {
        self.require_authority("spawn_weapon")?;
        let config = self
            .armory
            .get(kind)
            .ok_or(CombatError::UnknownWeaponKind(kind))?;
        let id = self.alloc_id();
        self.arena.weapons.insert(id, Weapon::new(id, kind, config));
        log::debug!("spawned weapon {} ({})", id, kind);
        Ok(id)
    }

    /// Removes an entity with everything it carries and any pending timers.
    pub fn destroy(&mut self, id: EntityId) {
        let Some(kind) = self.arena.kind_of(id) else {
            return;
        };
        self.timers.cancel_owner(id);

        match kind {
            EntityKind::Character => {
                let carried = self
                    .arena
                    .character_mut(id)
                    .map(|c| c.inventory.take_all())
                    .unwrap_or_default();
                for weapon in carried {
                    self.destroy(weapon);
                }
                self.trace.remove_body(id);
            }
            EntityKind::Weapon => {
                let holder = self.arena.weapon(id).and_then(Weapon::owner);
                if let Some(holder) = holder.and_then(|h| self.arena.character_mut(h)) {
                    holder.inventory.remove(id);
                }
            }
            EntityKind::Pickup => {
                if let Some(weapon) = self.arena.pickup(id).and_then(|p| p.weapon()) {
                    self.destroy(weapon);
                }
            }
            EntityKind::Projectile => {}
        }

        self.arena.remove(id);
        log::debug!("destroyed {} {}", kind.as_str(), id);
    }

    /// Runs one simulation step of `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.clock.advance(dt);
        self.step_dt = dt;
        self.timers.set_now(self.clock.now());

        self.dispatch_timers();
        self.tick_entities();
        if self.has_authority() {
            self.update_lunges();
            self.update_projectiles();
        }
        self.resolve_shots();
        self.sync_bodies();

        self.step_dt = 0.0;
    }

    /// Steps the world for `duration` seconds at the clock's fixed rate.
    pub fn run_for(&mut self, duration: f32) {
        let dt = self.clock.dt();
        let mut elapsed = 0.0;
        while elapsed + dt * 0.5 < duration {
            self.advance(dt);
            elapsed += dt;
        }
    }

    fn dispatch_timers(&mut self) {
        while let Some(due) = self.timers.pop_due() {
            log::trace!("timer {:?} fired for {}", due.key, due.owner);
            match due.key {
                TimerKey::Weapon(key) => {
                    self.with_weapon(due.owner, |weapon, owner, ctx| {
                        weapon.on_timer(key, due.handle, owner, ctx)
                    });
                }
                TimerKey::Character(key) => self.on_character_timer(due.owner, key, due.handle),
                TimerKey::Projectile(key) => self.on_projectile_timer(due.owner, key, due.handle),
                TimerKey::Expire => self.destroy(due.owner),
            }
        }
    }

    fn tick_entities(&mut self) {
        let (arena, mut ctx) = self.split();
        for weapon in arena.weapons.values_mut() {
            weapon.tick(&mut ctx);
        }
        for character in arena.characters.values_mut() {
            character.tick(&mut ctx);
        }
        for pickup in arena.pickups.values_mut() {
            pickup.tick(&mut ctx);
        }
    }

    fn sync_bodies(&mut self) {
        for character in self.arena.characters.values() {
            if character.collision_enabled {
                self.trace.place_body(character.id, &character.body());
            }
        }
        self.trace.flush();
    }

    /// Turns queued shot requests into hits. Observers forward the shot to
    /// the authority instead of resolving it.
    pub(crate) fn resolve_shots(&mut self) {
        while !self.shots.is_empty() {
            for shot in std::mem::take(&mut self.shots) {
                let Some(shooter) = self.arena.character(shot.owner) else {
                    continue;
                };
                let (origin, direction) = (shooter.eye(), shooter.aim());
                if self.has_authority() {
                    self.fire_shot(shot.weapon, shot.owner, origin, direction);
                } else {
                    self.outbox.invoke_on_authority(
                        shot.weapon,
                        RemoteCall::FireShot {
                            origin: origin.to_array(),
                            direction: direction.to_array(),
                        },
                    );
                }
            }
        }
    }

    pub(crate) fn fire_shot(&mut self, weapon: EntityId, owner: EntityId, origin: Vec3, direction: Vec3) {
        let Some(config) = self.arena.weapon(weapon).map(Weapon::shared_config) else {
            return;
        };
        let direction = direction.normalize_or(Vec3::NEG_Z);

        match &config.fire {
            FireKind::Instant(hit) => {
                let end = origin + direction * hit.range;
                let result = if config.sphere_trace_radius > 0.0 {
                    self.trace
                        .sphere_trace(origin, end, config.sphere_trace_radius, Some(owner))
                } else {
                    self.trace.line_trace(origin, end, Some(owner))
                };
                let Some(result) = result else {
                    log::trace!("shot from weapon {} hit nothing", weapon);
                    return;
                };
                let Some(victim) = result
                    .entity
                    .filter(|id| self.arena.characters.contains_key(id))
                else {
                    return;
                };
                let event = DamageEvent::new(hit.damage, hit.damage_type)
                    .from_weapon(owner, weapon)
                    .at(result.zone, direction);
                if let Err(err) = self.take_damage(victim, event) {
                    log::warn!("shot from weapon {} could not damage {}: {}", weapon, victim, err);
                }
            }
            FireKind::Projectile(projectile) => {
                self.spawn_projectile(weapon, owner, origin, direction, *projectile);
            }
        }
    }
}

impl AuthorityOracle for World {
    fn role_of(&self, entity: EntityId) -> Option<NetRole> {
        if !self.arena.contains(entity) {
            return None;
        }
        Some(NetRole::resolve(
            self.mode,
            self.local_connection,
            self.arena.owning_connection(entity),
        ))
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("mode", &self.mode)
            .field("local_connection", &self.local_connection)
            .field("now", &self.clock.now())
            .field("entities", &self.arena.len())
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}
