use std::sync::Arc;

use glam::Vec3;

use crate::error::CombatError;
use crate::event::CueKind;
use crate::hit::HitReport;
use crate::net::{ConnectionId, ObserverScope, RemoteCall, RemoteChannel};
use crate::pickup::WeaponPickup;
use crate::rules::DamageContext;
use crate::time::{CharacterTimer, TimerHandle, TimerKey};
use crate::weapon::{Weapon, WeaponState};
use crate::world::{EntityId, World};

use super::damage::{self, DamageEvent};
use super::lunge::{Lunge, MovementTuning};
use super::state::{Character, CheatFlags};

/// Extra reach past the capsule used when probing ahead of a lunge.
const LUNGE_PROBE_MARGIN: f32 = 0.1;

impl World {
    pub fn spawn_character(
        &mut self,
        controller: Option<ConnectionId>,
        team: u8,
        position: Vec3,
        aim: Vec3,
    ) -> Result<EntityId, CombatError> {
        self.require_authority("spawn_character")?;
        let id = self.alloc_id();
        let mut character = Character::new(id, team, controller, Arc::clone(&self.character_config));
        character.set_pose(position, Vec3::ZERO, aim);
        self.trace.place_body(id, &character.body());
        self.arena.characters.insert(id, character);
        log::info!("spawned character {} (team {}, controller {:?})", id, team, controller);

        self.spawn_default_inventory(id)?;
        Ok(id)
    }

    /// Gives a fresh character its configured weapons and equips the first
    /// one it can hold in hand.
    pub fn spawn_default_inventory(&mut self, character: EntityId) -> Result<(), CombatError> {
        self.require_authority("spawn_default_inventory")?;
        let kinds = self.expect_character(character)?.config.default_inventory.clone();
        for kind in kinds {
            if !self.armory.contains(kind) {
                log::warn!("default inventory names unknown weapon kind {}", kind);
                continue;
            }
            let weapon = self.spawn_weapon(kind)?;
            self.add_weapon(character, weapon)?;
        }

        let first = self.arena.character(character).and_then(|c| {
            c.inventory
                .weapons()
                .iter()
                .copied()
                .find(|id| self.is_equippable(*id))
        });
        if let Some(first) = first {
            self.equip_weapon(character, first)?;
        }
        Ok(())
    }

    fn is_equippable(&self, weapon: EntityId) -> bool {
        self.arena.weapon(weapon).is_some_and(|w| w.config().equippable)
    }

    fn has_ammo(&self, weapon: EntityId) -> bool {
        let owner = self.owner_view(weapon);
        self.arena
            .weapon(weapon)
            .is_some_and(|w| w.current_ammo() > 0 || w.has_infinite_ammo(&owner))
    }

    /// Applies damage on the authority. Returns what was actually dealt.
    pub fn take_damage(&mut self, victim: EntityId, event: DamageEvent) -> Result<f32, CombatError> {
        let target = self.expect_character(victim)?;
        if !self.has_authority() {
            return Ok(0.0);
        }
        if target.health <= 0.0 || target.cheats.contains(CheatFlags::GOD_MODE) {
            log::debug!("character {} ignored {} damage", victim, event.amount);
            return Ok(0.0);
        }

        let config = Arc::clone(&target.config);
        let victim_team = target.team;
        let victim_position = target.position;
        let attacker = event.instigator.and_then(|id| self.arena.character(id));
        let context = DamageContext {
            victim,
            victim_team,
            instigator: event.instigator,
            instigator_team: attacker.map(Character::team),
            damage_type: event.damage_type,
        };
        let attacker_position = attacker.map(Character::position);
        let (can_headshot, can_assassinate) = event
            .causer
            .and_then(|id| self.arena.weapon(id))
            .map(|w| (w.config().can_headshot, w.config().can_assassinate))
            .unwrap_or((false, false));

        let amount = match &self.rules {
            Some(rules) => rules.modify_damage(event.amount, &context),
            None => event.amount,
        };
        if amount <= 0.0 {
            return Ok(0.0);
        }

        let Some(target) = self.arena.character_mut(victim) else {
            return Ok(0.0);
        };
        target.health -= amount;

        let headshot = damage::is_headshot(
            config.shields_down(target.health),
            can_headshot,
            event.zone,
        );
        let assassination = attacker_position.is_some_and(|from| {
            damage::is_assassination(
                can_assassinate,
                event.shot_direction,
                from,
                victim_position,
                event.zone,
                config.assassination_tolerance,
            )
        });
        if headshot || assassination {
            log::debug!(
                "character {} takes a finishing blow (headshot: {}, assassination: {})",
                victim,
                headshot,
                assassination
            );
            target.health = 0.0;
        }

        let dealt = DamageEvent { amount, ..event };
        if target.health <= 0.0 {
            self.die(victim, dealt);
        } else {
            self.play_hit(victim, dealt);
        }
        Ok(amount)
    }

    /// Kills a character once. Returns false when it cannot die now.
    pub fn die(&mut self, victim: EntityId, event: DamageEvent) -> bool {
        let authority = self.has_authority();
        let Some(target) = self.arena.character_mut(victim) else {
            return false;
        };
        if !target.can_die(authority) {
            return false;
        }
        target.health = target.health.min(0.0);

        if let Some(rules) = self.rules.as_mut() {
            rules.killed(event.instigator, victim, event.damage_type);
        }
        log::info!("character {} killed by {:?}", victim, event.instigator);
        self.on_death(victim, event);
        true
    }

    pub(crate) fn on_death(&mut self, victim: EntityId, event: DamageEvent) {
        let authority = self.has_authority();
        let (arena, mut ctx) = self.split();
        let Some(target) = arena.characters.get_mut(&victim) else {
            return;
        };
        if target.dying {
            return;
        }
        target.dying = true;
        target.replicate_movement = false;
        target.torn_off = true;

        if authority {
            target.hits.report(
                HitReport {
                    actual_damage: event.amount,
                    instigator: event.instigator,
                    damage_causer: event.causer,
                    damage_type: event.damage_type,
                    killed: true,
                },
                ctx.now,
            );
        }

        target.timers.clear(ctx.timers, CharacterTimer::Regenerate);
        ctx.cue(victim, CueKind::Death { killer: event.instigator });

        if let Some(lunge) = target.lunge.take() {
            target.movement = lunge.saved;
            target.lunging = false;
        }
        target.velocity = Vec3::ZERO;
        target.collision_enabled = false;

        let animated = target.config.death_anim_duration > 0.0;
        if animated {
            let delay = target.config.ragdoll_delay();
            target
                .timers
                .reset(ctx.timers, victim, CharacterTimer::Ragdoll, delay);
        }

        self.trace.remove_body(victim);
        if authority {
            self.destroy_inventory(victim);
        }
        if !animated {
            self.set_ragdoll(victim);
        }
    }

    fn set_ragdoll(&mut self, id: EntityId) {
        let authority = self.has_authority();
        let (arena, mut ctx) = self.split();
        let Some(target) = arena.characters.get_mut(&id) else {
            return;
        };

        let lifespan = if target.config.has_ragdoll {
            target.ragdoll = true;
            ctx.cue(id, CueKind::Ragdoll);
            target.config.ragdoll_lifespan
        } else {
            target.hidden = true;
            ctx.cue(id, CueKind::Hidden);
            target.config.hidden_lifespan
        };

        if authority {
            if target.lifespan.is_valid() {
                ctx.timers.cancel(target.lifespan);
            }
            target.lifespan = ctx.timers.schedule(id, TimerKey::Expire, lifespan, false);
        }
    }

    /// Non-lethal damage: record it, re-arm regeneration and play reactions.
    pub(crate) fn play_hit(&mut self, victim: EntityId, event: DamageEvent) {
        let authority = self.has_authority();
        let instigator_local = event
            .instigator
            .is_some_and(|id| self.is_locally_controlled(id));
        let (arena, mut ctx) = self.split();
        let Some(target) = arena.characters.get_mut(&victim) else {
            return;
        };

        if authority {
            target.hits.report(
                HitReport {
                    actual_damage: event.amount,
                    instigator: event.instigator,
                    damage_causer: event.causer,
                    damage_type: event.damage_type,
                    killed: false,
                },
                ctx.now,
            );
            if event.amount > 0.0 && target.regen_enabled() {
                target.regen_first_tick = true;
                let delay = target.config.time_before_regen;
                target
                    .timers
                    .reset(ctx.timers, victim, CharacterTimer::Regenerate, delay);
            }
        }

        ctx.cue(
            victim,
            CueKind::HitReaction {
                damage: event.amount,
                instigator: event.instigator,
            },
        );
        if let Some(instigator) = event.instigator.filter(|_| instigator_local) {
            ctx.cue(instigator, CueKind::EnemyHit { victim });
        }
    }

    pub(crate) fn on_character_timer(&mut self, id: EntityId, key: CharacterTimer, handle: TimerHandle) {
        let fired = self
            .arena
            .character_mut(id)
            .is_some_and(|c| c.timers.fired(key, handle));
        if !fired {
            log::debug!("character {} ignored stale {:?} timer", id, key);
            return;
        }
        match key {
            CharacterTimer::Regenerate => self.regenerate(id),
            CharacterTimer::Ragdoll => self.set_ragdoll(id),
        }
    }

    fn regenerate(&mut self, id: EntityId) {
        let (arena, mut ctx) = self.split();
        let Some(target) = arena.characters.get_mut(&id) else {
            return;
        };
        if target.dying || target.health <= 0.0 {
            return;
        }
        if target.regen_first_tick {
            target.regen_first_tick = false;
            ctx.cue(id, CueKind::RegenStarted);
        }

        let max = target.config.max_health;
        let rate = target.config.regen_tick_rate;
        target.health = (target.health + target.config.regen_per_second * rate).min(max);
        if target.health < max {
            target
                .timers
                .reset(ctx.timers, id, CharacterTimer::Regenerate, rate);
        } else {
            target.regen_first_tick = true;
        }
    }

    pub fn add_weapon(&mut self, character: EntityId, weapon: EntityId) -> Result<(), CombatError> {
        self.expect_character(character)?;
        self.expect_weapon(weapon)?;
        if !self.has_authority() {
            return Ok(());
        }
        if let Some(w) = self.arena.weapon_mut(weapon) {
            w.on_enter_inventory(character);
        }
        if let Some(c) = self.arena.character_mut(character) {
            c.inventory.add(weapon);
        }
        Ok(())
    }

    pub fn remove_weapon(&mut self, character: EntityId, weapon: EntityId) -> Result<(), CombatError> {
        self.expect_character(character)?;
        self.expect_weapon(weapon)?;
        if !self.has_authority() {
            return Ok(());
        }
        self.with_weapon(weapon, |w, owner, ctx| w.on_leave_inventory(owner, ctx));
        if let Some(c) = self.arena.character_mut(character) {
            c.inventory.remove(weapon);
        }
        Ok(())
    }

    pub(crate) fn destroy_inventory(&mut self, character: EntityId) {
        let weapons = self
            .arena
            .character(character)
            .map(|c| c.inventory.weapons().to_vec())
            .unwrap_or_default();
        for weapon in weapons.into_iter().rev() {
            if let Err(err) = self.remove_weapon(character, weapon) {
                log::warn!("could not remove weapon {} from {}: {}", weapon, character, err);
            }
            self.destroy(weapon);
        }
    }

    pub fn equip_weapon(&mut self, character: EntityId, weapon: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        self.expect_weapon(weapon)?;
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::EquipWeapon { weapon });
            return Ok(());
        }
        if holder.dying || !holder.inventory.contains(weapon) {
            log::debug!("character {} cannot equip weapon {}", character, weapon);
            return Ok(());
        }
        if holder.current_weapon() == Some(weapon) || !self.is_equippable(weapon) {
            return Ok(());
        }
        self.set_current_weapon(character, Some(weapon));
        Ok(())
    }

    /// Swaps the weapon in hand: the old one is unequipped before the new
    /// one starts equipping.
    pub(crate) fn set_current_weapon(&mut self, character: EntityId, next: Option<EntityId>) {
        let Some(last) = self.arena.character(character).map(Character::current_weapon) else {
            return;
        };
        if last == next {
            return;
        }

        if let Some(last) = last {
            self.with_weapon(last, |w, owner, ctx| w.on_unequip(owner, ctx));
        }
        if let Some(c) = self.arena.character_mut(character) {
            c.inventory.set_current(next);
        }
        if let Some(next) = next {
            if let Some(w) = self.arena.weapon_mut(next) {
                w.on_enter_inventory(character);
            }
            self.with_weapon(next, |w, owner, ctx| w.on_equip(owner, ctx));
        }
        log::debug!("character {} switched weapon {:?} -> {:?}", character, last, next);
    }

    pub fn next_weapon(&mut self, character: EntityId) -> Result<(), CombatError> {
        self.cycle_weapon(character, true)
    }

    pub fn prev_weapon(&mut self, character: EntityId) -> Result<(), CombatError> {
        self.cycle_weapon(character, false)
    }

    fn cycle_weapon(&mut self, character: EntityId, forward: bool) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if holder.inventory.len() < 2 {
            return Ok(());
        }
        let current = holder.current_weapon();
        let equipping = current
            .and_then(|id| self.arena.weapon(id))
            .is_some_and(|w| w.state() == WeaponState::Equipping);
        if equipping {
            return Ok(());
        }
        let next = holder
            .inventory
            .cycle(current, forward, |id| self.is_equippable(id));
        match next {
            Some(next) => self.equip_weapon(character, next),
            None => Ok(()),
        }
    }

    /// Primary slots in use reached the configured cap. Extra weapons do
    /// not count.
    pub fn inventory_full(&self, character: EntityId) -> bool {
        self.arena.character(character).is_some_and(|c| {
            let primaries = c
                .inventory
                .weapons()
                .iter()
                .filter(|id| self.arena.weapon(**id).is_some_and(|w| !w.config().extra_weapon))
                .count();
            primaries >= c.config.max_inventory
        })
    }

    /// No carried weapon is still inside its refire interval.
    pub fn inventory_off_cooldown(&self, character: EntityId) -> bool {
        let now = self.now();
        self.arena.character(character).is_some_and(|c| {
            c.inventory
                .weapons()
                .iter()
                .all(|id| self.arena.weapon(*id).is_none_or(|w| w.off_cooldown(now)))
        })
    }

    /// Throws the weapon in hand out as a pickup. Returns the pickup id.
    pub fn drop_weapon(&mut self, character: EntityId) -> Result<Option<EntityId>, CombatError> {
        let holder = self.expect_character(character)?;
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::DropWeapon);
            return Ok(None);
        }
        if holder.dying || holder.inventory.len() <= 1 {
            log::debug!("character {} has nothing it may drop", character);
            return Ok(None);
        }
        let Some(dropped) = holder.current_weapon() else {
            return Ok(None);
        };
        let Some(weapon) = self.arena.weapon(dropped) else {
            return Ok(None);
        };
        if !weapon.config().droppable {
            return Ok(None);
        }

        let (kind, ammo, clip) = (weapon.kind(), weapon.current_ammo(), weapon.current_ammo_in_clip());
        let next = holder
            .inventory
            .cycle(Some(dropped), true, |id| self.is_equippable(id));
        let position = holder.position + Vec3::Y * holder.config.drop_offset;
        let velocity = holder.velocity + holder.aim * holder.config.drop_weapon_velocity;

        self.set_current_weapon(character, next);
        self.remove_weapon(character, dropped)?;

        let id = self.alloc_id();
        let mut pickup = WeaponPickup::new(id, kind);
        pickup.weapon = Some(dropped);
        pickup.ammo = ammo;
        pickup.clip = clip;
        pickup.position = position;
        pickup.velocity = velocity;
        self.arena.pickups.insert(id, pickup);

        self.cue(character, CueKind::WeaponDropped { pickup: id });
        log::info!("character {} dropped weapon {} as pickup {}", character, dropped, id);
        Ok(Some(id))
    }

    /// Uses the nearest pickup in reach: tops up a weapon of the same kind,
    /// otherwise takes the weapon, dropping the one in hand when full.
    pub fn interact(&mut self, character: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::Interact);
            return Ok(());
        }
        if holder.dying {
            return Ok(());
        }

        let (at, reach) = (holder.position, holder.config.interact_range);
        let nearest = self
            .arena
            .pickups
            .values()
            .filter(|p| p.position.distance(at) <= reach)
            .min_by(|a, b| a.position.distance(at).total_cmp(&b.position.distance(at)))
            .map(|p| (p.id, p.weapon_kind, p.ammo));
        let Some((pickup_id, kind, available)) = nearest else {
            return Ok(());
        };

        if let Some(held) = self.arena.held_of_kind(character, kind) {
            let given = self
                .with_weapon(held, |w, owner, ctx| w.give_ammo(available, owner, ctx))
                .unwrap_or(0);
            let emptied = self.arena.pickups.get_mut(&pickup_id).is_some_and(|p| {
                p.take_ammo(given);
                p.is_empty()
            });
            if emptied {
                self.destroy(pickup_id);
            }
            log::info!("character {} took {} rounds from pickup {}", character, given, pickup_id);
            return Ok(());
        }

        let extra = self.armory.get(kind).is_some_and(|c| c.extra_weapon);
        if !extra && self.inventory_full(character) && self.drop_weapon(character)?.is_none() {
            log::debug!("character {} has no room for pickup {}", character, pickup_id);
            return Ok(());
        }

        let Some(mut pickup) = self.arena.pickups.remove(&pickup_id) else {
            return Ok(());
        };
        let weapon = match pickup.weapon.take() {
            Some(id) if self.arena.weapons.contains_key(&id) => id,
            _ => self.spawn_weapon(kind)?,
        };
        if let Some(w) = self.arena.weapon_mut(weapon) {
            w.restore_ammo(pickup.ammo, pickup.clip);
        }
        self.add_weapon(character, weapon)?;
        if self.is_equippable(weapon) {
            self.equip_weapon(character, weapon)?;
        }

        self.cue(character, CueKind::WeaponPickedUp { weapon });
        log::info!("character {} picked up weapon {}", character, weapon);
        Ok(())
    }

    pub fn set_targeting(&mut self, character: EntityId, targeting: bool) -> Result<(), CombatError> {
        self.expect_character(character)?;
        if let Some(c) = self.arena.character_mut(character) {
            c.targeting = targeting;
        }
        self.cue(character, CueKind::Targeting(targeting));
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::SetTargeting { targeting });
        }
        Ok(())
    }

    pub fn set_running(&mut self, character: EntityId, running: bool, toggled: bool) -> Result<(), CombatError> {
        self.expect_character(character)?;
        if let Some(c) = self.arena.character_mut(character) {
            c.running = running;
            c.running_toggled = running && toggled;
        }
        self.cue(character, CueKind::Running(running));
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::SetRunning { running, toggled });
        }
        Ok(())
    }

    /// Movement input from the controlling node.
    pub fn move_character(
        &mut self,
        character: EntityId,
        position: Vec3,
        velocity: Vec3,
        aim: Vec3,
    ) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if holder.dying || holder.lunge.is_some() {
            return Ok(());
        }
        if let Some(c) = self.arena.character_mut(character) {
            c.set_pose(position, velocity, aim);
        }
        if !self.has_authority() {
            self.outbox.invoke_on_authority(
                character,
                RemoteCall::Move {
                    position: position.to_array(),
                    velocity: velocity.to_array(),
                    aim: aim.to_array(),
                },
            );
        }
        Ok(())
    }

    pub fn start_weapon_fire(&mut self, character: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if holder.dying || holder.lunging || holder.lunge.is_some() {
            return Ok(());
        }
        let running = holder.running;
        let Some(weapon) = holder.current_weapon() else {
            return Ok(());
        };
        if running {
            self.set_running(character, false, false)?;
        }

        let can_lunge = self.arena.weapon(weapon).is_some_and(|w| w.config().can_lunge);
        if can_lunge {
            if self.inventory_off_cooldown(character) {
                self.start_lunge(character, weapon)?;
            }
            return Ok(());
        }

        self.with_weapon(weapon, |w, owner, ctx| w.start_fire(owner, ctx));
        self.resolve_shots();
        Ok(())
    }

    pub fn stop_weapon_fire(&mut self, character: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if let Some(weapon) = holder.current_weapon() {
            self.with_weapon(weapon, |w, owner, ctx| w.stop_fire(owner, ctx));
            self.resolve_shots();
        }
        Ok(())
    }

    pub fn start_reload(&mut self, character: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if let Some(weapon) = holder.current_weapon() {
            self.with_weapon(weapon, |w, owner, ctx| w.start_reload(false, owner, ctx));
        }
        Ok(())
    }

    pub fn melee(&mut self, character: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if holder.dying || holder.lunging || holder.lunge.is_some() {
            return Ok(());
        }
        let Some(weapon) = self.arena.held_of_kind(character, holder.config.melee_kind) else {
            return Ok(());
        };
        if !self.has_ammo(weapon) || !self.inventory_off_cooldown(character) {
            return Ok(());
        }

        if self.arena.weapon(weapon).is_some_and(|w| w.config().can_lunge) {
            self.start_lunge(character, weapon)
        } else {
            self.fire_extra_weapon(weapon);
            Ok(())
        }
    }

    /// Throws the first carried grenade that still has ammo.
    pub fn throw_grenade(&mut self, character: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if holder.dying || holder.lunge.is_some() {
            return Ok(());
        }
        let grenade = holder
            .config
            .grenade_kinds
            .iter()
            .filter_map(|kind| self.arena.held_of_kind(character, *kind))
            .find(|id| self.has_ammo(*id));
        let Some(grenade) = grenade else {
            return Ok(());
        };
        if self.inventory_off_cooldown(character) {
            self.fire_extra_weapon(grenade);
        }
        Ok(())
    }

    /// Fires a weapon that is not in hand: equipped just for one shot.
    fn fire_extra_weapon(&mut self, weapon: EntityId) {
        self.with_weapon(weapon, |w, owner, ctx| {
            w.quick_equip(owner, ctx);
            w.start_fire(owner, ctx);
            w.stop_fire(owner, ctx);
            w.quick_unequip(owner, ctx);
        });
        self.resolve_shots();
    }

    /// Fires a weapon once where the character stands. The authority asks
    /// the owning node to do it when the character is driven remotely.
    pub fn fire_in_place(&mut self, character: EntityId, weapon: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        self.expect_weapon(weapon)?;
        let extra = holder.current_weapon() != Some(weapon);

        if self.is_locally_controlled(character) {
            if extra {
                self.fire_extra_weapon(weapon);
            } else {
                self.with_weapon(weapon, |w, owner, ctx| {
                    w.start_fire(owner, ctx);
                    w.stop_fire(owner, ctx);
                });
                self.resolve_shots();
            }
        } else if self.has_authority() {
            self.outbox.invoke_on_observers(
                character,
                RemoteCall::FireInPlace { weapon, extra },
                ObserverScope::OwnerOnly,
            );
        }
        Ok(())
    }

    /// Dashes at a character in front of the aim. Without a target the
    /// weapon just fires where the character stands.
    pub fn start_lunge(&mut self, character: EntityId, weapon: EntityId) -> Result<(), CombatError> {
        let holder = self.expect_character(character)?;
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::StartLunge { weapon });
            return Ok(());
        }
        if holder.dying || holder.lunge.is_some() || !holder.inventory.contains(weapon) {
            return Ok(());
        }
        let Some(config) = self.arena.weapon(weapon).map(Weapon::shared_config) else {
            return Ok(());
        };
        if !config.can_lunge {
            return self.fire_in_place(character, weapon);
        }

        let (eye, aim, start, saved) = (holder.eye(), holder.aim, holder.position, holder.movement);
        let target = self
            .trace
            .line_trace(eye, eye + aim * config.lunge_range, Some(character))
            .and_then(|hit| {
                let id = hit.entity?;
                let victim = self.arena.character(id)?;
                (victim.health > 0.0 && !victim.dying).then_some((id, hit.point))
            });
        let Some((target, hit_point)) = target else {
            log::debug!("character {} found nothing to lunge at", character);
            return self.fire_in_place(character, weapon);
        };

        if let Some(c) = self.arena.character_mut(character) {
            c.lunge = Some(Lunge {
                weapon,
                target,
                start,
                hit_point,
                saved,
                collided: false,
            });
            c.lunging = true;
            c.movement = MovementTuning::lunging(config.lunge_velocity);
            c.velocity = aim * config.lunge_velocity;
        }
        self.cue(character, CueKind::LungeStarted { target });
        log::debug!("character {} lunges at {}", character, target);
        Ok(())
    }

    /// Ends a lunge, restores movement and strikes with the lunge weapon.
    pub fn finish_lunge(&mut self, character: EntityId) -> Result<(), CombatError> {
        self.expect_character(character)?;
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::FinishLunge);
            return Ok(());
        }
        let Some(lunge) = self.arena.character_mut(character).and_then(|c| {
            let lunge = c.lunge.take()?;
            c.movement = lunge.saved;
            c.velocity = Vec3::ZERO;
            c.lunging = false;
            Some(lunge)
        }) else {
            return Ok(());
        };
        self.cue(character, CueKind::LungeFinished);
        self.fire_in_place(character, lunge.weapon)
    }

    pub fn on_lunge_collision(&mut self, character: EntityId) -> Result<(), CombatError> {
        self.expect_character(character)?;
        if !self.has_authority() {
            self.outbox
                .invoke_on_authority(character, RemoteCall::LungeCollision);
            return Ok(());
        }
        if let Some(lunge) = self.arena.character_mut(character).and_then(|c| c.lunge.as_mut()) {
            lunge.collided = true;
        }
        Ok(())
    }

    pub(crate) fn update_lunges(&mut self) {
        for id in self.arena.character_ids() {
            let Some(c) = self.arena.character(id) else {
                continue;
            };
            let Some(lunge) = c.lunge else {
                continue;
            };
            let Some(config) = self.arena.weapon(lunge.weapon).map(Weapon::shared_config) else {
                if let Err(err) = self.finish_lunge(id) {
                    log::warn!("could not end lunge of {}: {}", id, err);
                }
                continue;
            };

            let position = c.position;
            let reach = c.config.radius + LUNGE_PROBE_MARGIN;
            let blocked = c.velocity.try_normalize().is_some_and(|dir| {
                self.trace
                    .line_trace(position, position + dir * reach, Some(id))
                    .is_some_and(|hit| hit.entity != Some(lunge.target))
            });
            if blocked {
                if let Err(err) = self.on_lunge_collision(id) {
                    log::warn!("lunge collision for {} failed: {}", id, err);
                }
            }

            let lunge = self.arena.character(id).and_then(|c| c.lunge).unwrap_or(lunge);
            if let Some(exit) = lunge.check_exit(position, config.lunge_range, config.lunge_finish_range) {
                log::debug!("lunge of {} ended: {:?}", id, exit);
                if let Err(err) = self.finish_lunge(id) {
                    log::warn!("could not end lunge of {}: {}", id, err);
                }
            }
        }
    }
}
