use std::sync::Arc;

use crate::context::Ctx;
use crate::event::CueKind;
use crate::net::{
    FieldId, FieldSpec, FieldValue, ObserverScope, RemoteCall, Replicable, ReplicationScope,
    sequence_greater_than,
};
use crate::time::{TimerHandle, TimerSlots, WeaponTimer};
use crate::world::{EntityId, EntityKind, Tickable};

use super::burst::BurstState;
use super::config::{WeaponConfig, WeaponKind};
use super::state::{self, StateInputs, WeaponState};

const BURST_STOP_EPSILON: f32 = 0.01;
const RELOAD_REFILL_LEAD: f32 = 0.1;

/// A shot committed by a fire tick, resolved by the world after the
/// current operation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotRequest {
    pub weapon: EntityId,
    pub owner: EntityId,
}

/// What a weapon needs to know about the character carrying it.
///
/// A weapon with no owner sees the default view and can neither fire nor
/// reload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OwnerView {
    pub id: Option<EntityId>,
    pub alive: bool,
    pub dying: bool,
    pub locally_controlled: bool,
    /// The owner's current weapon is this one.
    pub holds_this: bool,
    pub infinite_ammo: bool,
    pub infinite_clip: bool,
}

#[derive(Debug)]
pub struct Weapon {
    id: EntityId,
    kind: WeaponKind,
    config: Arc<WeaponConfig>,
    owner: Option<EntityId>,
    max_ammo: i32,
    current_ammo: i32,
    current_ammo_in_clip: i32,
    burst_counter: i32,
    state: WeaponState,
    equipped: bool,
    wants_to_fire: bool,
    pending_reload: bool,
    pending_equip: bool,
    refiring: bool,
    last_fire_time: f32,
    equip_started_time: f32,
    equip_duration: f32,
    burst: BurstState,
    fire_sequence: u32,
    last_confirmed_sequence: Option<u32>,
    /// Confirmed fire ticks the owning node may still turn into shots.
    shot_credits: u32,
    timers: TimerSlots<WeaponTimer>,
}

impl Weapon {
    pub fn new(id: EntityId, kind: WeaponKind, config: Arc<WeaponConfig>) -> Self {
        let clip = if config.initial_clips > 0 {
            config.ammo_per_clip
        } else {
            0
        };
        let (max_ammo, current_ammo) = if config.needs_reload {
            (
                config.max_ammo,
                (config.ammo_per_clip * config.initial_clips).min(config.max_ammo),
            )
        } else {
            (config.ammo_per_clip, clip)
        };

        Self {
            id,
            kind,
            max_ammo,
            current_ammo,
            current_ammo_in_clip: clip.min(current_ammo),
            burst_counter: 0,
            state: WeaponState::Idle,
            equipped: config.always_equipped,
            wants_to_fire: false,
            pending_reload: false,
            pending_equip: false,
            refiring: false,
            last_fire_time: f32::NEG_INFINITY,
            equip_started_time: 0.0,
            equip_duration: 0.0,
            burst: BurstState {
                start_time: f32::NEG_INFINITY,
                ..BurstState::default()
            },
            fire_sequence: 0,
            last_confirmed_sequence: None,
            shot_credits: 0,
            timers: TimerSlots::new(),
            owner: None,
            config,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> WeaponKind {
        self.kind
    }

    pub fn config(&self) -> &WeaponConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<WeaponConfig> {
        Arc::clone(&self.config)
    }

    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub fn state(&self) -> WeaponState {
        self.state
    }

    pub fn max_ammo(&self) -> i32 {
        self.max_ammo
    }

    pub fn current_ammo(&self) -> i32 {
        self.current_ammo
    }

    pub fn current_ammo_in_clip(&self) -> i32 {
        self.current_ammo_in_clip
    }

    pub fn burst_counter(&self) -> i32 {
        self.burst_counter
    }

    pub fn is_equipped(&self) -> bool {
        self.equipped
    }

    pub fn wants_to_fire(&self) -> bool {
        self.wants_to_fire
    }

    pub fn pending_reload(&self) -> bool {
        self.pending_reload
    }

    pub fn pending_equip(&self) -> bool {
        self.pending_equip
    }

    pub fn last_fire_time(&self) -> f32 {
        self.last_fire_time
    }

    pub fn equip_started_time(&self) -> f32 {
        self.equip_started_time
    }

    pub fn equip_duration(&self) -> f32 {
        self.equip_duration
    }

    pub fn is_bursting(&self) -> bool {
        self.burst.bursting
    }

    pub fn burst(&self) -> &BurstState {
        &self.burst
    }

    pub fn has_infinite_ammo(&self, owner: &OwnerView) -> bool {
        self.config.infinite_ammo || owner.infinite_ammo
    }

    pub fn has_infinite_clip(&self, owner: &OwnerView) -> bool {
        self.config.infinite_clip || owner.infinite_clip
    }

    pub fn can_fire(&self, owner: &OwnerView) -> bool {
        owner.alive && !owner.dying && self.state.accepts_input() && !self.pending_reload
    }

    pub fn can_reload(&self, owner: &OwnerView) -> bool {
        let got_ammo = self.current_ammo_in_clip < self.config.ammo_per_clip
            && (self.current_ammo - self.current_ammo_in_clip > 0 || self.has_infinite_clip(owner));
        owner.alive && got_ammo && self.state.accepts_input() && self.config.needs_reload
    }

    pub fn off_cooldown(&self, now: f32) -> bool {
        let shot_ready = self.last_fire_time + self.config.time_between_shots <= now;
        let burst_ready = !self.config.burst || self.burst.off_cooldown(&self.config, now);
        shot_ready && !self.pending_reload && burst_ready
    }

    pub fn start_fire(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if self.config.burst {
            self.start_burst(owner, ctx);
            return;
        }

        if !ctx.has_authority() {
            ctx.remote.invoke_on_authority(self.id, RemoteCall::StartFire);
        }

        if !self.wants_to_fire {
            self.wants_to_fire = true;
            self.determine_state(owner, ctx);
        }
    }

    pub fn stop_fire(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if self.config.burst {
            if !self.burst.pausing {
                log::debug!("weapon {} ignores stop during burst", self.id);
                return;
            }
            self.burst.pausing = false;
        } else if !ctx.has_authority() {
            ctx.remote.invoke_on_authority(self.id, RemoteCall::StopFire);
        }

        if self.wants_to_fire {
            self.wants_to_fire = false;
            self.determine_state(owner, ctx);
        }
    }

    /// Clears burst bookkeeping once its cooldown has elapsed. Runs once
    /// per tick so `start_fire` never has to read the clock to decide.
    pub fn poll_burst_expiry(&mut self, now: f32) {
        if self.burst.pending_burst {
            return;
        }
        if self.burst.expired(&self.config, now) {
            self.burst.bursting = false;
            self.burst.pausing = false;
        }
    }

    fn start_burst(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if self.burst.bursting {
            if !self.burst.pending_burst {
                let remaining = (self.burst.cooldown_end(&self.config) - ctx.now).max(0.0);
                self.burst.pending_burst = true;
                self.timers
                    .reset(ctx.timers, self.id, WeaponTimer::BurstRestart, remaining);
            }
            return;
        }
        self.begin_burst(owner, ctx);
    }

    fn begin_burst(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if !ctx.has_authority() {
            ctx.remote.invoke_on_authority(self.id, RemoteCall::StartFire);
        }

        self.burst.begin(ctx.now);
        let stop_after = (self.config.burst_duration() - BURST_STOP_EPSILON).max(0.0);
        self.timers
            .reset(ctx.timers, self.id, WeaponTimer::BurstStop, stop_after);

        self.wants_to_fire = true;
        self.determine_state(owner, ctx);
    }

    pub fn start_reload(&mut self, from_replication: bool, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        let allowed = self.can_reload(owner);

        if !ctx.has_authority() && !from_replication && allowed {
            ctx.remote.invoke_on_authority(self.id, RemoteCall::StartReload);
        }

        if !(from_replication || allowed) {
            log::debug!("weapon {} cannot reload in {}", self.id, self.state.as_str());
            return;
        }

        self.pending_reload = true;
        self.determine_state(owner, ctx);

        let duration = self.config.reload_time();
        ctx.cue(self.id, CueKind::ReloadAnimation { duration });
        self.timers
            .reset(ctx.timers, self.id, WeaponTimer::StopReload, duration);
        if ctx.has_authority() {
            self.timers.reset(
                ctx.timers,
                self.id,
                WeaponTimer::ReloadWeapon,
                (duration - RELOAD_REFILL_LEAD).max(RELOAD_REFILL_LEAD),
            );
        }
    }

    pub fn stop_reload(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if self.state != WeaponState::Reloading {
            return;
        }
        self.pending_reload = false;
        self.timers.clear(ctx.timers, WeaponTimer::StopReload);
        self.timers.clear(ctx.timers, WeaponTimer::ReloadWeapon);
        self.determine_state(owner, ctx);
        ctx.cue(self.id, CueKind::StopReloadAnimation);
    }

    /// Moves ammo from the pool into the clip.
    pub fn reload_weapon(&mut self, owner: &OwnerView) {
        let per_clip = self.config.ammo_per_clip;
        let clip = self.current_ammo_in_clip;
        let delta = if self.has_infinite_clip(owner) {
            per_clip - clip
        } else {
            (per_clip - clip).min(self.current_ammo - clip)
        };

        if delta > 0 {
            self.current_ammo_in_clip += delta;
        }
        if self.has_infinite_clip(owner) {
            self.current_ammo = self.current_ammo.max(self.current_ammo_in_clip);
        }
    }

    /// Adds to the pool, limited by what it is missing. Returns the amount
    /// actually added.
    pub fn give_ammo(&mut self, amount: i32, owner: &OwnerView, ctx: &mut Ctx<'_>) -> i32 {
        if !ctx.has_authority() {
            return 0;
        }
        let missing = (self.max_ammo - self.current_ammo).max(0);
        let added = amount.clamp(0, missing);
        self.current_ammo += added;

        if self.current_ammo_in_clip <= 0 && self.can_reload(owner) && owner.holds_this {
            if owner.locally_controlled {
                self.start_reload(false, owner, ctx);
            } else {
                ctx.remote.invoke_on_observers(
                    self.id,
                    RemoteCall::ClientStartReload,
                    ObserverScope::OwnerOnly,
                );
            }
        }
        added
    }

    /// Removes from the pool. Returns the amount actually removed.
    pub fn take_ammo(&mut self, amount: i32, ctx: &Ctx<'_>) -> i32 {
        if !ctx.has_authority() {
            return 0;
        }
        let taken = amount.clamp(0, self.current_ammo);
        self.current_ammo -= taken;
        self.current_ammo_in_clip = self.current_ammo_in_clip.min(self.current_ammo);
        taken
    }

    pub fn use_ammo(&mut self, owner: &OwnerView) {
        if self.has_infinite_ammo(owner) || self.current_ammo_in_clip <= 0 {
            return;
        }
        self.current_ammo_in_clip -= 1;
        if !self.has_infinite_clip(owner) {
            self.current_ammo = (self.current_ammo - 1).max(0);
        }
    }

    /// Overwrites both counters, used when a pickup hands its weapon back.
    pub fn restore_ammo(&mut self, ammo: i32, clip: i32) {
        self.current_ammo = ammo.clamp(0, self.max_ammo);
        self.current_ammo_in_clip = clip.clamp(0, self.config.ammo_per_clip).min(self.current_ammo);
    }

    pub fn on_equip(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        self.pending_equip = true;
        self.determine_state(owner, ctx);

        let duration = self.config.equip_time();
        if duration > 0.0 {
            self.equip_started_time = ctx.now;
            self.equip_duration = duration;
            ctx.cue(self.id, CueKind::EquipAnimation { duration });
            self.timers
                .reset(ctx.timers, self.id, WeaponTimer::EquipFinished, duration);
        } else {
            self.on_equip_finished(owner, ctx);
        }
    }

    pub fn on_equip_finished(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        self.equipped = true;
        self.pending_equip = false;
        self.determine_state(owner, ctx);

        if owner.locally_controlled && self.current_ammo_in_clip <= 0 && self.can_reload(owner) {
            self.start_reload(false, owner, ctx);
        }
    }

    pub fn on_unequip(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        self.equipped = false;
        self.halt_fire(ctx);

        if self.pending_reload {
            ctx.cue(self.id, CueKind::StopReloadAnimation);
            self.pending_reload = false;
            self.timers.clear(ctx.timers, WeaponTimer::StopReload);
            self.timers.clear(ctx.timers, WeaponTimer::ReloadWeapon);
        }
        if self.pending_equip {
            ctx.cue(self.id, CueKind::StopEquipAnimation);
            self.pending_equip = false;
            self.timers.clear(ctx.timers, WeaponTimer::EquipFinished);
        }

        self.determine_state(owner, ctx);
    }

    /// Equips without animation, for extra weapons fired in place.
    pub fn quick_equip(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        self.equipped = true;
        self.pending_equip = false;
        self.timers.clear(ctx.timers, WeaponTimer::EquipFinished);
        self.determine_state(owner, ctx);
    }

    pub fn quick_unequip(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if self.config.always_equipped {
            return;
        }
        self.equipped = false;
        self.determine_state(owner, ctx);
    }

    pub fn on_enter_inventory(&mut self, owner: EntityId) {
        self.owner = Some(owner);
    }

    pub fn on_leave_inventory(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if ctx.has_authority() {
            self.owner = None;
        }
        if self.equipped || self.pending_equip {
            self.on_unequip(owner, ctx);
        }
    }

    /// Drops every pending timer, used when the weapon is destroyed.
    pub fn cancel_timers(&mut self, ctx: &mut Ctx<'_>) {
        self.timers.clear_all(ctx.timers);
    }

    pub fn handle_firing(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        let infinite = self.has_infinite_clip(owner) || self.has_infinite_ammo(owner);

        if (self.current_ammo_in_clip > 0 || infinite) && self.can_fire(owner) {
            ctx.cue(self.id, CueKind::FireEffects);

            if owner.locally_controlled {
                if self.config.time_before_shot > 0.0 {
                    self.timers.reset(
                        ctx.timers,
                        self.id,
                        WeaponTimer::HandleShot,
                        self.config.time_before_shot,
                    );
                } else {
                    self.fire_weapon(owner, ctx);
                }
                self.use_ammo(owner);
                self.burst_counter += 1;
            }
        } else if self.can_reload(owner) {
            self.start_reload(false, owner, ctx);
        } else if owner.locally_controlled {
            if self.current_ammo == 0 && !self.refiring {
                ctx.cue(self.id, CueKind::OutOfAmmo);
            }
            if self.burst_counter > 0 {
                self.on_burst_finished(ctx);
            }
        }

        if owner.locally_controlled {
            if !ctx.has_authority() {
                self.fire_sequence = self.fire_sequence.wrapping_add(1);
                ctx.remote.invoke_on_authority(
                    self.id,
                    RemoteCall::HandleFiring {
                        sequence: self.fire_sequence,
                    },
                );
            }

            if self.current_ammo_in_clip <= 0 && self.can_reload(owner) {
                self.start_reload(false, owner, ctx);
            }

            self.refiring =
                self.state == WeaponState::Firing && self.config.time_between_shots > 0.0;
            if self.refiring {
                self.timers.reset(
                    ctx.timers,
                    self.id,
                    WeaponTimer::HandleFiring,
                    self.config.time_between_shots,
                );
            }
        }

        self.last_fire_time = ctx.now;
    }

    /// Authority side of a fire tick reported by the owning node. Returns
    /// false when the confirmation is a duplicate or arrived out of order.
    pub fn server_handle_firing(&mut self, sequence: u32, owner: &OwnerView, ctx: &mut Ctx<'_>) -> bool {
        if let Some(last) = self.last_confirmed_sequence {
            if !sequence_greater_than(sequence, last) {
                log::debug!(
                    "weapon {} dropped stale fire confirmation {} (last {})",
                    self.id,
                    sequence,
                    last
                );
                return false;
            }
        }
        self.last_confirmed_sequence = Some(sequence);

        let should_update = self.current_ammo_in_clip > 0 && self.can_fire(owner);
        self.handle_firing(owner, ctx);
        if should_update {
            self.use_ammo(owner);
            self.burst_counter += 1;
            if !owner.locally_controlled {
                self.shot_credits = self.shot_credits.saturating_add(1);
            }
        }
        true
    }

    /// Spends one confirmed fire tick on a remote shot. A shot with no
    /// confirmed tick behind it is refused.
    pub fn take_shot_credit(&mut self) -> bool {
        if self.shot_credits == 0 {
            return false;
        }
        self.shot_credits -= 1;
        true
    }

    fn fire_weapon(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if let Some(owner) = owner.id {
            ctx.shots.push(ShotRequest {
                weapon: self.id,
                owner,
            });
        }
    }

    fn halt_fire(&mut self, ctx: &mut Ctx<'_>) {
        self.wants_to_fire = false;
        self.burst.clear();
        self.timers.clear(ctx.timers, WeaponTimer::BurstStop);
        self.timers.clear(ctx.timers, WeaponTimer::BurstRestart);
        self.timers.clear(ctx.timers, WeaponTimer::HandleShot);
    }

    fn determine_state(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        let next = state::determine_state(&StateInputs {
            equipped: self.equipped,
            pending_equip: self.pending_equip,
            pending_reload: self.pending_reload,
            can_reload: self.can_reload(owner),
            wants_to_fire: self.wants_to_fire,
            can_fire: self.can_fire(owner),
            current: self.state,
        });
        self.set_state(next, owner, ctx);
    }

    fn set_state(&mut self, next: WeaponState, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        let previous = self.state;
        if previous == WeaponState::Firing && next != WeaponState::Firing {
            self.on_burst_finished(ctx);
        }

        self.state = next;

        if previous != WeaponState::Firing && next == WeaponState::Firing {
            self.on_burst_started(owner, ctx);
        }
    }

    fn on_burst_started(&mut self, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        let between = self.config.time_between_shots;
        let next_allowed = self.last_fire_time + between;
        if between > 0.0 && next_allowed > ctx.now {
            self.timers.reset(
                ctx.timers,
                self.id,
                WeaponTimer::HandleFiring,
                next_allowed - ctx.now,
            );
        } else {
            self.handle_firing(owner, ctx);
        }
    }

    fn on_burst_finished(&mut self, ctx: &mut Ctx<'_>) {
        self.burst_counter = 0;
        ctx.cue(self.id, CueKind::StopFireEffects);
        self.timers.clear(ctx.timers, WeaponTimer::HandleFiring);
        self.refiring = false;
    }

    pub fn on_timer(
        &mut self,
        key: WeaponTimer,
        handle: TimerHandle,
        owner: &OwnerView,
        ctx: &mut Ctx<'_>,
    ) {
        if !self.timers.fired(key, handle) {
            log::debug!("weapon {} ignored stale {:?} timer", self.id, key);
            return;
        }

        match key {
            WeaponTimer::EquipFinished => {
                if self.pending_equip {
                    self.on_equip_finished(owner, ctx);
                }
            }
            WeaponTimer::StopReload => {
                if self.timers.is_active(ctx.timers, WeaponTimer::ReloadWeapon)
                    && self.state == WeaponState::Reloading
                {
                    self.reload_weapon(owner);
                }
                self.stop_reload(owner, ctx);
            }
            WeaponTimer::ReloadWeapon => {
                if self.state == WeaponState::Reloading {
                    self.reload_weapon(owner);
                }
            }
            WeaponTimer::HandleFiring => self.handle_firing(owner, ctx),
            WeaponTimer::HandleShot => {
                if owner.alive {
                    self.fire_weapon(owner, ctx);
                }
            }
            WeaponTimer::BurstStop => {
                self.burst.pausing = true;
                self.stop_fire(owner, ctx);
            }
            WeaponTimer::BurstRestart => {
                self.burst.bursting = false;
                self.burst.pending_burst = false;
                self.start_burst(owner, ctx);
            }
        }
    }

    pub fn on_rep_burst_counter(&mut self, counter: i32, ctx: &mut Ctx<'_>) {
        let previous = self.burst_counter;
        self.burst_counter = counter.max(0);
        if counter > 0 {
            ctx.cue(self.id, CueKind::FireEffects);
        } else if previous > 0 {
            ctx.cue(self.id, CueKind::StopFireEffects);
        }
    }

    pub fn on_rep_pending_reload(&mut self, pending: bool, owner: &OwnerView, ctx: &mut Ctx<'_>) {
        if pending {
            self.start_reload(true, owner, ctx);
        } else {
            self.stop_reload(owner, ctx);
            self.pending_reload = false;
        }
    }

    /// Replicated owner change, applied without the inventory hooks.
    pub fn set_owner(&mut self, owner: Option<EntityId>) {
        self.owner = owner;
    }
}

impl Tickable for Weapon {
    fn tick(&mut self, ctx: &mut Ctx<'_>) {
        self.poll_burst_expiry(ctx.now);
    }
}

impl Replicable for Weapon {
    const KIND: EntityKind = EntityKind::Weapon;

    fn manifest() -> &'static [FieldSpec<Self>] {
        const FIELDS: &[FieldSpec<Weapon>] = &[
            FieldSpec {
                field: FieldId::Owner,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::CurrentAmmo,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::CurrentAmmoInClip,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::BurstCounter,
                scope: ReplicationScope::SkipOwner,
                condition: None,
            },
            FieldSpec {
                field: FieldId::PendingReload,
                scope: ReplicationScope::SkipOwner,
                condition: None,
            },
        ];
        FIELDS
    }

    fn archetype(&self) -> u16 {
        self.kind
    }

    fn read_field(&self, field: FieldId) -> Option<FieldValue> {
        Some(match field {
            FieldId::Owner => FieldValue::Entity(self.owner),
            FieldId::CurrentAmmo => FieldValue::Int(self.current_ammo),
            FieldId::CurrentAmmoInClip => FieldValue::Int(self.current_ammo_in_clip),
            FieldId::BurstCounter => FieldValue::Int(self.burst_counter),
            FieldId::PendingReload => FieldValue::Bool(self.pending_reload),
            _ => return None,
        })
    }

    fn write_field(&mut self, field: FieldId, value: &FieldValue) -> bool {
        match (field, value) {
            (FieldId::Owner, FieldValue::Entity(owner)) => self.owner = *owner,
            (FieldId::CurrentAmmo, FieldValue::Int(ammo)) => self.current_ammo = *ammo,
            (FieldId::CurrentAmmoInClip, FieldValue::Int(clip)) => self.current_ammo_in_clip = *clip,
            (FieldId::BurstCounter, FieldValue::Int(counter)) => self.burst_counter = *counter,
            (FieldId::PendingReload, FieldValue::Bool(pending)) => self.pending_reload = *pending,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CueQueue;
    use crate::net::{NetMode, Outbox, Outgoing};
    use crate::time::{TimerKey, TimerQueue};

    struct Rig {
        mode: NetMode,
        timers: TimerQueue,
        outbox: Outbox,
        cues: CueQueue,
        shots: Vec<ShotRequest>,
    }

    impl Rig {
        fn new(mode: NetMode) -> Self {
            Self {
                mode,
                timers: TimerQueue::new(),
                outbox: Outbox::new(),
                cues: CueQueue::default(),
                shots: Vec::new(),
            }
        }

        fn ctx(&mut self) -> Ctx<'_> {
            Ctx {
                now: self.timers.now(),
                dt: 0.0,
                mode: self.mode,
                timers: &mut self.timers,
                remote: &mut self.outbox,
                cues: &mut self.cues,
                shots: &mut self.shots,
            }
        }

        fn advance_to(&mut self, weapon: &mut Weapon, owner: &OwnerView, now: f32) {
            self.timers.set_now(now);
            while let Some(due) = self.timers.pop_due() {
                if let TimerKey::Weapon(key) = due.key {
                    let mut ctx = self.ctx();
                    weapon.on_timer(key, due.handle, owner, &mut ctx);
                }
            }
            weapon.poll_burst_expiry(now);
        }
    }

    fn holder() -> OwnerView {
        OwnerView {
            id: Some(1),
            alive: true,
            locally_controlled: true,
            holds_this: true,
            ..OwnerView::default()
        }
    }

    fn rifle() -> WeaponConfig {
        WeaponConfig {
            max_ammo: 90,
            ammo_per_clip: 30,
            initial_clips: 2,
            time_between_shots: 0.1,
            no_anim_reload_duration: 1.0,
            ..WeaponConfig::default()
        }
    }

    fn equipped(config: WeaponConfig, rig: &mut Rig) -> Weapon {
        let mut weapon = Weapon::new(10, 1, Arc::new(config));
        weapon.on_enter_inventory(1);
        weapon.on_equip(&holder(), &mut rig.ctx());
        weapon
    }

    fn assert_ammo_invariant(weapon: &Weapon) {
        assert!(weapon.current_ammo_in_clip() >= 0);
        assert!(weapon.current_ammo_in_clip() <= weapon.current_ammo());
        assert!(weapon.current_ammo() <= weapon.max_ammo());
    }

    #[test]
    fn initial_ammo_fills_the_clip() {
        let weapon = Weapon::new(1, 1, Arc::new(rifle()));
        assert_eq!(weapon.current_ammo_in_clip(), 30);
        assert_eq!(weapon.current_ammo(), 60);

        let knife = Weapon::new(
            2,
            7,
            Arc::new(WeaponConfig {
                needs_reload: false,
                ammo_per_clip: 1,
                initial_clips: 1,
                always_equipped: true,
                ..WeaponConfig::default()
            }),
        );
        assert_eq!(knife.max_ammo(), 1);
        assert_eq!(knife.current_ammo(), 1);
        assert!(knife.is_equipped());
    }

    #[test]
    fn reload_fills_clip_from_pool() {
        let mut weapon = Weapon::new(1, 1, Arc::new(rifle()));
        weapon.restore_ammo(53, 5);
        weapon.reload_weapon(&holder());
        assert_eq!(weapon.current_ammo_in_clip(), 30);
        assert_eq!(weapon.current_ammo(), 53);
        assert_ammo_invariant(&weapon);
    }

    #[test]
    fn reload_is_limited_by_pool() {
        let mut weapon = Weapon::new(1, 1, Arc::new(rifle()));
        weapon.restore_ammo(12, 4);
        weapon.reload_weapon(&holder());
        assert_eq!(weapon.current_ammo_in_clip(), 12);
        assert_eq!(weapon.current_ammo(), 12);
    }

    #[test]
    fn infinite_clip_reload_grows_pool() {
        let mut weapon = Weapon::new(1, 1, Arc::new(rifle()));
        weapon.restore_ammo(3, 3);
        let owner = OwnerView {
            infinite_clip: true,
            ..holder()
        };
        weapon.reload_weapon(&owner);
        assert_eq!(weapon.current_ammo_in_clip(), 30);
        assert_eq!(weapon.current_ammo(), 30);
    }

    #[test]
    fn use_ammo_clamps_at_zero() {
        let mut weapon = Weapon::new(1, 1, Arc::new(rifle()));
        weapon.restore_ammo(1, 1);
        weapon.use_ammo(&holder());
        weapon.use_ammo(&holder());
        assert_eq!(weapon.current_ammo_in_clip(), 0);
        assert_eq!(weapon.current_ammo(), 0);
        assert_ammo_invariant(&weapon);
    }

    #[test]
    fn infinite_ammo_never_decrements() {
        let mut weapon = Weapon::new(1, 1, Arc::new(rifle()));
        let owner = OwnerView {
            infinite_ammo: true,
            ..holder()
        };
        weapon.use_ammo(&owner);
        assert_eq!(weapon.current_ammo_in_clip(), 30);
        assert_eq!(weapon.current_ammo(), 60);
    }

    #[test]
    fn unowned_weapon_cannot_fire() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = Weapon::new(1, 1, Arc::new(rifle()));
        let nobody = OwnerView::default();
        weapon.on_equip(&nobody, &mut rig.ctx());
        weapon.start_fire(&nobody, &mut rig.ctx());
        assert_eq!(weapon.state(), WeaponState::Idle);
        assert!(rig.shots.is_empty());
    }

    #[test]
    fn fire_commits_shot_and_ammo_immediately() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.start_fire(&holder(), &mut rig.ctx());

        assert_eq!(weapon.state(), WeaponState::Firing);
        assert_eq!(weapon.current_ammo_in_clip(), 29);
        assert_eq!(weapon.burst_counter(), 1);
        assert_eq!(rig.shots, vec![ShotRequest { weapon: 10, owner: 1 }]);

        rig.advance_to(&mut weapon, &holder(), 0.1);
        rig.advance_to(&mut weapon, &holder(), 0.2);
        assert_eq!(weapon.current_ammo_in_clip(), 27);
        assert_eq!(rig.shots.len(), 3);

        weapon.stop_fire(&holder(), &mut rig.ctx());
        assert_eq!(weapon.state(), WeaponState::Idle);
        assert_eq!(weapon.burst_counter(), 0);
        rig.advance_to(&mut weapon, &holder(), 1.0);
        assert_eq!(rig.shots.len(), 3);
        assert_ammo_invariant(&weapon);
    }

    #[test]
    fn refire_honours_time_between_shots() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.start_fire(&holder(), &mut rig.ctx());
        weapon.stop_fire(&holder(), &mut rig.ctx());

        rig.advance_to(&mut weapon, &holder(), 0.04);
        weapon.start_fire(&holder(), &mut rig.ctx());
        assert_eq!(rig.shots.len(), 1);
        assert!(!weapon.off_cooldown(0.04));

        rig.advance_to(&mut weapon, &holder(), 0.11);
        assert_eq!(rig.shots.len(), 2);
    }

    #[test]
    fn empty_clip_starts_reload() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.restore_ammo(40, 1);
        weapon.start_fire(&holder(), &mut rig.ctx());

        assert_eq!(weapon.current_ammo_in_clip(), 0);
        assert_eq!(weapon.state(), WeaponState::Reloading);
        assert!(weapon.pending_reload());

        rig.advance_to(&mut weapon, &holder(), 0.95);
        assert_eq!(weapon.current_ammo_in_clip(), 30);
        assert_eq!(weapon.state(), WeaponState::Reloading);

        rig.advance_to(&mut weapon, &holder(), 1.0);
        assert_eq!(weapon.state(), WeaponState::Idle);
        assert!(!weapon.pending_reload());
        assert_eq!(weapon.current_ammo(), 39);
        assert_ammo_invariant(&weapon);
    }

    #[test]
    fn full_clip_absorbs_reload() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.start_reload(false, &holder(), &mut rig.ctx());
        assert!(!weapon.pending_reload());
        assert!(rig.timers.is_empty());
    }

    #[test]
    fn stop_reload_twice_matches_once() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.restore_ammo(50, 10);
        weapon.start_reload(false, &holder(), &mut rig.ctx());
        assert_eq!(weapon.state(), WeaponState::Reloading);

        weapon.stop_reload(&holder(), &mut rig.ctx());
        let state = weapon.state();
        let cues = rig.cues.len();
        weapon.stop_reload(&holder(), &mut rig.ctx());

        assert_eq!(weapon.state(), state);
        assert_eq!(rig.cues.len(), cues);
        assert!(rig.timers.is_empty());
        assert_eq!(weapon.current_ammo_in_clip(), 10);
    }

    #[test]
    fn unequip_cancels_reload() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.restore_ammo(50, 10);
        weapon.start_reload(false, &holder(), &mut rig.ctx());
        weapon.on_unequip(&holder(), &mut rig.ctx());

        rig.advance_to(&mut weapon, &holder(), 2.0);
        assert_eq!(weapon.current_ammo_in_clip(), 10);
        assert_eq!(weapon.state(), WeaponState::Idle);
        assert!(!weapon.pending_reload());
    }

    #[test]
    fn equip_animation_delays_readiness() {
        let mut rig = Rig::new(NetMode::Standalone);
        let config = WeaponConfig {
            equip_duration: 0.5,
            ..rifle()
        };
        let mut weapon = equipped(config, &mut rig);
        assert_eq!(weapon.state(), WeaponState::Equipping);
        assert!(!weapon.is_equipped());

        rig.advance_to(&mut weapon, &holder(), 0.5);
        assert!(weapon.is_equipped());
        assert_eq!(weapon.state(), WeaponState::Idle);
    }

    #[test]
    fn client_forwards_fire_ticks_with_sequence() {
        let mut rig = Rig::new(NetMode::Client);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.start_fire(&holder(), &mut rig.ctx());
        rig.advance_to(&mut weapon, &holder(), 0.1);

        let calls: Vec<RemoteCall> = rig
            .outbox
            .iter()
            .map(|out| out.envelope().call.clone())
            .collect();
        assert_eq!(
            calls,
            vec![
                RemoteCall::StartFire,
                RemoteCall::HandleFiring { sequence: 1 },
                RemoteCall::HandleFiring { sequence: 2 },
            ]
        );
        assert!(
            rig.outbox
                .iter()
                .all(|out| matches!(out, Outgoing::ToAuthority(_)))
        );
    }

    #[test]
    fn duplicate_fire_confirmation_is_ignored() {
        let mut rig = Rig::new(NetMode::DedicatedServer);
        let mut weapon = equipped(rifle(), &mut rig);
        let remote_owner = OwnerView {
            locally_controlled: false,
            ..holder()
        };

        assert!(weapon.server_handle_firing(1, &remote_owner, &mut rig.ctx()));
        assert!(!weapon.server_handle_firing(1, &remote_owner, &mut rig.ctx()));
        assert!(weapon.server_handle_firing(2, &remote_owner, &mut rig.ctx()));
        assert_eq!(weapon.current_ammo_in_clip(), 28);
        assert!(rig.shots.is_empty());
    }

    #[test]
    fn give_ammo_caps_at_max_and_asks_owner_to_reload() {
        let mut rig = Rig::new(NetMode::DedicatedServer);
        let mut weapon = equipped(rifle(), &mut rig);
        weapon.restore_ammo(0, 0);
        let remote_owner = OwnerView {
            locally_controlled: false,
            ..holder()
        };

        assert_eq!(weapon.give_ammo(500, &remote_owner, &mut rig.ctx()), 90);
        assert_eq!(weapon.current_ammo(), 90);
        assert!(rig.outbox.iter().any(|out| matches!(
            out,
            Outgoing::ToObservers {
                scope: ObserverScope::OwnerOnly,
                ..
            }
        )));
        assert_eq!(weapon.take_ammo(100, &rig.ctx()), 90);
        assert_eq!(weapon.current_ammo(), 0);
    }

    fn burst_rifle() -> WeaponConfig {
        WeaponConfig {
            burst: true,
            shots_per_burst: 3,
            time_between_shots: 0.1,
            time_between_bursts: 0.05,
            ..rifle()
        }
    }

    #[test]
    fn burst_fires_fixed_count() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(burst_rifle(), &mut rig);
        weapon.start_fire(&holder(), &mut rig.ctx());
        weapon.stop_fire(&holder(), &mut rig.ctx());
        assert!(weapon.wants_to_fire());

        for step in 1..=10 {
            rig.advance_to(&mut weapon, &holder(), step as f32 * 0.05);
        }
        assert_eq!(rig.shots.len(), 3);
        assert_eq!(weapon.state(), WeaponState::Idle);
    }

    #[test]
    fn burst_request_during_cooldown_does_not_overlap() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(burst_rifle(), &mut rig);
        weapon.start_fire(&holder(), &mut rig.ctx());

        rig.advance_to(&mut weapon, &holder(), 0.05);
        weapon.start_fire(&holder(), &mut rig.ctx());
        assert_eq!(weapon.burst().start_time, 0.0);
        assert!(weapon.burst().pending_burst);
        assert!(!weapon.off_cooldown(0.05));

        rig.advance_to(&mut weapon, &holder(), 0.36);
        assert!(weapon.burst().start_time > 0.3);
        assert!(weapon.is_bursting());
        assert!(!weapon.burst().pending_burst);
    }

    #[test]
    fn burst_expires_then_starts_fresh() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(burst_rifle(), &mut rig);
        weapon.start_fire(&holder(), &mut rig.ctx());
        assert!((weapon.config().burst_duration() - 0.3).abs() < 1e-6);

        rig.advance_to(&mut weapon, &holder(), 0.36);
        assert!(!weapon.is_bursting());

        weapon.start_fire(&holder(), &mut rig.ctx());
        assert!(weapon.is_bursting());
        assert_eq!(weapon.burst().start_time, 0.36);
    }

    #[test]
    fn fire_at_cooldown_end_starts_a_fresh_burst() {
        let mut rig = Rig::new(NetMode::Standalone);
        let mut weapon = equipped(burst_rifle(), &mut rig);
        weapon.start_fire(&holder(), &mut rig.ctx());

        rig.advance_to(&mut weapon, &holder(), 0.35);
        assert!(!weapon.is_bursting());

        weapon.start_fire(&holder(), &mut rig.ctx());
        assert!(weapon.is_bursting());
        assert!(!weapon.burst().pending_burst);
        assert_eq!(weapon.burst().start_time, 0.35);
    }

    #[test]
    fn replicated_pending_reload_plays_on_observer() {
        let mut rig = Rig::new(NetMode::Client);
        let mut weapon = equipped(rifle(), &mut rig);
        let proxy = OwnerView {
            locally_controlled: false,
            ..holder()
        };

        weapon.restore_ammo(50, 10);
        weapon.on_rep_pending_reload(true, &proxy, &mut rig.ctx());
        assert_eq!(weapon.state(), WeaponState::Reloading);
        assert!(rig.outbox.is_empty());

        weapon.on_rep_pending_reload(false, &proxy, &mut rig.ctx());
        assert_eq!(weapon.state(), WeaponState::Idle);
        assert_eq!(rig.cues.count(|kind| *kind == CueKind::StopReloadAnimation), 1);
    }
}
