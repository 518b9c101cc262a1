use std::sync::Arc;

use glam::Vec3;

use crate::context::Ctx;
use crate::hit::{HitReceiver, HitRecord, HitReplicator};
use crate::net::{
    ConnectionId, FieldId, FieldSpec, FieldValue, NetMode, Replicable, ReplicationScope,
};
use crate::physics::BodyVolume;
use crate::time::{CharacterTimer, TimerHandle, TimerSlots};
use crate::world::{Damageable, EntityId, EntityKind, Tickable};

use super::config::CharacterConfig;
use super::inventory::Inventory;
use super::lunge::{Lunge, MovementTuning};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CheatFlags: u8 {
        const GOD_MODE      = 0b0001;
        const INFINITE_AMMO = 0b0010;
        const INFINITE_CLIP = 0b0100;
        const HEALTH_REGEN  = 0b1000;
    }
}

/// Combat state of one character.
#[derive(Debug)]
pub struct Character {
    pub(crate) id: EntityId,
    pub(crate) team: u8,
    pub(crate) controller: Option<ConnectionId>,
    pub(crate) config: Arc<CharacterConfig>,
    pub(crate) health: f32,
    pub(crate) dying: bool,
    pub(crate) torn_off: bool,
    pub(crate) replicate_movement: bool,
    pub(crate) collision_enabled: bool,
    pub(crate) ragdoll: bool,
    pub(crate) hidden: bool,
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) aim: Vec3,
    pub(crate) targeting: bool,
    pub(crate) running: bool,
    pub(crate) running_toggled: bool,
    pub(crate) movement: MovementTuning,
    pub(crate) inventory: Inventory,
    pub(crate) lunge: Option<Lunge>,
    pub(crate) lunging: bool,
    pub(crate) hits: HitReplicator,
    pub(crate) receiver: HitReceiver,
    pub(crate) last_hit: HitRecord,
    pub(crate) cheats: CheatFlags,
    pub(crate) regen_first_tick: bool,
    pub(crate) lifespan: TimerHandle,
    pub(crate) timers: TimerSlots<CharacterTimer>,
}

impl Character {
    pub fn new(
        id: EntityId,
        team: u8,
        controller: Option<ConnectionId>,
        config: Arc<CharacterConfig>,
    ) -> Self {
        Self {
            id,
            team,
            controller,
            health: config.max_health,
            dying: false,
            torn_off: false,
            replicate_movement: true,
            collision_enabled: true,
            ragdoll: false,
            hidden: false,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            aim: Vec3::NEG_Z,
            targeting: false,
            running: false,
            running_toggled: false,
            movement: config.movement,
            inventory: Inventory::new(),
            lunge: None,
            lunging: false,
            hits: HitReplicator::new(config.hit_record_window),
            receiver: HitReceiver::default(),
            last_hit: HitRecord::default(),
            cheats: CheatFlags::empty(),
            regen_first_tick: true,
            lifespan: TimerHandle::INVALID,
            timers: TimerSlots::new(),
            config,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn team(&self) -> u8 {
        self.team
    }

    pub fn controller(&self) -> Option<ConnectionId> {
        self.controller
    }

    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    pub fn max_health(&self) -> f32 {
        self.config.max_health
    }

    pub fn is_dying(&self) -> bool {
        self.dying
    }

    pub fn is_torn_off(&self) -> bool {
        self.torn_off
    }

    pub fn is_ragdoll(&self) -> bool {
        self.ragdoll
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn aim(&self) -> Vec3 {
        self.aim
    }

    pub fn eye(&self) -> Vec3 {
        self.position + Vec3::Y * self.config.eye_height
    }

    pub fn is_targeting(&self) -> bool {
        self.targeting
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn movement(&self) -> &MovementTuning {
        &self.movement
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn current_weapon(&self) -> Option<EntityId> {
        self.inventory.current()
    }

    pub fn is_lunging(&self) -> bool {
        self.lunging
    }

    pub fn lunge(&self) -> Option<&Lunge> {
        self.lunge.as_ref()
    }

    pub fn hit_record(&self) -> &HitRecord {
        self.hits.record()
    }

    /// Last hit record delivered to this node by replication.
    pub fn last_hit(&self) -> &HitRecord {
        &self.last_hit
    }

    pub fn cheats(&self) -> CheatFlags {
        self.cheats
    }

    pub fn set_cheats(&mut self, cheats: CheatFlags) {
        self.cheats = cheats;
    }

    pub fn regen_enabled(&self) -> bool {
        self.config.health_regen || self.cheats.contains(CheatFlags::HEALTH_REGEN)
    }

    pub fn is_locally_controlled(&self, mode: NetMode, local: Option<ConnectionId>) -> bool {
        match self.controller {
            None => mode.is_server(),
            Some(connection) => Some(connection) == local,
        }
    }

    pub fn can_die(&self, authority: bool) -> bool {
        authority && !self.dying
    }

    pub fn body(&self) -> BodyVolume {
        BodyVolume {
            position: self.position,
            facing: self.aim,
            radius: self.config.radius,
            height: self.config.height,
        }
    }

    pub fn set_pose(&mut self, position: Vec3, velocity: Vec3, aim: Vec3) {
        self.position = position;
        self.velocity = velocity;
        if let Some(aim) = aim.try_normalize() {
            self.aim = aim;
        }
    }
}

impl Damageable for Character {
    fn health(&self) -> f32 {
        self.health
    }

    fn accepts_damage(&self) -> bool {
        self.health > 0.0 && !self.dying && !self.cheats.contains(CheatFlags::GOD_MODE)
    }
}

impl Tickable for Character {
    fn tick(&mut self, ctx: &mut Ctx<'_>) {
        if self.dying || ctx.dt <= 0.0 {
            return;
        }
        let speed = self.velocity.length();
        if speed > self.movement.max_walk_speed {
            self.velocity *= self.movement.max_walk_speed / speed;
        }
        self.position += self.velocity * ctx.dt;
    }
}

fn movement_replicates(character: &Character, _now: f32) -> bool {
    character.replicate_movement
}

fn hit_window_open(character: &Character, now: f32) -> bool {
    character.hits.is_replicating(now)
}

impl Replicable for Character {
    const KIND: EntityKind = EntityKind::Character;

    fn manifest() -> &'static [FieldSpec<Self>] {
        const FIELDS: &[FieldSpec<Character>] = &[
            FieldSpec {
                field: FieldId::Inventory,
                scope: ReplicationScope::OwnerOnly,
                condition: None,
            },
            FieldSpec {
                field: FieldId::CurrentWeapon,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Health,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Targeting,
                scope: ReplicationScope::SkipOwner,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Running,
                scope: ReplicationScope::SkipOwner,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Lunging,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::LastHit,
                scope: ReplicationScope::Custom,
                condition: Some(hit_window_open),
            },
            FieldSpec {
                field: FieldId::Dying,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Position,
                scope: ReplicationScope::SkipOwner,
                condition: Some(movement_replicates),
            },
            FieldSpec {
                field: FieldId::Velocity,
                scope: ReplicationScope::SkipOwner,
                condition: Some(movement_replicates),
            },
            FieldSpec {
                field: FieldId::Aim,
                scope: ReplicationScope::SkipOwner,
                condition: Some(movement_replicates),
            },
        ];
        FIELDS
    }

    fn archetype(&self) -> u16 {
        u16::from(self.team)
    }

    fn read_field(&self, field: FieldId) -> Option<FieldValue> {
        Some(match field {
            FieldId::Inventory => FieldValue::Entities(self.inventory.weapons().to_vec()),
            FieldId::CurrentWeapon => FieldValue::Entity(self.inventory.current()),
            FieldId::Health => FieldValue::Float(self.health),
            FieldId::Targeting => FieldValue::Bool(self.targeting),
            FieldId::Running => FieldValue::Bool(self.running),
            FieldId::Lunging => FieldValue::Bool(self.lunging),
            FieldId::LastHit => FieldValue::Hit(self.hits.record().to_wire()),
            FieldId::Dying => FieldValue::Bool(self.dying),
            FieldId::Position => FieldValue::Vector(self.position.to_array()),
            FieldId::Velocity => FieldValue::Vector(self.velocity.to_array()),
            FieldId::Aim => FieldValue::Vector(self.aim.to_array()),
            _ => return None,
        })
    }

    fn write_field(&mut self, field: FieldId, value: &FieldValue) -> bool {
        match (field, value) {
            (FieldId::Inventory, FieldValue::Entities(weapons)) => self.inventory.replace(weapons),
            (FieldId::CurrentWeapon, FieldValue::Entity(weapon)) => {
                self.inventory.set_current(*weapon)
            }
            (FieldId::Health, FieldValue::Float(health)) => self.health = *health,
            (FieldId::Targeting, FieldValue::Bool(targeting)) => self.targeting = *targeting,
            (FieldId::Running, FieldValue::Bool(running)) => self.running = *running,
            (FieldId::Lunging, FieldValue::Bool(lunging)) => self.lunging = *lunging,
            (FieldId::LastHit, FieldValue::Hit(hit)) => self.last_hit = HitRecord::from_wire(hit),
            (FieldId::Dying, FieldValue::Bool(dying)) => self.dying |= *dying,
            (FieldId::Position, FieldValue::Vector(position)) => {
                self.position = Vec3::from_array(*position)
            }
            (FieldId::Velocity, FieldValue::Vector(velocity)) => {
                self.velocity = Vec3::from_array(*velocity)
            }
            (FieldId::Aim, FieldValue::Vector(aim)) => self.aim = Vec3::from_array(*aim),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::collect_fields;

    fn character() -> Character {
        Character::new(1, 0, Some(3), Arc::new(CharacterConfig::default()))
    }

    #[test]
    fn local_control_follows_controller() {
        let player = character();
        assert!(player.is_locally_controlled(NetMode::Client, Some(3)));
        assert!(!player.is_locally_controlled(NetMode::Client, Some(4)));
        assert!(!player.is_locally_controlled(NetMode::DedicatedServer, None));

        let bot = Character::new(2, 1, None, Arc::new(CharacterConfig::default()));
        assert!(bot.is_locally_controlled(NetMode::DedicatedServer, None));
        assert!(!bot.is_locally_controlled(NetMode::Client, Some(3)));
    }

    #[test]
    fn god_mode_refuses_damage() {
        let mut player = character();
        assert!(player.accepts_damage());
        player.set_cheats(CheatFlags::GOD_MODE);
        assert!(!player.accepts_damage());
    }

    #[test]
    fn owner_sees_inventory_but_not_its_own_movement() {
        let mut player = character();
        player.inventory.add(9);

        let owner_fields: Vec<FieldId> = collect_fields(&player, true, 0.0)
            .into_iter()
            .map(|update| update.field)
            .collect();
        assert!(owner_fields.contains(&FieldId::Inventory));
        assert!(!owner_fields.contains(&FieldId::Position));
        assert!(!owner_fields.contains(&FieldId::LastHit));

        let other_fields: Vec<FieldId> = collect_fields(&player, false, 0.0)
            .into_iter()
            .map(|update| update.field)
            .collect();
        assert!(!other_fields.contains(&FieldId::Inventory));
        assert!(other_fields.contains(&FieldId::Position));
    }

    #[test]
    fn frozen_movement_stops_replicating() {
        let mut player = character();
        player.replicate_movement = false;
        let fields = collect_fields(&player, false, 0.0);
        assert!(fields.iter().all(|update| update.field != FieldId::Velocity));
    }
}
