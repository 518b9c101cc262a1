use glam::Vec3;

use crate::net::{FieldId, FieldSpec, FieldValue, Replicable, ReplicationScope};
use crate::time::{ProjectileTimer, TimerHandle, TimerSlots};
use crate::weapon::{ProjectileConfig, WeaponKind};
use crate::world::{EntityId, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub point: Vec3,
    pub normal: Vec3,
}

#[derive(Debug)]
pub struct Projectile {
    pub(crate) id: EntityId,
    pub(crate) weapon_kind: WeaponKind,
    pub(crate) config: ProjectileConfig,
    pub(crate) instigator: Option<EntityId>,
    pub(crate) causer: Option<EntityId>,
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) stopped: bool,
    pub(crate) bounced: bool,
    pub(crate) stuck: bool,
    pub(crate) stuck_to: Option<EntityId>,
    pub(crate) stuck_offset: Vec3,
    pub(crate) impact: Option<Impact>,
    pub(crate) exploded: bool,
    pub(crate) effect_played: bool,
    pub(crate) lifespan: TimerHandle,
    pub(crate) timers: TimerSlots<ProjectileTimer>,
}

impl Projectile {
    pub fn new(id: EntityId, weapon_kind: WeaponKind, config: ProjectileConfig) -> Self {
        Self {
            id,
            weapon_kind,
            config,
            instigator: None,
            causer: None,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            stopped: false,
            bounced: false,
            stuck: false,
            stuck_to: None,
            stuck_offset: Vec3::ZERO,
            impact: None,
            exploded: false,
            effect_played: false,
            lifespan: TimerHandle::INVALID,
            timers: TimerSlots::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn weapon_kind(&self) -> WeaponKind {
        self.weapon_kind
    }

    pub fn config(&self) -> &ProjectileConfig {
        &self.config
    }

    pub fn instigator(&self) -> Option<EntityId> {
        self.instigator
    }

    pub fn causer(&self) -> Option<EntityId> {
        self.causer
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    pub fn stuck_to(&self) -> Option<EntityId> {
        self.stuck_to
    }

    pub fn has_exploded(&self) -> bool {
        self.exploded
    }

    /// Where the explosion is centred, nudged off the struck surface.
    pub fn explosion_point(&self) -> Vec3 {
        match self.impact {
            Some(impact) => impact.point + impact.normal * 0.1,
            None => self.position,
        }
    }

    /// Damage dealt to the entity the projectile is stuck to.
    pub fn stuck_damage(&self) -> f32 {
        if self.config.stuck_damage > 0.0 {
            self.config.stuck_damage
        } else {
            self.config.explosion_damage
        }
    }

    /// Marks the explosion effect as played. Returns false if it already was.
    pub fn claim_effect(&mut self) -> bool {
        !std::mem::replace(&mut self.effect_played, true)
    }
}

impl Replicable for Projectile {
    const KIND: EntityKind = EntityKind::Projectile;

    fn manifest() -> &'static [FieldSpec<Self>] {
        const FIELDS: &[FieldSpec<Projectile>] = &[
            FieldSpec {
                field: FieldId::Owner,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Position,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Velocity,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Stuck,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::StuckTo,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Exploded,
                scope: ReplicationScope::All,
                condition: None,
            },
        ];
        FIELDS
    }

    fn archetype(&self) -> u16 {
        self.weapon_kind
    }

    fn read_field(&self, field: FieldId) -> Option<FieldValue> {
        Some(match field {
            FieldId::Owner => FieldValue::Entity(self.instigator),
            FieldId::Position => FieldValue::Vector(self.position.to_array()),
            FieldId::Velocity => FieldValue::Vector(self.velocity.to_array()),
            FieldId::Stuck => FieldValue::Bool(self.stuck),
            FieldId::StuckTo => FieldValue::Entity(self.stuck_to),
            FieldId::Exploded => FieldValue::Bool(self.exploded),
            _ => return None,
        })
    }

    fn write_field(&mut self, field: FieldId, value: &FieldValue) -> bool {
        match (field, value) {
            (FieldId::Owner, FieldValue::Entity(owner)) => self.instigator = *owner,
            (FieldId::Position, FieldValue::Vector(position)) => {
                self.position = Vec3::from_array(*position)
            }
            (FieldId::Velocity, FieldValue::Vector(velocity)) => {
                self.velocity = Vec3::from_array(*velocity)
            }
            (FieldId::Stuck, FieldValue::Bool(stuck)) => self.stuck = *stuck,
            (FieldId::StuckTo, FieldValue::Entity(host)) => self.stuck_to = *host,
            (FieldId::Exploded, FieldValue::Bool(exploded)) => self.exploded = *exploded,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explosion_is_nudged_off_the_surface() {
        let mut projectile = Projectile::new(1, 4, ProjectileConfig::default());
        projectile.position = Vec3::new(0.0, 0.0, -3.0);
        assert_eq!(projectile.explosion_point(), Vec3::new(0.0, 0.0, -3.0));

        projectile.impact = Some(Impact {
            point: Vec3::new(0.0, 0.0, -5.0),
            normal: Vec3::Z,
        });
        assert!(projectile.explosion_point().abs_diff_eq(Vec3::new(0.0, 0.0, -4.9), 1e-5));
    }

    #[test]
    fn stuck_damage_falls_back_to_explosion_damage() {
        let mut config = ProjectileConfig {
            stuck_damage: 0.0,
            explosion_damage: 70.0,
            ..ProjectileConfig::default()
        };
        assert_eq!(Projectile::new(1, 6, config.clone()).stuck_damage(), 70.0);
        config.stuck_damage = 150.0;
        assert_eq!(Projectile::new(1, 6, config).stuck_damage(), 150.0);
    }

    #[test]
    fn effect_plays_once() {
        let mut projectile = Projectile::new(1, 4, ProjectileConfig::default());
        assert!(projectile.claim_effect());
        assert!(!projectile.claim_effect());
    }
}
