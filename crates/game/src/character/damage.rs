use glam::Vec3;

use crate::physics::HitZone;
use crate::weapon::DamageTypeId;
use crate::world::EntityId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub amount: f32,
    pub damage_type: DamageTypeId,
    pub instigator: Option<EntityId>,
    /// Weapon entity that dealt the damage.
    pub causer: Option<EntityId>,
    pub zone: HitZone,
    pub shot_direction: Vec3,
}

impl DamageEvent {
    pub fn new(amount: f32, damage_type: DamageTypeId) -> Self {
        Self {
            amount,
            damage_type,
            instigator: None,
            causer: None,
            zone: HitZone::Body,
            shot_direction: Vec3::ZERO,
        }
    }

    pub fn from_weapon(mut self, instigator: EntityId, weapon: EntityId) -> Self {
        self.instigator = Some(instigator);
        self.causer = Some(weapon);
        self
    }

    pub fn at(mut self, zone: HitZone, shot_direction: Vec3) -> Self {
        self.zone = zone;
        self.shot_direction = shot_direction;
        self
    }
}

pub fn is_headshot(shields_down: bool, can_headshot: bool, zone: HitZone) -> bool {
    shields_down && can_headshot && zone.is_head()
}

/// Two directions point the same way within a cosine tolerance.
pub fn coincident(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    match (a.try_normalize(), b.try_normalize()) {
        (Some(a), Some(b)) => a.dot(b) >= tolerance,
        _ => false,
    }
}

pub fn is_assassination(
    can_assassinate: bool,
    shot_direction: Vec3,
    attacker: Vec3,
    victim: Vec3,
    zone: HitZone,
    tolerance: f32,
) -> bool {
    can_assassinate && zone.is_back() && coincident(shot_direction, victim - attacker, tolerance)
}
