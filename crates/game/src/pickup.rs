use glam::Vec3;

use crate::context::Ctx;
use crate::net::{FieldId, FieldSpec, FieldValue, Replicable, ReplicationScope};
use crate::weapon::WeaponKind;
use crate::world::{EntityId, EntityKind, Tickable};

const PICKUP_DRAG: f32 = 2.0;

/// A loose weapon in the world, holding the weapon entity and the ammo it
/// had when dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponPickup {
    pub(crate) id: EntityId,
    pub(crate) weapon: Option<EntityId>,
    pub(crate) weapon_kind: WeaponKind,
    pub(crate) ammo: i32,
    pub(crate) clip: i32,
    pub(crate) position: Vec3,
    pub(crate) velocity: Vec3,
}

impl WeaponPickup {
    pub fn new(id: EntityId, weapon_kind: WeaponKind) -> Self {
        Self {
            id,
            weapon: None,
            weapon_kind,
            ammo: 0,
            clip: 0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn weapon(&self) -> Option<EntityId> {
        self.weapon
    }

    pub fn weapon_kind(&self) -> WeaponKind {
        self.weapon_kind
    }

    pub fn ammo(&self) -> i32 {
        self.ammo
    }

    pub fn clip(&self) -> i32 {
        self.clip
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn is_empty(&self) -> bool {
        self.ammo <= 0
    }

    /// Removes up to `amount` from the stored pool. Returns what was taken.
    pub fn take_ammo(&mut self, amount: i32) -> i32 {
        let taken = amount.clamp(0, self.ammo);
        self.ammo -= taken;
        self.clip = self.clip.min(self.ammo);
        taken
    }
}

impl Tickable for WeaponPickup {
    fn tick(&mut self, ctx: &mut Ctx<'_>) {
        if self.velocity == Vec3::ZERO {
            return;
        }
        self.position += self.velocity * ctx.dt;
        self.velocity *= (1.0 - PICKUP_DRAG * ctx.dt).max(0.0);
        if self.velocity.length_squared() < 1e-4 {
            self.velocity = Vec3::ZERO;
        }
    }
}

impl Replicable for WeaponPickup {
    const KIND: EntityKind = EntityKind::Pickup;

    fn manifest() -> &'static [FieldSpec<Self>] {
        const FIELDS: &[FieldSpec<WeaponPickup>] = &[
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
                field: FieldId::Position,
                scope: ReplicationScope::All,
                condition: None,
            },
            FieldSpec {
                field: FieldId::Velocity,
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
            FieldId::CurrentAmmo => FieldValue::Int(self.ammo),
            FieldId::CurrentAmmoInClip => FieldValue::Int(self.clip),
            FieldId::Position => FieldValue::Vector(self.position.to_array()),
            FieldId::Velocity => FieldValue::Vector(self.velocity.to_array()),
            _ => return None,
        })
    }

    fn write_field(&mut self, field: FieldId, value: &FieldValue) -> bool {
        match (field, value) {
            (FieldId::CurrentAmmo, FieldValue::Int(ammo)) => self.ammo = *ammo,
            (FieldId::CurrentAmmoInClip, FieldValue::Int(clip)) => self.clip = *clip,
            (FieldId::Position, FieldValue::Vector(position)) => {
                self.position = Vec3::from_array(*position)
            }
            (FieldId::Velocity, FieldValue::Vector(velocity)) => {
                self.velocity = Vec3::from_array(*velocity)
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_ammo_keeps_clip_within_pool() {
        let mut pickup = WeaponPickup::new(1, 2);
        pickup.ammo = 20;
        pickup.clip = 12;

        assert_eq!(pickup.take_ammo(15), 15);
        assert_eq!(pickup.ammo(), 5);
        assert_eq!(pickup.clip(), 5);
        assert_eq!(pickup.take_ammo(50), 5);
        assert!(pickup.is_empty());
    }
}
