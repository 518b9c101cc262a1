use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::world::EntityId;

/// Semantic hit location on a character volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum HitZone {
    #[default]
    Body = 0,
    Head = 1,
    Neck = 2,
    Spine = 3,
    Limb = 4,
}

impl HitZone {
    pub fn from_index(value: u8) -> Self {
        match value {
            1 => Self::Head,
            2 => Self::Neck,
            3 => Self::Spine,
            4 => Self::Limb,
            _ => Self::Body,
        }
    }

    pub fn is_head(self) -> bool {
        matches!(self, Self::Head)
    }

    /// Zones an assassination can land on.
    pub fn is_back(self) -> bool {
        matches!(self, Self::Neck | Self::Spine)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    pub entity: Option<EntityId>,
    pub point: Vec3,
    pub normal: Vec3,
    pub zone: HitZone,
    /// Surface accepts sticky projectiles.
    pub sticky: bool,
    pub distance: f32,
}

/// Hit volume of a character, centred on its position, facing its aim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyVolume {
    pub position: Vec3,
    pub facing: Vec3,
    pub radius: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneSphere {
    pub zone: HitZone,
    pub center: Vec3,
    pub radius: f32,
}

impl BodyVolume {
    /// Zone spheres in body space, forward is -Z.
    pub fn local_zones(radius: f32, height: f32) -> [ZoneSphere; 6] {
        let h = height;
        let r = radius;
        [
            ZoneSphere {
                zone: HitZone::Head,
                center: Vec3::new(0.0, 0.43 * h, 0.0),
                radius: 0.07 * h,
            },
            ZoneSphere {
                zone: HitZone::Neck,
                center: Vec3::new(0.0, 0.36 * h, 0.2 * r),
                radius: 0.045 * h,
            },
            ZoneSphere {
                zone: HitZone::Spine,
                center: Vec3::new(0.0, 0.12 * h, 0.55 * r),
                radius: 0.5 * r,
            },
            ZoneSphere {
                zone: HitZone::Body,
                center: Vec3::new(0.0, 0.12 * h, 0.0),
                radius: r,
            },
            ZoneSphere {
                zone: HitZone::Body,
                center: Vec3::new(0.0, -0.15 * h, 0.0),
                radius: r,
            },
            ZoneSphere {
                zone: HitZone::Limb,
                center: Vec3::new(0.0, -0.38 * h, 0.0),
                radius: 0.7 * r,
            },
        ]
    }

    pub fn rotation(&self) -> Quat {
        let flat = Vec3::new(self.facing.x, 0.0, self.facing.z).normalize_or(Vec3::NEG_Z);
        Quat::from_rotation_y((-flat.x).atan2(-flat.z))
    }

    pub fn zones(&self) -> [ZoneSphere; 6] {
        let rotation = self.rotation();
        Self::local_zones(self.radius, self.height).map(|sphere| ZoneSphere {
            center: self.position + rotation * sphere.center,
            ..sphere
        })
    }
}

pub trait TraceService {
    fn line_trace(&self, from: Vec3, to: Vec3, ignore: Option<EntityId>) -> Option<TraceHit>;

    fn sphere_trace(
        &self,
        from: Vec3,
        to: Vec3,
        radius: f32,
        ignore: Option<EntityId>,
    ) -> Option<TraceHit>;

    /// Creates or moves the hit volume of an entity.
    fn place_body(&mut self, entity: EntityId, volume: &BodyVolume);

    fn remove_body(&mut self, entity: EntityId);

    /// Makes body moves visible to the next queries.
    fn flush(&mut self) {}
}
