use std::collections::HashMap;

use glam::Vec3;
use rapier3d::prelude::*;

use super::trace::{BodyVolume, HitZone, TraceHit, TraceService};
use crate::world::EntityId;

const ENTITY_FLAG: u128 = 1 << 40;
const STICKY_FLAG: u128 = 1 << 41;

fn encode_user_data(entity: Option<EntityId>, zone: HitZone, sticky: bool) -> u128 {
    let mut data = (zone as u128) << 32;
    if let Some(id) = entity {
        data |= ENTITY_FLAG | id as u128;
    }
    if sticky {
        data |= STICKY_FLAG;
    }
    data
}

fn decode_user_data(data: u128) -> (Option<EntityId>, HitZone, bool) {
    let entity = (data & ENTITY_FLAG != 0).then_some((data & 0xFFFF_FFFF) as EntityId);
    let zone = HitZone::from_index(((data >> 32) & 0xFF) as u8);
    (entity, zone, data & STICKY_FLAG != 0)
}

/// rapier3d-backed trace service. Character volumes are kinematic bodies
/// carrying one ball collider per hit zone.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    entity_bodies: HashMap<EntityId, RigidBodyHandle>,
    /// Rays cast around the centre line of a sphere trace.
    sphere_rays: usize,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    const TICK_RATE: Real = 1.0 / 60.0;

    pub fn new() -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = Self::TICK_RATE;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, -9.81, 0.0),
            entity_bodies: HashMap::new(),
            sphere_rays: 4,
        }
    }

    pub fn step(&mut self) {
        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    pub fn add_static_box(&mut self, position: Vec3, half_extents: Vec3, sticky: bool) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(Vector::new(position.x, position.y, position.z))
            .user_data(encode_user_data(None, HitZone::Body, sticky))
            .build();
        self.colliders.insert(collider)
    }

    pub fn add_ground(&mut self, y: Real, half_size: Real) -> ColliderHandle {
        self.add_static_box(
            Vec3::new(0.0, y - 0.1, 0.0),
            Vec3::new(half_size, 0.1, half_size),
            true,
        )
    }

    pub fn body_count(&self) -> usize {
        self.entity_bodies.len()
    }

    fn set_body_pose(&mut self, handle: RigidBodyHandle, position: Vec3, rotation: glam::Quat) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let rot =
                Rotation::from_xyzw(rotation.x, rotation.y, rotation.z, rotation.w).normalize();
            let new_pose = Pose::from_parts(Vector::new(position.x, position.y, position.z), rot);
            body.set_position(new_pose, true);
        }
    }

    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: Real, filter: QueryFilter<'_>) -> Option<TraceHit> {
        let query = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        );
        let ray = Ray::new(
            Vector::new(origin.x, origin.y, origin.z),
            Vector::new(direction.x, direction.y, direction.z),
        );

        query.cast_ray(&ray, max_distance, true).map(|(collider, toi)| {
            let user_data = self.colliders.get(collider).map_or(0, |c| c.user_data);
            let (entity, zone, sticky) = decode_user_data(user_data);
            TraceHit {
                entity,
                point: origin + direction * toi,
                normal: -direction,
                zone,
                sticky,
                distance: toi,
            }
        })
    }

    fn filter_for(&self, ignore: Option<EntityId>) -> QueryFilter<'_> {
        match ignore.and_then(|id| self.entity_bodies.get(&id)) {
            Some(handle) => QueryFilter::default().exclude_rigid_body(*handle),
            None => QueryFilter::default(),
        }
    }
}

impl TraceService for PhysicsWorld {
    fn line_trace(&self, from: Vec3, to: Vec3, ignore: Option<EntityId>) -> Option<TraceHit> {
        let delta = to - from;
        let distance = delta.length();
        if distance <= f32::EPSILON {
            return None;
        }
        self.cast(from, delta / distance, distance, self.filter_for(ignore))
    }

    fn sphere_trace(
        &self,
        from: Vec3,
        to: Vec3,
        radius: f32,
        ignore: Option<EntityId>,
    ) -> Option<TraceHit> {
        let delta = to - from;
        let distance = delta.length();
        if distance <= f32::EPSILON {
            return None;
        }
        let direction = delta / distance;
        let (side, up) = direction.any_orthonormal_pair();

        let mut best = self.cast(from, direction, distance, self.filter_for(ignore));
        for i in 0..self.sphere_rays {
            let angle = i as f32 * std::f32::consts::TAU / self.sphere_rays as f32;
            let offset = (side * angle.cos() + up * angle.sin()) * radius;
            let hit = self.cast(from + offset, direction, distance, self.filter_for(ignore));
            if let Some(hit) = hit {
                if best.is_none_or(|current| hit.distance < current.distance) {
                    best = Some(hit);
                }
            }
        }
        best
    }

    fn place_body(&mut self, entity: EntityId, volume: &BodyVolume) {
        let rotation = volume.rotation();
        if let Some(handle) = self.entity_bodies.get(&entity).copied() {
            self.set_body_pose(handle, volume.position, rotation);
            return;
        }

        let position = volume.position;
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(Vector::new(position.x, position.y, position.z))
            .build();
        let handle = self.bodies.insert(body);

        for sphere in BodyVolume::local_zones(volume.radius, volume.height) {
            let offset = sphere.center;
            let collider = ColliderBuilder::ball(sphere.radius)
                .translation(Vector::new(offset.x, offset.y, offset.z))
                .user_data(encode_user_data(Some(entity), sphere.zone, true))
                .build();
            self.colliders
                .insert_with_parent(collider, handle, &mut self.bodies);
        }

        self.set_body_pose(handle, position, rotation);
        self.entity_bodies.insert(entity, handle);
    }

    fn remove_body(&mut self, entity: EntityId) {
        let Some(handle) = self.entity_bodies.remove(&entity) else {
            return;
        };
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn flush(&mut self) {
        self.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_data_round_trip() {
        let data = encode_user_data(Some(77), HitZone::Spine, true);
        assert_eq!(decode_user_data(data), (Some(77), HitZone::Spine, true));

        let wall = encode_user_data(None, HitZone::Body, false);
        assert_eq!(decode_user_data(wall), (None, HitZone::Body, false));
    }

    #[test]
    fn traces_hit_placed_bodies_after_flush() {
        let mut physics = PhysicsWorld::new();
        physics.place_body(
            3,
            &BodyVolume {
                position: Vec3::new(0.0, 0.0, -8.0),
                facing: Vec3::Z,
                radius: 0.4,
                height: 1.8,
            },
        );
        physics.flush();

        let chest = 0.12 * 1.8;
        let hit = physics.line_trace(
            Vec3::new(0.0, chest, 0.0),
            Vec3::new(0.0, chest, -20.0),
            None,
        );
        assert_eq!(hit.and_then(|h| h.entity), Some(3));
        assert!(physics
            .line_trace(Vec3::new(0.0, chest, 0.0), Vec3::new(0.0, chest, -20.0), Some(3))
            .is_none());

        physics.remove_body(3);
        assert_eq!(physics.body_count(), 0);
    }
}
