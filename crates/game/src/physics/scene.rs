use std::collections::BTreeMap;

use glam::Vec3;

use super::trace::{BodyVolume, HitZone, TraceHit, TraceService};
use crate::world::EntityId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block {
    pub min: Vec3,
    pub max: Vec3,
    pub sticky: bool,
}

/// Analytic trace scene: character zones as spheres, level geometry as
/// axis-aligned boxes. Deterministic and free of broad-phase state.
#[derive(Debug, Clone, Default)]
pub struct SimpleScene {
    bodies: BTreeMap<EntityId, BodyVolume>,
    blocks: Vec<Block>,
}

fn ray_sphere(origin: Vec3, dir: Vec3, max: f32, center: Vec3, radius: f32) -> Option<f32> {
    let m = origin - center;
    let b = m.dot(dir);
    let c = m.length_squared() - radius * radius;
    if c > 0.0 && b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()).max(0.0);
    (t <= max).then_some(t)
}

fn ray_box(origin: Vec3, dir: Vec3, max: f32, min_b: Vec3, max_b: Vec3) -> Option<(f32, Vec3)> {
    let mut t_enter = 0.0f32;
    let mut t_exit = max;
    let mut normal = -dir;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        if d.abs() < 1e-8 {
            if o < min_b[axis] || o > max_b[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (min_b[axis] - o) * inv;
        let mut t1 = (max_b[axis] - o) * inv;
        let mut sign = -1.0;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
            sign = 1.0;
        }
        if t0 > t_enter {
            t_enter = t0;
            normal = Vec3::ZERO;
            normal[axis] = sign;
        }
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }
    Some((t_enter, normal))
}

impl SimpleScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, center: Vec3, half_extents: Vec3, sticky: bool) {
        self.blocks.push(Block {
            min: center - half_extents,
            max: center + half_extents,
            sticky,
        });
    }

    pub fn add_floor(&mut self, y: f32, half_size: f32) {
        self.add_block(
            Vec3::new(0.0, y - 0.1, 0.0),
            Vec3::new(half_size, 0.1, half_size),
            true,
        );
    }

    pub fn body(&self, entity: EntityId) -> Option<&BodyVolume> {
        self.bodies.get(&entity)
    }

    fn sweep(&self, from: Vec3, to: Vec3, inflate: f32, ignore: Option<EntityId>) -> Option<TraceHit> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        let dir = delta / length;
        let mut best: Option<TraceHit> = None;
        let mut consider = |hit: TraceHit| {
            if best.is_none_or(|current| hit.distance < current.distance) {
                best = Some(hit);
            }
        };

        for (id, volume) in &self.bodies {
            if Some(*id) == ignore {
                continue;
            }
            for sphere in volume.zones() {
                let Some(t) = ray_sphere(from, dir, length, sphere.center, sphere.radius + inflate)
                else {
                    continue;
                };
                let swept = from + dir * t;
                let normal = (swept - sphere.center).normalize_or(-dir);
                consider(TraceHit {
                    entity: Some(*id),
                    point: swept - normal * inflate,
                    normal,
                    zone: sphere.zone,
                    sticky: true,
                    distance: t,
                });
            }
        }

        for block in &self.blocks {
            let grow = Vec3::splat(inflate);
            if let Some((t, normal)) = ray_box(from, dir, length, block.min - grow, block.max + grow) {
                consider(TraceHit {
                    entity: None,
                    point: from + dir * t - normal * inflate,
                    normal,
                    zone: HitZone::Body,
                    sticky: block.sticky,
                    distance: t,
                });
            }
        }

        best
    }
}

impl TraceService for SimpleScene {
    fn line_trace(&self, from: Vec3, to: Vec3, ignore: Option<EntityId>) -> Option<TraceHit> {
        self.sweep(from, to, 0.0, ignore)
    }

    fn sphere_trace(
        &self,
        from: Vec3,
        to: Vec3,
        radius: f32,
        ignore: Option<EntityId>,
    ) -> Option<TraceHit> {
        self.sweep(from, to, radius.max(0.0), ignore)
    }

    fn place_body(&mut self, entity: EntityId, volume: &BodyVolume) {
        self.bodies.insert(entity, *volume);
    }

    fn remove_body(&mut self, entity: EntityId) {
        self.bodies.remove(&entity);
    }
}
