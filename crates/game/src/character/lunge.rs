use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::world::EntityId;

/// Movement parameters a lunge overrides while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementTuning {
    pub max_walk_speed: f32,
    pub braking_deceleration: f32,
    pub ground_friction: f32,
    pub gravity_scale: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            max_walk_speed: 6.0,
            braking_deceleration: 20.0,
            ground_friction: 8.0,
            gravity_scale: 1.0,
        }
    }
}

impl MovementTuning {
    pub fn lunging(velocity: f32) -> Self {
        Self {
            max_walk_speed: velocity,
            braking_deceleration: 0.0,
            ground_friction: 0.0,
            gravity_scale: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LungeExit {
    OutOfRange,
    ReachedTarget,
    Collided,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lunge {
    pub weapon: EntityId,
    pub target: EntityId,
    pub start: Vec3,
    pub hit_point: Vec3,
    pub saved: MovementTuning,
    pub collided: bool,
}

impl Lunge {
    /// First matching exit condition, checked in a fixed order.
    pub fn check_exit(&self, position: Vec3, range: f32, finish_range: f32) -> Option<LungeExit> {
        if position.distance(self.start) > range {
            Some(LungeExit::OutOfRange)
        } else if position.distance(self.hit_point) <= finish_range {
            Some(LungeExit::ReachedTarget)
        } else if self.collided {
            Some(LungeExit::Collided)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lunge() -> Lunge {
        Lunge {
            weapon: 2,
            target: 3,
            start: Vec3::ZERO,
            hit_point: Vec3::new(0.0, 0.0, -4.0),
            saved: MovementTuning::default(),
            collided: false,
        }
    }

    #[test]
    fn exits_in_order() {
        let mut lunge = lunge();
        assert_eq!(lunge.check_exit(Vec3::new(0.0, 0.0, -1.0), 5.0, 1.5), None);
        assert_eq!(
            lunge.check_exit(Vec3::new(0.0, 0.0, -3.0), 5.0, 1.5),
            Some(LungeExit::ReachedTarget)
        );
        assert_eq!(
            lunge.check_exit(Vec3::new(6.0, 0.0, 0.0), 5.0, 1.5),
            Some(LungeExit::OutOfRange)
        );

        lunge.collided = true;
        assert_eq!(
            lunge.check_exit(Vec3::new(0.0, 0.0, -1.0), 5.0, 1.5),
            Some(LungeExit::Collided)
        );
        assert_eq!(
            lunge.check_exit(Vec3::new(0.0, 0.0, -3.5), 5.0, 1.5),
            Some(LungeExit::ReachedTarget)
        );
    }

    #[test]
    fn lunge_tuning_removes_drag() {
        let tuning = MovementTuning::lunging(10.0);
        assert_eq!(tuning.max_walk_speed, 10.0);
        assert_eq!(tuning.ground_friction, 0.0);
        assert_eq!(tuning.gravity_scale, 0.0);
    }
}
