use serde::{Deserialize, Serialize};

use crate::hit::HIT_RECORD_WINDOW;
use crate::weapon::{WeaponKind, kinds};

use super::lunge::MovementTuning;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub max_health: f32,
    /// Shields are down at or below this fraction of max health.
    pub low_health_percentage: f32,
    pub max_inventory: usize,
    pub drop_weapon_velocity: f32,
    pub drop_offset: f32,
    pub health_regen: bool,
    pub regen_per_second: f32,
    pub regen_tick_rate: f32,
    pub time_before_regen: f32,
    pub assassination_tolerance: f32,
    pub death_anim_duration: f32,
    pub has_ragdoll: bool,
    pub ragdoll_lifespan: f32,
    pub hidden_lifespan: f32,
    pub hit_record_window: f32,
    pub radius: f32,
    pub height: f32,
    /// Eye offset above the body centre.
    pub eye_height: f32,
    pub interact_range: f32,
    /// Largest gap accepted between a reported shot origin and the eye.
    pub shot_origin_tolerance: f32,
    pub movement: MovementTuning,
    pub default_inventory: Vec<WeaponKind>,
    pub melee_kind: WeaponKind,
    pub grenade_kinds: Vec<WeaponKind>,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            low_health_percentage: 0.3,
            max_inventory: 2,
            drop_weapon_velocity: 4.0,
            drop_offset: 1.0,
            health_regen: false,
            regen_per_second: 10.0,
            regen_tick_rate: 0.25,
            time_before_regen: 3.0,
            assassination_tolerance: 0.5,
            death_anim_duration: 0.0,
            has_ragdoll: true,
            ragdoll_lifespan: 10.0,
            hidden_lifespan: 1.0,
            hit_record_window: HIT_RECORD_WINDOW,
            radius: 0.4,
            height: 1.8,
            eye_height: 0.7,
            interact_range: 2.0,
            shot_origin_tolerance: 2.0,
            movement: MovementTuning::default(),
            default_inventory: vec![
                kinds::RIFLE,
                kinds::PISTOL,
                kinds::FRAG_GRENADE,
                kinds::STICKY_GRENADE,
                kinds::KNIFE,
            ],
            melee_kind: kinds::KNIFE,
            grenade_kinds: vec![kinds::FRAG_GRENADE, kinds::STICKY_GRENADE],
        }
    }
}

impl CharacterConfig {
    pub fn shields_down(&self, health: f32) -> bool {
        health <= self.max_health * self.low_health_percentage
    }

    /// Ragdoll activation delay once a death animation has started.
    pub fn ragdoll_delay(&self) -> f32 {
        (self.death_anim_duration - 0.7).max(0.1)
    }
}
