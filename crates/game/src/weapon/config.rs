use serde::{Deserialize, Serialize};

pub type WeaponKind = u16;
pub type DamageTypeId = u16;

pub mod damage_types {
    use super::DamageTypeId;

    pub const BULLET: DamageTypeId = 1;
    pub const EXPLOSION: DamageTypeId = 2;
    pub const MELEE: DamageTypeId = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstantHitConfig {
    pub damage: f32,
    pub range: f32,
    pub damage_type: DamageTypeId,
}

impl Default for InstantHitConfig {
    fn default() -> Self {
        Self {
            damage: 20.0,
            range: 100.0,
            damage_type: damage_types::BULLET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileConfig {
    /// Quiet expiry, no explosion.
    pub life: f32,
    pub explode_time: f32,
    pub explode_time_after_bounce: f32,
    /// Only floor contacts start the after-bounce countdown.
    pub floor_bounce_only: bool,
    pub explode_on_stop: bool,
    pub explode_delay_after_stop: f32,
    pub sticky: bool,
    pub stuck_damage: f32,
    pub explosion_damage: f32,
    pub explosion_radius: f32,
    pub damage_type: DamageTypeId,
    pub initial_speed: f32,
    pub gravity_scale: f32,
    pub bounces: bool,
    pub restitution: f32,
    pub stop_speed: f32,
    pub spawn_offset: f32,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            life: 10.0,
            explode_time: 0.0,
            explode_time_after_bounce: 0.0,
            floor_bounce_only: false,
            explode_on_stop: true,
            explode_delay_after_stop: 0.0,
            sticky: false,
            stuck_damage: 100.0,
            explosion_damage: 100.0,
            explosion_radius: 3.0,
            damage_type: damage_types::EXPLOSION,
            initial_speed: 30.0,
            gravity_scale: 0.0,
            bounces: false,
            restitution: 0.4,
            stop_speed: 0.5,
            spawn_offset: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FireKind {
    Instant(InstantHitConfig),
    Projectile(ProjectileConfig),
}

impl Default for FireKind {
    fn default() -> Self {
        Self::Instant(InstantHitConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponConfig {
    pub name: String,
    pub infinite_ammo: bool,
    pub infinite_clip: bool,
    pub max_ammo: i32,
    pub ammo_per_clip: i32,
    pub initial_clips: i32,
    pub time_before_shot: f32,
    pub time_between_shots: f32,
    pub no_anim_reload_duration: f32,
    /// Reload animation length, 0 when the weapon has none.
    pub reload_duration: f32,
    /// Equip animation length, 0 when the weapon has none.
    pub equip_duration: f32,
    pub alt_equip_duration: f32,
    pub burst: bool,
    pub shots_per_burst: i32,
    pub time_between_bursts: f32,
    pub extra_weapon: bool,
    pub equippable: bool,
    pub droppable: bool,
    pub always_equipped: bool,
    pub needs_reload: bool,
    pub can_lunge: bool,
    pub lunge_range: f32,
    pub lunge_finish_range: f32,
    pub lunge_velocity: f32,
    pub can_headshot: bool,
    pub can_assassinate: bool,
    /// Sphere trace radius for instant hits, 0 for a line trace.
    pub sphere_trace_radius: f32,
    pub fire: FireKind,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            name: String::from("weapon"),
            infinite_ammo: false,
            infinite_clip: false,
            max_ammo: 100,
            ammo_per_clip: 20,
            initial_clips: 4,
            time_before_shot: 0.0,
            time_between_shots: 0.2,
            no_anim_reload_duration: 1.0,
            reload_duration: 0.0,
            equip_duration: 0.0,
            alt_equip_duration: 0.0,
            burst: false,
            shots_per_burst: 1,
            time_between_bursts: 0.5,
            extra_weapon: false,
            equippable: true,
            droppable: true,
            always_equipped: false,
            needs_reload: true,
            can_lunge: false,
            lunge_range: 5.0,
            lunge_finish_range: 1.5,
            lunge_velocity: 10.0,
            can_headshot: false,
            can_assassinate: false,
            sphere_trace_radius: 0.0,
            fire: FireKind::default(),
        }
    }
}

impl WeaponConfig {
    pub fn burst_duration(&self) -> f32 {
        self.time_between_shots * self.shots_per_burst.max(1) as f32
    }

    pub fn reload_time(&self) -> f32 {
        if self.reload_duration > 0.0 {
            self.reload_duration
        } else {
            self.no_anim_reload_duration
        }
    }

    pub fn equip_time(&self) -> f32 {
        if self.alt_equip_duration > 0.0 {
            self.alt_equip_duration
        } else {
            self.equip_duration
        }
    }

    pub fn projectile(&self) -> Option<&ProjectileConfig> {
        match &self.fire {
            FireKind::Projectile(config) => Some(config),
            FireKind::Instant(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_duration_scales_with_shot_count() {
        let config = WeaponConfig {
            time_between_shots: 0.1,
            shots_per_burst: 3,
            ..WeaponConfig::default()
        };
        assert!((config.burst_duration() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn reload_falls_back_without_animation() {
        let mut config = WeaponConfig::default();
        assert_eq!(config.reload_time(), 1.0);
        config.reload_duration = 2.2;
        assert_eq!(config.reload_time(), 2.2);
    }

    #[test]
    fn alt_equip_duration_wins() {
        let config = WeaponConfig {
            equip_duration: 0.8,
            alt_equip_duration: 0.3,
            ..WeaponConfig::default()
        };
        assert_eq!(config.equip_time(), 0.3);
    }
}
