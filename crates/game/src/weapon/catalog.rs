use std::collections::BTreeMap;
use std::sync::Arc;

use super::config::{
    FireKind, InstantHitConfig, ProjectileConfig, WeaponConfig, WeaponKind, damage_types,
};

pub mod kinds {
    use super::WeaponKind;

    pub const RIFLE: WeaponKind = 1;
    pub const PISTOL: WeaponKind = 2;
    pub const BURST_RIFLE: WeaponKind = 3;
    pub const ROCKET_LAUNCHER: WeaponKind = 4;
    pub const FRAG_GRENADE: WeaponKind = 5;
    pub const STICKY_GRENADE: WeaponKind = 6;
    pub const KNIFE: WeaponKind = 7;
}

/// Registry of weapon archetypes, shared between nodes so a replicated
/// kind id resolves to the same configuration everywhere.
#[derive(Debug, Clone, Default)]
pub struct Armory {
    configs: BTreeMap<WeaponKind, Arc<WeaponConfig>>,
}

impl Armory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: WeaponKind, config: WeaponConfig) -> &mut Self {
        self.configs.insert(kind, Arc::new(config));
        self
    }

    pub fn get(&self, kind: WeaponKind) -> Option<Arc<WeaponConfig>> {
        self.configs.get(&kind).cloned()
    }

    pub fn contains(&self, kind: WeaponKind) -> bool {
        self.configs.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = WeaponKind> + '_ {
        self.configs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn standard() -> Self {
        let mut armory = Self::new();
        armory
            .register(
                kinds::RIFLE,
                WeaponConfig {
                    name: "rifle".into(),
                    max_ammo: 150,
                    ammo_per_clip: 30,
                    initial_clips: 3,
                    time_between_shots: 0.1,
                    reload_duration: 1.6,
                    equip_duration: 0.4,
                    can_headshot: true,
                    fire: FireKind::Instant(InstantHitConfig {
                        damage: 15.0,
                        range: 120.0,
                        damage_type: damage_types::BULLET,
                    }),
                    ..WeaponConfig::default()
                },
            )
            .register(
                kinds::PISTOL,
                WeaponConfig {
                    name: "pistol".into(),
                    max_ammo: 60,
                    ammo_per_clip: 12,
                    initial_clips: 3,
                    time_between_shots: 0.25,
                    reload_duration: 1.1,
                    equip_duration: 0.25,
                    can_headshot: true,
                    fire: FireKind::Instant(InstantHitConfig {
                        damage: 25.0,
                        range: 80.0,
                        damage_type: damage_types::BULLET,
                    }),
                    ..WeaponConfig::default()
                },
            )
            .register(
                kinds::BURST_RIFLE,
                WeaponConfig {
                    name: "burst rifle".into(),
                    max_ammo: 120,
                    ammo_per_clip: 24,
                    initial_clips: 3,
                    time_between_shots: 0.08,
                    burst: true,
                    shots_per_burst: 3,
                    time_between_bursts: 0.3,
                    reload_duration: 1.5,
                    equip_duration: 0.4,
                    can_headshot: true,
                    fire: FireKind::Instant(InstantHitConfig {
                        damage: 18.0,
                        range: 120.0,
                        damage_type: damage_types::BULLET,
                    }),
                    ..WeaponConfig::default()
                },
            )
            .register(
                kinds::ROCKET_LAUNCHER,
                WeaponConfig {
                    name: "rocket launcher".into(),
                    max_ammo: 8,
                    ammo_per_clip: 1,
                    initial_clips: 4,
                    time_between_shots: 1.0,
                    reload_duration: 1.8,
                    equip_duration: 0.6,
                    fire: FireKind::Projectile(ProjectileConfig {
                        explosion_damage: 90.0,
                        explosion_radius: 4.0,
                        initial_speed: 25.0,
                        ..ProjectileConfig::default()
                    }),
                    ..WeaponConfig::default()
                },
            )
            .register(
                kinds::FRAG_GRENADE,
                WeaponConfig {
                    name: "frag grenade".into(),
                    max_ammo: 3,
                    ammo_per_clip: 1,
                    initial_clips: 2,
                    time_between_shots: 0.8,
                    extra_weapon: true,
                    equippable: false,
                    droppable: false,
                    always_equipped: true,
                    needs_reload: true,
                    fire: FireKind::Projectile(ProjectileConfig {
                        explode_time: 2.5,
                        explode_on_stop: false,
                        bounces: true,
                        gravity_scale: 1.0,
                        initial_speed: 14.0,
                        explosion_damage: 120.0,
                        explosion_radius: 5.0,
                        ..ProjectileConfig::default()
                    }),
                    ..WeaponConfig::default()
                },
            )
            .register(
                kinds::STICKY_GRENADE,
                WeaponConfig {
                    name: "sticky grenade".into(),
                    max_ammo: 2,
                    ammo_per_clip: 1,
                    initial_clips: 2,
                    time_between_shots: 0.8,
                    extra_weapon: true,
                    equippable: false,
                    droppable: false,
                    always_equipped: true,
                    fire: FireKind::Projectile(ProjectileConfig {
                        sticky: true,
                        explode_on_stop: true,
                        explode_delay_after_stop: 1.5,
                        gravity_scale: 1.0,
                        initial_speed: 14.0,
                        stuck_damage: 150.0,
                        explosion_damage: 80.0,
                        ..ProjectileConfig::default()
                    }),
                    ..WeaponConfig::default()
                },
            )
            .register(
                kinds::KNIFE,
                WeaponConfig {
                    name: "knife".into(),
                    infinite_ammo: true,
                    max_ammo: 1,
                    ammo_per_clip: 1,
                    initial_clips: 1,
                    time_between_shots: 0.6,
                    extra_weapon: true,
                    equippable: false,
                    droppable: false,
                    always_equipped: true,
                    needs_reload: false,
                    can_lunge: true,
                    can_assassinate: true,
                    sphere_trace_radius: 0.2,
                    fire: FireKind::Instant(InstantHitConfig {
                        damage: 50.0,
                        range: 2.5,
                        damage_type: damage_types::MELEE,
                    }),
                    ..WeaponConfig::default()
                },
            );
        armory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_armory_covers_every_kind() {
        let armory = Armory::standard();
        assert_eq!(armory.len(), 7);
        for kind in armory.kinds() {
            let config = armory.get(kind).unwrap();
            assert!(config.shots_per_burst >= 1);
            assert!(config.time_between_shots >= 0.0);
        }
    }

    #[test]
    fn auxiliary_weapons_are_extra() {
        let armory = Armory::standard();
        for kind in [kinds::FRAG_GRENADE, kinds::STICKY_GRENADE, kinds::KNIFE] {
            let config = armory.get(kind).unwrap();
            assert!(config.extra_weapon);
            assert!(!config.droppable);
        }
        assert!(armory.get(kinds::KNIFE).unwrap().can_lunge);
        assert!(armory.get(kinds::STICKY_GRENADE).unwrap().projectile().unwrap().sticky);
    }
}
