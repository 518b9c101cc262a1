use glam::Vec3;

use crate::character::DamageEvent;
use crate::event::CueKind;
use crate::physics::{HitZone, TraceHit};
use crate::time::{ProjectileTimer, TimerHandle, TimerKey, TimerService};
use crate::weapon::ProjectileConfig;
use crate::world::{EntityId, World};

use super::state::{Impact, Projectile};

const GRAVITY: f32 = 9.81;

/// How long an exploded projectile lingers so observers see the explosion.
const EXPLODED_LINGER: f32 = 2.0;

/// Contacts whose normal points this far up count as floor.
const FLOOR_NORMAL_Y: f32 = 0.7;

/// Lift applied after a bounce so the next sweep does not start inside the
/// surface.
const BOUNCE_SKIN: f32 = 0.01;

impl World {
    pub(crate) fn spawn_projectile(
        &mut self,
        weapon: EntityId,
        owner: EntityId,
        origin: Vec3,
        direction: Vec3,
        config: ProjectileConfig,
    ) -> EntityId {
        let kind = self.arena.weapon(weapon).map(|w| w.kind()).unwrap_or_default();
        let id = self.alloc_id();
        let mut projectile = Projectile::new(id, kind, config);
        projectile.instigator = Some(owner);
        projectile.causer = Some(weapon);
        projectile.position = origin + direction * config.spawn_offset;
        projectile.velocity = direction * config.initial_speed;
        projectile.lifespan = self.timers.schedule(id, TimerKey::Expire, config.life, false);
        if config.explode_time > 0.0 {
            projectile
                .timers
                .reset(&mut self.timers, id, ProjectileTimer::Fuse, config.explode_time);
        }
        self.arena.projectiles.insert(id, projectile);
        log::debug!("weapon {} launched projectile {}", weapon, id);
        id
    }

    /// Moves live projectiles one step and resolves their contacts.
    pub(crate) fn update_projectiles(&mut self) {
        let dt = self.step_dt;
        for id in self.arena.projectile_ids() {
            let Some(projectile) = self.arena.projectile(id) else {
                continue;
            };
            if projectile.exploded {
                continue;
            }

            if projectile.stuck {
                let host = projectile
                    .stuck_to
                    .and_then(|host| self.arena.character(host))
                    .map(|c| c.position);
                let offset = projectile.stuck_offset;
                if let (Some(host), Some(projectile)) = (host, self.arena.projectiles.get_mut(&id)) {
                    projectile.position = host + offset;
                }
                continue;
            }
            if projectile.stopped || dt <= 0.0 {
                continue;
            }

            let config = projectile.config;
            let velocity = projectile.velocity + Vec3::NEG_Y * GRAVITY * config.gravity_scale * dt;
            let from = projectile.position;
            let to = from + velocity * dt;
            let hit = self.trace.line_trace(from, to, projectile.instigator);

            match hit {
                None => {
                    if let Some(projectile) = self.arena.projectiles.get_mut(&id) {
                        projectile.position = to;
                        projectile.velocity = velocity;
                    }
                }
                Some(hit) if config.sticky && (hit.sticky || hit.entity.is_some()) => {
                    self.stick(id, hit);
                }
                Some(hit) if config.bounces => self.bounce(id, hit, velocity),
                Some(hit) => {
                    if let Some(projectile) = self.arena.projectiles.get_mut(&id) {
                        projectile.position = hit.point;
                        projectile.impact = Some(Impact {
                            point: hit.point,
                            normal: hit.normal,
                        });
                    }
                    // Contact only halts the projectile; its trigger settings
                    // decide whether and when it detonates.
                    self.on_projectile_stopped(id);
                }
            }
        }
    }

    fn stick(&mut self, id: EntityId, hit: TraceHit) {
        let host = hit
            .entity
            .and_then(|host| self.arena.character(host))
            .map(|c| c.position);
        let (arena, mut ctx) = self.split();
        let Some(projectile) = arena.projectiles.get_mut(&id) else {
            return;
        };
        projectile.stuck = true;
        projectile.stuck_to = hit.entity.filter(|_| host.is_some());
        projectile.stuck_offset = host.map_or(Vec3::ZERO, |host| hit.point - host);
        projectile.position = hit.point;
        projectile.velocity = Vec3::ZERO;
        projectile.impact = Some(Impact {
            point: hit.point,
            normal: hit.normal,
        });
        ctx.cue(id, CueKind::Stuck { surface: projectile.stuck_to });
        log::debug!("projectile {} stuck to {:?}", id, projectile.stuck_to);

        self.on_projectile_stopped(id);
    }

    fn bounce(&mut self, id: EntityId, hit: TraceHit, velocity: Vec3) {
        let (arena, ctx) = self.split();
        let Some(projectile) = arena.projectiles.get_mut(&id) else {
            return;
        };
        let config = projectile.config;
        let reflected = velocity - 2.0 * velocity.dot(hit.normal) * hit.normal;
        let after = reflected * config.restitution;
        projectile.position = hit.point + hit.normal * BOUNCE_SKIN;
        projectile.velocity = after;
        projectile.impact = Some(Impact {
            point: hit.point,
            normal: hit.normal,
        });

        let on_floor = hit.normal.y >= FLOOR_NORMAL_Y;
        if !projectile.bounced && (!config.floor_bounce_only || on_floor) {
            projectile.bounced = true;
            if config.explode_time_after_bounce > 0.0 {
                projectile.timers.reset(
                    ctx.timers,
                    id,
                    ProjectileTimer::BounceFuse,
                    config.explode_time_after_bounce,
                );
            }
        }

        if after.length() < config.stop_speed {
            self.on_projectile_stopped(id);
        }
    }

    fn on_projectile_stopped(&mut self, id: EntityId) {
        let (arena, ctx) = self.split();
        let Some(projectile) = arena.projectiles.get_mut(&id) else {
            return;
        };
        if projectile.stopped {
            return;
        }
        projectile.stopped = true;
        projectile.velocity = Vec3::ZERO;

        let config = projectile.config;
        if !config.explode_on_stop {
            return;
        }
        if config.explode_delay_after_stop > 0.0 {
            projectile.timers.reset(
                ctx.timers,
                id,
                ProjectileTimer::StoppedFuse,
                config.explode_delay_after_stop,
            );
        } else {
            self.explode(id);
        }
    }

    pub(crate) fn on_projectile_timer(&mut self, id: EntityId, key: ProjectileTimer, handle: TimerHandle) {
        let fired = self
            .arena
            .projectiles
            .get_mut(&id)
            .is_some_and(|p| p.timers.fired(key, handle));
        if !fired {
            log::debug!("projectile {} ignored stale {:?} timer", id, key);
            return;
        }
        match key {
            ProjectileTimer::Fuse | ProjectileTimer::StoppedFuse | ProjectileTimer::BounceFuse => {
                self.explode(id)
            }
        }
    }

    /// Detonates once on the authority: damages whatever the projectile is
    /// stuck to, then everything alive in the blast radius.
    pub fn explode(&mut self, id: EntityId) {
        if !self.has_authority() {
            return;
        }
        let Some(projectile) = self.arena.projectiles.get_mut(&id) else {
            return;
        };
        if projectile.exploded {
            return;
        }
        projectile.exploded = true;
        projectile.effect_played = true;
        projectile.stopped = true;
        projectile.velocity = Vec3::ZERO;
        projectile.timers.clear_all(&mut self.timers);
        if projectile.lifespan.is_valid() {
            self.timers.cancel(projectile.lifespan);
        }
        projectile.lifespan = self.timers.schedule(id, TimerKey::Expire, EXPLODED_LINGER, false);

        let center = projectile.explosion_point();
        let config = projectile.config;
        let stuck_damage = projectile.stuck_damage();
        let stuck_to = projectile.stuck_to;
        let (instigator, causer) = (projectile.instigator, projectile.causer);
        let blast = |amount: f32, zone: HitZone, direction: Vec3| DamageEvent {
            amount,
            damage_type: config.damage_type,
            instigator,
            causer,
            zone,
            shot_direction: direction,
        };

        self.cue(id, CueKind::Explosion { position: center });
        log::debug!("projectile {} exploded at {}", id, center);

        if let Some(host) = stuck_to.filter(|host| self.arena.characters.contains_key(host)) {
            let direction = self.arena.character(host).map_or(Vec3::ZERO, |c| c.position - center);
            if let Err(err) = self.take_damage(host, blast(stuck_damage, HitZone::Body, direction)) {
                log::warn!("projectile {} could not damage {}: {}", id, host, err);
            }
        }

        let victims: Vec<(EntityId, Vec3)> = self
            .arena
            .characters
            .values()
            .filter(|c| Some(c.id) != stuck_to && c.health > 0.0 && !c.dying)
            .filter(|c| c.position.distance(center) <= config.explosion_radius)
            .map(|c| (c.id, c.position - center))
            .collect();
        for (victim, direction) in victims {
            if let Err(err) = self.take_damage(victim, blast(config.explosion_damage, HitZone::Body, direction)) {
                log::warn!("projectile {} could not damage {}: {}", id, victim, err);
            }
        }
    }

    /// Observer reaction to the replicated explosion flag; the effect plays
    /// at most once however often the flag arrives.
    pub(crate) fn on_rep_exploded(&mut self, id: EntityId) {
        let Some(projectile) = self.arena.projectiles.get_mut(&id) else {
            return;
        };
        projectile.exploded = true;
        projectile.stopped = true;
        if projectile.claim_effect() {
            let center = projectile.explosion_point();
            self.cue(id, CueKind::Explosion { position: center });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::character::CharacterConfig;
    use crate::net::NetMode;
    use crate::physics::SimpleScene;
    use crate::weapon::{Armory, kinds};

    fn world_with_floor() -> World {
        let mut scene = SimpleScene::new();
        scene.add_floor(-0.9, 50.0);
        World::new(
            NetMode::DedicatedServer,
            Arc::new(Armory::standard()),
            Arc::new(CharacterConfig::default()),
            Box::new(scene),
        )
    }

    fn launch(world: &mut World, config: ProjectileConfig, direction: Vec3) -> EntityId {
        let shooter = world
            .spawn_character(None, 0, Vec3::new(0.0, 0.0, 20.0), Vec3::NEG_Z)
            .unwrap();
        let weapon = world.spawn_weapon(kinds::ROCKET_LAUNCHER).unwrap();
        world.spawn_projectile(weapon, shooter, Vec3::new(0.0, 0.5, 0.0), direction, config)
    }

    #[test]
    fn rocket_explodes_on_the_floor() {
        let mut world = world_with_floor();
        let config = ProjectileConfig {
            initial_speed: 20.0,
            ..ProjectileConfig::default()
        };
        let id = launch(&mut world, config, Vec3::NEG_Y);

        world.run_for(0.2);
        let projectile = world.arena().projectile(id).unwrap();
        assert!(projectile.has_exploded());
        assert!(projectile.explosion_point().y > -0.9);
        assert_eq!(
            world
                .cues()
                .count(|k| matches!(k, CueKind::Explosion { .. })),
            1
        );

        world.run_for(EXPLODED_LINGER + 0.1);
        assert!(world.arena().projectile(id).is_none());
    }

    #[test]
    fn landing_without_explode_on_stop_waits_for_the_fuse() {
        let mut world = world_with_floor();
        let config = ProjectileConfig {
            initial_speed: 20.0,
            explode_on_stop: false,
            explode_time: 1.0,
            ..ProjectileConfig::default()
        };
        let id = launch(&mut world, config, Vec3::NEG_Y);

        world.run_for(0.2);
        let projectile = world.arena().projectile(id).unwrap();
        assert!(projectile.stopped);
        assert!(!projectile.has_exploded());
        assert!(projectile.position.y > -1.0);

        world.run_for(0.9);
        assert!(world.arena().projectile(id).unwrap().has_exploded());
    }

    #[test]
    fn sticky_grenade_on_a_plain_wall_waits_its_delay() {
        let mut scene = SimpleScene::new();
        scene.add_floor(-0.9, 50.0);
        scene.add_block(Vec3::new(0.0, 0.5, -3.0), Vec3::new(2.0, 2.0, 0.2), false);
        let mut world = World::new(
            NetMode::DedicatedServer,
            Arc::new(Armory::standard()),
            Arc::new(CharacterConfig::default()),
            Box::new(scene),
        );
        let config = *world
            .armory()
            .get(kinds::STICKY_GRENADE)
            .unwrap()
            .projectile()
            .unwrap();
        assert_eq!(config.explode_delay_after_stop, 1.5);
        let id = launch(&mut world, config, Vec3::NEG_Z);

        world.run_for(0.3);
        let projectile = world.arena().projectile(id).unwrap();
        assert!(projectile.stopped);
        assert!(!projectile.stuck);
        assert!(!projectile.has_exploded());

        world.run_for(1.0);
        assert!(!world.arena().projectile(id).unwrap().has_exploded());
        world.run_for(0.5);
        assert!(world.arena().projectile(id).unwrap().has_exploded());
    }

    #[test]
    fn fuse_fires_in_the_air() {
        let mut world = world_with_floor();
        let config = ProjectileConfig {
            initial_speed: 1.0,
            explode_time: 0.1,
            ..ProjectileConfig::default()
        };
        let id = launch(&mut world, config, Vec3::X);

        world.run_for(0.05);
        assert!(!world.arena().projectile(id).unwrap().has_exploded());
        world.run_for(0.1);
        assert!(world.arena().projectile(id).unwrap().has_exploded());
    }

    #[test]
    fn bouncing_grenade_waits_for_its_fuse() {
        let mut world = world_with_floor();
        let config = ProjectileConfig {
            initial_speed: 4.0,
            gravity_scale: 1.0,
            bounces: true,
            explode_on_stop: false,
            explode_time_after_bounce: 1.0,
            floor_bounce_only: true,
            ..ProjectileConfig::default()
        };
        let id = launch(&mut world, config, Vec3::NEG_Y);

        world.run_for(0.5);
        let projectile = world.arena().projectile(id).unwrap();
        assert!(projectile.bounced);
        assert!(!projectile.has_exploded());

        world.run_for(1.0);
        assert!(world.arena().projectile(id).unwrap().has_exploded());
    }

    #[test]
    fn life_expiry_removes_without_exploding() {
        let mut world = world_with_floor();
        let config = ProjectileConfig {
            life: 0.2,
            initial_speed: 1.0,
            ..ProjectileConfig::default()
        };
        let id = launch(&mut world, config, Vec3::X);

        world.run_for(0.3);
        assert!(world.arena().projectile(id).is_none());
        assert_eq!(
            world
                .cues()
                .count(|k| matches!(k, CueKind::Explosion { .. })),
            0
        );
    }

    #[test]
    fn replicated_explosion_plays_once() {
        let mut world = World::new(
            NetMode::Client,
            Arc::new(Armory::standard()),
            Arc::new(CharacterConfig::default()),
            Box::new(SimpleScene::new()),
        );
        world
            .arena
            .projectiles
            .insert(9, Projectile::new(9, kinds::ROCKET_LAUNCHER, ProjectileConfig::default()));

        world.on_rep_exploded(9);
        world.on_rep_exploded(9);
        assert_eq!(
            world
                .cues()
                .count(|k| matches!(k, CueKind::Explosion { .. })),
            1
        );
    }
}
