use glam::Vec3;

use crate::error::CombatError;
use crate::net::{CallDirection, ConnectionId, Envelope, RemoteCall};

use super::entity::EntityId;
use super::node::World;

impl World {
    /// Executes a call that arrived from another node.
    ///
    /// `from` is the sending connection on the authority, `None` when the
    /// call came from the authority itself. Calls are dropped when their
    /// arguments are malformed, when they travel the wrong way, or when the
    /// sender does not drive the target entity.
    pub fn receive_call(&mut self, from: Option<ConnectionId>, envelope: Envelope) -> Result<(), CombatError> {
        let Envelope { entity, call } = envelope;
        let name = call.name();

        if !call.validate() {
            log::warn!("rejected {} on {} from {:?}: invalid arguments", name, entity, from);
            return Err(CombatError::Rejected {
                call: name,
                reason: "invalid arguments",
            });
        }
        let expected = if self.has_authority() {
            CallDirection::ToAuthority
        } else {
            CallDirection::ToObservers
        };
        if call.direction() != expected {
            log::warn!("rejected {} on {}: wrong direction", name, entity);
            return Err(CombatError::Rejected {
                call: name,
                reason: "wrong direction",
            });
        }
        if !self.arena.contains(entity) {
            log::warn!("rejected {} on unknown entity {}", name, entity);
            return Err(CombatError::UnknownEntity(entity));
        }
        if self.has_authority() && self.arena.owning_connection(entity) != from {
            log::warn!("rejected {} on {}: {:?} does not own it", name, entity, from);
            return Err(CombatError::Rejected {
                call: name,
                reason: "caller does not own the entity",
            });
        }

        log::trace!("<- {} {} from {:?}", entity, name, from);
        match call {
            RemoteCall::StartFire => {
                self.expect_weapon(entity)?;
                self.with_weapon(entity, |w, owner, ctx| w.start_fire(owner, ctx));
            }
            RemoteCall::StopFire => {
                self.expect_weapon(entity)?;
                self.with_weapon(entity, |w, owner, ctx| w.stop_fire(owner, ctx));
            }
            RemoteCall::StartReload | RemoteCall::ClientStartReload => {
                self.expect_weapon(entity)?;
                self.with_weapon(entity, |w, owner, ctx| w.start_reload(false, owner, ctx));
            }
            RemoteCall::StopReload => {
                self.expect_weapon(entity)?;
                self.with_weapon(entity, |w, owner, ctx| w.stop_reload(owner, ctx));
            }
            RemoteCall::HandleFiring { sequence } => {
                self.expect_weapon(entity)?;
                self.with_weapon(entity, |w, owner, ctx| {
                    w.server_handle_firing(sequence, owner, ctx)
                });
            }
            RemoteCall::FireShot { origin, direction } => {
                self.server_fire_shot(entity, Vec3::from_array(origin), Vec3::from_array(direction))?;
            }
            RemoteCall::EquipWeapon { weapon } => self.equip_weapon(entity, weapon)?,
            RemoteCall::DropWeapon => {
                self.drop_weapon(entity)?;
            }
            RemoteCall::SetTargeting { targeting } => self.set_targeting(entity, targeting)?,
            RemoteCall::SetRunning { running, toggled } => self.set_running(entity, running, toggled)?,
            RemoteCall::StartLunge { weapon } => self.start_lunge(entity, weapon)?,
            RemoteCall::FinishLunge => self.finish_lunge(entity)?,
            RemoteCall::LungeCollision => self.on_lunge_collision(entity)?,
            RemoteCall::Interact => self.interact(entity)?,
            RemoteCall::Move {
                position,
                velocity,
                aim,
            } => self.move_character(
                entity,
                Vec3::from_array(position),
                Vec3::from_array(velocity),
                Vec3::from_array(aim),
            )?,
            RemoteCall::FireInPlace { weapon, .. } => self.fire_in_place(entity, weapon)?,
        }

        self.resolve_shots();
        Ok(())
    }

    /// Resolves a shot the owning node traced locally. Each shot must be
    /// backed by a fire tick the authority already confirmed, and an origin
    /// too far from the shooter's eye is replaced by the eye.
    fn server_fire_shot(&mut self, weapon: EntityId, origin: Vec3, direction: Vec3) -> Result<(), CombatError> {
        let Some(owner) = self.expect_weapon(weapon)?.owner() else {
            return Err(CombatError::Rejected {
                call: "fire_shot",
                reason: "weapon has no owner",
            });
        };
        let shooter = self.expect_character(owner)?;
        if shooter.dying || shooter.health <= 0.0 {
            return Ok(());
        }
        let eye = shooter.eye();
        let tolerance = shooter.config.shot_origin_tolerance;

        let credited = self
            .arena
            .weapon_mut(weapon)
            .is_some_and(|w| w.take_shot_credit());
        if !credited {
            log::warn!("weapon {} sent a shot with no confirmed fire tick", weapon);
            return Err(CombatError::Rejected {
                call: "fire_shot",
                reason: "no confirmed fire tick",
            });
        }

        let origin = if origin.distance(eye) <= tolerance {
            origin
        } else {
            log::debug!("weapon {} shot origin {} snapped to eye {}", weapon, origin, eye);
            eye
        };
        self.fire_shot(weapon, owner, origin, direction);
        Ok(())
    }
}
