use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;

use crate::character::{Character, DamageEvent};
use crate::hit::HitRecord;
use crate::net::{
    ConnectionId, EntityUpdate, FieldId, FieldUpdate, FieldValue, Replicable, ReplicationFrame,
    SpawnRecord, ViewerBaseline, collect_fields,
};
use crate::physics::HitZone;
use crate::pickup::WeaponPickup;
use crate::projectile::Projectile;
use crate::weapon::Weapon;

use super::arena::Arena;
use super::entity::{EntityId, EntityKind};
use super::node::World;

/// Appends spawn records and changed fields of one entity family.
fn gather<T: Replicable>(
    frame: &mut ReplicationFrame,
    baseline: &mut ViewerBaseline,
    arena: &Arena,
    entities: &BTreeMap<EntityId, T>,
    viewer: ConnectionId,
    now: f32,
) {
    for (id, entity) in entities {
        let owner = arena.owning_connection(*id);
        if !baseline.knows(*id) {
            frame.spawned.push(SpawnRecord {
                entity: *id,
                kind: T::KIND as u8,
                archetype: entity.archetype(),
                controller: owner,
            });
            baseline.introduce(*id);
        }
        let fields = baseline.diff(*id, collect_fields(entity, owner == Some(viewer), now));
        if !fields.is_empty() {
            frame.updates.push(EntityUpdate { entity: *id, fields });
        }
    }
}

impl World {
    pub fn add_viewer(&mut self, viewer: ConnectionId) {
        self.replicator.add_viewer(viewer);
        log::info!("viewer {} joined", viewer);
    }

    pub fn remove_viewer(&mut self, viewer: ConnectionId) {
        self.replicator.remove_viewer(viewer);
        log::info!("viewer {} left", viewer);
    }

    pub fn viewers(&self) -> Vec<ConnectionId> {
        self.replicator.viewers().collect()
    }

    /// Everything `viewer` has not seen yet: new entities, changed fields
    /// and removals.
    pub fn build_frame(&mut self, viewer: ConnectionId) -> ReplicationFrame {
        let now = self.now();
        let mut frame = ReplicationFrame::new(self.clock.tick(), now);
        if !self.has_authority() {
            log::warn!("observer asked to build a frame for {}", viewer);
            return frame;
        }

        let arena = &self.arena;
        let baseline = self.replicator.baseline_mut(viewer);
        gather(&mut frame, baseline, arena, &arena.characters, viewer, now);
        gather(&mut frame, baseline, arena, &arena.weapons, viewer, now);
        gather(&mut frame, baseline, arena, &arena.pickups, viewer, now);
        gather(&mut frame, baseline, arena, &arena.projectiles, viewer, now);

        let gone: Vec<EntityId> = baseline.known().filter(|id| !arena.contains(*id)).collect();
        for id in gone {
            baseline.forget(id);
            frame.removed.push(id);
        }
        frame
    }

    /// Mirrors an authority frame on an observer and runs the reactions
    /// tied to each replicated field.
    pub fn apply_frame(&mut self, frame: &ReplicationFrame) {
        if self.has_authority() {
            log::warn!("authority ignored a replication frame");
            return;
        }

        for spawn in &frame.spawned {
            self.spawn_mirror(spawn);
        }
        for update in &frame.updates {
            match self.arena.kind_of(update.entity) {
                Some(EntityKind::Weapon) => self.apply_weapon_fields(update.entity, &update.fields),
                Some(EntityKind::Character) => {
                    self.apply_character_fields(update.entity, &update.fields)
                }
                Some(EntityKind::Pickup) => {
                    if let Some(pickup) = self.arena.pickups.get_mut(&update.entity) {
                        write_fields(pickup, update.entity, &update.fields);
                    }
                }
                Some(EntityKind::Projectile) => {
                    self.apply_projectile_fields(update.entity, &update.fields)
                }
                None => log::warn!("update for unknown entity {}", update.entity),
            }
        }
        for id in &frame.removed {
            self.destroy(*id);
        }
        self.resolve_shots();
    }

    fn spawn_mirror(&mut self, spawn: &SpawnRecord) {
        let id = spawn.entity;
        if self.arena.contains(id) {
            return;
        }
        match EntityKind::try_from(spawn.kind) {
            Ok(EntityKind::Character) => {
                let team = u8::try_from(spawn.archetype).unwrap_or_default();
                let character =
                    Character::new(id, team, spawn.controller, Arc::clone(&self.character_config));
                self.arena.characters.insert(id, character);
            }
            Ok(EntityKind::Weapon) => match self.armory.get(spawn.archetype) {
                Some(config) => {
                    self.arena
                        .weapons
                        .insert(id, Weapon::new(id, spawn.archetype, config));
                }
                None => log::warn!("no weapon archetype {} for mirror {}", spawn.archetype, id),
            },
            Ok(EntityKind::Pickup) => {
                self.arena
                    .pickups
                    .insert(id, WeaponPickup::new(id, spawn.archetype));
            }
            Ok(EntityKind::Projectile) => {
                let config = self
                    .armory
                    .get(spawn.archetype)
                    .and_then(|c| c.projectile().copied())
                    .unwrap_or_default();
                self.arena
                    .projectiles
                    .insert(id, Projectile::new(id, spawn.archetype, config));
            }
            Err(kind) => {
                log::warn!("unknown entity kind {} for mirror {}", kind, id);
                return;
            }
        }
        log::debug!("mirrored entity {}", id);
    }

    fn apply_weapon_fields(&mut self, id: EntityId, fields: &[FieldUpdate]) {
        for update in fields {
            match (update.field, &update.value) {
                (FieldId::Owner, FieldValue::Entity(owner)) => {
                    let previous = self.arena.weapon(id).and_then(Weapon::owner);
                    if previous == *owner {
                        continue;
                    }
                    if previous.is_some() {
                        self.with_weapon(id, |w, view, ctx| w.on_leave_inventory(view, ctx));
                    }
                    if let Some(weapon) = self.arena.weapon_mut(id) {
                        weapon.set_owner(*owner);
                    }
                }
                (FieldId::BurstCounter, FieldValue::Int(counter)) => {
                    self.with_weapon(id, |w, _, ctx| w.on_rep_burst_counter(*counter, ctx));
                }
                (FieldId::PendingReload, FieldValue::Bool(pending)) => {
                    self.with_weapon(id, |w, view, ctx| {
                        w.on_rep_pending_reload(*pending, view, ctx)
                    });
                }
                _ => {
                    if let Some(weapon) = self.arena.weapon_mut(id) {
                        write_fields(weapon, id, std::slice::from_ref(update));
                    }
                }
            }
        }
    }

    fn apply_character_fields(&mut self, id: EntityId, fields: &[FieldUpdate]) {
        for update in fields {
            match (update.field, &update.value) {
                (FieldId::CurrentWeapon, FieldValue::Entity(weapon)) => {
                    self.set_current_weapon(id, *weapon);
                }
                (FieldId::LastHit, FieldValue::Hit(hit)) => {
                    let Some(target) = self.arena.character_mut(id) else {
                        continue;
                    };
                    target.last_hit = HitRecord::from_wire(hit);
                    if !target.receiver.accept(hit) {
                        continue;
                    }
                    let event = DamageEvent {
                        amount: hit.actual_damage,
                        damage_type: hit.damage_type,
                        instigator: hit.instigator,
                        causer: hit.damage_causer,
                        zone: HitZone::Body,
                        shot_direction: Vec3::ZERO,
                    };
                    if hit.killed {
                        self.on_death(id, event);
                    } else {
                        self.play_hit(id, event);
                    }
                }
                _ => {
                    if let Some(character) = self.arena.character_mut(id) {
                        write_fields(character, id, std::slice::from_ref(update));
                    }
                }
            }
        }
    }

    fn apply_projectile_fields(&mut self, id: EntityId, fields: &[FieldUpdate]) {
        for update in fields {
            match (update.field, &update.value) {
                (FieldId::Exploded, FieldValue::Bool(true)) => self.on_rep_exploded(id),
                _ => {
                    if let Some(projectile) = self.arena.projectiles.get_mut(&id) {
                        write_fields(projectile, id, std::slice::from_ref(update));
                    }
                }
            }
        }
    }
}

fn write_fields<T: Replicable>(entity: &mut T, id: EntityId, fields: &[FieldUpdate]) {
    for update in fields {
        if !entity.write_field(update.field, &update.value) {
            log::warn!("entity {} rejected field {:?}", id, update.field);
        }
    }
}
