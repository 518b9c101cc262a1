use std::collections::BTreeMap;

use crate::character::Character;
use crate::pickup::WeaponPickup;
use crate::projectile::Projectile;
use crate::net::ConnectionId;
use crate::weapon::{Weapon, WeaponKind};

use super::entity::{EntityId, EntityKind};

/// Entity storage of one node. Ordered maps keep iteration deterministic
/// across nodes.
#[derive(Debug, Default)]
pub struct Arena {
    pub(crate) characters: BTreeMap<EntityId, Character>,
    pub(crate) weapons: BTreeMap<EntityId, Weapon>,
    pub(crate) pickups: BTreeMap<EntityId, WeaponPickup>,
    pub(crate) projectiles: BTreeMap<EntityId, Projectile>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        if self.characters.contains_key(&id) {
            Some(EntityKind::Character)
        } else if self.weapons.contains_key(&id) {
            Some(EntityKind::Weapon)
        } else if self.pickups.contains_key(&id) {
            Some(EntityKind::Pickup)
        } else if self.projectiles.contains_key(&id) {
            Some(EntityKind::Projectile)
        } else {
            None
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.kind_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.characters.len() + self.weapons.len() + self.pickups.len() + self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: EntityId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn weapon(&self, id: EntityId) -> Option<&Weapon> {
        self.weapons.get(&id)
    }

    pub fn weapon_mut(&mut self, id: EntityId) -> Option<&mut Weapon> {
        self.weapons.get_mut(&id)
    }

    pub fn pickup(&self, id: EntityId) -> Option<&WeaponPickup> {
        self.pickups.get(&id)
    }

    pub fn projectile(&self, id: EntityId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn weapons(&self) -> impl Iterator<Item = &Weapon> {
        self.weapons.values()
    }

    pub fn pickups(&self) -> impl Iterator<Item = &WeaponPickup> {
        self.pickups.values()
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub(crate) fn character_ids(&self) -> Vec<EntityId> {
        self.characters.keys().copied().collect()
    }

    pub(crate) fn projectile_ids(&self) -> Vec<EntityId> {
        self.projectiles.keys().copied().collect()
    }

    /// Connection that drives an entity: a character's controller, or the
    /// controller of whoever holds or fired it.
    pub fn owning_connection(&self, id: EntityId) -> Option<ConnectionId> {
        if let Some(character) = self.characters.get(&id) {
            return character.controller;
        }
        let holder = match self.kind_of(id)? {
            EntityKind::Weapon => self.weapons.get(&id)?.owner(),
            EntityKind::Projectile => self.projectiles.get(&id)?.instigator(),
            EntityKind::Pickup | EntityKind::Character => None,
        }?;
        self.characters.get(&holder)?.controller
    }

    /// Removes an entity of any kind. Returns the kind it had.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<EntityKind> {
        if self.characters.remove(&id).is_some() {
            Some(EntityKind::Character)
        } else if self.weapons.remove(&id).is_some() {
            Some(EntityKind::Weapon)
        } else if self.pickups.remove(&id).is_some() {
            Some(EntityKind::Pickup)
        } else if self.projectiles.remove(&id).is_some() {
            Some(EntityKind::Projectile)
        } else {
            None
        }
    }

    /// First weapon of the given kind held by a character.
    pub(crate) fn held_of_kind(&self, character: EntityId, kind: WeaponKind) -> Option<EntityId> {
        let holder = self.characters.get(&character)?;
        holder
            .inventory
            .weapons()
            .iter()
            .copied()
            .find(|id| self.weapons.get(id).is_some_and(|w| w.kind() == kind))
    }
}
