use crate::world::EntityId;

/// Ordered weapon list of one character, unique by entity id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    weapons: Vec<EntityId>,
    current: Option<EntityId>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.weapons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty()
    }

    pub fn contains(&self, weapon: EntityId) -> bool {
        self.weapons.contains(&weapon)
    }

    pub fn weapons(&self) -> &[EntityId] {
        &self.weapons
    }

    pub fn current(&self) -> Option<EntityId> {
        self.current
    }

    pub fn set_current(&mut self, weapon: Option<EntityId>) {
        self.current = weapon;
    }

    pub fn add(&mut self, weapon: EntityId) -> bool {
        if self.contains(weapon) {
            return false;
        }
        self.weapons.push(weapon);
        true
    }

    pub fn remove(&mut self, weapon: EntityId) -> bool {
        let Some(index) = self.weapons.iter().position(|id| *id == weapon) else {
            return false;
        };
        self.weapons.remove(index);
        if self.current == Some(weapon) {
            self.current = None;
        }
        true
    }

    /// Replaces the list with a replicated one. The current weapon is
    /// replicated separately and left alone.
    pub fn replace(&mut self, weapons: &[EntityId]) {
        self.weapons.clear();
        for weapon in weapons {
            self.add(*weapon);
        }
    }

    pub fn take_all(&mut self) -> Vec<EntityId> {
        self.current = None;
        std::mem::take(&mut self.weapons)
    }

    /// Walks the list from `from`, wrapping, and returns
    /// the first other weapon accepted by `accept`.
    pub fn cycle(
        &self,
        from: Option<EntityId>,
        forward: bool,
        accept: impl Fn(EntityId) -> bool,
    ) -> Option<EntityId> {
        let len = self.weapons.len();
        if len == 0 {
            return None;
        }
        let start = from
            .and_then(|id| self.weapons.iter().position(|w| *w == id))
            .unwrap_or(if forward { len - 1 } else { 0 });

        (1..=len)
            .map(|offset| {
                if forward {
                    (start + offset) % len
                } else {
                    (start + len - offset % len) % len
                }
            })
            .map(|index| self.weapons[index])
            .find(|id| Some(*id) != from && accept(*id))
    }
}
