use std::collections::VecDeque;

use glam::Vec3;

use crate::world::EntityId;

/// Presentation requests raised by the simulation: sounds, animations,
/// effects and HUD notices. The host decides how to play them.
#[derive(Debug, Clone, PartialEq)]
pub enum CueKind {
    FireEffects,
    StopFireEffects,
    OutOfAmmo,
    ReloadAnimation { duration: f32 },
    StopReloadAnimation,
    EquipAnimation { duration: f32 },
    StopEquipAnimation,
    HitReaction { damage: f32, instigator: Option<EntityId> },
    EnemyHit { victim: EntityId },
    Death { killer: Option<EntityId> },
    Ragdoll,
    Hidden,
    RegenStarted,
    Targeting(bool),
    Running(bool),
    LungeStarted { target: EntityId },
    LungeFinished,
    Explosion { position: Vec3 },
    Stuck { surface: Option<EntityId> },
    WeaponDropped { pickup: EntityId },
    WeaponPickedUp { weapon: EntityId },
}

impl CueKind {
    /// Cues with no gameplay meaning; dedicated servers skip them.
    pub fn is_cosmetic(&self) -> bool {
        !matches!(
            self,
            Self::Death { .. }
                | Self::Explosion { .. }
                | Self::WeaponDropped { .. }
                | Self::WeaponPickedUp { .. }
                | Self::LungeStarted { .. }
                | Self::LungeFinished
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub time: f32,
    pub entity: EntityId,
    pub kind: CueKind,
}

/// Bounded cue stream. The oldest cue is dropped when the host falls behind.
#[derive(Debug)]
pub struct CueQueue {
    cues: VecDeque<Cue>,
    capacity: usize,
    dropped: u64,
}

impl Default for CueQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl CueQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            cues: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, time: f32, entity: EntityId, kind: CueKind) {
        if self.cues.len() >= self.capacity {
            self.cues.pop_front();
            self.dropped += 1;
        }
        self.cues.push_back(Cue { time, entity, kind });
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cue> {
        self.cues.iter()
    }

    pub fn for_entity(&self, entity: EntityId) -> impl Iterator<Item = &Cue> {
        self.cues.iter().filter(move |cue| cue.entity == entity)
    }

    pub fn count(&self, predicate: impl Fn(&CueKind) -> bool) -> usize {
        self.cues.iter().filter(|cue| predicate(&cue.kind)).count()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Cue> + '_ {
        self.cues.drain(..)
    }

    pub fn clear(&mut self) {
        self.cues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_full() {
        let mut queue = CueQueue::new(2);
        queue.push(0.0, 1, CueKind::FireEffects);
        queue.push(0.1, 1, CueKind::StopFireEffects);
        queue.push(0.2, 2, CueKind::OutOfAmmo);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.iter().next().map(|c| &c.kind), Some(&CueKind::StopFireEffects));
    }

    #[test]
    fn filters_by_entity_and_kind() {
        let mut queue = CueQueue::default();
        queue.push(0.0, 1, CueKind::FireEffects);
        queue.push(0.0, 2, CueKind::FireEffects);
        queue.push(0.0, 2, CueKind::Death { killer: Some(1) });

        assert_eq!(queue.for_entity(2).count(), 2);
        assert_eq!(queue.count(|k| matches!(k, CueKind::FireEffects)), 2);
        assert!(!CueKind::Death { killer: None }.is_cosmetic());
        assert!(CueKind::RegenStarted.is_cosmetic());

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained.len(), 3);
        assert!(queue.is_empty());
    }
}
