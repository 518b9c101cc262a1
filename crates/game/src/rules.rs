use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::weapon::DamageTypeId;
use crate::world::EntityId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageContext {
    pub victim: EntityId,
    pub victim_team: u8,
    pub instigator: Option<EntityId>,
    pub instigator_team: Option<u8>,
    pub damage_type: DamageTypeId,
}

impl DamageContext {
    pub fn is_self_damage(&self) -> bool {
        self.instigator == Some(self.victim)
    }

    pub fn is_friendly(&self) -> bool {
        !self.is_self_damage() && self.instigator_team == Some(self.victim_team)
    }
}

/// Kill-credit hook run on the authority when a character dies.
pub trait Scorekeeper {
    fn killed(&mut self, killer: Option<EntityId>, victim: EntityId, damage_type: DamageTypeId);

    fn score(&self, _character: EntityId) -> Option<ScoreLine> {
        None
    }
}

pub trait GameRules: Scorekeeper {
    fn modify_damage(&self, amount: f32, context: &DamageContext) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreLine {
    pub kills: u32,
    pub deaths: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scoreboard {
    pub damage_scale: f32,
    pub friendly_fire: bool,
    lines: BTreeMap<EntityId, ScoreLine>,
}

impl Default for Scoreboard {
    fn default() -> Self {
        Self {
            damage_scale: 1.0,
            friendly_fire: false,
            lines: BTreeMap::new(),
        }
    }
}

impl Scoreboard {
    pub fn new(damage_scale: f32, friendly_fire: bool) -> Self {
        Self {
            damage_scale,
            friendly_fire,
            lines: BTreeMap::new(),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = (EntityId, ScoreLine)> + '_ {
        self.lines.iter().map(|(id, line)| (*id, *line))
    }
}

impl Scorekeeper for Scoreboard {
    fn killed(&mut self, killer: Option<EntityId>, victim: EntityId, _damage_type: DamageTypeId) {
        self.lines.entry(victim).or_default().deaths += 1;
        if let Some(killer) = killer.filter(|killer| *killer != victim) {
            self.lines.entry(killer).or_default().kills += 1;
        }
    }

    fn score(&self, character: EntityId) -> Option<ScoreLine> {
        self.lines.get(&character).copied()
    }
}

impl GameRules for Scoreboard {
    fn modify_damage(&self, amount: f32, context: &DamageContext) -> f32 {
        if context.is_friendly() && !self.friendly_fire {
            return 0.0;
        }
        amount * self.damage_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(victim_team: u8, instigator: EntityId, instigator_team: u8) -> DamageContext {
        DamageContext {
            victim: 1,
            victim_team,
            instigator: Some(instigator),
            instigator_team: Some(instigator_team),
            damage_type: 1,
        }
    }

    #[test]
    fn friendly_fire_switch() {
        let mut board = Scoreboard::default();
        assert_eq!(board.modify_damage(30.0, &hit(0, 2, 0)), 0.0);
        assert_eq!(board.modify_damage(30.0, &hit(0, 2, 1)), 30.0);
        assert_eq!(board.modify_damage(30.0, &hit(0, 1, 0)), 30.0);

        board.friendly_fire = true;
        assert_eq!(board.modify_damage(30.0, &hit(0, 2, 0)), 30.0);
    }

    #[test]
    fn difficulty_scales_damage() {
        let board = Scoreboard::new(0.5, false);
        assert_eq!(board.modify_damage(40.0, &hit(0, 2, 1)), 20.0);
    }

    #[test]
    fn kill_credit() {
        let mut board = Scoreboard::default();
        board.killed(Some(2), 1, 1);
        board.killed(Some(1), 1, 2);
        assert_eq!(board.score(2), Some(ScoreLine { kills: 1, deaths: 0 }));
        assert_eq!(board.score(1), Some(ScoreLine { kills: 0, deaths: 2 }));
        assert_eq!(board.score(9), None);
    }
}
