use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WeaponState {
    #[default]
    Idle,
    Firing,
    Reloading,
    Equipping,
}

impl WeaponState {
    /// States in which a trigger pull or reload request is honoured.
    pub fn accepts_input(self) -> bool {
        matches!(self, Self::Idle | Self::Firing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Firing => "firing",
            Self::Reloading => "reloading",
            Self::Equipping => "equipping",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StateInputs {
    pub equipped: bool,
    pub pending_equip: bool,
    pub pending_reload: bool,
    pub can_reload: bool,
    pub wants_to_fire: bool,
    pub can_fire: bool,
    pub current: WeaponState,
}

pub fn determine_state(inputs: &StateInputs) -> WeaponState {
    if !inputs.equipped && !inputs.pending_equip {
        WeaponState::Idle
    } else if inputs.pending_equip {
        WeaponState::Equipping
    } else if inputs.pending_reload {
        if inputs.can_reload {
            WeaponState::Reloading
        } else {
            inputs.current
        }
    } else if inputs.wants_to_fire && inputs.can_fire {
        WeaponState::Firing
    } else {
        WeaponState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipped() -> StateInputs {
        StateInputs {
            equipped: true,
            ..StateInputs::default()
        }
    }

    #[test]
    fn unequipped_is_idle_regardless_of_intent() {
        let inputs = StateInputs {
            wants_to_fire: true,
            can_fire: true,
            pending_reload: true,
            can_reload: true,
            current: WeaponState::Firing,
            ..StateInputs::default()
        };
        assert_eq!(determine_state(&inputs), WeaponState::Idle);
    }

    #[test]
    fn pending_equip_wins() {
        let inputs = StateInputs {
            pending_equip: true,
            wants_to_fire: true,
            can_fire: true,
            ..equipped()
        };
        assert_eq!(determine_state(&inputs), WeaponState::Equipping);
    }

    #[test]
    fn reload_request_latches_until_legal() {
        let blocked = StateInputs {
            pending_reload: true,
            can_reload: false,
            current: WeaponState::Reloading,
            ..equipped()
        };
        assert_eq!(determine_state(&blocked), WeaponState::Reloading);

        let firing = StateInputs {
            current: WeaponState::Firing,
            ..blocked
        };
        assert_eq!(determine_state(&firing), WeaponState::Firing);

        let legal = StateInputs {
            can_reload: true,
            current: WeaponState::Idle,
            ..blocked
        };
        assert_eq!(determine_state(&legal), WeaponState::Reloading);
    }

    #[test]
    fn fires_only_when_wanted_and_allowed() {
        let wants = StateInputs {
            wants_to_fire: true,
            ..equipped()
        };
        assert_eq!(determine_state(&wants), WeaponState::Idle);
        assert_eq!(
            determine_state(&StateInputs {
                can_fire: true,
                ..wants
            }),
            WeaponState::Firing
        );
    }

    #[test]
    fn input_states() {
        assert!(WeaponState::Idle.accepts_input());
        assert!(WeaponState::Firing.accepts_input());
        assert!(!WeaponState::Reloading.accepts_input());
        assert!(!WeaponState::Equipping.accepts_input());
    }
}
