use sidearm::EntityId;

#[derive(Debug, Clone)]
pub enum SandboxEvent {
    Spawned {
        character: EntityId,
        role: SeatRole,
    },
    Killed {
        victim: EntityId,
        killer: Option<EntityId>,
    },
    Exploded {
        projectile: EntityId,
    },
    WeaponDropped {
        character: EntityId,
        pickup: EntityId,
    },
    WeaponPickedUp {
        character: EntityId,
        weapon: EntityId,
    },
    CallRejected {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Who drives a character in the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatRole {
    /// Driven from the observer node over the link.
    Player,
    /// Driven on the authority.
    Bot,
}

impl SeatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatRole::Player => "player",
            SeatRole::Bot => "bot",
        }
    }
}

impl SandboxEvent {
    pub fn describe(&self) -> String {
        match self {
            SandboxEvent::Spawned { character, role } => {
                format!("{} {} spawned", role.as_str(), character)
            }
            SandboxEvent::Killed { victim, killer } => match killer {
                Some(killer) if killer != victim => format!("{} killed {}", killer, victim),
                _ => format!("{} died", victim),
            },
            SandboxEvent::Exploded { projectile } => format!("projectile {} exploded", projectile),
            SandboxEvent::WeaponDropped { character, pickup } => {
                format!("{} dropped a weapon (pickup {})", character, pickup)
            }
            SandboxEvent::WeaponPickedUp { character, weapon } => {
                format!("{} picked up weapon {}", character, weapon)
            }
            SandboxEvent::CallRejected { message } => format!("rejected: {}", message),
            SandboxEvent::Error { message } => message.clone(),
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SandboxEvent::CallRejected { .. } | SandboxEvent::Error { .. }
        )
    }
}
