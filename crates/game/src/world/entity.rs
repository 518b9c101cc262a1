use serde::{Deserialize, Serialize};

pub type EntityId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EntityKind {
    #[default]
    Character = 0,
    Weapon = 1,
    Pickup = 2,
    Projectile = 3,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Weapon => "weapon",
            Self::Pickup => "pickup",
            Self::Projectile => "projectile",
        }
    }
}

impl TryFrom<u8> for EntityKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Character),
            1 => Ok(Self::Weapon),
            2 => Ok(Self::Pickup),
            3 => Ok(Self::Projectile),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_wire_byte() {
        for kind in [
            EntityKind::Character,
            EntityKind::Weapon,
            EntityKind::Pickup,
            EntityKind::Projectile,
        ] {
            assert_eq!(EntityKind::try_from(kind as u8), Ok(kind));
        }
        assert_eq!(EntityKind::try_from(9), Err(9));
    }
}
