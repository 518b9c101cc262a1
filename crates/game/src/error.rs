use crate::net::WireError;
use crate::weapon::WeaponKind;
use crate::world::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CombatError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("entity {id} is not a {expected}")]
    WrongKind { id: EntityId, expected: &'static str },
    #[error("no weapon archetype registered for kind {0}")]
    UnknownWeaponKind(WeaponKind),
    #[error("remote call {call} rejected: {reason}")]
    Rejected {
        call: &'static str,
        reason: &'static str,
    },
    #[error(transparent)]
    Wire(#[from] WireError),
}
