use serde::{Deserialize, Serialize};

use crate::world::EntityId;

pub type ConnectionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetMode {
    #[default]
    Standalone,
    DedicatedServer,
    ListenServer,
    Client,
}

impl NetMode {
    pub fn is_server(self) -> bool {
        !matches!(self, Self::Client)
    }

    pub fn is_dedicated(self) -> bool {
        matches!(self, Self::DedicatedServer)
    }

    /// Nodes with a local viewer play cosmetic effects.
    pub fn plays_cosmetics(self) -> bool {
        !self.is_dedicated()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::DedicatedServer => "dedicated",
            Self::ListenServer => "listen",
            Self::Client => "client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NetRole {
    #[default]
    Authority,
    /// Mirror driven by a local controller.
    AutonomousProxy,
    SimulatedProxy,
}

impl NetRole {
    pub fn has_authority(self) -> bool {
        matches!(self, Self::Authority)
    }

    /// Role a node assigns to an entity given who controls it.
    pub fn resolve(
        mode: NetMode,
        local: Option<ConnectionId>,
        controller: Option<ConnectionId>,
    ) -> Self {
        if mode.is_server() {
            Self::Authority
        } else if controller.is_some() && controller == local {
            Self::AutonomousProxy
        } else {
            Self::SimulatedProxy
        }
    }
}

pub trait AuthorityOracle {
    fn role_of(&self, entity: EntityId) -> Option<NetRole>;

    fn has_authority(&self, entity: EntityId) -> bool {
        self.role_of(entity).is_some_and(NetRole::has_authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn servers_own_everything() {
        assert_eq!(
            NetRole::resolve(NetMode::DedicatedServer, None, Some(3)),
            NetRole::Authority
        );
        assert_eq!(
            NetRole::resolve(NetMode::ListenServer, Some(0), None),
            NetRole::Authority
        );
    }

    #[test]
    fn clients_only_drive_their_own_pawn() {
        assert_eq!(
            NetRole::resolve(NetMode::Client, Some(2), Some(2)),
            NetRole::AutonomousProxy
        );
        assert_eq!(
            NetRole::resolve(NetMode::Client, Some(2), Some(5)),
            NetRole::SimulatedProxy
        );
        assert_eq!(
            NetRole::resolve(NetMode::Client, None, None),
            NetRole::SimulatedProxy
        );
    }
}
