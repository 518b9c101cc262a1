mod burst;
mod catalog;
mod config;
mod instance;
mod state;

pub use burst::BurstState;
pub use catalog::{Armory, kinds};
pub use config::{
    DamageTypeId, FireKind, InstantHitConfig, ProjectileConfig, WeaponConfig, WeaponKind,
    damage_types,
};
pub use instance::{OwnerView, ShotRequest, Weapon};
pub use state::{StateInputs, WeaponState, determine_state};
