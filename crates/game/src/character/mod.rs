mod config;
mod controller;
mod damage;
mod inventory;
mod lunge;
mod state;

pub use config::CharacterConfig;
pub use damage::{DamageEvent, coincident, is_assassination, is_headshot};
pub use inventory::Inventory;
pub use lunge::{Lunge, LungeExit, MovementTuning};
pub use state::{Character, CheatFlags};
