mod arena;
mod capability;
mod entity;
mod node;
mod remote;
mod replicate;

pub use arena::Arena;
pub use capability::{Damageable, Tickable};
pub use entity::{EntityId, EntityKind};
pub use node::World;
