mod scene;
mod trace;
mod world;

pub use scene::{Block, SimpleScene};
pub use trace::{BodyVolume, HitZone, TraceHit, TraceService, ZoneSphere};
pub use world::PhysicsWorld;
