pub mod character;
pub mod context;
pub mod error;
pub mod event;
pub mod hit;
pub mod net;
pub mod physics;
pub mod pickup;
pub mod projectile;
pub mod rules;
pub mod time;
pub mod weapon;
pub mod world;

pub use character::{
    Character, CharacterConfig, CheatFlags, DamageEvent, Inventory, Lunge, LungeExit,
    MovementTuning,
};
pub use context::Ctx;
pub use error::CombatError;
pub use event::{Cue, CueKind, CueQueue};
pub use hit::{HitReceiver, HitRecord, HitReplicator, HitReport, HIT_RECORD_WINDOW};
pub use net::{
    AuthorityOracle, ConnectionId, Envelope, FieldId, FieldValue, Message, NetMode, NetRole,
    ObserverScope, Outbox, Outgoing, RemoteCall, RemoteChannel, ReplicationFrame,
    ReplicationScope, Replicator, WireError,
};
pub use physics::{BodyVolume, HitZone, PhysicsWorld, SimpleScene, TraceHit, TraceService};
pub use pickup::WeaponPickup;
pub use projectile::Projectile;
pub use rules::{DamageContext, GameRules, ScoreLine, Scoreboard, Scorekeeper};
pub use time::{GameClock, TimerHandle, TimerKey, TimerQueue, TimerService, TimerSlots};
pub use weapon::{
    Armory, DamageTypeId, FireKind, OwnerView, ProjectileConfig, Weapon, WeaponConfig,
    WeaponKind, WeaponState,
};
pub use world::{Arena, Damageable, EntityId, EntityKind, Tickable, World};
