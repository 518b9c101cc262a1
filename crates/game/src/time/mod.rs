mod clock;
mod timer;

pub use clock::GameClock;
pub use timer::{
    CharacterTimer, DueTimer, ProjectileTimer, TimerHandle, TimerKey, TimerQueue, TimerService,
    TimerSlots, WeaponTimer,
};
