use crate::event::{CueKind, CueQueue};
use crate::net::{NetMode, RemoteChannel};
use crate::time::TimerService;
use crate::weapon::ShotRequest;
use crate::world::EntityId;

/// Collaborators handed to entity operations for the duration of one call.
pub struct Ctx<'a> {
    pub now: f32,
    /// Length of the step being simulated, zero outside a tick.
    pub dt: f32,
    pub mode: NetMode,
    pub timers: &'a mut dyn TimerService,
    pub remote: &'a mut dyn RemoteChannel,
    pub cues: &'a mut CueQueue,
    pub shots: &'a mut Vec<ShotRequest>,
}

impl Ctx<'_> {
    /// Servers and standalone nodes own every entity they simulate.
    pub fn has_authority(&self) -> bool {
        self.mode.is_server()
    }

    /// Raises a cue, skipping cosmetic ones on dedicated servers.
    pub fn cue(&mut self, entity: EntityId, kind: CueKind) {
        if kind.is_cosmetic() && !self.mode.plays_cosmetics() {
            return;
        }
        self.cues.push(self.now, entity, kind);
    }
}
