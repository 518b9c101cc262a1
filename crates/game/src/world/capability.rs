use crate::context::Ctx;

/// Per-step update run by the world after timers have fired.
pub trait Tickable {
    fn tick(&mut self, ctx: &mut Ctx<'_>);
}

/// Entities that carry health and can be targeted by damage.
pub trait Damageable {
    fn health(&self) -> f32;

    fn is_alive(&self) -> bool {
        self.health() > 0.0
    }

    fn accepts_damage(&self) -> bool {
        self.is_alive()
    }
}
