/// Simulation time for one node.
///
/// `advance` moves the clock by an explicit step. Hosts that run on wall
/// time feed real elapsed time through `accumulate` and then take
/// `pending_steps` fixed steps.
#[derive(Debug, Clone)]
pub struct GameClock {
    dt: f32,
    accumulator: f32,
    tick: u32,
    now: f32,
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new(60)
    }
}

impl GameClock {
    const MAX_FRAME_TIME: f32 = 0.25;

    pub fn new(tick_rate: u32) -> Self {
        Self {
            dt: 1.0 / tick_rate.max(1) as f32,
            accumulator: 0.0,
            tick: 0,
            now: 0.0,
        }
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn now(&self) -> f32 {
        self.now
    }

    pub fn advance(&mut self, elapsed: f32) {
        self.now += elapsed.max(0.0);
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn accumulate(&mut self, real_elapsed: f32) {
        self.accumulator += real_elapsed.clamp(0.0, Self::MAX_FRAME_TIME);
    }

    pub fn pending_steps(&mut self) -> u32 {
        let mut steps = 0;
        while self.accumulator >= self.dt {
            self.accumulator -= self.dt;
            steps += 1;
        }
        steps
    }

    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_fixed_steps() {
        let mut clock = GameClock::new(60);

        clock.accumulate(1.0 / 30.0 + 0.001);
        assert_eq!(clock.pending_steps(), 2);
        assert_eq!(clock.pending_steps(), 0);
    }

    #[test]
    fn long_frames_are_clamped() {
        let mut clock = GameClock::new(10);

        clock.accumulate(5.0);
        assert_eq!(clock.pending_steps(), 2);
    }

    #[test]
    fn advance_moves_time_and_tick() {
        let mut clock = GameClock::new(60);
        clock.advance(0.5);
        clock.advance(0.25);

        assert_eq!(clock.tick(), 2);
        assert!((clock.now() - 0.75).abs() < 1e-6);
    }
}
