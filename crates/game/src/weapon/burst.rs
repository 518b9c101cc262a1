use super::config::WeaponConfig;

/// Slack for comparing accumulated f32 times against the cooldown end.
const COOLDOWN_TOLERANCE: f32 = 1e-4;

/// Bookkeeping for burst-fire weapons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BurstState {
    pub bursting: bool,
    pub start_time: f32,
    /// An automatic restart is scheduled for when the cooldown ends.
    pub pending_burst: bool,
    /// Set by the scheduled stop; a stop without it is ignored.
    pub pausing: bool,
}

impl BurstState {
    pub fn cooldown_end(&self, config: &WeaponConfig) -> f32 {
        self.start_time + config.burst_duration() + config.time_between_bursts
    }

    pub fn expired(&self, config: &WeaponConfig, now: f32) -> bool {
        self.bursting && self.cooldown_end(config) <= now + COOLDOWN_TOLERANCE
    }

    pub fn begin(&mut self, now: f32) {
        self.bursting = true;
        self.start_time = now;
        self.pending_burst = false;
        self.pausing = false;
    }

    pub fn clear(&mut self) {
        self.bursting = false;
        self.pending_burst = false;
        self.pausing = false;
    }

    pub fn off_cooldown(&self, config: &WeaponConfig, now: f32) -> bool {
        !self.pending_burst && self.cooldown_end(config) <= now + COOLDOWN_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_round_burst() -> WeaponConfig {
        WeaponConfig {
            burst: true,
            time_between_shots: 0.1,
            shots_per_burst: 3,
            time_between_bursts: 0.05,
            ..WeaponConfig::default()
        }
    }

    #[test]
    fn expires_after_burst_and_gap() {
        let config = three_round_burst();
        let mut burst = BurstState::default();
        burst.begin(0.0);

        assert!(!burst.expired(&config, 0.2));
        assert!(!burst.off_cooldown(&config, 0.2));
        assert!(burst.expired(&config, 0.36));
        assert!(burst.off_cooldown(&config, 0.36));
    }

    #[test]
    fn cooldown_ends_exactly_on_time() {
        let config = three_round_burst();
        let mut burst = BurstState::default();
        burst.begin(0.0);

        assert!(!burst.expired(&config, 0.349));
        assert!(burst.expired(&config, 0.35));
        assert!(burst.off_cooldown(&config, 0.35));
    }

    #[test]
    fn pending_restart_holds_cooldown() {
        let config = three_round_burst();
        let mut burst = BurstState::default();
        burst.begin(0.0);
        burst.pending_burst = true;
        assert!(!burst.off_cooldown(&config, 1.0));

        burst.clear();
        assert!(!burst.bursting);
        assert!(burst.off_cooldown(&config, 1.0));
    }
}
