use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub tick_rate: u32,
    /// One-way delay of the simulated link, each direction.
    pub latency_ms: u32,
    pub jitter_ms: u32,
    pub bots: usize,
    pub seed: u64,
    /// Seconds before a removed character is spawned again.
    pub respawn_delay: f32,
    pub arena_half_size: f32,
    pub health_regen: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            latency_ms: 50,
            jitter_ms: 0,
            bots: 2,
            seed: 1,
            respawn_delay: 3.0,
            arena_half_size: 30.0,
            health_regen: true,
        }
    }
}
