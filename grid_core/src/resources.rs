use bevy::prelude::Resource;

/// Tunable parameters for the movement and animation engine.
#[derive(Resource, Debug, Clone)]
pub struct EngineConfig {
    /// Movement speed used for entities until the authority supplies one.
    pub default_walk_speed_tiles_per_sec: f32,
    /// Wall-clock length of the attack wind-up animation.
    pub attack_duration_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_walk_speed_tiles_per_sec: 4.0,
            attack_duration_secs: 0.6,
        }
    }
}
