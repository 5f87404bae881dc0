//! # PromptMesh Configuration
//!
//! TOML-based configuration for locomotion tuning, clip fading, normalization, camera and world.
//! Every field has a default so partial files are valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while reading or writing configuration files
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Root configuration resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, bevy::prelude::Resource)]
pub struct PromptMeshConfig {
    #[serde(default)]
    pub locomotion: LocomotionConfig,

    #[serde(default)]
    pub body: BodyConfig,

    #[serde(default)]
    pub animation: AnimationConfig,

    #[serde(default)]
    pub normalizer: NormalizerConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub world: WorldConfig,
}

// ============================================================================
// Sections
// ============================================================================

/// How the jump request is gated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpPolicy {
    /// Wall-clock cooldown only; the ground check is diagnostic
    #[default]
    CooldownOnly,
    /// Cooldown and a ground hit this tick
    GroundedAndCooldown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocomotionConfig {
    /// Horizontal speed in units per second
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,

    /// Upward impulse applied on jump
    #[serde(default = "default_jump_impulse")]
    pub jump_impulse: f32,

    /// Real-time seconds before another jump is allowed
    #[serde(default = "default_jump_cooldown")]
    pub jump_cooldown_secs: f64,

    /// Movement magnitude below which the avatar counts as standing
    #[serde(default = "default_deadzone")]
    pub movement_deadzone: f32,

    /// Facing slerp rate (scaled by delta)
    #[serde(default = "default_turn_rate")]
    pub turn_rate: f32,

    /// Ray origin height above the feet
    #[serde(default = "default_ground_ray_lift")]
    pub ground_ray_lift: f32,

    /// Ray length below the origin
    #[serde(default = "default_ground_ray_length")]
    pub ground_ray_length: f32,

    #[serde(default)]
    pub jump_policy: JumpPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    #[serde(default = "default_capsule_half_height")]
    pub capsule_half_height: f32,

    #[serde(default = "default_capsule_radius")]
    pub capsule_radius: f32,

    #[serde(default = "default_mass")]
    pub mass: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Cross-fade window in seconds
    #[serde(default = "default_fade_secs")]
    pub fade_secs: f32,

    /// Rest clip name, synthesized if the asset lacks it
    #[serde(default = "default_idle_clip")]
    pub idle_clip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Canonical height for uploaded avatars
    #[serde(default = "default_target_height")]
    pub target_height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Look-target lerp rate (scaled by delta)
    #[serde(default = "default_follow_rate")]
    pub follow_rate: f32,

    /// Look-target height above the feet
    #[serde(default = "default_target_height_offset")]
    pub target_height_offset: f32,

    #[serde(default = "default_camera_distance")]
    pub distance: f32,

    #[serde(default = "default_min_distance")]
    pub min_distance: f32,

    #[serde(default = "default_max_distance")]
    pub max_distance: f32,

    /// Minimum angle from the up axis, radians
    #[serde(default = "default_min_polar")]
    pub min_polar: f32,

    /// Maximum angle from the up axis, radians
    #[serde(default = "default_max_polar")]
    pub max_polar: f32,

    /// Radians per pixel of mouse drag
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,

    #[serde(default = "default_zoom_speed")]
    pub zoom_speed: f32,

    /// Vertical field of view, degrees
    #[serde(default = "default_fov")]
    pub fov_degrees: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Ground plane edge length
    #[serde(default = "default_ground_size")]
    pub ground_size: f32,

    #[serde(default = "default_gravity")]
    pub gravity: f32,

    /// Preset id, or `"uploaded"` for the stored upload
    #[serde(default = "default_avatar")]
    pub default_avatar: String,

    /// Directory the asset server reads from
    #[serde(default = "default_asset_root")]
    pub asset_root: String,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Static display value for the online counter
    #[serde(default = "default_online_users")]
    pub online_users: u32,
}

fn default_move_speed() -> f32 { 5.0 }
fn default_jump_impulse() -> f32 { 10.0 }
fn default_jump_cooldown() -> f64 { 1.0 }
fn default_deadzone() -> f32 { 0.1 }
fn default_turn_rate() -> f32 { 15.0 }
fn default_ground_ray_lift() -> f32 { 0.1 }
fn default_ground_ray_length() -> f32 { 0.3 }
fn default_capsule_half_height() -> f32 { 0.7 }
fn default_capsule_radius() -> f32 { 0.6 }
fn default_mass() -> f32 { 1.0 }
fn default_fade_secs() -> f32 { 0.2 }
fn default_idle_clip() -> String { "Idle".to_string() }
fn default_target_height() -> f32 { 1.8 }
fn default_follow_rate() -> f32 { 8.0 }
fn default_target_height_offset() -> f32 { 1.0 }
fn default_camera_distance() -> f32 { 5.0 }
fn default_min_distance() -> f32 { 2.0 }
fn default_max_distance() -> f32 { 15.0 }
fn default_min_polar() -> f32 { std::f32::consts::FRAC_PI_4 }
fn default_max_polar() -> f32 { std::f32::consts::FRAC_PI_2 - 0.1 }
fn default_sensitivity() -> f32 { 0.005 }
fn default_zoom_speed() -> f32 { 0.5 }
fn default_fov() -> f32 { 60.0 }
fn default_ground_size() -> f32 { 50.0 }
fn default_gravity() -> f32 { 9.81 }
fn default_avatar() -> String { "Walking".to_string() }
fn default_asset_root() -> String { "assets".to_string() }
fn default_log_filter() -> String { "info,wgpu=warn,naga=warn".to_string() }
fn default_online_users() -> u32 { 47 }

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            move_speed: default_move_speed(),
            jump_impulse: default_jump_impulse(),
            jump_cooldown_secs: default_jump_cooldown(),
            movement_deadzone: default_deadzone(),
            turn_rate: default_turn_rate(),
            ground_ray_lift: default_ground_ray_lift(),
            ground_ray_length: default_ground_ray_length(),
            jump_policy: JumpPolicy::default(),
        }
    }
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            capsule_half_height: default_capsule_half_height(),
            capsule_radius: default_capsule_radius(),
            mass: default_mass(),
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fade_secs: default_fade_secs(),
            idle_clip: default_idle_clip(),
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            target_height: default_target_height(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            follow_rate: default_follow_rate(),
            target_height_offset: default_target_height_offset(),
            distance: default_camera_distance(),
            min_distance: default_min_distance(),
            max_distance: default_max_distance(),
            min_polar: default_min_polar(),
            max_polar: default_max_polar(),
            sensitivity: default_sensitivity(),
            zoom_speed: default_zoom_speed(),
            fov_degrees: default_fov(),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ground_size: default_ground_size(),
            gravity: default_gravity(),
            default_avatar: default_avatar(),
            asset_root: default_asset_root(),
            log_filter: default_log_filter(),
            online_users: default_online_users(),
        }
    }
}

impl BodyConfig {
    /// Distance from the capsule center (body origin) down to the feet
    pub fn center_to_feet(&self) -> f32 {
        self.capsule_half_height + self.capsule_radius
    }
}

impl PromptMeshConfig {
    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from TOML file or return default
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match Self::from_toml(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Save to TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = PromptMeshConfig::from_toml(
            r#"
            [locomotion]
            move_speed = 7.5
            jump_policy = "grounded_and_cooldown"
            "#,
        )
        .unwrap();

        assert_eq!(config.locomotion.move_speed, 7.5);
        assert_eq!(config.locomotion.jump_policy, JumpPolicy::GroundedAndCooldown);
        assert_eq!(config.locomotion.jump_impulse, 10.0);
        assert_eq!(config.animation.fade_secs, 0.2);
        assert_eq!(config.world.default_avatar, "Walking");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promptmesh.toml");

        let mut config = PromptMeshConfig::default();
        config.normalizer.target_height = 2.0;
        config.save(&path).unwrap();

        assert_eq!(PromptMeshConfig::load_or_default(&path), config);
    }

    #[test]
    fn test_malformed_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promptmesh.toml");
        std::fs::write(&path, "locomotion = [this is not toml").unwrap();

        assert_eq!(PromptMeshConfig::load_or_default(&path), PromptMeshConfig::default());
    }
}
