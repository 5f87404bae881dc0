//! # Character Controller
//!
//! Per-tick locomotion for one avatar body, independent of the physics engine.
//!
//! ## Tick order
//!
//! 1. Ground check (ray down from just above the feet, own collider excluded)
//! 2. Camera-relative movement vector
//! 3. Horizontal velocity write (vertical left to gravity and jumps)
//! 4. Facing slerp toward the heading
//! 5. Clip choice (locomotion vs rest)
//! 6. Jump (wall-clock cooldown, optionally gated on the ground check)
//! 7. Camera target lerp
//!
//! A tick without a physics world or a body writes nothing.

use bevy::prelude::*;
use bevy_camera_controller::CameraTarget;
use promptmesh_common::config::{JumpPolicy, PromptMeshConfig};
use promptmesh_common::AvatarError;
use tracing::debug;

// ============================================================================
// Boundaries
// ============================================================================

/// Logical input flags for one tick
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
#[reflect(Resource)]
pub struct InputState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub jump: bool,
}

impl InputState {
    /// View-space direction (x right, z toward the camera), not normalized
    pub fn view_direction(&self) -> Vec3 {
        let axis = |pos: bool, neg: bool| f32::from(u8::from(pos)) - f32::from(u8::from(neg));
        Vec3::new(axis(self.right, self.left), 0.0, axis(self.backward, self.forward))
    }
}

/// Result of a downward ground ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
}

/// Ray queries against the physics world
pub trait PhysicsQuery {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: Entity,
    ) -> Option<RayHit>;
}

/// Dynamic rigid body driven by the controller
pub trait BodyHandle {
    fn entity(&self) -> Entity;
    fn position(&self) -> Vec3;
    fn linear_velocity(&self) -> Vec3;
    fn set_linear_velocity(&mut self, velocity: Vec3);
    fn apply_impulse(&mut self, impulse: Vec3);
}

// ============================================================================
// Jump Cooldown
// ============================================================================

/// Wall-clock debounce for jumps. Landing does not re-arm it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JumpCooldown {
    ready_at: Option<f64>,
}

impl JumpCooldown {
    pub fn is_armed(&self, now: f64) -> bool {
        self.ready_at.is_none_or(|t| now >= t)
    }

    /// Consume the cooldown if armed, re-arming after `cooldown` seconds
    pub fn try_fire(&mut self, now: f64, cooldown: f64) -> bool {
        if !self.is_armed(now) {
            return false;
        }
        self.ready_at = Some(now + cooldown);
        true
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Tuning for the controller
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct LocomotionSettings {
    pub move_speed: f32,
    pub jump_impulse: f32,
    pub jump_cooldown_secs: f64,
    pub movement_deadzone: f32,
    pub turn_rate: f32,
    pub ground_ray_lift: f32,
    pub ground_ray_length: f32,
    /// Capsule center (body origin) to feet
    pub center_to_feet: f32,
    pub camera_follow_rate: f32,
    pub camera_height: f32,
    #[reflect(ignore)]
    pub jump_policy: JumpPolicy,
}

impl LocomotionSettings {
    pub fn from_config(config: &PromptMeshConfig) -> Self {
        let loco = &config.locomotion;
        Self {
            move_speed: loco.move_speed,
            jump_impulse: loco.jump_impulse,
            jump_cooldown_secs: loco.jump_cooldown_secs,
            movement_deadzone: loco.movement_deadzone,
            turn_rate: loco.turn_rate,
            ground_ray_lift: loco.ground_ray_lift,
            ground_ray_length: loco.ground_ray_length,
            center_to_feet: config.body.center_to_feet(),
            camera_follow_rate: config.camera.follow_rate,
            camera_height: config.camera.target_height_offset,
            jump_policy: loco.jump_policy,
        }
    }
}

impl Default for LocomotionSettings {
    fn default() -> Self {
        Self::from_config(&PromptMeshConfig::default())
    }
}

/// Timing and view for one tick
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Simulation seconds since the previous tick
    pub delta: f32,
    /// Real seconds since startup
    pub now: f64,
    /// Camera orientation; only its yaw is used
    pub camera_rotation: Quat,
}

/// Which clip the animation player should be on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipChoice {
    Locomotion,
    Rest,
}

/// What happened during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub grounded: bool,
    pub ground_hit: Option<RayHit>,
    pub movement: Vec3,
    pub clip: ClipChoice,
    pub jumped: bool,
}

/// Locomotion state of one avatar body
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct LocomotionController {
    pub settings: LocomotionSettings,
    #[reflect(ignore)]
    cooldown: JumpCooldown,
    #[reflect(ignore)]
    last_report: Option<TickReport>,
}

impl LocomotionController {
    pub fn new(settings: LocomotionSettings) -> Self {
        Self {
            settings,
            cooldown: JumpCooldown::default(),
            last_report: None,
        }
    }

    pub fn cooldown(&self) -> &JumpCooldown {
        &self.cooldown
    }

    /// Outcome of the last tick that ran
    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    /// Feet position for a body origin
    pub fn feet(&self, body_position: Vec3) -> Vec3 {
        body_position - Vec3::Y * self.settings.center_to_feet
    }

    /// Where the camera should look for a body origin
    pub fn camera_goal(&self, body_position: Vec3) -> Vec3 {
        self.feet(body_position) + Vec3::Y * self.settings.camera_height
    }

    /// World-space movement for the input, rotated by the camera's yaw
    pub fn movement(&self, input: &InputState, camera_rotation: Quat) -> Vec3 {
        let forward = camera_rotation * Vec3::NEG_Z;
        let yaw = if forward.x.abs() + forward.z.abs() > f32::EPSILON {
            (-forward.x).atan2(-forward.z)
        } else {
            // Looking straight down or up: fall back to the camera's up vector
            let up = camera_rotation * Vec3::Y;
            (-up.x).atan2(-up.z)
        };

        Quat::from_rotation_y(yaw)
            * input.view_direction().normalize_or_zero()
            * self.settings.move_speed
    }

    pub fn tick(
        &mut self,
        input: &InputState,
        ctx: &TickContext,
        physics: Option<&dyn PhysicsQuery>,
        body: Option<&mut dyn BodyHandle>,
        facing: &mut Quat,
        camera: &mut CameraTarget,
    ) -> Result<TickReport, AvatarError> {
        let (Some(physics), Some(body)) = (physics, body) else {
            return Err(AvatarError::PhysicsUnavailable);
        };
        let s = &self.settings;

        // 1. Ground check
        let position = body.position();
        let ray_origin = self.feet(position) + Vec3::Y * s.ground_ray_lift;
        let ground_hit =
            physics.cast_ray(ray_origin, Vec3::NEG_Y, s.ground_ray_length, body.entity());
        let grounded = ground_hit.is_some();

        // 2. Movement
        let movement = self.movement(input, ctx.camera_rotation);

        // 3. Velocity
        let velocity = body.linear_velocity();
        body.set_linear_velocity(Vec3::new(movement.x, velocity.y, movement.z));

        // 4. Facing
        let moving = movement.length() > s.movement_deadzone;
        if moving {
            let target = Quat::from_rotation_y(movement.x.atan2(movement.z));
            *facing = facing.slerp(target, (ctx.delta * s.turn_rate).clamp(0.0, 1.0));
        }

        // 5. Clip
        let clip = if moving {
            ClipChoice::Locomotion
        } else {
            ClipChoice::Rest
        };

        // 6. Jump
        let mut jumped = false;
        if input.jump {
            debug!(
                "Jump attempt: grounded={}, origin_y={:.3}, body_y={:.3}, hit={:?}",
                grounded,
                ray_origin.y,
                position.y,
                ground_hit.map(|h| h.distance)
            );
            let allowed = match s.jump_policy {
                JumpPolicy::CooldownOnly => true,
                JumpPolicy::GroundedAndCooldown => grounded,
            };
            if allowed && self.cooldown.try_fire(ctx.now, s.jump_cooldown_secs) {
                body.apply_impulse(Vec3::Y * s.jump_impulse);
                jumped = true;
            }
        }

        // 7. Camera
        camera.follow(self.camera_goal(position), ctx.delta, s.camera_follow_rate);

        let report = TickReport {
            grounded,
            ground_hit,
            movement,
            clip,
            jumped,
        };
        self.last_report = Some(report);
        Ok(report)
    }
}

impl Default for LocomotionController {
    fn default() -> Self {
        Self::new(LocomotionSettings::default())
    }
}
