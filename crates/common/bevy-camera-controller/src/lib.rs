#![deny(unsafe_code)]

//! Orbit-style follow camera.
//!
//! The camera orbits a [`CameraTarget`] point at a spherical offset. Something else (a
//! character controller) moves the target; this crate only turns mouse input into the orbit
//! and places the camera.
//!
//! ```text
//!            Y
//!            │   camera
//!            │  ╱
//!            │ ╱ polar (clamped)
//!            │╱
//!  target ───●──────── yaw around Y
//! ```

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::ButtonInput;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, Window};
use core::f32::consts::*;

/// Orbit camera plugin
#[derive(Default)]
pub struct CameraControllerPlugin;

impl Plugin for CameraControllerPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<OrbitCamera>()
            .register_type::<CameraTarget>()
            .add_systems(
                Update,
                (run_orbit_input, position_orbit_cameras)
                    .chain()
                    .in_set(CameraRigSet),
            );
    }
}

/// Systems that read the target and place the camera. Move the target before this set.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraRigSet;

/// Based on Valorant's default sensitivity: 1.0 / 180.0 radians per dot.
pub const RADIANS_PER_DOT: f32 = 1.0 / 180.0;

// ============================================================================
// Camera Target
// ============================================================================

/// Point the orbit camera looks at
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Default)]
#[reflect(Component)]
pub struct CameraTarget {
    pub point: Vec3,
}

impl CameraTarget {
    pub fn new(point: Vec3) -> Self {
        Self { point }
    }

    /// Lerp toward `goal` at `rate` per second
    pub fn follow(&mut self, goal: Vec3, delta: f32, rate: f32) {
        let t = (delta * rate).clamp(0.0, 1.0);
        self.point = self.point.lerp(goal, t);
    }

    /// Jump straight to `goal`
    pub fn snap(&mut self, goal: Vec3) {
        self.point = goal;
    }
}

// ============================================================================
// Orbit Camera
// ============================================================================

/// Orbit state around the camera's target
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct OrbitCamera {
    /// Enables this controller when `true`.
    pub enabled: bool,
    /// Distance from the target
    pub distance: f32,
    /// Rotation around the up axis
    pub yaw: f32,
    /// Angle from the up axis
    pub polar: f32,
    pub min_polar: f32,
    pub max_polar: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians per pixel of drag
    pub sensitivity: f32,
    /// Distance per wheel line
    pub zoom_speed: f32,
    /// Mouse button that orbits while held
    pub orbit_button: MouseButton,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            enabled: true,
            distance: 5.0,
            yaw: 0.0,
            polar: FRAC_PI_2 - 0.1,
            min_polar: FRAC_PI_4,
            max_polar: FRAC_PI_2 - 0.1,
            min_distance: 2.0,
            max_distance: 15.0,
            sensitivity: RADIANS_PER_DOT,
            zoom_speed: 0.5,
            orbit_button: MouseButton::Right,
        }
    }
}

impl OrbitCamera {
    /// Take distance and angles from an eye position looking at `target`
    pub fn looking_from(mut self, eye: Vec3, target: Vec3) -> Self {
        let offset = eye - target;
        let distance = offset.length();
        if distance > f32::EPSILON {
            self.distance = distance.clamp(self.min_distance, self.max_distance);
            self.yaw = offset.x.atan2(offset.z);
            self.polar = (offset.y / distance)
                .clamp(-1.0, 1.0)
                .acos()
                .clamp(self.min_polar, self.max_polar);
        }
        self
    }

    /// Apply a mouse drag in pixels
    pub fn orbit(&mut self, drag: Vec2) {
        self.yaw -= drag.x * self.sensitivity;
        self.polar = (self.polar - drag.y * self.sensitivity).clamp(self.min_polar, self.max_polar);
    }

    /// Positive zooms in
    pub fn zoom(&mut self, lines: f32) {
        self.distance =
            (self.distance - lines * self.zoom_speed).clamp(self.min_distance, self.max_distance);
    }

    /// Camera position relative to the target
    pub fn offset(&self) -> Vec3 {
        let (sin_p, cos_p) = self.polar.sin_cos();
        let (sin_y, cos_y) = self.yaw.sin_cos();
        Vec3::new(sin_p * sin_y, cos_p, sin_p * cos_y) * self.distance
    }
}

// ============================================================================
// Systems
// ============================================================================

fn run_orbit_input(
    windows: Query<&Window>,
    mut cursor_options: Query<&mut CursorOptions, With<Window>>,
    mut mouse_motion_events: MessageReader<MouseMotion>,
    mut mouse_wheel_events: MessageReader<MouseWheel>,
    mouse_button_input: Res<ButtonInput<MouseButton>>,
    mut query: Query<&mut OrbitCamera, With<Camera>>,
) {
    let Ok(mut orbit) = query.single_mut() else {
        return;
    };
    if !orbit.enabled {
        mouse_motion_events.clear();
        mouse_wheel_events.clear();
        return;
    }

    let mut scroll = 0.0;
    for event in mouse_wheel_events.read() {
        scroll += match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 16.0,
        };
    }
    if scroll != 0.0 {
        orbit.zoom(scroll);
    }

    let grab_change = mouse_button_input.just_pressed(orbit.orbit_button)
        || mouse_button_input.just_released(orbit.orbit_button);
    let dragging = mouse_button_input.pressed(orbit.orbit_button);

    // Hide the cursor while dragging
    if grab_change {
        for window in &windows {
            if !window.focused {
                continue;
            }
            if let Ok(mut opts) = cursor_options.single_mut() {
                if dragging {
                    opts.grab_mode = CursorGrabMode::Locked;
                    opts.visible = false;
                } else {
                    opts.grab_mode = CursorGrabMode::None;
                    opts.visible = true;
                }
            }
        }
    }

    let mut mouse_delta = Vec2::ZERO;
    for event in mouse_motion_events.read() {
        mouse_delta += event.delta;
    }
    if mouse_delta != Vec2::ZERO && dragging {
        orbit.orbit(mouse_delta);
    }
}

/// Place each orbit camera around its target
pub fn position_orbit_cameras(
    mut query: Query<(&mut Transform, &OrbitCamera, &CameraTarget), With<Camera>>,
) {
    for (mut transform, orbit, target) in query.iter_mut() {
        transform.translation = target.point + orbit.offset();
        transform.look_at(target.point, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_converges_without_overshoot() {
        let mut target = CameraTarget::new(Vec3::ZERO);
        let goal = Vec3::new(4.0, 1.0, -2.0);

        target.follow(goal, 1.0 / 60.0, 8.0);
        let step = target.point;
        assert!(step.length() > 0.0 && step.length() < goal.length());

        // Huge delta clamps to the goal instead of overshooting
        target.follow(goal, 5.0, 8.0);
        assert_eq!(target.point, goal);
    }

    #[test]
    fn test_snap_jumps_directly() {
        let mut target = CameraTarget::new(Vec3::ZERO);
        target.snap(Vec3::new(10.0, 1.0, 10.0));
        assert_eq!(target.point, Vec3::new(10.0, 1.0, 10.0));
    }

    #[test]
    fn test_polar_and_distance_are_clamped() {
        let mut orbit = OrbitCamera::default();

        orbit.orbit(Vec2::new(0.0, 10_000.0));
        assert_eq!(orbit.polar, orbit.min_polar);
        orbit.orbit(Vec2::new(0.0, -10_000.0));
        assert_eq!(orbit.polar, orbit.max_polar);

        orbit.zoom(100.0);
        assert_eq!(orbit.distance, orbit.min_distance);
        orbit.zoom(-100.0);
        assert_eq!(orbit.distance, orbit.max_distance);
    }

    #[test]
    fn test_looking_from_recovers_eye_position() {
        let eye = Vec3::new(3.0, 2.5, 4.0);
        let target = Vec3::new(0.0, 1.0, 0.0);
        let orbit = OrbitCamera::default().looking_from(eye, target);

        assert!((target + orbit.offset() - eye).length() < 1e-4);
    }

    #[test]
    fn test_camera_placed_around_target() {
        let mut app = App::new();
        app.add_systems(Update, position_orbit_cameras);

        let orbit = OrbitCamera::default();
        let offset = orbit.offset();
        let camera = app
            .world_mut()
            .spawn((
                Camera::default(),
                Transform::default(),
                orbit,
                CameraTarget::new(Vec3::new(1.0, 1.0, 1.0)),
            ))
            .id();

        app.update();

        let transform = app.world().get::<Transform>(camera).unwrap();
        assert!((transform.translation - (Vec3::ONE + offset)).length() < 1e-5);
        let to_target = (Vec3::ONE - transform.translation).normalize();
        assert!(transform.forward().dot(to_target) > 0.999);
    }
}
