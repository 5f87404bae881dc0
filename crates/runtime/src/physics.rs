//! # Physics Integration
//!
//! Avian adapters for the locomotion controller, avatar body spawning, and the per-frame
//! locomotion system.
//!
//! ## Body layout
//!
//! ```text
//! AvatarBody (RigidBody::Dynamic, capsule, rotation locked, origin = capsule center)
//!   └── AvatarVisual (offset down to the feet, facing slerp lands here)
//!         └── model instance (rotation offset, optional normalization, SceneRoot once loaded)
//! ```
//!
//! Despawning the body drops its `AvatarDescriptor`, which releases any upload lease.
//!
//! A body is only driven once its model instance is mounted. Until then, and for good if
//! the model failed to load, it stays where it was spawned.

use avian3d::prelude::*;
use bevy::prelude::*;
use bevy::time::Real;
use bevy_camera_controller::{CameraRigSet, CameraTarget};
use promptmesh_common::assets::{ModelInstance, NormalizeScale, PendingModel};
use promptmesh_common::plugins::AvatarAnimation;
use promptmesh_common::services::animation::IDLE_CLIP;
use promptmesh_common::services::ClipPicker;
use promptmesh_common::{AvatarDescriptor, PromptMeshConfig};
use tracing::{debug, trace};

use crate::character::{
    BodyHandle, ClipChoice, InputState, LocomotionController, LocomotionSettings, PhysicsQuery,
    RayHit, TickContext,
};

// ============================================================================
// Physics Plugin
// ============================================================================

/// Plugin for runtime physics integration.
pub struct RuntimePhysicsPlugin;

impl Plugin for RuntimePhysicsPlugin {
    fn build(&self, app: &mut App) {
        if let Some(config) = app.world().get_resource::<PromptMeshConfig>() {
            info!(
                "Jump apex ≈ {:.2}m with impulse {} on mass {}",
                calculate_jump_height(
                    config.locomotion.jump_impulse / config.body.mass,
                    config.world.gravity
                ),
                config.locomotion.jump_impulse,
                config.body.mass
            );
        }

        app.add_systems(
            Update,
            (apply_configured_gravity, snap_camera_on_mount, drive_locomotion)
                .chain()
                .before(CameraRigSet),
        );
    }
}

// ============================================================================
// Components
// ============================================================================

/// Locomotion-controlled rigid body
#[derive(Component, Debug, Default, Reflect)]
#[reflect(Component)]
pub struct AvatarBody;

/// Node whose rotation is the avatar's facing
#[derive(Component, Debug, Default, Reflect)]
#[reflect(Component)]
pub struct AvatarVisual;

/// Child entities of an avatar body
#[derive(Component, Debug, Clone, Copy)]
pub struct AvatarParts {
    pub visual: Entity,
    pub instance: Entity,
}

// ============================================================================
// Adapters
// ============================================================================

/// `PhysicsQuery` over Avian's spatial query
pub struct AvianQuery<'a, 'w, 's> {
    pub spatial: &'a SpatialQuery<'w, 's>,
}

impl PhysicsQuery for AvianQuery<'_, '_, '_> {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: Entity,
    ) -> Option<RayHit> {
        let direction = Dir3::new(direction).ok()?;
        let filter = SpatialQueryFilter::default().with_excluded_entities([exclude]);
        self.spatial
            .cast_ray(origin, direction, max_distance, true, &filter)
            .map(|hit| RayHit {
                distance: hit.distance,
            })
    }
}

/// `BodyHandle` over a body's components for one tick
pub struct AvianBody<'a> {
    pub entity: Entity,
    pub position: Vec3,
    pub velocity: &'a mut LinearVelocity,
    pub mass: f32,
}

impl BodyHandle for AvianBody<'_> {
    fn entity(&self) -> Entity {
        self.entity
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn linear_velocity(&self) -> Vec3 {
        self.velocity.0
    }

    fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.velocity.0 = velocity;
    }

    fn apply_impulse(&mut self, impulse: Vec3) {
        self.velocity.0 += impulse / self.mass.max(f32::EPSILON);
    }
}

// ============================================================================
// Spawning
// ============================================================================

/// Spawn a locomotion-controlled avatar with its feet at `feet_position`
pub fn spawn_avatar_body(
    commands: &mut Commands,
    descriptor: &AvatarDescriptor,
    config: &PromptMeshConfig,
    feet_position: Vec3,
) -> Entity {
    let resolved = descriptor.resolve();
    let body_config = &config.body;
    let center_to_feet = body_config.center_to_feet();

    let body = commands
        .spawn((
            Name::new(format!("Avatar: {}", descriptor.name)),
            Transform::from_translation(feet_position + Vec3::Y * center_to_feet),
            Visibility::default(),
            AvatarBody,
            descriptor.clone(),
            LocomotionController::new(LocomotionSettings::from_config(config)),
        ))
        .id();

    // Physics components
    commands.entity(body).insert((
        RigidBody::Dynamic,
        Collider::capsule(body_config.capsule_radius, body_config.capsule_half_height * 2.0),
        CollisionMargin(0.02),
        LockedAxes::ROTATION_LOCKED,
        Friction::new(0.0),
        Restitution::new(0.0),
        GravityScale(1.0),
        Mass(body_config.mass),
        LinearVelocity::default(),
    ));

    let visual = commands
        .spawn((
            Name::new("AvatarVisual"),
            AvatarVisual,
            Transform::from_translation(Vec3::NEG_Y * center_to_feet),
            Visibility::default(),
            ChildOf(body),
        ))
        .id();

    let instance = commands
        .spawn((
            Name::new("AvatarModel"),
            Transform::from_rotation(Quat::from_rotation_y(resolved.rotation_offset)),
            Visibility::default(),
            PendingModel {
                source_id: resolved.source_id.clone(),
            },
            ChildOf(visual),
        ))
        .id();

    if resolved.normalize {
        commands.entity(instance).insert(NormalizeScale {
            target_height: config.normalizer.target_height,
        });
    }

    commands.entity(body).insert(AvatarParts { visual, instance });

    info!(
        "🧍 Spawned avatar '{}' from '{}' at {:?}",
        descriptor.name, resolved.source_id, feet_position
    );
    body
}

// ============================================================================
// Systems
// ============================================================================

/// Keep Avian's gravity in sync with the configuration
pub fn apply_configured_gravity(
    config: Option<Res<PromptMeshConfig>>,
    gravity: Option<ResMut<Gravity>>,
) {
    let (Some(config), Some(mut gravity)) = (config, gravity) else {
        return;
    };

    let configured = Vec3::NEG_Y * config.world.gravity;
    if gravity.0 != configured {
        gravity.0 = configured;
        info!("Gravity updated to {:?} m/s²", configured);
    }
}

/// New bodies put the camera target straight on them
pub fn snap_camera_on_mount(
    bodies: Query<(&Transform, &LocomotionController), Added<AvatarBody>>,
    mut cameras: Query<&mut CameraTarget, With<Camera>>,
) {
    for (transform, controller) in bodies.iter() {
        let goal = controller.camera_goal(transform.translation);
        for mut target in cameras.iter_mut() {
            target.snap(goal);
        }
    }
}

/// Run one locomotion tick per avatar body
#[allow(clippy::too_many_arguments)]
pub fn drive_locomotion(
    time: Res<Time>,
    real_time: Res<Time<Real>>,
    input: Res<InputState>,
    picker: Option<Res<ClipPicker>>,
    config: Option<Res<PromptMeshConfig>>,
    spatial_query: SpatialQuery,
    mut bodies: Query<
        (
            Entity,
            &Transform,
            &mut LinearVelocity,
            &Mass,
            &mut LocomotionController,
            &AvatarParts,
        ),
        With<AvatarBody>,
    >,
    mut visuals: Query<&mut Transform, (With<AvatarVisual>, Without<AvatarBody>)>,
    mut animations: Query<&mut AvatarAnimation>,
    mounted: Query<(), With<ModelInstance>>,
    mut cameras: Query<
        (&Transform, &mut CameraTarget),
        (With<Camera>, Without<AvatarBody>, Without<AvatarVisual>),
    >,
) {
    let idle = config
        .as_ref()
        .map(|c| c.animation.idle_clip.clone())
        .unwrap_or_else(|| IDLE_CLIP.to_string());
    let physics = AvianQuery {
        spatial: &spatial_query,
    };

    let mut camera = cameras.single_mut().ok();
    let camera_rotation = camera
        .as_ref()
        .map(|(transform, _)| transform.rotation)
        .unwrap_or(Quat::IDENTITY);
    let mut detached_target = CameraTarget::default();

    let ctx = TickContext {
        delta: time.delta_secs(),
        now: real_time.elapsed_secs_f64(),
        camera_rotation,
    };

    for (entity, transform, mut velocity, mass, mut controller, parts) in bodies.iter_mut() {
        if !mounted.contains(parts.instance) {
            continue;
        }

        let mut body = AvianBody {
            entity,
            position: transform.translation,
            velocity: &mut velocity,
            mass: mass.0,
        };
        let mut facing = visuals
            .get(parts.visual)
            .map(|t| t.rotation)
            .unwrap_or(Quat::IDENTITY);
        let target = match camera.as_mut() {
            Some((_, target)) => &mut **target,
            None => &mut detached_target,
        };

        let report = match controller.tick(
            &input,
            &ctx,
            Some(&physics),
            Some(&mut body),
            &mut facing,
            target,
        ) {
            Ok(report) => report,
            Err(e) => {
                trace!("Locomotion tick skipped for {:?}: {}", entity, e);
                continue;
            }
        };

        if let Ok(mut visual) = visuals.get_mut(parts.visual) {
            visual.rotation = facing;
        }

        let clip = match report.clip {
            ClipChoice::Locomotion => picker
                .as_ref()
                .and_then(|p| p.selected())
                .unwrap_or(idle.as_str()),
            ClipChoice::Rest => idle.as_str(),
        };
        if let Ok(mut animation) = animations.get_mut(parts.instance) {
            animation.request(clip);
        }

        if report.jumped {
            debug!("🦘 Jump impulse applied to {:?}", entity);
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Calculate jump height from launch speed and gravity.
///
/// Uses kinematic equation: h = v² / (2g)
pub fn calculate_jump_height(jump_speed: f32, gravity: f32) -> f32 {
    if gravity.abs() < 0.001 {
        return f32::INFINITY; // No gravity = infinite jump
    }

    (jump_speed * jump_speed) / (2.0 * gravity.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use bevy::time::TimeUpdateStrategy;
    use promptmesh_common::assets::{ModelAsset, ModelClip};
    use promptmesh_common::services::ClipBlender;
    use std::sync::Arc;
    use std::time::Duration;

    /// Headless app with Avian and a static ground slab whose top is y = 0
    fn locomotion_app() -> App {
        let mut app = App::new();
        app.add_plugins((
            MinimalPlugins,
            TransformPlugin,
            bevy::asset::AssetPlugin::default(),
            bevy::scene::ScenePlugin,
            PhysicsPlugins::default(),
        ))
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f32(
            1.0 / 60.0,
        )))
        .insert_resource(PromptMeshConfig::default())
        .add_plugins(crate::PromptMeshRuntimePlugin);
        app.finish();

        app.world_mut().spawn((
            RigidBody::Static,
            Collider::cuboid(50.0, 0.1, 50.0),
            Transform::from_xyz(0.0, -0.05, 0.0),
        ));
        app
    }

    fn spawn_body(app: &mut App, feet: Vec3) -> (Entity, AvatarParts) {
        let body = app
            .world_mut()
            .run_system_once(move |mut commands: Commands, config: Res<PromptMeshConfig>| {
                spawn_avatar_body(&mut commands, &AvatarDescriptor::default(), &config, feet)
            })
            .unwrap();
        let parts = *app.world().get::<AvatarParts>(body).unwrap();
        (body, parts)
    }

    /// What attaching a loaded model leaves on the instance
    fn mount_model(app: &mut App, parts: &AvatarParts) {
        let asset = Arc::new(ModelAsset {
            source_id: "models/Walking.glb".to_string(),
            scene: Handle::default(),
            clips: vec![ModelClip {
                name: "Walking".to_string(),
                handle: Handle::default(),
            }],
        });
        app.world_mut().entity_mut(parts.instance).insert((
            ModelInstance { asset },
            AvatarAnimation::new(ClipBlender::new(&["Walking".to_string()], IDLE_CLIP, 0.2)),
        ));
    }

    fn report(app: &App, body: Entity) -> Option<crate::character::TickReport> {
        app.world()
            .get::<LocomotionController>(body)
            .and_then(|c| c.last_report().copied())
    }

    #[test]
    fn test_jump_height() {
        // Default: impulse 10 on mass 1, gravity 9.81
        let height = calculate_jump_height(10.0, 9.81);
        assert!((height - 5.10).abs() < 0.01);
        assert_eq!(calculate_jump_height(10.0, 0.0), f32::INFINITY);
    }

    #[test]
    fn test_impulse_scales_by_mass() {
        let mut velocity = LinearVelocity(Vec3::new(1.0, 0.0, 0.0));
        let mut body = AvianBody {
            entity: Entity::PLACEHOLDER,
            position: Vec3::ZERO,
            velocity: &mut velocity,
            mass: 2.0,
        };

        body.apply_impulse(Vec3::Y * 10.0);
        body.set_linear_velocity(Vec3::new(0.0, body.linear_velocity().y, 3.0));

        assert_eq!(velocity.0, Vec3::new(0.0, 5.0, 3.0));
    }

    #[test]
    fn test_camera_snaps_to_new_body() {
        let mut app = App::new();
        app.add_systems(Update, snap_camera_on_mount);

        let camera = app
            .world_mut()
            .spawn((Camera::default(), CameraTarget::new(Vec3::ZERO)))
            .id();
        app.world_mut().spawn((
            AvatarBody,
            Transform::from_xyz(8.0, 1.3, -4.0),
            LocomotionController::default(),
        ));

        app.update();

        let target = app.world().get::<CameraTarget>(camera).unwrap();
        assert!((target.point - Vec3::new(8.0, 1.0, -4.0)).length() < 1e-5);
    }

    #[test]
    fn test_ground_ray_sees_ground_but_not_own_capsule() {
        let mut app = locomotion_app();
        let (resting, resting_parts) = spawn_body(&mut app, Vec3::ZERO);
        let (lifted, lifted_parts) = spawn_body(&mut app, Vec3::new(10.0, 5.0, 0.0));
        mount_model(&mut app, &resting_parts);
        mount_model(&mut app, &lifted_parts);

        for _ in 0..30 {
            app.update();
        }

        let resting = report(&app, resting).unwrap();
        assert!(resting.grounded);
        // The ray starts inside the capsule; a hit at ~0 would be the body itself
        let distance = resting.ground_hit.unwrap().distance;
        assert!(distance > 0.05 && distance < 0.2, "hit at {}", distance);

        let lifted = report(&app, lifted).unwrap();
        assert!(!lifted.grounded);
        assert!(lifted.ground_hit.is_none());
    }

    #[test]
    fn test_moving_tick_requests_picked_clip_and_turns_visual() {
        let mut app = locomotion_app();
        let mut picker = ClipPicker::new(IDLE_CLIP);
        picker.set_catalog(vec![IDLE_CLIP.to_string(), "Walking".to_string()]);
        assert_eq!(picker.selected(), Some("Walking"));
        app.insert_resource(picker);

        let (body, parts) = spawn_body(&mut app, Vec3::ZERO);
        mount_model(&mut app, &parts);
        app.insert_resource(InputState {
            right: true,
            ..default()
        });

        for _ in 0..10 {
            app.update();
        }

        let world = app.world();
        let animation = world.get::<AvatarAnimation>(parts.instance).unwrap();
        assert_eq!(animation.blender.active_clip(), Some("Walking"));

        // Turning toward +X
        let visual = world.get::<Transform>(parts.visual).unwrap();
        assert!(visual.rotation.angle_between(Quat::IDENTITY) > 0.1);
        assert!((visual.rotation * Vec3::Z).x > 0.0);

        assert!(world.get::<LinearVelocity>(body).unwrap().x > 4.0);
    }

    #[test]
    fn test_body_waits_for_model_instance() {
        let mut app = locomotion_app();
        app.insert_resource(InputState {
            forward: true,
            ..default()
        });
        let (body, parts) = spawn_body(&mut app, Vec3::ZERO);

        for _ in 0..10 {
            app.update();
        }

        assert!(report(&app, body).is_none());
        let velocity = app.world().get::<LinearVelocity>(body).unwrap();
        assert!(velocity.x.abs() < 1e-3 && velocity.z.abs() < 1e-3);
        assert_eq!(
            app.world().get::<Transform>(parts.visual).unwrap().rotation,
            Quat::IDENTITY
        );

        // Mounting the model starts the ticks
        mount_model(&mut app, &parts);
        app.update();
        let mounted = report(&app, body).unwrap();
        assert!(mounted.movement.z < 0.0);
    }
}
