//! # Park Plugin (Client)
//!
//! Static world: the ground collider, scene dressing, lights and the orbit camera.
//!
//! ```text
//!        z-
//!   T(-5,-5)      T(4,-4)
//!          B(2,-2)
//!     ─────── F(0,0) ─────── x+
//!          B(-2,2)
//!   T(-3,6)       T(6,5)
//!        z+   camera (0,1.5,5)
//! ```
//!
//! Only the ground collides. Dressing is visual.

use avian3d::prelude::*;
use bevy::core_pipeline::tonemapping::Tonemapping;
use bevy::light::{GlobalAmbientLight, NotShadowCaster};
use bevy::prelude::*;
use bevy_camera_controller::{CameraTarget, OrbitCamera};
use promptmesh_common::PromptMeshConfig;

pub struct ParkPlugin;

impl Plugin for ParkPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Startup,
            (spawn_ground, spawn_park_dressing, spawn_lights, spawn_camera_rig),
        );
    }
}

const TREES: [Vec3; 4] = [
    Vec3::new(-5.0, 0.0, -5.0),
    Vec3::new(-3.0, 0.0, 6.0),
    Vec3::new(4.0, 0.0, -4.0),
    Vec3::new(6.0, 0.0, 5.0),
];
const BENCHES: [Vec3; 2] = [Vec3::new(2.0, 0.1, -2.0), Vec3::new(-2.0, 0.1, 2.0)];
const FOUNTAIN: Vec3 = Vec3::new(0.0, 0.25, 0.0);

const CAMERA_EYE: Vec3 = Vec3::new(0.0, 1.5, 5.0);
const CAMERA_LOOK_AT: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Ground thickness below y = 0
const GROUND_THICKNESS: f32 = 0.1;

// ============================================================================
// Components
// ============================================================================

/// Static ground plane
#[derive(Component, Debug)]
pub struct Ground;

/// Root of one piece of scene dressing
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dressing {
    Tree,
    Bench,
    Fountain,
}

// ============================================================================
// Startup Systems
// ============================================================================

fn flat_material(materials: &mut Assets<StandardMaterial>, color: Color) -> Handle<StandardMaterial> {
    materials.add(StandardMaterial {
        base_color: color,
        perceptual_roughness: 0.9,
        metallic: 0.0,
        ..default()
    })
}

/// Grass plane with a static box collider whose top face is y = 0
pub fn spawn_ground(
    mut commands: Commands,
    config: Res<PromptMeshConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let size = config.world.ground_size;

    commands
        .spawn((
            Name::new("Ground"),
            Ground,
            Mesh3d(meshes.add(Plane3d::default().mesh().size(size, size))),
            MeshMaterial3d(flat_material(&mut materials, Color::srgb_u8(0x6a, 0xbe, 0x4f))),
            Transform::default(),
        ))
        .with_child((
            RigidBody::Static,
            Collider::cuboid(size, GROUND_THICKNESS, size),
            Transform::from_xyz(0.0, -GROUND_THICKNESS / 2.0, 0.0),
        ));

    info!("🌳 Ground {}x{} ready", size, size);
}

/// Trees, benches and the fountain
pub fn spawn_park_dressing(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let trunk_mesh = meshes.add(Cylinder::new(0.2, 2.0));
    let leaves_mesh = meshes.add(Cone::new(1.0, 2.5));
    let trunk_material = flat_material(&mut materials, Color::srgb_u8(0x8b, 0x5a, 0x2b));
    let leaves_material = flat_material(&mut materials, Color::srgb_u8(0x37, 0x92, 0x37));

    for (i, position) in TREES.iter().enumerate() {
        commands.spawn((
            Name::new(format!("Tree {}", i + 1)),
            Dressing::Tree,
            Transform::from_translation(*position),
            Visibility::default(),
            children![
                (
                    Mesh3d(trunk_mesh.clone()),
                    MeshMaterial3d(trunk_material.clone()),
                    Transform::from_xyz(0.0, 1.0, 0.0),
                ),
                (
                    Mesh3d(leaves_mesh.clone()),
                    MeshMaterial3d(leaves_material.clone()),
                    Transform::from_xyz(0.0, 2.5, 0.0),
                ),
            ],
        ));
    }

    let seat_mesh = meshes.add(Cuboid::new(2.0, 0.2, 0.5));
    let leg_mesh = meshes.add(Cuboid::new(0.2, 1.0, 0.2));
    let bench_material = flat_material(&mut materials, Color::srgb_u8(0x55, 0x55, 0x55));

    for (i, position) in BENCHES.iter().enumerate() {
        commands.spawn((
            Name::new(format!("Bench {}", i + 1)),
            Dressing::Bench,
            Transform::from_translation(*position),
            Visibility::default(),
            children![
                (Mesh3d(seat_mesh.clone()), MeshMaterial3d(bench_material.clone())),
                (
                    Mesh3d(leg_mesh.clone()),
                    MeshMaterial3d(bench_material.clone()),
                    Transform::from_xyz(-0.9, -0.6, 0.0),
                    NotShadowCaster,
                ),
                (
                    Mesh3d(leg_mesh.clone()),
                    MeshMaterial3d(bench_material.clone()),
                    Transform::from_xyz(0.9, -0.6, 0.0),
                    NotShadowCaster,
                ),
            ],
        ));
    }

    let water_material = materials.add(StandardMaterial {
        base_color: Color::srgba_u8(0x4f, 0xc3, 0xf7, 204),
        alpha_mode: AlphaMode::Blend,
        perceptual_roughness: 0.9,
        ..default()
    });
    commands.spawn((
        Name::new("Fountain"),
        Dressing::Fountain,
        Transform::from_translation(FOUNTAIN),
        Visibility::default(),
        children![
            (
                Mesh3d(meshes.add(Cylinder::new(1.5, 0.5))),
                MeshMaterial3d(flat_material(&mut materials, Color::srgb_u8(0xcc, 0xcc, 0xcc))),
            ),
            (
                Mesh3d(meshes.add(Cylinder::new(1.2, 0.1))),
                MeshMaterial3d(water_material),
                Transform::from_xyz(0.0, 0.3, 0.0),
                NotShadowCaster,
            ),
        ],
    ));
}

/// Ambient fill plus one shadow-casting sun
pub fn spawn_lights(mut commands: Commands) {
    commands.insert_resource(GlobalAmbientLight {
        color: Color::WHITE,
        brightness: 600.0,
        affects_lightmapped_meshes: true,
    });

    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            illuminance: 12000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 15.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// The orbit camera, looking at the spawn point
pub fn spawn_camera_rig(mut commands: Commands, config: Res<PromptMeshConfig>) {
    let camera = &config.camera;
    let eye = CAMERA_LOOK_AT + (CAMERA_EYE - CAMERA_LOOK_AT).normalize() * camera.distance;
    let orbit = OrbitCamera {
        min_polar: camera.min_polar,
        max_polar: camera.max_polar,
        min_distance: camera.min_distance,
        max_distance: camera.max_distance,
        sensitivity: camera.sensitivity,
        zoom_speed: camera.zoom_speed,
        ..default()
    }
    .looking_from(eye, CAMERA_LOOK_AT);

    commands.spawn((
        Name::new("Camera"),
        Camera3d::default(),
        Tonemapping::Reinhard,
        Projection::Perspective(PerspectiveProjection {
            fov: camera.fov_degrees.to_radians(),
            near: 0.1,
            far: 1000.0,
            ..default()
        }),
        Transform::from_translation(eye).looking_at(CAMERA_LOOK_AT, Vec3::Y),
        orbit,
        CameraTarget::new(CAMERA_LOOK_AT),
    ));
}
