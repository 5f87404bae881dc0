//! PromptMesh Client - walk an avatar around the park
//!
//! ## Usage
//! ```text
//! promptmesh-client [config.toml]
//! ```
//! Without an argument the client reads `promptmesh.toml` from the working directory, and
//! falls back to defaults when it is missing.
//!
//! ## Plugins
//! - ModelResourcePlugin: GLB cache, per-body instances, scale normalization
//! - SharedAnimationPlugin: cross-faded clip playback and the clip picker
//! - PromptMeshRuntimePlugin: locomotion controller on Avian3D bodies
//! - CameraControllerPlugin: orbit camera around the follow target
//! - ParkPlugin / PlayerServicePlugin / InputPlugin: world composition

mod plugins;

use avian3d::prelude::*;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy_camera_controller::CameraControllerPlugin;
use plugins::{InputPlugin, ParkPlugin, PlayerServicePlugin};
use promptmesh_common::assets::ModelResourcePlugin;
use promptmesh_common::plugins::SharedAnimationPlugin;
use promptmesh_common::PromptMeshConfig;
use promptmesh_runtime::PromptMeshRuntimePlugin;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "promptmesh.toml";

fn main() {
    // Parse command line args
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = PromptMeshConfig::load_or_default(&config_path);

    App::new()
        // Core Bevy plugins
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: plugins::player_plugin::window_title(&config),
                        resolution: bevy::window::WindowResolution::new(1280, 720),
                        present_mode: bevy::window::PresentMode::Fifo, // VSync
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    file_path: config.world.asset_root.clone(),
                    ..default()
                })
                .set(LogPlugin {
                    filter: config.world.log_filter.clone(),
                    ..default()
                }),
        )
        // Config first: plugins below read it while building
        .insert_resource(config.clone())
        // Physics (Avian3D)
        .add_plugins(PhysicsPlugins::default())
        .insert_resource(Gravity(Vec3::NEG_Y * config.world.gravity))
        // Avatar subsystem
        .add_plugins(ModelResourcePlugin)
        .add_plugins(SharedAnimationPlugin)
        .add_plugins(PromptMeshRuntimePlugin)
        .add_plugins(CameraControllerPlugin)
        // World composition
        .add_plugins(InputPlugin)
        .add_plugins(ParkPlugin)
        .add_plugins(PlayerServicePlugin)
        .run();
}
