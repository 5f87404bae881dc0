//! # PromptMesh Runtime
//!
//! Avatar locomotion for the PromptMesh client.
//!
//! ## Modules
//!
//! - [`character`]: Engine-independent locomotion tick (ground check, movement, jump cooldown)
//! - [`physics`]: Avian adapters, avatar body spawning, per-frame locomotion system
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      PromptMesh Runtime                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Locomotion Controller                                          │
//! │  ├── Reads InputState and the camera's yaw                      │
//! │  ├── Checks the ground through PhysicsQuery                     │
//! │  └── Writes velocity, facing, clip choice, camera target        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Physics Integration                                            │
//! │  ├── Avian ray casts and velocities behind the controller seams │
//! │  ├── Capsule body with a visual child and a model instance      │
//! │  └── Runs before the camera rig places the camera               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod character;
pub mod physics;

use bevy::prelude::*;

// ============================================================================
// Runtime Plugin
// ============================================================================

/// Main runtime plugin.
///
/// Insert `PromptMeshConfig` before adding it so the jump estimate is logged.
///
/// # Example
/// ```rust,ignore
/// use bevy::prelude::*;
/// use promptmesh_runtime::PromptMeshRuntimePlugin;
///
/// fn main() {
///     App::new()
///         .add_plugins(DefaultPlugins)
///         .add_plugins(avian3d::prelude::PhysicsPlugins::default())
///         .add_plugins(PromptMeshRuntimePlugin)
///         .run();
/// }
/// ```
pub struct PromptMeshRuntimePlugin;

impl Plugin for PromptMeshRuntimePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<character::InputState>()
            .register_type::<character::InputState>()
            .register_type::<character::LocomotionController>()
            .register_type::<physics::AvatarBody>()
            .register_type::<physics::AvatarVisual>();

        app.add_plugins(physics::RuntimePhysicsPlugin);

        info!("PromptMesh Runtime initialized");
    }
}

// ============================================================================
// Prelude
// ============================================================================

/// Convenient re-exports for common runtime types.
pub mod prelude {
    pub use super::character::{
        ClipChoice, InputState, LocomotionController, LocomotionSettings, TickContext, TickReport,
    };
    pub use super::physics::{
        spawn_avatar_body, AvatarBody, AvatarParts, AvatarVisual, RuntimePhysicsPlugin,
    };
    pub use super::PromptMeshRuntimePlugin;
}
