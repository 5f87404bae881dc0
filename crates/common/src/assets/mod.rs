//! # Avatar Model Assets
//!
//! ## Table of Contents
//!
//! 1. **ModelCache** - One `ModelAsset` per source id, loaded once and never mutated
//! 2. **ModelInstance** - Per-body scene clone with its own bone state
//! 3. **Normalization** - One-shot rescale of externally sourced instances to a canonical height
//!
//! ```text
//! PendingModel ──(cache Loaded)──▶ SceneRoot + ModelInstance ──▶ InstanceMesh tags
//!                                              │                        │
//!                                              └──── NormalizeScale ◀───┘ (uploads only)
//! ```

mod model;
mod normalize;

pub use model::*;
pub use normalize::*;

use bevy::prelude::*;

/// Loading, instancing and normalization of avatar models
pub struct ModelResourcePlugin;

impl Plugin for ModelResourcePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelCache>()
            .add_message::<AssetLoadFailed>()
            .add_systems(
                Update,
                (
                    poll_model_loads,
                    attach_model_instances,
                    mark_shadow_casters,
                    normalize_model_scale,
                )
                    .chain(),
            );
    }
}
