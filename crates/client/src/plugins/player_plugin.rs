//! PlayerService Plugin - the session's avatar
//!
//! Owns the one locomotion-controlled body of the session:
//! - Picks the startup avatar from the configuration (preset, generated, or the stored upload)
//! - Swaps avatars on `F1`..`F3` or an `AvatarSelected` message
//! - Tears the old body down first, so its upload lease and cached model are released
//! - Reports model load failures in the window title
//!
//! ## Swap
//!
//! ```text
//! AvatarSelected ──▶ despawn old body (lease dropped, cache evicted)
//!                └─▶ spawn_avatar_body at the spawn point ──▶ camera snaps on mount
//! ```

use bevy::prelude::*;
use promptmesh_common::assets::{AssetLoadFailed, ModelCache};
use promptmesh_common::avatar::{AvatarStore, FileAvatarStore, DEFAULT_PRESET};
use promptmesh_common::{AvatarDescriptor, AvatarError, PromptMeshConfig};
use promptmesh_runtime::physics::spawn_avatar_body;
use std::path::PathBuf;

/// `default_avatar` value selecting the stored upload
pub const UPLOADED_AVATAR: &str = "uploaded";

/// `default_avatar` value selecting the generation placeholder
pub const GENERATED_AVATAR: &str = "generated";

/// Feet position of every freshly spawned body
pub const SPAWN_POINT: Vec3 = Vec3::ZERO;

// ============================================================================
// Plugin
// ============================================================================

pub struct PlayerServicePlugin;

impl Plugin for PlayerServicePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<AvatarLibrary>() {
            let library = app
                .world()
                .get_resource::<PromptMeshConfig>()
                .map(AvatarLibrary::from_config)
                .unwrap_or_else(|| AvatarLibrary::new(PathBuf::from("assets"), None));
            app.insert_resource(library);
        }

        app.init_resource::<ActiveAvatar>()
            .add_message::<AvatarSelected>()
            .add_systems(Startup, select_startup_avatar)
            .add_systems(
                Update,
                (
                    avatar_hotkeys,
                    apply_avatar_selection,
                    surface_asset_failures,
                )
                    .chain(),
            );
    }
}

// ============================================================================
// Resources & Messages
// ============================================================================

/// Request to replace the session's avatar
#[derive(Message, Debug, Clone)]
pub struct AvatarSelected {
    pub descriptor: AvatarDescriptor,
}

/// The session's current body
#[derive(Resource, Debug, Default)]
pub struct ActiveAvatar {
    pub body: Option<Entity>,
}

/// Where avatars come from: presets on disk and the uploaded-avatar store
#[derive(Resource)]
pub struct AvatarLibrary {
    asset_root: PathBuf,
    store: Option<Box<dyn AvatarStore + Send + Sync>>,
}

impl AvatarLibrary {
    pub fn new(asset_root: PathBuf, store: Option<Box<dyn AvatarStore + Send + Sync>>) -> Self {
        Self { asset_root, store }
    }

    /// File store in the platform data directory
    pub fn from_config(config: &PromptMeshConfig) -> Self {
        let store = FileAvatarStore::default_dir()
            .map(|dir| Box::new(FileAvatarStore::new(dir)) as Box<dyn AvatarStore + Send + Sync>);
        if store.is_none() {
            warn!("⚠️ No data directory, uploaded avatars are unavailable");
        }
        Self::new(PathBuf::from(&config.world.asset_root), store)
    }

    /// Lease the stored upload, if there is one
    pub fn uploaded(&self) -> Result<Option<AvatarDescriptor>, AvatarError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.get()? {
            Some(stored) => Ok(Some(AvatarDescriptor::from_stored(&self.asset_root, &stored)?)),
            None => Ok(None),
        }
    }

    /// Descriptor for a `default_avatar`-style id. A missing upload falls back to the
    /// default preset.
    pub fn descriptor_for(&self, id: &str) -> AvatarDescriptor {
        match id {
            UPLOADED_AVATAR => match self.uploaded() {
                Ok(Some(descriptor)) => descriptor,
                Ok(None) => {
                    warn!("⚠️ No uploaded avatar stored, using '{}'", DEFAULT_PRESET);
                    AvatarDescriptor::predefined(DEFAULT_PRESET)
                }
                Err(e) => {
                    error!("❌ Uploaded avatar unavailable: {}", e);
                    AvatarDescriptor::predefined(DEFAULT_PRESET)
                }
            },
            GENERATED_AVATAR => AvatarDescriptor::generated("park", None),
            preset => AvatarDescriptor::predefined(preset),
        }
    }
}

// ============================================================================
// Systems
// ============================================================================

fn select_startup_avatar(
    config: Res<PromptMeshConfig>,
    library: Res<AvatarLibrary>,
    mut selections: MessageWriter<AvatarSelected>,
) {
    let descriptor = library.descriptor_for(&config.world.default_avatar);
    info!("🎮 Startup avatar: {}", descriptor.name);
    info!("🎮 Controls: WASD/Arrows=Move, SPACE=Jump, [ ]/1-9=Clip, F1-F3=Avatar");
    info!("   Right-click + drag = Orbit camera, Scroll = Zoom");
    selections.write(AvatarSelected { descriptor });
}

fn avatar_hotkeys(
    keyboard: Res<ButtonInput<KeyCode>>,
    library: Res<AvatarLibrary>,
    mut selections: MessageWriter<AvatarSelected>,
) {
    let id = if keyboard.just_pressed(KeyCode::F1) {
        DEFAULT_PRESET
    } else if keyboard.just_pressed(KeyCode::F2) {
        GENERATED_AVATAR
    } else if keyboard.just_pressed(KeyCode::F3) {
        UPLOADED_AVATAR
    } else {
        return;
    };

    selections.write(AvatarSelected {
        descriptor: library.descriptor_for(id),
    });
}

/// Despawn a body and forget its uploaded model
pub fn teardown_avatar(
    commands: &mut Commands,
    cache: &mut ModelCache,
    body: Entity,
    descriptor: Option<&AvatarDescriptor>,
) {
    if let Some(descriptor) = descriptor.filter(|d| d.is_uploaded()) {
        let source_id = descriptor.resolve().source_id;
        if cache.evict(&source_id) {
            debug!("Evicted uploaded model '{}'", source_id);
        }
    }
    commands.entity(body).despawn();
}

fn apply_avatar_selection(
    mut commands: Commands,
    mut selections: MessageReader<AvatarSelected>,
    config: Res<PromptMeshConfig>,
    mut active: ResMut<ActiveAvatar>,
    mut cache: ResMut<ModelCache>,
    descriptors: Query<&AvatarDescriptor>,
) {
    // Only the latest request matters
    let Some(selection) = selections.read().last().cloned() else {
        return;
    };

    if let Some(old) = active.body.take() {
        teardown_avatar(&mut commands, &mut cache, old, descriptors.get(old).ok());
    }

    let body = spawn_avatar_body(&mut commands, &selection.descriptor, &config, SPAWN_POINT);
    active.body = Some(body);

    info!("🔄 Avatar is now '{}'", selection.descriptor.name);
}

fn surface_asset_failures(
    mut failures: MessageReader<AssetLoadFailed>,
    config: Res<PromptMeshConfig>,
    mut windows: Query<&mut Window>,
) {
    let Some(failure) = failures.read().last() else {
        return;
    };

    for mut window in windows.iter_mut() {
        window.title = format!(
            "{} · avatar unavailable ({})",
            window_title(&config),
            failure.source_id
        );
    }
}

/// Title with the static online counter
pub fn window_title(config: &PromptMeshConfig) -> String {
    format!("PromptMesh Park · {} online", config.world.online_users)
}
