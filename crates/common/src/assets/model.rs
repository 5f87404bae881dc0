//! Model cache and per-body instances.

use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::light::NotShadowCaster;
use bevy::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::AvatarError;

// ============================================================================
// Model Asset
// ============================================================================

/// Model load state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelLoadState {
    /// Never requested
    NotLoaded,
    /// Currently loading
    Loading,
    /// Loaded successfully
    Loaded,
    /// Failed to load
    Failed(String),
}

/// Named clip inside a model container
#[derive(Debug, Clone)]
pub struct ModelClip {
    pub name: String,
    pub handle: Handle<AnimationClip>,
}

/// Scene plus ordered clips of one loaded container. Shared read-only by every instance.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    pub source_id: String,
    pub scene: Handle<Scene>,
    pub clips: Vec<ModelClip>,
}

impl ModelAsset {
    pub fn from_gltf(source_id: &str, gltf: &Gltf) -> Result<Self, AvatarError> {
        let scene = gltf
            .default_scene
            .clone()
            .or_else(|| gltf.scenes.first().cloned())
            .ok_or_else(|| AvatarError::asset_load(source_id, "container has no scene"))?;

        let ids: Vec<_> = gltf.animations.iter().map(|h| h.id()).collect();
        let names = order_clip_names(
            &ids,
            gltf.named_animations
                .iter()
                .map(|(name, handle)| (name.as_ref(), handle.id())),
        );

        let clips = names
            .into_iter()
            .zip(gltf.animations.iter().cloned())
            .map(|(name, handle)| ModelClip { name, handle })
            .collect();

        Ok(Self {
            source_id: source_id.to_string(),
            scene,
            clips,
        })
    }

    /// Clip names in container order
    pub fn clip_names(&self) -> Vec<String> {
        self.clips.iter().map(|c| c.name.clone()).collect()
    }
}

/// Names for clips in container order. Unnamed clips get `Action###`.
pub fn order_clip_names<'a, Id>(
    ordered: &[Id],
    named: impl IntoIterator<Item = (&'a str, Id)>,
) -> Vec<String>
where
    Id: Eq + Hash + Copy,
{
    let mut names: Vec<String> = (0..ordered.len()).map(|i| format!("Action{i:03}")).collect();

    let index_by_id: HashMap<Id, usize> =
        ordered.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    for (name, id) in named {
        if let Some(&idx) = index_by_id.get(&id) {
            names[idx] = name.to_string();
        }
    }

    names
}

// ============================================================================
// Model Cache
// ============================================================================

struct CachedModel {
    handle: Handle<Gltf>,
    state: ModelLoadState,
    asset: Option<Arc<ModelAsset>>,
}

/// Loaded containers keyed by source id
#[derive(Resource, Default)]
pub struct ModelCache {
    models: HashMap<String, CachedModel>,
}

impl ModelCache {
    /// Start loading `source_id` unless it is already known
    pub fn load(&mut self, asset_server: &AssetServer, source_id: &str) -> ModelLoadState {
        if let Some(cached) = self.models.get(source_id) {
            return cached.state.clone();
        }

        info!("📦 Loading avatar model '{}'", source_id);
        let handle: Handle<Gltf> = asset_server.load(source_id.to_string());
        self.track(source_id, handle);
        ModelLoadState::Loading
    }

    /// Track an in-flight load
    pub fn track(&mut self, source_id: &str, handle: Handle<Gltf>) {
        self.models.insert(
            source_id.to_string(),
            CachedModel {
                handle,
                state: ModelLoadState::Loading,
                asset: None,
            },
        );
    }

    pub fn state(&self, source_id: &str) -> ModelLoadState {
        self.models
            .get(source_id)
            .map(|m| m.state.clone())
            .unwrap_or(ModelLoadState::NotLoaded)
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<ModelAsset>> {
        self.models.get(source_id).and_then(|m| m.asset.clone())
    }

    /// Forget a source so the next `load` starts over
    pub fn evict(&mut self, source_id: &str) -> bool {
        self.models.remove(source_id).is_some()
    }

    pub fn resolve_loaded(&mut self, source_id: &str, asset: ModelAsset) {
        if let Some(cached) = self.models.get_mut(source_id) {
            cached.state = ModelLoadState::Loaded;
            cached.asset = Some(Arc::new(asset));
        }
    }

    pub fn resolve_failed(&mut self, source_id: &str, error: &AvatarError) {
        if let Some(cached) = self.models.get_mut(source_id) {
            cached.state = ModelLoadState::Failed(error.to_string());
            cached.asset = None;
        }
    }

    fn loading(&self) -> impl Iterator<Item = (&String, &Handle<Gltf>)> {
        self.models
            .iter()
            .filter(|(_, m)| m.state == ModelLoadState::Loading)
            .map(|(id, m)| (id, &m.handle))
    }
}

/// Published when a model source cannot be loaded
#[derive(Message, Debug, Clone)]
pub struct AssetLoadFailed {
    pub source_id: String,
    pub error: AvatarError,
}

/// Resolve in-flight loads into assets or failures
pub fn poll_model_loads(
    asset_server: Res<AssetServer>,
    gltfs: Res<Assets<Gltf>>,
    mut cache: ResMut<ModelCache>,
    mut failures: MessageWriter<AssetLoadFailed>,
) {
    let mut finished: Vec<(String, Result<ModelAsset, AvatarError>)> = Vec::new();

    for (source_id, handle) in cache.loading() {
        if let Some(gltf) = gltfs.get(handle) {
            finished.push((source_id.clone(), ModelAsset::from_gltf(source_id, gltf)));
        } else if let LoadState::Failed(err) = asset_server.load_state(handle) {
            finished.push((source_id.clone(), Err(AvatarError::asset_load(source_id, err))));
        }
    }

    for (source_id, result) in finished {
        match result {
            Ok(asset) => {
                info!(
                    "✅ Avatar model '{}' loaded with {} clip(s)",
                    source_id,
                    asset.clips.len()
                );
                cache.resolve_loaded(&source_id, asset);
            }
            Err(error) => {
                error!("❌ {}", error);
                cache.resolve_failed(&source_id, &error);
                failures.write(AssetLoadFailed { source_id, error });
            }
        }
    }
}

// ============================================================================
// Model Instances
// ============================================================================

/// Entity waiting for its model to finish loading
#[derive(Component, Debug, Clone)]
pub struct PendingModel {
    pub source_id: String,
}

/// Cloned scene of a `ModelAsset`. The scene spawner duplicates the node graph (bones
/// included), so animating one instance never touches another.
#[derive(Component, Debug, Clone)]
pub struct ModelInstance {
    pub asset: Arc<ModelAsset>,
}

/// Mesh surface belonging to a model instance
#[derive(Component, Debug, Clone, Copy)]
pub struct InstanceMesh {
    pub instance: Entity,
}

/// Turn `entity` into an instance of `asset`
pub fn instantiate(commands: &mut Commands, entity: Entity, asset: &Arc<ModelAsset>) {
    commands.entity(entity).insert((
        SceneRoot(asset.scene.clone()),
        ModelInstance {
            asset: Arc::clone(asset),
        },
    ));
}

/// Instantiate pending entities whose model is ready
pub fn attach_model_instances(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut cache: ResMut<ModelCache>,
    pending: Query<(Entity, &PendingModel)>,
) {
    for (entity, pending_model) in pending.iter() {
        match cache.load(&asset_server, &pending_model.source_id) {
            ModelLoadState::Loaded => {
                let Some(asset) = cache.get(&pending_model.source_id) else {
                    continue;
                };
                instantiate(&mut commands, entity, &asset);
                commands.entity(entity).remove::<PendingModel>();
            }
            ModelLoadState::Failed(reason) => {
                warn!(
                    "⚠️ Avatar model '{}' unavailable, body stays empty: {}",
                    pending_model.source_id, reason
                );
                commands.entity(entity).remove::<PendingModel>();
            }
            ModelLoadState::Loading | ModelLoadState::NotLoaded => {}
        }
    }
}

/// Walk up the hierarchy to the owning instance
fn find_instance_ancestor(
    entity: Entity,
    parents: &Query<&ChildOf>,
    instances: &Query<(), With<ModelInstance>>,
) -> Option<Entity> {
    let mut current = entity;
    loop {
        if instances.contains(current) {
            return Some(current);
        }
        current = parents.get(current).ok()?.parent();
    }
}

/// Tag freshly spawned instance meshes and make them cast shadows
pub fn mark_shadow_casters(
    mut commands: Commands,
    meshes: Query<Entity, (Added<Mesh3d>, Without<InstanceMesh>)>,
    parents: Query<&ChildOf>,
    instances: Query<(), With<ModelInstance>>,
) {
    for mesh_entity in meshes.iter() {
        let Some(instance) = find_instance_ancestor(mesh_entity, &parents, &instances) else {
            continue;
        };
        commands
            .entity(mesh_entity)
            .remove::<NotShadowCaster>()
            .insert(InstanceMesh { instance });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset(source_id: &str) -> ModelAsset {
        ModelAsset {
            source_id: source_id.to_string(),
            scene: Handle::default(),
            clips: vec![ModelClip {
                name: "Walking".to_string(),
                handle: Handle::default(),
            }],
        }
    }

    #[test]
    fn test_clip_names_follow_container_order() {
        let ordered = [10u32, 20, 30];
        let names = order_clip_names(&ordered, [("TPose", 30), ("Walking", 10)]);
        assert_eq!(names, vec!["Walking", "Action001", "TPose"]);
    }

    #[test]
    fn test_cache_states() {
        let mut cache = ModelCache::default();
        assert_eq!(cache.state("models/Walking.glb"), ModelLoadState::NotLoaded);

        cache.track("models/Walking.glb", Handle::default());
        assert_eq!(cache.state("models/Walking.glb"), ModelLoadState::Loading);
        assert!(cache.get("models/Walking.glb").is_none());

        cache.resolve_loaded("models/Walking.glb", sample_asset("models/Walking.glb"));
        assert_eq!(cache.state("models/Walking.glb"), ModelLoadState::Loaded);

        let first = cache.get("models/Walking.glb").unwrap();
        let second = cache.get("models/Walking.glb").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.clip_names(), vec!["Walking"]);
    }

    #[test]
    fn test_failed_load_is_remembered_until_evicted() {
        let mut cache = ModelCache::default();
        cache.track("uploads/broken.glb", Handle::default());
        cache.resolve_failed(
            "uploads/broken.glb",
            &AvatarError::asset_load("uploads/broken.glb", "invalid glTF header"),
        );

        assert!(matches!(
            cache.state("uploads/broken.glb"),
            ModelLoadState::Failed(reason) if reason.contains("invalid glTF header")
        ));

        assert!(cache.evict("uploads/broken.glb"));
        assert_eq!(cache.state("uploads/broken.glb"), ModelLoadState::NotLoaded);
    }

    #[test]
    fn test_instance_meshes_are_tagged() {
        let mut app = App::new();
        app.add_systems(Update, mark_shadow_casters);

        let asset = Arc::new(sample_asset("models/Walking.glb"));
        let instance = app.world_mut().spawn(ModelInstance { asset }).id();
        let joint = app.world_mut().spawn(ChildOf(instance)).id();
        let mesh = app
            .world_mut()
            .spawn((Mesh3d(Handle::default()), NotShadowCaster, ChildOf(joint)))
            .id();
        let stray = app.world_mut().spawn(Mesh3d(Handle::default())).id();

        app.update();

        let world = app.world();
        assert_eq!(world.get::<InstanceMesh>(mesh).map(|m| m.instance), Some(instance));
        assert!(world.get::<NotShadowCaster>(mesh).is_none());
        assert!(world.get::<InstanceMesh>(stray).is_none());
    }
}
