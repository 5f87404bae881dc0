//! # Animation Plugin
//!
//! Binds a `ClipBlender` to every model instance and mirrors its weights into the instance's
//! `AnimationPlayer` each frame.
//!
//! ## Flow
//!
//! 1. `bind_clip_blenders` - new `ModelInstance` gets an `AvatarAnimation` with its catalog
//! 2. `publish_clip_catalogs` - catalog goes upward once per distinct value
//! 3. `bind_animation_players` - once the scene has spawned, build the graph on its player
//! 4. `advance_clip_blends` - step fades and push weights (all clips loop)
//!
//! ## Usage
//!
//! ```rust,ignore
//! app.add_plugins(SharedAnimationPlugin);
//! ```

use bevy::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::assets::ModelInstance;
use crate::config::PromptMeshConfig;
use crate::services::animation::{
    natural_name, CatalogNotifier, ClipBlender, ClipPicker, DEFAULT_FADE_SECS, IDLE_CLIP,
};

// ============================================================================
// Components
// ============================================================================

/// Clip state of one model instance
#[derive(Component, Debug)]
pub struct AvatarAnimation {
    pub blender: ClipBlender,
    /// Entity holding the `AnimationPlayer`, once the scene has spawned
    pub player_entity: Option<Entity>,
    /// Graph node per clip with a source track
    pub nodes: HashMap<String, AnimationNodeIndex>,
}

impl AvatarAnimation {
    pub fn new(blender: ClipBlender) -> Self {
        Self {
            blender,
            player_entity: None,
            nodes: HashMap::new(),
        }
    }

    /// Ask for a clip. Unknown names are ignored.
    pub fn request(&mut self, clip: &str) -> bool {
        match self.blender.set_clip(clip) {
            Ok(started) => {
                if started {
                    debug!("🎬 Fading to '{}'", clip);
                }
                started
            }
            Err(e) => {
                debug!("🎬 {}", e);
                false
            }
        }
    }
}

/// Upward notification: a model instance exposed its clip catalog
#[derive(Message, Debug, Clone, PartialEq)]
pub struct ClipCatalogPublished {
    pub instance: Entity,
    pub catalog: Vec<String>,
}

// ============================================================================
// Systems
// ============================================================================

/// Attach a blender to each new model instance
pub fn bind_clip_blenders(
    mut commands: Commands,
    config: Option<Res<PromptMeshConfig>>,
    instances: Query<(Entity, &ModelInstance), Without<AvatarAnimation>>,
) {
    let (idle, fade) = config
        .as_ref()
        .map(|c| (c.animation.idle_clip.as_str(), c.animation.fade_secs))
        .unwrap_or((IDLE_CLIP, DEFAULT_FADE_SECS));

    for (entity, instance) in instances.iter() {
        let mut blender = ClipBlender::new(&instance.asset.clip_names(), idle, fade);
        // Start at rest
        let _ = blender.set_clip(idle);
        commands.entity(entity).insert(AvatarAnimation::new(blender));
    }
}

/// Publish catalogs, deduplicated by value
pub fn publish_clip_catalogs(
    mut notifier: Local<CatalogNotifier>,
    mut picker: ResMut<ClipPicker>,
    animations: Query<(Entity, &AvatarAnimation), Added<AvatarAnimation>>,
    mut published: MessageWriter<ClipCatalogPublished>,
) {
    for (entity, animation) in animations.iter() {
        let Some(catalog) = notifier.offer(animation.blender.catalog()) else {
            continue;
        };

        let labels: Vec<String> = catalog.iter().map(|c| natural_name(c)).collect();
        info!("🎬 Clip catalog: {}", labels.join(", "));

        picker.set_catalog(catalog.clone());
        published.write(ClipCatalogPublished {
            instance: entity,
            catalog,
        });
    }
}

/// Recursively find AnimationPlayer in entity hierarchy
fn find_animation_player_recursive(
    entity: Entity,
    children_query: &Query<&Children>,
    animation_players: &Query<Entity, With<AnimationPlayer>>,
) -> Option<Entity> {
    if animation_players.get(entity).is_ok() {
        return Some(entity);
    }

    if let Ok(children) = children_query.get(entity) {
        for child in children.iter() {
            if let Some(found) =
                find_animation_player_recursive(child, children_query, animation_players)
            {
                return Some(found);
            }
        }
    }

    None
}

/// Build the animation graph once the instance's player exists
pub fn bind_animation_players(
    mut commands: Commands,
    mut graphs: ResMut<Assets<AnimationGraph>>,
    mut animations: Query<(Entity, &ModelInstance, &mut AvatarAnimation)>,
    children_query: Query<&Children>,
    animation_players: Query<Entity, With<AnimationPlayer>>,
) {
    for (entity, instance, mut animation) in animations.iter_mut() {
        if animation.player_entity.is_some() {
            continue;
        }

        let Some(player_entity) =
            find_animation_player_recursive(entity, &children_query, &animation_players)
        else {
            continue;
        };

        let mut graph = AnimationGraph::new();
        let mut nodes = HashMap::new();
        for clip in &instance.asset.clips {
            let node = graph.add_clip(clip.handle.clone(), 1.0, graph.root);
            nodes.insert(clip.name.clone(), node);
        }

        if nodes.is_empty() {
            warn!("⚠️ Avatar '{}' has no clips, it will hold its rest pose", instance.asset.source_id);
        }

        commands
            .entity(player_entity)
            .insert(AnimationGraphHandle(graphs.add(graph)));
        animation.player_entity = Some(player_entity);
        animation.nodes = nodes;

        info!("🎬 Animation graph bound for {:?} -> player {:?}", entity, player_entity);
    }
}

/// Step fades and push weights into the players
pub fn advance_clip_blends(
    time: Res<Time>,
    mut animations: Query<&mut AvatarAnimation>,
    mut players: Query<&mut AnimationPlayer>,
) {
    let delta = time.delta_secs();

    for mut animation in animations.iter_mut() {
        animation.blender.advance(delta);

        let Some(player_entity) = animation.player_entity else {
            continue;
        };
        let Ok(mut player) = players.get_mut(player_entity) else {
            continue;
        };

        for (name, node) in &animation.nodes {
            let weight = animation.blender.weight(name);
            if weight > 0.0 {
                if !player.is_playing_animation(*node) {
                    player.play(*node).repeat();
                }
                if let Some(active) = player.animation_mut(*node) {
                    active.set_weight(weight);
                }
            } else if player.is_playing_animation(*node) {
                player.stop(*node);
            }
        }
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// Clip playback for avatar model instances
pub struct SharedAnimationPlugin;

impl Plugin for SharedAnimationPlugin {
    fn build(&self, app: &mut App) {
        let idle = app
            .world()
            .get_resource::<PromptMeshConfig>()
            .map(|c| c.animation.idle_clip.clone())
            .unwrap_or_else(|| IDLE_CLIP.to_string());

        app.insert_resource(ClipPicker::new(idle))
            .add_message::<ClipCatalogPublished>()
            .add_systems(
                Update,
                (
                    bind_clip_blenders,
                    publish_clip_catalogs,
                    bind_animation_players,
                    advance_clip_blends,
                )
                    .chain(),
            );

        info!("🎬 SharedAnimationPlugin initialized");
    }
}
