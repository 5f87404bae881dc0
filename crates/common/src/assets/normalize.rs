//! Canonical-height normalization for externally sourced models.
//!
//! Runs once per instance: the `NormalizeScale` marker is removed on the first pass whether
//! or not the geometry could be normalized. Running twice would compound the scale.
//!
//! An instance is measured once its scene has spawned (it has children) and every tagged
//! surface has its mesh. A spawned scene with no surfaces counts as degenerate.

use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;

use super::model::{InstanceMesh, ModelInstance};
use crate::error::AvatarError;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self { min: first, max: first }, |b, p| Self {
            min: b.min.min(p),
            max: b.max.max(p),
        }))
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Uniform scale plus vertical shift that puts the feet on y = 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub scale: f32,
    pub translation_y: f32,
}

impl Normalization {
    pub fn apply(&self, transform: &mut Transform) {
        transform.scale *= self.scale;
        transform.translation.y += self.translation_y;
    }
}

pub fn compute_normalization(
    bounds: &Bounds,
    target_height: f32,
) -> Result<Normalization, AvatarError> {
    let size = bounds.size();
    if size.y <= f32::EPSILON {
        return Err(AvatarError::DegenerateGeometry { height: size.y });
    }

    let scale = target_height / size.y;
    Ok(Normalization {
        scale,
        translation_y: (size.y / 2.0 - bounds.center().y) * scale,
    })
}

/// Requests normalization of a model instance
#[derive(Component, Debug, Clone, Copy)]
pub struct NormalizeScale {
    pub target_height: f32,
}

/// Rescale flagged instances once their meshes are available
pub fn normalize_model_scale(
    mut commands: Commands,
    meshes: Res<Assets<Mesh>>,
    mut instances: Query<
        (
            Entity,
            &NormalizeScale,
            &GlobalTransform,
            &mut Transform,
            Option<&Children>,
        ),
        With<ModelInstance>,
    >,
    instance_meshes: Query<(&InstanceMesh, &Mesh3d, &GlobalTransform)>,
) {
    for (entity, normalize, instance_global, mut transform, children) in instances.iter_mut() {
        let to_instance = instance_global.affine().inverse();
        let mut bounds: Option<Bounds> = None;
        let mut surfaces = 0;
        let mut waiting = false;

        for (owner, mesh3d, mesh_global) in instance_meshes.iter() {
            if owner.instance != entity {
                continue;
            }
            surfaces += 1;

            let Some(mesh) = meshes.get(&mesh3d.0) else {
                waiting = true;
                break;
            };
            let Some(VertexAttributeValues::Float32x3(positions)) =
                mesh.attribute(Mesh::ATTRIBUTE_POSITION)
            else {
                continue;
            };

            let to_local = to_instance * mesh_global.affine();
            let mesh_bounds = Bounds::from_points(
                positions
                    .iter()
                    .map(|p| to_local.transform_point3(Vec3::from_array(*p))),
            );
            bounds = match (bounds, mesh_bounds) {
                (Some(a), Some(b)) => Some(a.union(b)),
                (a, b) => a.or(b),
            };
        }

        let scene_spawned = children.is_some_and(|c| !c.is_empty());
        if waiting || (surfaces == 0 && !scene_spawned) {
            continue;
        }

        commands.entity(entity).remove::<NormalizeScale>();

        let bounds = bounds.unwrap_or_default();
        info!("📏 Normalizing avatar, original size {:?}", bounds.size());

        match compute_normalization(&bounds, normalize.target_height) {
            Ok(normalization) => {
                normalization.apply(&mut transform);
                info!("📏 Applied scale {:.3}", normalization.scale);
            }
            Err(e) => warn!("⚠️ {}, rendering at native scale", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_points(min: Vec3, max: Vec3) -> Vec<Vec3> {
        vec![min, max, Vec3::new(min.x, max.y, min.z), Vec3::new(max.x, min.y, max.z)]
    }

    #[test]
    fn test_scales_to_target_and_rests_on_ground() {
        let points = box_points(Vec3::new(-20.0, -45.0, -10.0), Vec3::new(20.0, 135.0, 10.0));
        let bounds = Bounds::from_points(points.iter().copied()).unwrap();

        let n = compute_normalization(&bounds, 1.8).unwrap();
        assert!((n.scale - 1.8 / 180.0).abs() < 1e-6);

        let mut transform = Transform::IDENTITY;
        n.apply(&mut transform);
        let after = Bounds::from_points(points.iter().map(|p| transform.transform_point(*p))).unwrap();

        assert!(after.min.y.abs() < 1e-5);
        assert!((after.size().y - 1.8).abs() < 1e-5);
        assert_eq!(transform.scale, Vec3::splat(n.scale));
    }

    #[test]
    fn test_degenerate_box_is_rejected() {
        let flat = Bounds::from_points([Vec3::new(-1.0, 0.5, -1.0), Vec3::new(1.0, 0.5, 1.0)]).unwrap();
        assert_eq!(
            compute_normalization(&flat, 1.8),
            Err(AvatarError::DegenerateGeometry { height: 0.0 })
        );
    }

    fn flagged_instance(app: &mut App) -> Entity {
        let asset = std::sync::Arc::new(crate::assets::ModelAsset {
            source_id: "uploads/custom.glb".to_string(),
            scene: Handle::default(),
            clips: Vec::new(),
        });
        app.world_mut()
            .spawn((
                ModelInstance { asset },
                NormalizeScale { target_height: 1.8 },
                Transform::default(),
                GlobalTransform::default(),
            ))
            .id()
    }

    fn normalize_app() -> App {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .add_systems(Update, normalize_model_scale);
        app
    }

    #[test]
    fn test_instance_mesh_is_normalized_once() {
        let mut app = normalize_app();
        let instance = flagged_instance(&mut app);
        let mesh = app
            .world_mut()
            .resource_mut::<Assets<Mesh>>()
            .add(Cuboid::new(1.0, 2.0, 1.0));
        app.world_mut().spawn((
            InstanceMesh { instance },
            Mesh3d(mesh),
            GlobalTransform::default(),
            ChildOf(instance),
        ));

        app.update();
        app.update();

        let world = app.world();
        assert!(world.get::<NormalizeScale>(instance).is_none());
        let transform = world.get::<Transform>(instance).unwrap();
        assert!((transform.scale - Vec3::splat(0.9)).length() < 1e-5);
        // Cuboid centered on the origin: shift up by half the new height
        assert!((transform.translation.y - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_spawned_scene_without_surfaces_is_degenerate() {
        let mut app = normalize_app();
        let empty = flagged_instance(&mut app);
        app.world_mut().spawn((Transform::default(), ChildOf(empty)));
        let unspawned = flagged_instance(&mut app);

        app.update();

        let world = app.world();
        assert!(world.get::<NormalizeScale>(empty).is_none());
        assert_eq!(world.get::<Transform>(empty), Some(&Transform::default()));
        // Scene not spawned yet: keep waiting
        assert!(world.get::<NormalizeScale>(unspawned).is_some());
    }

    #[test]
    fn test_empty_point_set_has_no_bounds() {
        assert_eq!(Bounds::from_points(std::iter::empty()), None);
    }
}
