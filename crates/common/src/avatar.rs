//! # Avatar Descriptors
//!
//! The selected avatar is an immutable value handed down through world composition. It is
//! resolved once at spawn time into a single source id for the model cache; nothing downstream
//! knows which variant produced the instance.
//!
//! ```text
//! Predefined("Walking")           ──▶ models/Walking.glb
//! Generated { model_url: None }   ──▶ models/Walking.glb   (placeholder while pending)
//! Uploaded { lease, rotation }    ──▶ uploads/<uuid>.glb   (normalized, rotated)
//! ```
//!
//! Uploaded blobs live on disk only while an `UploadLease` is alive. The lease is shared by
//! every clone of the descriptor and the file is removed when the last clone drops.

use bevy::prelude::Component;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AvatarError;

/// Preset shipped with the client
pub const DEFAULT_PRESET: &str = "Walking";

/// Model shown for generated avatars whose mesh is not ready yet
pub const GENERATED_PLACEHOLDER: &str = "models/Walking.glb";

/// Directory under the asset root that holds leased uploads
pub const UPLOAD_DIR: &str = "uploads";

// ============================================================================
// Descriptor
// ============================================================================

/// Where an avatar's model comes from
#[derive(Debug, Clone)]
pub enum AvatarSource {
    /// Curated, pre-scaled model under `models/`
    Predefined(String),
    /// Produced by the external image-to-mesh service
    Generated {
        image_ref: String,
        model_url: Option<String>,
    },
    /// User-supplied model of unknown scale
    Uploaded {
        lease: Arc<UploadLease>,
        rotation_offset: f32,
    },
}

/// Immutable avatar selection passed down through composition
#[derive(Debug, Clone, Component)]
pub struct AvatarDescriptor {
    pub name: String,
    pub source: AvatarSource,
}

/// What the model resource and the body spawner need from a descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAvatar {
    pub source_id: String,
    /// Rescale to the canonical height after instantiation
    pub normalize: bool,
    /// Yaw applied to the visual model, radians
    pub rotation_offset: f32,
}

impl AvatarDescriptor {
    pub fn predefined(preset_id: impl Into<String>) -> Self {
        let preset_id = preset_id.into();
        Self {
            name: preset_id.clone(),
            source: AvatarSource::Predefined(preset_id),
        }
    }

    pub fn generated(image_ref: impl Into<String>, model_url: Option<String>) -> Self {
        Self {
            name: "Generated".to_string(),
            source: AvatarSource::Generated {
                image_ref: image_ref.into(),
                model_url,
            },
        }
    }

    pub fn uploaded(lease: UploadLease, rotation_offset: f32) -> Self {
        Self {
            name: "Uploaded".to_string(),
            source: AvatarSource::Uploaded {
                lease: Arc::new(lease),
                rotation_offset,
            },
        }
    }

    /// Lease the stored upload under `asset_root` and describe it
    pub fn from_stored(asset_root: &Path, stored: &StoredAvatar) -> Result<Self, AvatarError> {
        let lease = UploadLease::acquire(asset_root, &stored.glb)?;
        Ok(Self::uploaded(lease, stored.rotation_y))
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self.source, AvatarSource::Uploaded { .. })
    }

    pub fn resolve(&self) -> ResolvedAvatar {
        match &self.source {
            AvatarSource::Predefined(preset_id) => ResolvedAvatar {
                source_id: format!("models/{preset_id}.glb"),
                normalize: false,
                rotation_offset: 0.0,
            },
            AvatarSource::Generated { model_url, .. } => ResolvedAvatar {
                source_id: model_url
                    .clone()
                    .unwrap_or_else(|| GENERATED_PLACEHOLDER.to_string()),
                normalize: false,
                rotation_offset: 0.0,
            },
            AvatarSource::Uploaded {
                lease,
                rotation_offset,
            } => ResolvedAvatar {
                source_id: lease.asset_path().to_string(),
                normalize: true,
                rotation_offset: *rotation_offset,
            },
        }
    }
}

impl Default for AvatarDescriptor {
    fn default() -> Self {
        Self::predefined(DEFAULT_PRESET)
    }
}

// ============================================================================
// Upload Lease
// ============================================================================

/// Temporary asset file backing an uploaded avatar, removed on drop
#[derive(Debug)]
pub struct UploadLease {
    asset_path: String,
    file_path: PathBuf,
}

impl UploadLease {
    /// Write `bytes` to `<asset_root>/uploads/<uuid>.glb`
    pub fn acquire(asset_root: &Path, bytes: &[u8]) -> Result<Self, AvatarError> {
        let dir = asset_root.join(UPLOAD_DIR);
        std::fs::create_dir_all(&dir)?;

        let file_name = format!("{}.glb", uuid::Uuid::new_v4());
        let file_path = dir.join(&file_name);
        std::fs::write(&file_path, bytes)?;

        tracing::debug!("Leased upload {:?} ({} bytes)", file_path, bytes.len());

        Ok(Self {
            asset_path: format!("{UPLOAD_DIR}/{file_name}"),
            file_path,
        })
    }

    /// Path relative to the asset root
    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl Drop for UploadLease {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.file_path) {
            Ok(()) => tracing::debug!("Released upload {:?}", self.file_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to release upload {:?}: {}", self.file_path, e),
        }
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Single-record key for the uploaded avatar
pub const AVATAR_RECORD_KEY: u32 = 1;

/// Uploaded avatar as persisted between sessions
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAvatar {
    pub glb: Vec<u8>,
    pub rotation_y: f32,
}

/// Key-value collaborator holding at most one uploaded avatar
pub trait AvatarStore {
    fn put(&self, avatar: &StoredAvatar) -> Result<(), AvatarError>;
    fn get(&self) -> Result<Option<StoredAvatar>, AvatarError>;
    fn delete(&self) -> Result<(), AvatarError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct AvatarRecord {
    id: u32,
    rotation_y: f32,
}

/// Stores `avatar.glb` + `avatar.toml` in a data directory
#[derive(Debug, Clone)]
pub struct FileAvatarStore {
    dir: PathBuf,
}

impl FileAvatarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform data directory, e.g. `~/.local/share/promptmesh`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("promptmesh"))
    }

    fn glb_path(&self) -> PathBuf {
        self.dir.join("avatar.glb")
    }

    fn record_path(&self) -> PathBuf {
        self.dir.join("avatar.toml")
    }
}

impl AvatarStore for FileAvatarStore {
    fn put(&self, avatar: &StoredAvatar) -> Result<(), AvatarError> {
        std::fs::create_dir_all(&self.dir)?;

        let record = AvatarRecord {
            id: AVATAR_RECORD_KEY,
            rotation_y: avatar.rotation_y,
        };
        let content =
            toml::to_string_pretty(&record).map_err(|e| AvatarError::Store(e.to_string()))?;

        std::fs::write(self.glb_path(), &avatar.glb)?;
        std::fs::write(self.record_path(), content)?;
        Ok(())
    }

    fn get(&self) -> Result<Option<StoredAvatar>, AvatarError> {
        let record_path = self.record_path();
        if !record_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&record_path)?;
        let record: AvatarRecord =
            toml::from_str(&content).map_err(|e| AvatarError::Store(e.to_string()))?;
        if record.id != AVATAR_RECORD_KEY {
            return Ok(None);
        }

        let glb = std::fs::read(self.glb_path())?;
        Ok(Some(StoredAvatar {
            glb,
            rotation_y: record.rotation_y,
        }))
    }

    fn delete(&self) -> Result<(), AvatarError> {
        for path in [self.glb_path(), self.record_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_variants() {
        let preset = AvatarDescriptor::predefined("Robot").resolve();
        assert_eq!(preset.source_id, "models/Robot.glb");
        assert!(!preset.normalize);

        let pending = AvatarDescriptor::generated("images/42.png", None).resolve();
        assert_eq!(pending.source_id, GENERATED_PLACEHOLDER);

        let ready =
            AvatarDescriptor::generated("images/42.png", Some("https://mesh/42.glb".into()))
                .resolve();
        assert_eq!(ready.source_id, "https://mesh/42.glb");
    }

    #[test]
    fn test_uploaded_resolves_to_lease_with_normalization() {
        let root = tempfile::tempdir().unwrap();
        let lease = UploadLease::acquire(root.path(), b"glTF").unwrap();
        let descriptor = AvatarDescriptor::uploaded(lease, 1.5);

        let resolved = descriptor.resolve();
        assert!(resolved.source_id.starts_with("uploads/"));
        assert!(resolved.source_id.ends_with(".glb"));
        assert!(resolved.normalize);
        assert_eq!(resolved.rotation_offset, 1.5);
        assert!(root.path().join(&resolved.source_id).exists());
    }

    #[test]
    fn test_lease_released_when_last_clone_drops() {
        let root = tempfile::tempdir().unwrap();
        let lease = UploadLease::acquire(root.path(), b"glTF").unwrap();
        let file = lease.file_path().to_path_buf();

        let descriptor = AvatarDescriptor::uploaded(lease, 0.0);
        let clone = descriptor.clone();
        drop(descriptor);
        assert!(file.exists());

        drop(clone);
        assert!(!file.exists());
    }

    #[test]
    fn test_file_store_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAvatarStore::new(dir.path().join("data"));

        assert_eq!(store.get().unwrap(), None);

        let avatar = StoredAvatar {
            glb: vec![1, 2, 3, 4],
            rotation_y: std::f32::consts::PI,
        };
        store.put(&avatar).unwrap();
        assert_eq!(store.get().unwrap(), Some(avatar));

        store.delete().unwrap();
        assert_eq!(store.get().unwrap(), None);
        store.delete().unwrap();
    }

    #[test]
    fn test_from_stored_leases_blob() {
        let root = tempfile::tempdir().unwrap();
        let stored = StoredAvatar {
            glb: b"glTF-binary".to_vec(),
            rotation_y: 0.25,
        };

        let descriptor = AvatarDescriptor::from_stored(root.path(), &stored).unwrap();
        let resolved = descriptor.resolve();
        let on_disk = std::fs::read(root.path().join(&resolved.source_id)).unwrap();
        assert_eq!(on_disk, stored.glb);
        assert!(descriptor.is_uploaded());
    }
}
