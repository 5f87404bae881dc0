//! # Avatar Errors
//!
//! Nothing in the avatar subsystem is fatal to the host loop. Every variant here is either
//! surfaced to the UI or logged, and the simulation keeps rendering what it has.

/// Error types for the avatar subsystem
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AvatarError {
    /// Source unreachable or not a valid skinned-model container
    #[error("Failed to load avatar model '{source_id}': {reason}")]
    AssetLoad { source_id: String, reason: String },

    /// Zero-height bounding box during normalization
    #[error("Avatar model has a height of {height}, cannot normalize scale")]
    DegenerateGeometry { height: f32 },

    /// Physics world or rigid body not constructed yet
    #[error("Physics world is not available this tick")]
    PhysicsUnavailable,

    /// Requested clip is not in the catalog
    #[error("Unknown animation clip: {0}")]
    UnknownClip(String),

    /// Uploaded-avatar persistence failure
    #[error("Avatar store error: {0}")]
    Store(String),
}

impl AvatarError {
    pub fn asset_load(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetLoad {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for AvatarError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_load_message_names_source() {
        let err = AvatarError::asset_load("models/Missing.glb", "file not found");
        assert_eq!(
            err.to_string(),
            "Failed to load avatar model 'models/Missing.glb': file not found"
        );
    }
}
