//! # PromptMesh Common
//!
//! Shared avatar types and plugins used by the runtime and the client.
//!
//! ## Modules
//!
//! - `assets`: Model resource (GLB cache, per-spawn instances) and scale normalization
//! - `avatar`: Avatar descriptors, upload leases, uploaded-avatar persistence
//! - `config`: TOML configuration shared by every crate
//! - `error`: Error taxonomy for the avatar subsystem
//! - `plugins`: Shared Bevy plugins (clip playback, catalog publication)
//! - `services`: Engine-agnostic state machines (clip blender, catalog notifier, clip picker)
//!
//! ## Architecture
//!
//! ```text
//! AvatarDescriptor ──resolve──▶ source id ──ModelCache──▶ ModelAsset (shared, read-only)
//!                                                            │
//!                                                   instantiate per body
//!                                                            ▼
//!                                                      ModelInstance ──▶ ClipBlender
//! ```

pub mod assets;
pub mod avatar;
pub mod config;
pub mod error;
pub mod plugins;
pub mod services;

pub use avatar::{AvatarDescriptor, AvatarSource, ResolvedAvatar};
pub use config::PromptMeshConfig;
pub use error::AvatarError;
