//! Shared Bevy plugins for avatar instances.

pub mod animation_plugin;

pub use animation_plugin::{AvatarAnimation, ClipCatalogPublished, SharedAnimationPlugin};
