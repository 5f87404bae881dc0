//! Engine-agnostic services shared by the Bevy plugins.

pub mod animation;

pub use animation::{natural_name, CatalogNotifier, ClipBlender, ClipPicker, ClipState};
