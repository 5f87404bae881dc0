//! # Client Plugins
//!
//! One plugin per concern of the park client.
//!
//! ## Usage
//! ```rust,ignore
//! app.add_plugins(InputPlugin)
//!    .add_plugins(ParkPlugin)
//!    .add_plugins(PlayerServicePlugin);
//! ```

pub mod input_plugin;
pub mod park_plugin;
pub mod player_plugin;

pub use input_plugin::InputPlugin;
pub use park_plugin::ParkPlugin;
pub use player_plugin::PlayerServicePlugin;
