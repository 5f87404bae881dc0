//! # Input Plugin (Client)
//!
//! Maps physical keys to the logical locomotion flags and drives the clip picker.
//!
//! | Keys | Effect |
//! |---|---|
//! | `W`/`↑`, `S`/`↓`, `A`/`←`, `D`/`→` | forward / backward / left / right |
//! | `Space` | jump |
//! | `[` / `]` | previous / next clip |
//! | `1`..`9` | pick a clip by position |

use bevy::prelude::*;
use promptmesh_common::services::{natural_name, ClipPicker};
use promptmesh_runtime::character::InputState;

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputState>().add_systems(
            PreUpdate,
            map_keyboard_to_input.after(bevy::input::InputSystems),
        )
        .add_systems(Update, pick_clip_from_keys);
    }
}

const DIGIT_KEYS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

/// Snapshot the logical flags for this frame
pub fn map_keyboard_to_input(keyboard: Res<ButtonInput<KeyCode>>, mut input: ResMut<InputState>) {
    let any = |keys: [KeyCode; 2]| keyboard.any_pressed(keys);

    let next = InputState {
        forward: any([KeyCode::KeyW, KeyCode::ArrowUp]),
        backward: any([KeyCode::KeyS, KeyCode::ArrowDown]),
        left: any([KeyCode::KeyA, KeyCode::ArrowLeft]),
        right: any([KeyCode::KeyD, KeyCode::ArrowRight]),
        jump: keyboard.pressed(KeyCode::Space),
    };

    if *input != next {
        *input = next;
    }
}

/// Cycle or pick the locomotion clip
pub fn pick_clip_from_keys(keyboard: Res<ButtonInput<KeyCode>>, mut picker: ResMut<ClipPicker>) {
    let picked = if keyboard.just_pressed(KeyCode::BracketRight) {
        picker.cycle(1).map(str::to_string)
    } else if keyboard.just_pressed(KeyCode::BracketLeft) {
        picker.cycle(-1).map(str::to_string)
    } else if let Some(index) = DIGIT_KEYS.iter().position(|k| keyboard.just_pressed(*k)) {
        picker.select_index(index).map(str::to_string)
    } else {
        return;
    };

    if let Some(clip) = picked {
        info!("🎞️ Locomotion clip: {} ({})", natural_name(&clip), clip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        let mut app = App::new();
        app.init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<InputState>()
            .insert_resource(ClipPicker::new("Idle"))
            .add_systems(Update, (map_keyboard_to_input, pick_clip_from_keys));
        app
    }

    fn press(app: &mut App, key: KeyCode) {
        let mut keyboard = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
        keyboard.clear();
        keyboard.press(key);
    }

    #[test]
    fn test_wasd_and_arrows_map_to_flags() {
        let mut app = test_app();
        {
            let mut keyboard = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
            keyboard.press(KeyCode::KeyW);
            keyboard.press(KeyCode::ArrowLeft);
            keyboard.press(KeyCode::Space);
        }
        app.update();

        let input = *app.world().resource::<InputState>();
        assert!(input.forward && input.left && input.jump);
        assert!(!input.backward && !input.right);

        {
            let mut keyboard = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
            keyboard.release_all();
        }
        app.update();
        assert_eq!(*app.world().resource::<InputState>(), InputState::default());
    }

    #[test]
    fn test_brackets_and_digits_drive_picker() {
        let mut app = test_app();
        app.world_mut()
            .resource_mut::<ClipPicker>()
            .set_catalog(vec!["Idle".into(), "Walking".into(), "Running".into()]);
        assert_eq!(app.world().resource::<ClipPicker>().selected(), Some("Walking"));

        press(&mut app, KeyCode::BracketRight);
        app.update();
        assert_eq!(app.world().resource::<ClipPicker>().selected(), Some("Running"));

        press(&mut app, KeyCode::Digit1);
        app.update();
        assert_eq!(app.world().resource::<ClipPicker>().selected(), Some("Idle"));
    }
}
