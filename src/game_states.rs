use bevy::prelude::*;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum AppState {
    /// Waiting for the character scene and its clips.
    #[default]
    Loading,
    InGame,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<AppState>()
            .add_systems(OnEnter(AppState::InGame), grab_cursor)
            .add_systems(Update, toggle_cursor.run_if(in_state(AppState::InGame)));
    }
}

fn grab_cursor(mut windows: Query<&mut Window>) {
    for mut window in &mut windows {
        window.cursor_options.grab_mode = bevy::window::CursorGrabMode::Confined;
        window.cursor_options.visible = false;
    }
}

/// Escape frees the cursor, a click grabs it again.
fn toggle_cursor(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    mut windows: Query<&mut Window>,
) {
    let grab = if keyboard.just_pressed(KeyCode::Escape) {
        false
    } else if mouse.just_pressed(MouseButton::Left) {
        true
    } else {
        return;
    };
    for mut window in &mut windows {
        window.cursor_options.grab_mode = if grab {
            bevy::window::CursorGrabMode::Confined
        } else {
            bevy::window::CursorGrabMode::None
        };
        window.cursor_options.visible = !grab;
    }
}
