use bevy::prelude::*;

use crate::game_states::AppState;

pub mod components;
pub mod head;
pub mod input;
pub mod physics;
pub mod states;

pub use components::{CharacterController, CharacterRig, Locomotion, WeaponMounts};
pub use input::{ControlState, Controls};

pub struct CharacterControllerPlugin;

impl Plugin for CharacterControllerPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<Locomotion>()
            .configure_sets(
                FixedUpdate,
                (CharacterSet::Sense, CharacterSet::Act)
                    .chain()
                    .run_if(in_state(AppState::InGame)),
            )
            .add_systems(
                Update,
                (
                    input::keyboard_input,
                    input::gamepad_input,
                    input::mouse_look,
                    input::face_yaw,
                )
                    .chain()
                    .run_if(in_state(AppState::InGame)),
            )
            .add_systems(
                FixedUpdate,
                (
                    physics::detect_ground_contacts.in_set(CharacterSet::Sense),
                    physics::character_fixed_step.in_set(CharacterSet::Act),
                ),
            )
            .add_systems(
                PostUpdate,
                head::turn_head
                    .after(bevy::app::Animation)
                    .before(TransformSystem::TransformPropagate)
                    .run_if(in_state(AppState::InGame)),
            );
    }
}

/// Contacts of the previous physics step are read before characters act on them.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterSet {
    Sense,
    Act,
}
