use bevy::prelude::*;

use crate::character_controller::components::CharacterRig;
use crate::character_controller::input::ControlState;

/// Degrees the head may tilt up or down.
const HEAD_PITCH_LIMIT: f32 = 45.0;

/// Local rotation that points a bone along `facing`, tilted by the clamped
/// look `pitch` in degrees. `parent` is the world rotation of the bone's parent.
pub fn head_rotation(parent: Quat, facing: Quat, pitch: f32) -> Quat {
    let pitch = pitch.clamp(-HEAD_PITCH_LIMIT, HEAD_PITCH_LIMIT);
    parent.inverse() * facing * Quat::from_rotation_x(-pitch.to_radians())
}

/// World rotation of `node`'s parent, composed from this frame's local
/// transforms up to and including `root`.
fn parent_rotation(
    node: Entity,
    root: Entity,
    parents: &Query<&ChildOf>,
    transforms: &Query<&mut Transform>,
) -> Option<Quat> {
    let mut rotation = Quat::IDENTITY;
    let mut current = node;
    while current != root {
        current = parents.get(current).ok()?.parent();
        rotation = transforms.get(current).ok()?.rotation * rotation;
    }
    Some(rotation)
}

/// Overrides the animated head pose so characters look where the camera does.
pub fn turn_head(
    characters: Query<(Entity, &ControlState, &CharacterRig)>,
    parents: Query<&ChildOf>,
    mut transforms: Query<&mut Transform>,
) {
    for (entity, state, rig) in &characters {
        let Some(head) = rig.head else {
            continue;
        };
        let Some(parent) = parent_rotation(head, entity, &parents, &transforms) else {
            continue;
        };
        let Ok(facing) = transforms.get(entity).map(|t| t.rotation) else {
            continue;
        };
        if let Ok(mut transform) = transforms.get_mut(head) {
            transform.rotation = head_rotation(parent, facing, state.pitch);
        }
    }
}
