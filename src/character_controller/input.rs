use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::prelude::*;
use bitflags::bitflags;

use crate::character_controller::components::CharacterController;
use crate::config::CharacterConfig;

const STICK_DEAD_ZONE: f32 = 0.3;
/// Degrees of yaw per second at full right stick deflection.
const STICK_TURN_RATE: f32 = 180.0;
const PITCH_LIMIT: f32 = 80.0;

bitflags! {
    /// Controls currently held, or pressed since the last fixed tick.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Controls: u8 {
        const FORWARD = 1 << 0;
        const BACK = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const JUMP = 1 << 4;
        const EQUIP = 1 << 5;
        const PRIMARY = 1 << 6;
        const SECONDARY = 1 << 7;
    }
}

impl Controls {
    /// Bits refreshed from held buttons every frame.
    pub const HELD: Self = Self::FORWARD
        .union(Self::BACK)
        .union(Self::LEFT)
        .union(Self::RIGHT)
        .union(Self::JUMP);

    /// Local move direction, not normalized. Opposite keys cancel out.
    pub fn move_direction(self) -> Vec3 {
        let mut direction = Vec3::ZERO;
        if self.contains(Self::FORWARD) {
            direction += Vec3::NEG_Z;
        }
        if self.contains(Self::BACK) {
            direction += Vec3::Z;
        }
        if self.contains(Self::LEFT) {
            direction += Vec3::NEG_X;
        }
        if self.contains(Self::RIGHT) {
            direction += Vec3::X;
        }
        direction
    }

    /// Returns whether `flags` were set, and clears them.
    pub fn take(&mut self, flags: Self) -> bool {
        let set = self.intersects(flags);
        self.remove(flags);
        set
    }
}

/// Input of one character, gathered per frame and consumed per fixed tick.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ControlState {
    pub controls: Controls,
    /// Degrees, positive turns right.
    pub yaw: f32,
    /// Degrees, clamped to [-80, 80].
    pub pitch: f32,
}

impl ControlState {
    pub fn add_look(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(-self.yaw.to_radians())
    }
}

/// Refreshes held controls from the keyboard and latches button presses.
pub fn keyboard_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    mut characters: Query<&mut ControlState, With<CharacterController>>,
) {
    for mut state in &mut characters {
        let controls = &mut state.controls;
        controls.remove(Controls::HELD);

        controls.set(Controls::FORWARD, keyboard.any_pressed([KeyCode::KeyW, KeyCode::ArrowUp]));
        controls.set(Controls::BACK, keyboard.any_pressed([KeyCode::KeyS, KeyCode::ArrowDown]));
        controls.set(Controls::LEFT, keyboard.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]));
        controls.set(Controls::RIGHT, keyboard.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]));
        controls.set(Controls::JUMP, keyboard.pressed(KeyCode::Space));

        // Presses stay latched until a fixed tick consumes them
        if keyboard.just_pressed(KeyCode::KeyQ) {
            controls.insert(Controls::EQUIP);
        }
        if mouse.just_pressed(MouseButton::Left) {
            controls.insert(Controls::PRIMARY);
        }
        if mouse.just_pressed(MouseButton::Right) {
            controls.insert(Controls::SECONDARY);
        }
    }
}

/// Adds gamepad input on top of the keyboard state.
pub fn gamepad_input(
    time: Res<Time>,
    gamepads: Query<&Gamepad>,
    mut characters: Query<&mut ControlState, With<CharacterController>>,
) {
    for gamepad in gamepads.iter() {
        let stick = gamepad.left_stick();
        let turn = gamepad.get(GamepadAxis::RightStickX).unwrap_or(0.0);

        for mut state in &mut characters {
            let controls = &mut state.controls;
            if stick.y > STICK_DEAD_ZONE {
                controls.insert(Controls::FORWARD);
            }
            if stick.y < -STICK_DEAD_ZONE {
                controls.insert(Controls::BACK);
            }
            if stick.x < -STICK_DEAD_ZONE {
                controls.insert(Controls::LEFT);
            }
            if stick.x > STICK_DEAD_ZONE {
                controls.insert(Controls::RIGHT);
            }
            if gamepad.pressed(GamepadButton::South) {
                controls.insert(Controls::JUMP);
            }
            if gamepad.just_pressed(GamepadButton::North) {
                controls.insert(Controls::EQUIP);
            }
            if gamepad.just_pressed(GamepadButton::West) {
                controls.insert(Controls::PRIMARY);
            }

            if turn.abs() > STICK_DEAD_ZONE {
                state.add_look(turn * STICK_TURN_RATE * time.delta_secs(), 0.0);
            }
        }
    }
}

pub fn mouse_look(
    motion: Res<AccumulatedMouseMotion>,
    config: Res<CharacterConfig>,
    mut characters: Query<&mut ControlState, With<CharacterController>>,
) {
    if motion.delta == Vec2::ZERO {
        return;
    }
    let sensitivity = config.movement.yaw_sensitivity;
    for mut state in &mut characters {
        state.add_look(motion.delta.x * sensitivity, motion.delta.y * sensitivity);
    }
}

/// The character always faces where the player looks.
pub fn face_yaw(mut characters: Query<(&ControlState, &mut Transform), With<CharacterController>>) {
    for (state, mut transform) in &mut characters {
        transform.rotation = state.rotation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_cancel() {
        let controls = Controls::FORWARD | Controls::BACK | Controls::LEFT;
        assert_eq!(controls.move_direction(), Vec3::NEG_X);
    }

    #[test]
    fn diagonal_is_summed_unnormalized() {
        let controls = Controls::FORWARD | Controls::RIGHT;
        assert_eq!(controls.move_direction(), Vec3::new(1.0, 0.0, -1.0));
    }

    #[test]
    fn no_keys_no_direction() {
        assert_eq!(Controls::JUMP.move_direction(), Vec3::ZERO);
    }

    #[test]
    fn take_consumes_presses() {
        let mut controls = Controls::EQUIP | Controls::FORWARD;
        assert!(controls.take(Controls::EQUIP));
        assert!(!controls.take(Controls::EQUIP | Controls::PRIMARY));
        assert_eq!(controls, Controls::FORWARD);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut state = ControlState::default();
        state.add_look(10.0, 200.0);
        assert_eq!(state.pitch, 80.0);
        state.add_look(0.0, -500.0);
        assert_eq!(state.pitch, -80.0);
        assert_eq!(state.yaw, 10.0);
    }

    #[test]
    fn positive_yaw_turns_right() {
        let mut state = ControlState::default();
        state.add_look(90.0, 0.0);
        let forward = state.rotation() * Vec3::NEG_Z;
        assert!(forward.abs_diff_eq(Vec3::X, 1e-5));
    }
}
