use avian3d::prelude::{Collider, ExternalImpulse, LockedAxes, RigidBody};
use bevy::prelude::*;

use crate::character_controller::input::ControlState;
use crate::config::MovementTuning;

/// A marker component indicating that an entity is a physics driven character.
/// Requires all components needed for the controller to function properly.
#[derive(Component, Default)]
#[require(
    RigidBody,
    Collider,
    LockedAxes = LockedAxes::ROTATION_LOCKED,
    ExternalImpulse,
    ControlState,
    Locomotion
)]
pub struct CharacterController;

/// Ground and jump bookkeeping of a character.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct Locomotion {
    /// Set by ground contacts during a physics step, cleared at the end of every fixed tick.
    pub grounded: bool,
    /// The jump control has to be released between jumps.
    pub ok_to_jump: bool,
    /// Seconds since the last ground contact.
    pub air_timer: f32,
    pub jump_started: bool,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self {
            grounded: false,
            ok_to_jump: true,
            air_timer: 0.0,
            jump_started: false,
        }
    }
}

impl Locomotion {
    /// A contact counts as ground when it is below the upper part of the body and faces up.
    /// Any one qualifying contact is enough.
    pub fn register_contact(&mut self, center: Vec3, point: Vec3, normal: Vec3, tuning: &MovementTuning) {
        if point.y < center.y + tuning.ground_contact_height && normal.y > tuning.ground_normal_min_y {
            self.grounded = true;
        }
    }

    /// Ages the air timer and reports whether the character still counts as
    /// grounded. Short losses of contact are forgiven.
    pub fn update_air_time(&mut self, delta: f32, tuning: &MovementTuning) -> bool {
        if self.grounded {
            self.air_timer = 0.0;
        } else {
            self.air_timer += delta;
        }
        self.air_timer < tuning.inair_threshold_time
    }
}

/// Scene nodes of a spawned character. The entities belong to the scene,
/// the character only points at them.
#[derive(Component, Debug, Clone, Copy)]
pub struct CharacterRig {
    /// The entity carrying the [`AnimationPlayer`].
    pub animator: Entity,
    /// `None` when the model lacks a locator or the weapon.
    pub mounts: Option<WeaponMounts>,
    /// Bone following the look pitch, if the model has one.
    pub head: Option<Entity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponMounts {
    pub back_locator: Entity,
    pub hand_locator: Entity,
    pub weapon: Entity,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn floor_contact_grounds() {
        let tuning = MovementTuning::default();
        let mut locomotion = Locomotion::default();
        locomotion.register_contact(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::Y, &tuning);
        assert!(locomotion.grounded);
    }

    #[test]
    fn wall_and_ceiling_contacts_do_not_ground() {
        let tuning = MovementTuning::default();
        let center = Vec3::new(0.0, 1.0, 0.0);
        let mut locomotion = Locomotion::default();
        locomotion.register_contact(center, Vec3::new(0.5, 1.0, 0.0), Vec3::NEG_X, &tuning);
        locomotion.register_contact(center, Vec3::new(0.0, 2.5, 0.0), Vec3::Y, &tuning);
        locomotion.register_contact(center, Vec3::ZERO, Vec3::new(0.0, 0.7, 0.714), &tuning);
        assert!(!locomotion.grounded);
    }

    #[test]
    fn any_qualifying_contact_wins() {
        let tuning = MovementTuning::default();
        let center = Vec3::new(0.0, 1.0, 0.0);
        let mut locomotion = Locomotion::default();
        locomotion.register_contact(center, Vec3::ZERO, Vec3::Y, &tuning);
        locomotion.register_contact(center, Vec3::new(0.5, 1.0, 0.0), Vec3::NEG_X, &tuning);
        assert!(locomotion.grounded);
    }

    #[test]
    fn short_air_time_still_counts_as_grounded() {
        let tuning = MovementTuning::default();
        let mut locomotion = Locomotion::default();
        let mut elapsed = 0.0;
        while elapsed < 0.09 - 1e-4 {
            assert!(locomotion.update_air_time(0.01, &tuning));
            elapsed += 0.01;
        }
        locomotion.grounded = true;
        assert!(locomotion.update_air_time(DT, &tuning));
        assert_eq!(locomotion.air_timer, 0.0);
    }

    #[test]
    fn long_air_time_is_airborne() {
        let tuning = MovementTuning::default();
        let mut locomotion = Locomotion::default();
        assert!(locomotion.update_air_time(0.05, &tuning));
        assert!(!locomotion.update_air_time(0.06, &tuning));
    }
}
