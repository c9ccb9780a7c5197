use std::time::Duration;

use bevy::prelude::*;

use crate::animation::{AnimLayer, AnimationDriver, Clip};
use crate::character_controller::components::Locomotion;
use crate::character_controller::input::Controls;
use crate::config::MovementTuning;
use crate::weapon::actions::{WeaponActions, WeaponState, WeaponTick};

const LOCOMOTION_FADE: f32 = 0.2;
const JUMP_LOOP_FADE: f32 = 0.3;

/// The rigid body a character pushes around.
pub trait MotionBody {
    fn linear_velocity(&self) -> Vec3;
    fn set_linear_velocity(&mut self, velocity: Vec3);
    fn apply_impulse(&mut self, impulse: Vec3);
}

/// Downward ray query used while airborne.
pub trait GroundProbe {
    /// Distance from `origin` to the first surface straight below, if any
    /// within `max_distance`.
    fn distance_below(&self, origin: Vec3, max_distance: f32) -> Option<f32>;
}

/// Everything one fixed tick of a character touches.
pub struct CharacterStep<'a, B, P, A> {
    pub locomotion: &'a mut Locomotion,
    pub weapon: &'a mut WeaponActions,
    pub controls: &'a mut Controls,
    pub transform: &'a Transform,
    pub tuning: &'a MovementTuning,
    pub body: &'a mut B,
    pub probe: &'a P,
    pub anim: &'a mut A,
}

impl<B: MotionBody, P: GroundProbe, A: AnimationDriver> CharacterStep<'_, B, P, A> {
    /// Runs weapon actions and locomotion for one fixed tick.
    pub fn run(self, delta: Duration) -> WeaponTick {
        let Self {
            locomotion,
            weapon,
            controls,
            transform,
            tuning,
            body,
            probe,
            anim,
        } = self;

        let soft_grounded = locomotion.update_air_time(delta.as_secs_f32(), tuning);

        let velocity = body.linear_velocity();
        let planar_velocity = Vec3::new(velocity.x, 0.0, velocity.z);
        let move_dir = controls.move_direction();

        let equip = controls.take(Controls::EQUIP);
        let attack = controls.take(Controls::PRIMARY);
        // Nothing is bound to the secondary button yet
        controls.remove(Controls::SECONDARY);
        let weapon_tick = weapon.tick(equip, attack, locomotion.grounded, delta, anim);

        // The swing owns the body layer, locomotion sits this tick out.
        if weapon_tick.current == WeaponState::AttackAnim {
            if weapon_tick.attack_started_from_equipped() {
                body.set_linear_velocity(Vec3::ZERO);
            }
            locomotion.grounded = false;
            return weapon_tick;
        }

        let move_dir = move_dir.normalize_or_zero();
        let force = if soft_grounded {
            tuning.move_force
        } else {
            tuning.inair_move_force
        };
        body.apply_impulse(transform.rotation * move_dir * force);

        if soft_grounded {
            body.apply_impulse(-planar_velocity * tuning.brake_force);

            if controls.contains(Controls::JUMP) {
                if locomotion.ok_to_jump {
                    body.apply_impulse(Vec3::Y * tuning.jump_force);
                    locomotion.jump_started = true;
                    locomotion.ok_to_jump = false;
                    anim.stop_layer(AnimLayer::Body, 0.0);
                    anim.play_exclusive(Clip::JumpStart, AnimLayer::Body, false, LOCOMOTION_FADE);
                    anim.set_time(Clip::JumpStart, 0.0);
                }
            } else {
                locomotion.ok_to_jump = true;
            }
        }

        if !locomotion.grounded || locomotion.jump_started {
            if locomotion.jump_started {
                if anim.is_at_end(Clip::JumpStart) {
                    anim.play_exclusive(Clip::JumpLoop, AnimLayer::Body, true, JUMP_LOOP_FADE);
                    anim.set_time(Clip::JumpLoop, 0.0);
                    locomotion.jump_started = false;
                }
            } else {
                match probe.distance_below(transform.translation, tuning.ground_probe_distance) {
                    Some(distance) if distance > tuning.max_stepdown_height => {
                        anim.play_exclusive(Clip::JumpLoop, AnimLayer::Body, true, LOCOMOTION_FADE);
                    }
                    Some(_) => {}
                    // Nothing below at all. Keep whatever is playing.
                    None => trace!("no ground within {}", tuning.ground_probe_distance),
                }
            }
        } else {
            if soft_grounded && move_dir != Vec3::ZERO {
                anim.play_exclusive(Clip::Run, AnimLayer::Body, true, LOCOMOTION_FADE);
            } else {
                anim.play_exclusive(Clip::Idle, AnimLayer::Body, true, LOCOMOTION_FADE);
            }

            let speed = (planar_velocity.length() * tuning.run_speed_scale)
                .clamp(tuning.run_speed_min, tuning.run_speed_max);
            anim.set_speed(Clip::Run, speed);
        }

        locomotion.grounded = false;
        weapon_tick
    }
}
