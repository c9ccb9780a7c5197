use std::time::Duration;

use bevy::prelude::*;

use crate::animation::{AnimLayer, AnimationDriver, Clip};
use crate::character_controller::Controls;
use crate::weapon::queue::InputQueue;

const ACTION_FADE: f32 = 0.1;
const SHEATHE_STOP_FADE: f32 = 0.2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Reflect)]
pub enum WeaponState {
    /// The rig is missing its locators or weapon, nothing ever happens.
    #[default]
    Invalid,
    Unequipped,
    Equipping,
    Equipped,
    Unequipping,
    AttackAnim,
}

/// Where the weapon node should be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountPoint {
    Hand,
    Back,
}

/// Outcome of one [`WeaponActions::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponTick {
    pub previous: WeaponState,
    pub current: WeaponState,
    pub mount: Option<MountPoint>,
}

impl WeaponTick {
    /// True on the tick an attack swing starts from the idle stance.
    pub fn attack_started_from_equipped(&self) -> bool {
        self.previous == WeaponState::Equipped && self.current == WeaponState::AttackAnim
    }
}

/// Equip, sheathe and combo sequencing for one character.
#[derive(Debug, Clone)]
pub struct WeaponActions {
    state: WeaponState,
    action_clip: Clip,
    combo_index: usize,
    combo_len: usize,
    queue: InputQueue,
}

impl WeaponActions {
    pub fn new(combo_len: usize, hold: Duration) -> Self {
        Self {
            state: WeaponState::Invalid,
            action_clip: Clip::UnSheath,
            combo_index: 0,
            combo_len: combo_len.max(1),
            queue: InputQueue::new(hold),
        }
    }

    /// Called once the rig has been found; the weapon starts on the back.
    pub fn activate(&mut self) {
        if self.state == WeaponState::Invalid {
            self.state = WeaponState::Unequipped;
        }
    }

    pub fn state(&self) -> WeaponState {
        self.state
    }

    pub fn combo_index(&self) -> usize {
        self.combo_index
    }

    pub fn queue(&self) -> &InputQueue {
        &self.queue
    }

    fn buffer_attack(&mut self, attack: bool) {
        if attack && self.queue.is_empty() {
            self.queue.set_input(Controls::PRIMARY);
        }
    }

    pub fn tick(
        &mut self,
        equip: bool,
        attack: bool,
        grounded: bool,
        delta: Duration,
        anim: &mut impl AnimationDriver,
    ) -> WeaponTick {
        self.queue.update(delta);

        let previous = self.state;
        let mut mount = None;

        match self.state {
            WeaponState::Invalid => {}
            WeaponState::Unequipped => {
                if equip {
                    self.action_clip = Clip::UnSheath;
                    anim.play(self.action_clip, AnimLayer::Weapon, false, 0.0);
                    anim.set_time(self.action_clip, 0.0);
                    mount = Some(MountPoint::Hand);
                    self.state = WeaponState::Equipping;
                }
            }
            WeaponState::Equipping => {
                self.buffer_attack(attack);
                anim.play(self.action_clip, AnimLayer::Weapon, false, ACTION_FADE);

                if anim.is_at_end(self.action_clip) {
                    // A buffered swing starts next tick, so don't bother with the idle pose.
                    if self.queue.is_empty() {
                        anim.play_exclusive(Clip::EquipIdle, AnimLayer::Weapon, true, ACTION_FADE);
                    }
                    self.state = WeaponState::Equipped;
                }
            }
            WeaponState::Equipped => {
                if equip {
                    self.action_clip = Clip::Sheath;
                    anim.play(self.action_clip, AnimLayer::Weapon, false, ACTION_FADE);
                    anim.set_time(self.action_clip, 0.0);
                    self.state = WeaponState::Unequipping;
                } else if attack || !self.queue.is_empty() {
                    if grounded {
                        let clip = Clip::Combo(self.combo_index);
                        if anim.play_exclusive(clip, AnimLayer::Body, false, ACTION_FADE) {
                            self.queue.reset();
                            self.action_clip = clip;
                            anim.set_time(clip, 0.0);
                            anim.stop_layer(AnimLayer::Weapon, 0.0);
                            self.state = WeaponState::AttackAnim;
                        } else {
                            // Body layer is busy, keep the press for the next tick.
                            self.buffer_attack(attack);
                        }
                    } else {
                        self.buffer_attack(attack);
                    }
                }
            }
            WeaponState::Unequipping => {
                anim.play(self.action_clip, AnimLayer::Weapon, false, ACTION_FADE);
                if anim.is_at_end(self.action_clip) {
                    anim.stop_layer(AnimLayer::Weapon, SHEATHE_STOP_FADE);
                    mount = Some(MountPoint::Back);
                    self.state = WeaponState::Unequipped;
                }
            }
            WeaponState::AttackAnim => {
                self.buffer_attack(attack);
                anim.play_exclusive(self.action_clip, AnimLayer::Body, false, ACTION_FADE);

                if anim.is_at_end(self.action_clip) {
                    if self.queue.is_empty() {
                        self.combo_index = 0;
                        anim.play_exclusive(Clip::EquipIdle, AnimLayer::Weapon, true, ACTION_FADE);
                    } else {
                        self.combo_index = (self.combo_index + 1) % self.combo_len;
                    }
                    self.state = WeaponState::Equipped;
                }
            }
        }

        if previous != self.state {
            debug!(
                "weapon {:?} -> {:?} (combo {})",
                previous, self.state, self.combo_index
            );
        }

        WeaponTick {
            previous,
            current: self.state,
            mount,
        }
    }
}
