use bevy::ecs::entity::EntityHashSet;
use bevy::prelude::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Reflect)]
pub enum DamageState {
    #[default]
    Off,
    On,
}

/// Sent once per target for every opened damage window.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponHit {
    pub attacker: Entity,
    pub target: Entity,
}

/// Gate for weapon contacts, opened and closed by tags in attack clips.
#[derive(Debug, Clone, Default)]
pub struct DamageWindow {
    state: DamageState,
    recipients: EntityHashSet,
}

impl DamageWindow {
    pub fn state(&self) -> DamageState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DamageState::On
    }

    /// Applies an animation trigger. Tags without `prefix` are not ours.
    /// Reopening the window forgets who was already hit.
    pub fn on_trigger(&mut self, tag: &str, prefix: &str) {
        if !tag.starts_with(prefix) {
            return;
        }
        let next = if tag.ends_with("ON") {
            DamageState::On
        } else {
            DamageState::Off
        };
        if self.state == DamageState::Off && next == DamageState::On {
            self.recipients.clear();
        }
        if self.state != next {
            trace!("damage window {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    /// Registers a weapon contact with `other`. Returns the hit to report, if any.
    pub fn on_contact(&mut self, attacker: Entity, other: Entity, is_static: bool) -> Option<WeaponHit> {
        if !self.is_open() || is_static {
            return None;
        }
        self.recipients.insert(other).then_some(WeaponHit {
            attacker,
            target: other,
        })
    }
}
