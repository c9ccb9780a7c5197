use std::time::Duration;

use bevy::prelude::*;

use crate::character_controller::Controls;

/// Holds at most one buffered press for a limited time.
#[derive(Debug, Clone)]
pub struct InputQueue {
    input: Controls,
    timer: Timer,
}

impl InputQueue {
    pub fn new(hold: Duration) -> Self {
        Self {
            input: Controls::empty(),
            timer: Timer::new(hold, TimerMode::Once),
        }
    }

    /// Stores `input` and restarts the hold timer. Callers check
    /// [`InputQueue::is_empty`] first, so an occupied slot is never overwritten.
    pub fn set_input(&mut self, input: Controls) {
        self.input = input;
        self.timer.reset();
    }

    /// Ages the buffered press and drops it once the hold time has passed.
    pub fn update(&mut self, delta: Duration) {
        if self.is_empty() {
            return;
        }
        self.timer.tick(delta);
        if self.timer.finished() {
            self.reset();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub fn input(&self) -> Controls {
        self.input
    }

    pub fn reset(&mut self) {
        self.input = Controls::empty();
        self.timer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: Duration = Duration::from_millis(1200);

    #[test]
    fn starts_empty() {
        let queue = InputQueue::new(HOLD);
        assert!(queue.is_empty());
        assert_eq!(queue.input(), Controls::empty());
    }

    #[test]
    fn press_survives_until_hold_time() {
        let mut queue = InputQueue::new(HOLD);
        queue.set_input(Controls::PRIMARY);
        queue.update(Duration::from_millis(1199));
        assert!(!queue.is_empty());
        assert_eq!(queue.input(), Controls::PRIMARY);
    }

    #[test]
    fn press_expires_at_hold_time() {
        let mut queue = InputQueue::new(HOLD);
        queue.set_input(Controls::PRIMARY);
        queue.update(Duration::from_millis(600));
        queue.update(Duration::from_millis(600));
        assert!(queue.is_empty());
    }

    #[test]
    fn set_input_restarts_the_timer() {
        let mut queue = InputQueue::new(HOLD);
        queue.set_input(Controls::PRIMARY);
        queue.update(Duration::from_millis(1000));
        queue.reset();
        queue.set_input(Controls::EQUIP);
        queue.update(Duration::from_millis(1000));
        assert_eq!(queue.input(), Controls::EQUIP);
    }

    #[test]
    fn idle_time_does_not_count_against_the_next_press() {
        let mut queue = InputQueue::new(HOLD);
        queue.update(Duration::from_secs(5));
        queue.set_input(Controls::PRIMARY);
        queue.update(Duration::from_millis(100));
        assert!(!queue.is_empty());
    }
}
