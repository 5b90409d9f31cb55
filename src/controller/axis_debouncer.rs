//! Turns continuous stick deflection into discrete, auto-repeating steps.

use crate::controller::snapshot::{AxisId, DeviceSnapshot};

pub const DEFAULT_DEADZONE: f32 = 0.3;
pub const DEFAULT_REPEAT_DELAY_MS: u64 = 200;

// Sign of an axis step; `Positive` is right / down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Negative,
    Positive,
}

impl Direction {
    pub fn of(value: f32) -> Self {
        if value > 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Negative => -1,
            Direction::Positive => 1,
        }
    }
}

/// Last fire time per axis, in clock milliseconds. `None` means the stick was
/// inside the deadzone at the last evaluation and the next push fires at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisTimestamps {
    pub horizontal: Option<u64>,
    pub vertical: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisFire {
    pub horizontal: Option<Direction>,
    pub vertical: Option<Direction>,
}

#[derive(Debug, Clone, Copy)]
pub struct AxisDebouncer {
    deadzone: f32,
    repeat_delay_ms: u64,
}

impl Default for AxisDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEADZONE, DEFAULT_REPEAT_DELAY_MS)
    }
}

impl AxisDebouncer {
    pub fn new(deadzone: f32, repeat_delay_ms: u64) -> Self {
        Self {
            deadzone,
            repeat_delay_ms,
        }
    }

    /// Evaluates the primary stick for one listener and updates its timestamps.
    pub fn maybe_fire(
        &self,
        state: &mut AxisTimestamps,
        snapshot: &DeviceSnapshot,
        now: u64,
    ) -> AxisFire {
        AxisFire {
            horizontal: self.step(
                &mut state.horizontal,
                snapshot.axis(AxisId::LeftStickX),
                now,
            ),
            vertical: self.step(&mut state.vertical, snapshot.axis(AxisId::LeftStickY), now),
        }
    }

    fn step(&self, last_fire: &mut Option<u64>, value: f32, now: u64) -> Option<Direction> {
        if value.abs() <= self.deadzone {
            *last_fire = None;
            return None;
        }

        let due = match *last_fire {
            None => true,
            Some(last) => now.saturating_sub(last) > self.repeat_delay_ms,
        };
        if !due {
            return None;
        }

        *last_fire = Some(now);
        Some(Direction::of(value))
    }
}
