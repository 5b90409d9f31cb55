//! Device snapshot types shared by the reader, edge detector and arbiter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// Physical buttons in standard-layout order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ButtonId {
    A,
    B,
    X,
    Y,
    LB,
    RB,
    LT,
    RT,
    Select,
    Start,
    L3,
    R3,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

impl ButtonId {
    pub const COUNT: usize = 16;

    /// Every button, ordered by its standard-layout index.
    pub const ALL: [ButtonId; ButtonId::COUNT] = [
        ButtonId::A,
        ButtonId::B,
        ButtonId::X,
        ButtonId::Y,
        ButtonId::LB,
        ButtonId::RB,
        ButtonId::LT,
        ButtonId::RT,
        ButtonId::Select,
        ButtonId::Start,
        ButtonId::L3,
        ButtonId::R3,
        ButtonId::DPadUp,
        ButtonId::DPadDown,
        ButtonId::DPadLeft,
        ButtonId::DPadRight,
    ];

    /// Index of the button in the standard gamepad layout.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisId {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
}

/// Compact set of buttons, iterated in standard-layout order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSet(u16);

impl ButtonSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, button: ButtonId) {
        self.0 |= 1 << button.index();
    }

    pub fn contains(&self, button: ButtonId) -> bool {
        self.0 & (1 << button.index()) != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = ButtonId> + '_ {
        ButtonId::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl FromIterator<ButtonId> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = ButtonId>>(iter: I) -> Self {
        let mut set = ButtonSet::new();
        for button in iter {
            set.insert(button);
        }
        set
    }
}

/// Button and axis state of one device at one tick.
///
/// Built fresh for every tick and never mutated once handed to the arbiter.
/// Buttons the device did not report are simply absent from `buttons`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceSnapshot {
    pub device_index: usize,
    pub buttons: HashMap<ButtonId, bool>,
    pub axes: HashMap<AxisId, f32>,
}

impl DeviceSnapshot {
    pub fn new(device_index: usize) -> Self {
        Self {
            device_index,
            ..Default::default()
        }
    }

    /// Builds a snapshot from raw standard-layout arrays. Indices past the
    /// known buttons are ignored; axes map to left X, left Y, right X, right Y.
    pub fn from_raw(device_index: usize, buttons: &[bool], axes: &[f32]) -> Self {
        let mut snapshot = Self::new(device_index);
        for (index, pressed) in buttons.iter().enumerate() {
            if let Some(button) = ButtonId::from_index(index) {
                snapshot.buttons.insert(button, *pressed);
            }
        }
        let axis_ids = [
            AxisId::LeftStickX,
            AxisId::LeftStickY,
            AxisId::RightStickX,
            AxisId::RightStickY,
        ];
        for (axis, value) in axis_ids.iter().zip(axes) {
            snapshot.axes.insert(*axis, value.clamp(-1.0, 1.0));
        }
        snapshot
    }

    pub fn with_button(mut self, button: ButtonId, pressed: bool) -> Self {
        self.buttons.insert(button, pressed);
        self
    }

    pub fn with_axis(mut self, axis: AxisId, value: f32) -> Self {
        self.axes.insert(axis, value.clamp(-1.0, 1.0));
        self
    }

    /// `None` when the device did not report the button.
    pub fn button(&self, button: ButtonId) -> Option<bool> {
        self.buttons.get(&button).copied()
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.button(button).unwrap_or(false)
    }

    /// Missing axes read as centered.
    pub fn axis(&self, axis: AxisId) -> f32 {
        self.axes.get(&axis).copied().unwrap_or(0.0)
    }
}
