use tracing::debug;

use crate::controller::snapshot::{ButtonId, ButtonSet, DeviceSnapshot};

// Press and release transitions between two consecutive snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Edges {
    pressed: ButtonSet,
    released: ButtonSet,
}

/// Computes the buttons that went from released to pressed.
///
/// No edges are produced on the first tick (`previous` is `None`) or when the
/// two snapshots come from different device indices. A button missing from
/// `current` never edges; a button missing from `previous` counts as released.
pub fn detect_edges(previous: Option<&DeviceSnapshot>, current: &DeviceSnapshot) -> ButtonSet {
    transitions(previous, current).pressed
}

fn transitions(previous: Option<&DeviceSnapshot>, current: &DeviceSnapshot) -> Edges {
    let mut edges = Edges::default();
    let Some(previous) = previous else {
        return edges;
    };
    if previous.device_index != current.device_index {
        return edges;
    }

    for button in ButtonId::ALL {
        let Some(is_pressed) = current.button(button) else {
            continue;
        };
        let was_pressed = previous.is_pressed(button);
        if is_pressed && !was_pressed {
            edges.pressed.insert(button);
        } else if !is_pressed && was_pressed {
            edges.released.insert(button);
        }
    }
    edges
}

/// Holds the previous tick's snapshot and turns each new snapshot into edges.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    previous: Option<DeviceSnapshot>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous snapshot; the next call yields no edges.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&DeviceSnapshot> {
        self.previous.as_ref()
    }

    pub fn advance(&mut self, current: DeviceSnapshot) -> ButtonSet {
        if let Some(previous) = &self.previous {
            if previous.device_index != current.device_index {
                debug!(
                    "Device index changed {} -> {}, skipping edge detection this tick",
                    previous.device_index, current.device_index
                );
            }
        }

        let edges = transitions(self.previous.as_ref(), &current);
        for button in edges.pressed.iter() {
            debug!("Button {} pressed (released -> pressed)", button);
        }
        for button in edges.released.iter() {
            debug!("Button {} released (pressed -> released)", button);
        }

        self.previous = Some(current);
        edges.pressed
    }
}
