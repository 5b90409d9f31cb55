use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use statum::{machine, state};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

use crate::controller::snapshot::{AxisId, ButtonId, DeviceSnapshot};

/// Connection changes reported by the platform input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected { index: usize, name: String },
    Disconnected { index: usize },
}

// Reader errors
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Failed to initialize input backend: {0}")]
    InitializationError(String),
}

/// Source of per-tick device state.
///
/// `read_snapshot` returning `None` means no eligible device is connected,
/// which is a normal condition and stops the polling loop.
pub trait SnapshotReader {
    fn read_snapshot(&mut self) -> Option<DeviceSnapshot>;

    /// Drains pending connect/disconnect notifications.
    fn poll_device_events(&mut self) -> Vec<DeviceEvent> {
        Vec::new()
    }
}

/// Picks the first device, by enumeration order, whose name is non-empty and
/// does not contain any excluded substring. Returns its device index.
pub fn select_device<'a>(
    devices: impl IntoIterator<Item = (usize, &'a str)>,
    excluded: &[String],
) -> Option<usize> {
    devices
        .into_iter()
        .find(|(_, name)| is_eligible(name, excluded))
        .map(|(index, _)| index)
}

/// Notification for losing device `lost`. `None` while another eligible
/// device is still connected, since the next read selects that one instead.
pub fn disconnect_notice<'a>(
    lost: usize,
    devices: impl IntoIterator<Item = (usize, &'a str)>,
    excluded: &[String],
) -> Option<DeviceEvent> {
    let remaining = devices.into_iter().filter(|(index, _)| *index != lost);
    match select_device(remaining, excluded) {
        Some(_) => None,
        None => Some(DeviceEvent::Disconnected { index: lost }),
    }
}

/// Converts a raw stick reading to screen orientation: +1 is right on X and
/// down on Y. The backend reports Y with up positive.
pub fn screen_axis(axis: AxisId, raw: f32) -> f32 {
    match axis {
        AxisId::LeftStickX | AxisId::RightStickX => raw,
        AxisId::LeftStickY | AxisId::RightStickY => -raw,
    }
}

pub fn is_eligible(name: &str, excluded: &[String]) -> bool {
    !name.is_empty() && !excluded.iter().any(|pattern| name.contains(pattern.as_str()))
}

// Define reader states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum ReaderState {
    Initializing,
    Reading,
}

#[machine]
#[derive(Debug)]
pub struct GilrsReader<S: ReaderState> {
    // Gilrs context
    gilrs: Gilrs,

    // Gamepad the last snapshot came from
    selected: Option<GamepadId>,

    // Name substrings of peripherals that are not game controllers
    excluded_devices: Vec<String>,

    // Connection events seen while pumping for snapshots
    pending: Vec<DeviceEvent>,
}

impl<S: ReaderState> GilrsReader<S> {
    pub fn excluded_devices(&self) -> &[String] {
        &self.excluded_devices
    }

    fn connected_gamepads(&self) -> Vec<(GamepadId, String)> {
        self.gilrs
            .gamepads()
            .filter(|(_, gamepad)| gamepad.is_connected())
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect()
    }

    fn eligible_gamepads(&self) -> Vec<(GamepadId, String)> {
        self.connected_gamepads()
            .into_iter()
            .filter(|(_, name)| is_eligible(name, &self.excluded_devices))
            .collect()
    }
}

impl GilrsReader<Initializing> {
    pub fn create(excluded_devices: Vec<String>) -> Result<Self, ReaderError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(ReaderError::InitializationError(e.to_string()));
            }
        };

        debug!("Excluding devices matching: {:?}", excluded_devices);
        Ok(Self::new(gilrs, None, excluded_devices, Vec::new()))
    }

    /// Enumerates the pads that are already plugged in and queues a connect
    /// notification for the first eligible one.
    pub fn initialize(mut self) -> GilrsReader<Reading> {
        let gamepads: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, waiting for a connection");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, name)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, name);
            }
        }

        if let Some((id, name)) = self.eligible_gamepads().into_iter().next() {
            info!("Selected gamepad: {} ({})", name, id);
            self.pending.push(DeviceEvent::Connected {
                index: usize::from(id),
                name,
            });
        }

        self.transition()
    }
}

impl GilrsReader<Reading> {
    // Pull every queued gilrs event; gilrs only refreshes cached state here
    fn pump(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    let name = self.gilrs.gamepad(id).name().to_string();
                    if !is_eligible(&name, &self.excluded_devices) {
                        debug!("Ignoring excluded device: {}", name);
                        continue;
                    }
                    info!("Controller connected: {} ({})", name, id);
                    self.pending.push(DeviceEvent::Connected {
                        index: usize::from(id),
                        name,
                    });
                }
                EventType::Disconnected => {
                    let devices = self.connected_gamepads();
                    let notice = disconnect_notice(
                        usize::from(id),
                        devices
                            .iter()
                            .map(|(other, name)| (usize::from(*other), name.as_str())),
                        &self.excluded_devices,
                    );
                    match notice {
                        Some(notice) => {
                            warn!("Controller disconnected: {}", id);
                            self.pending.push(notice);
                        }
                        None => info!(
                            "Controller {} disconnected, another controller is still connected",
                            id
                        ),
                    }
                    if self.selected == Some(id) {
                        self.selected = None;
                    }
                }
                _ => {}
            }
        }
    }
}

impl SnapshotReader for GilrsReader<Reading> {
    fn read_snapshot(&mut self) -> Option<DeviceSnapshot> {
        self.pump();

        let candidates = self.eligible_gamepads();
        let index = select_device(
            candidates
                .iter()
                .map(|(id, name)| (usize::from(*id), name.as_str())),
            &self.excluded_devices,
        )?;
        let (id, name) = candidates
            .into_iter()
            .find(|(id, _)| usize::from(*id) == index)?;

        if self.selected != Some(id) {
            info!("Reading from gamepad: {} ({})", name, id);
            self.selected = Some(id);
        }

        let gamepad = self.gilrs.connected_gamepad(id)?;
        let mut snapshot = DeviceSnapshot::new(index);
        for button in ButtonId::ALL {
            if let Some(data) = gamepad.button_data(to_gilrs_button(button)) {
                snapshot.buttons.insert(button, data.is_pressed());
            }
        }
        for (axis, raw) in [
            (AxisId::LeftStickX, Axis::LeftStickX),
            (AxisId::LeftStickY, Axis::LeftStickY),
            (AxisId::RightStickX, Axis::RightStickX),
            (AxisId::RightStickY, Axis::RightStickY),
        ] {
            snapshot = snapshot.with_axis(axis, screen_axis(axis, gamepad.value(raw)));
        }
        Some(snapshot)
    }

    fn poll_device_events(&mut self) -> Vec<DeviceEvent> {
        self.pump();
        std::mem::take(&mut self.pending)
    }
}

// Helper function to map our ButtonId to the gilrs Button
fn to_gilrs_button(button: ButtonId) -> Button {
    match button {
        ButtonId::A => Button::South,
        ButtonId::B => Button::East,
        ButtonId::X => Button::West,
        ButtonId::Y => Button::North,
        ButtonId::LB => Button::LeftTrigger,
        ButtonId::RB => Button::RightTrigger,
        ButtonId::LT => Button::LeftTrigger2,
        ButtonId::RT => Button::RightTrigger2,
        ButtonId::Select => Button::Select,
        ButtonId::Start => Button::Start,
        ButtonId::L3 => Button::LeftThumb,
        ButtonId::R3 => Button::RightThumb,
        ButtonId::DPadUp => Button::DPadUp,
        ButtonId::DPadDown => Button::DPadDown,
        ButtonId::DPadLeft => Button::DPadLeft,
        ButtonId::DPadRight => Button::DPadRight,
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    snapshot: Option<DeviceSnapshot>,
    events: VecDeque<DeviceEvent>,
    reads: usize,
}

/// Reader fed by hand, for driving the arbiter without hardware.
///
/// Clones share state, so a test can keep one clone while the arbiter owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReader {
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plugs in a device with all buttons released and queues its connect event.
    pub fn connect(&self, index: usize, name: &str) {
        let mut state = self.state.borrow_mut();
        state.snapshot = Some(DeviceSnapshot::from_raw(
            index,
            &[false; ButtonId::COUNT],
            &[0.0, 0.0],
        ));
        state.events.push_back(DeviceEvent::Connected {
            index,
            name: name.to_string(),
        });
    }

    pub fn disconnect(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(snapshot) = state.snapshot.take() {
            state.events.push_back(DeviceEvent::Disconnected {
                index: snapshot.device_index,
            });
        }
    }

    pub fn set_snapshot(&self, snapshot: Option<DeviceSnapshot>) {
        self.state.borrow_mut().snapshot = snapshot;
    }

    /// Sets one button on the current snapshot, if a device is present.
    pub fn set_button(&self, button: ButtonId, pressed: bool) {
        if let Some(snapshot) = self.state.borrow_mut().snapshot.as_mut() {
            snapshot.buttons.insert(button, pressed);
        }
    }

    pub fn set_axis(&self, axis: AxisId, value: f32) {
        if let Some(snapshot) = self.state.borrow_mut().snapshot.as_mut() {
            snapshot.axes.insert(axis, value.clamp(-1.0, 1.0));
        }
    }

    /// Number of times the arbiter has read a snapshot.
    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }
}

impl SnapshotReader for ScriptedReader {
    fn read_snapshot(&mut self) -> Option<DeviceSnapshot> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;
        state.snapshot.clone()
    }

    fn poll_device_events(&mut self) -> Vec<DeviceEvent> {
        self.state.borrow_mut().events.drain(..).collect()
    }
}
