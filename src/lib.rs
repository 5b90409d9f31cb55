//! Gamepad input routing for the launcher UI.
//!
//! A single [`InputArbiter`] polls the controller once per frame and routes
//! button presses and stick steps to the listeners registered by the views
//! currently on screen.

pub mod arbiter;
pub mod config;
pub mod controller;
pub mod error;

pub use arbiter::{
    EventName, FrameQueue, HardwareArbiter, InputArbiter, ListenerCallbacks, ListenerHandle,
    ListenerId, ListenerRegistry,
};
pub use config::ArbiterSettings;
pub use controller::{ButtonId, DeviceSnapshot, Direction};
pub use error::ArbiterError;
