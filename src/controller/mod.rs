//! Controller subsystem for gamepad state sampling
//!
//! Implements the per-tick input pipeline feeding the arbiter:
//!
//! 1. [`device_reader`] - Device selection and raw snapshot sampling
//! 2. [`edge_detector`] - Released-to-pressed transitions between ticks
//! 3. [`axis_debouncer`] - Deadzone and auto-repeat for the primary stick
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Reader ──► EdgeDetector ──► pressed ButtonSet ──► Arbiter
//!                   └──► AxisDebouncer ─► AxisFire (per listener)
//! ```

pub mod axis_debouncer;
pub mod device_reader;
pub mod edge_detector;
pub mod snapshot;

pub use axis_debouncer::{AxisDebouncer, AxisFire, AxisTimestamps, Direction};
pub use device_reader::{
    disconnect_notice, screen_axis, select_device, DeviceEvent, GilrsReader, ReaderError,
    ScriptedReader, SnapshotReader,
};
pub use edge_detector::{detect_edges, EdgeDetector};
pub use snapshot::{AxisId, ButtonId, ButtonSet, DeviceSnapshot};
