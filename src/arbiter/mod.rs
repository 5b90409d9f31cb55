//! Input arbiter - frame-driven routing of gamepad input to UI listeners
//!
//! One [`InputArbiter`] owns the whole routing state: the listener registry,
//! the previous snapshot, the per-tick consumed set and the loop lifecycle.
//! Each tick it reads one snapshot, computes press edges, hands every edge to
//! at most one listener (highest priority first) and then lets every listener
//! evaluate the primary stick on its own repeat timer.
//!
//! # Lifecycle
//!
//! ```text
//!            device connected / registration while connected
//! Stopped ────────────────────────────────────────────────────► Running
//!    ▲                                                             │
//!    └──────────── device disconnected / no device read ───────────┘
//! ```
//!
//! Listener count never stops the loop: a view being replaced deregisters
//! before its successor registers, and the loop has to survive that gap.

pub mod listener;
pub mod scheduler;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ArbiterSettings;
use crate::controller::axis_debouncer::AxisDebouncer;
use crate::controller::device_reader::{DeviceEvent, GilrsReader, Reading, SnapshotReader};
use crate::controller::edge_detector::EdgeDetector;
use crate::controller::snapshot::{ButtonSet, DeviceSnapshot};
use crate::error::ArbiterError;

pub use listener::{
    AxisCallback, ButtonCallback, CallbackResult, EventName, ListenerCallbacks, ListenerHandle,
    ListenerId, ListenerRegistry,
};
pub use scheduler::{Clock, FrameHandle, FrameQueue, FrameScheduler, ManualClock, SystemClock};

use listener::Listener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Stopped,
    Running { frame: FrameHandle },
}

pub struct InputArbiter<R, S = FrameQueue, C = SystemClock> {
    reader: R,
    scheduler: S,
    clock: C,
    registry: ListenerRegistry,
    edges: EdgeDetector,
    debouncer: AxisDebouncer,

    // Buttons already handled by some listener this tick
    consumed: ButtonSet,

    state: LoopState,
    connected: watch::Sender<bool>,

    ticks: u64,
    stats_interval_ticks: u64,
}

/// Arbiter reading real hardware through gilrs.
pub type HardwareArbiter = InputArbiter<GilrsReader<Reading>, FrameQueue, SystemClock>;

impl HardwareArbiter {
    pub fn with_gilrs(settings: &ArbiterSettings) -> Result<Self, ArbiterError> {
        settings.validate()?;
        let reader = GilrsReader::create(settings.excluded_devices.clone())?.initialize();
        Ok(Self::new(reader, FrameQueue::new(), SystemClock::new(), settings))
    }
}

impl<R, S, C> InputArbiter<R, S, C>
where
    R: SnapshotReader,
    S: FrameScheduler,
    C: Clock,
{
    pub fn new(reader: R, scheduler: S, clock: C, settings: &ArbiterSettings) -> Self {
        debug!("Creating input arbiter with settings: {:?}", settings);
        let (connected, _) = watch::channel(false);
        Self {
            reader,
            scheduler,
            clock,
            registry: ListenerRegistry::new(),
            edges: EdgeDetector::new(),
            debouncer: AxisDebouncer::new(settings.deadzone, settings.repeat_delay_ms),
            consumed: ButtonSet::new(),
            state: LoopState::Stopped,
            connected,
            ticks: 0,
            stats_interval_ticks: settings.stats_interval_ticks,
        }
    }

    /// Registers a listener. Starts the loop if a device is connected and the
    /// loop is not running.
    pub fn register_listener(
        &mut self,
        callbacks: ListenerCallbacks,
        priority: i32,
    ) -> ListenerHandle {
        let handle = self.registry.register(callbacks, priority);
        self.restart_if_idle();
        handle
    }

    /// Registers under a reserved id, replacing whatever that id held before.
    pub fn register_listener_as(
        &mut self,
        id: ListenerId,
        callbacks: ListenerCallbacks,
        priority: i32,
    ) -> ListenerHandle {
        let handle = self.registry.register_as(id, callbacks, priority);
        self.restart_if_idle();
        handle
    }

    /// Shared registry handle, for registering or removing listeners from
    /// inside callbacks. Registrations made through it do not start the loop.
    pub fn registry(&self) -> ListenerRegistry {
        self.registry.clone()
    }

    fn restart_if_idle(&mut self) {
        if self.is_device_connected() && self.state == LoopState::Stopped {
            self.start_loop();
        }
    }

    pub fn device_connected(&mut self, index: usize, name: &str) {
        info!("Gamepad connected: {} (index {})", name, index);
        self.connected.send_replace(true);
        self.start_loop();
    }

    pub fn device_disconnected(&mut self) {
        info!("Gamepad disconnected");
        self.connected.send_replace(false);
        self.stop_loop();
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected { index, name } => self.device_connected(index, &name),
            DeviceEvent::Disconnected { .. } => self.device_disconnected(),
        }
    }

    /// Forwards the reader's pending connection notifications.
    pub fn pump_device_events(&mut self) {
        for event in self.reader.poll_device_events() {
            self.handle_device_event(event);
        }
    }

    pub fn is_device_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Receiver that observes every connection change.
    pub fn subscribe_connection(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LoopState::Running { .. })
    }

    /// Ticks executed since the arbiter was created.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn start_loop(&mut self) {
        if self.is_running() {
            debug!("Polling loop already active");
            return;
        }

        info!("Starting polling loop");
        self.edges.reset();
        let frame = self.scheduler.schedule_next_tick();
        self.state = LoopState::Running { frame };
    }

    pub fn stop_loop(&mut self) {
        if let LoopState::Running { frame } = self.state {
            info!("Stopping polling loop after {} ticks", self.ticks);
            self.scheduler.cancel(frame);
            self.state = LoopState::Stopped;
        }
    }

    /// Entry point for the host when a scheduled frame fires. Frames that are
    /// not the loop's current request are ignored. Returns whether a tick ran.
    pub fn run_frame(&mut self, frame: FrameHandle) -> bool {
        match self.state {
            LoopState::Running { frame: current } if current == frame => {
                self.tick();
                true
            }
            _ => {
                debug!("Ignoring stale frame {}", frame.id());
                false
            }
        }
    }

    fn tick(&mut self) {
        self.ticks += 1;
        self.consumed.clear();

        let Some(snapshot) = self.reader.read_snapshot() else {
            warn!("No gamepad available, halting polling loop");
            self.connected.send_replace(false);
            self.stop_loop();
            return;
        };

        if self.stats_interval_ticks > 0 && self.ticks % self.stats_interval_ticks == 0 {
            debug!(
                "{} ticks, {} listeners active, device {} reporting {} buttons",
                self.ticks,
                self.registry.len(),
                snapshot.device_index,
                snapshot.buttons.len()
            );
        }

        let now = self.clock.now_ms();
        let pressed = self.edges.advance(snapshot.clone());
        let listeners = self.registry.snapshot();

        self.dispatch_buttons(&listeners, pressed);
        self.dispatch_axes(&listeners, &snapshot, now);

        let frame = self.scheduler.schedule_next_tick();
        self.state = LoopState::Running { frame };
    }

    fn dispatch_buttons(&mut self, listeners: &[Rc<Listener>], pressed: ButtonSet) {
        if pressed.is_empty() {
            return;
        }

        for listener in listeners {
            for button in pressed.iter() {
                if !listener.is_active() {
                    break;
                }
                if self.consumed.contains(button) {
                    continue;
                }

                let mut callbacks = listener.callbacks.borrow_mut();
                let Some(callback) = callbacks.button_mut(button) else {
                    continue;
                };

                let event = EventName::from(button);
                debug!(
                    "Calling {} ({}, priority {})",
                    event, listener.id, listener.priority
                );
                run_guarded(event, listener.id, || callback());
                self.consumed.insert(button);
            }
        }
    }

    // Axis steps are never consumed: each listener runs its own repeat timer
    fn dispatch_axes(
        &mut self,
        listeners: &[Rc<Listener>],
        snapshot: &DeviceSnapshot,
        now: u64,
    ) {
        for listener in listeners {
            if !listener.is_active() {
                continue;
            }

            let mut timestamps = listener.axis_state.get();
            let fire = self.debouncer.maybe_fire(&mut timestamps, snapshot, now);
            listener.axis_state.set(timestamps);

            if let Some(direction) = fire.horizontal {
                let mut callbacks = listener.callbacks.borrow_mut();
                if let Some(callback) = callbacks.horizontal_mut() {
                    run_guarded(EventName::OnHorizontal, listener.id, || callback(direction));
                }
            }

            if let Some(direction) = fire.vertical {
                if !listener.is_active() {
                    continue;
                }
                let mut callbacks = listener.callbacks.borrow_mut();
                if let Some(callback) = callbacks.vertical_mut() {
                    run_guarded(EventName::OnVertical, listener.id, || callback(direction));
                }
            }
        }
    }
}

impl<R, C> InputArbiter<R, FrameQueue, C>
where
    R: SnapshotReader,
    C: Clock,
{
    /// Releases one frame: runs every tick requested before this call.
    /// Returns the number of ticks executed.
    pub fn advance_frame(&mut self) -> usize {
        let due = self.scheduler.take_due();
        let mut ran = 0;
        for frame in due {
            if self.run_frame(frame) {
                ran += 1;
            }
        }
        ran
    }
}

// Failure boundary around one callback: errors and panics are logged, never propagated
fn run_guarded<F>(event: EventName, listener: ListenerId, callback: F)
where
    F: FnOnce() -> CallbackResult,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => debug!("{} finished ({})", event, listener),
        Ok(Err(e)) => error!("Error in callback {} ({}): {:?}", event, listener, e),
        Err(payload) => {
            error!(
                "Callback {} ({}) panicked: {}",
                event,
                listener,
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
