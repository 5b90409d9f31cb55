//! Listener registrations and the priority-ordered registry.

use color_eyre::eyre;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

use crate::controller::axis_debouncer::{AxisTimestamps, Direction};
use crate::controller::snapshot::ButtonId;

pub type CallbackResult = eyre::Result<()>;
pub type ButtonCallback = Box<dyn FnMut() -> CallbackResult>;
pub type AxisCallback = Box<dyn FnMut(Direction) -> CallbackResult>;

/// Every event a listener can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    OnA,
    OnB,
    OnX,
    OnY,
    OnLB,
    OnRB,
    OnLT,
    OnRT,
    OnSelect,
    OnStart,
    OnL3,
    OnR3,
    OnDPadUp,
    OnDPadDown,
    OnDPadLeft,
    OnDPadRight,
    OnHorizontal,
    OnVertical,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::OnA => "onA",
            EventName::OnB => "onB",
            EventName::OnX => "onX",
            EventName::OnY => "onY",
            EventName::OnLB => "onLB",
            EventName::OnRB => "onRB",
            EventName::OnLT => "onLT",
            EventName::OnRT => "onRT",
            EventName::OnSelect => "onSelect",
            EventName::OnStart => "onStart",
            EventName::OnL3 => "onL3",
            EventName::OnR3 => "onR3",
            EventName::OnDPadUp => "onDPadUp",
            EventName::OnDPadDown => "onDPadDown",
            EventName::OnDPadLeft => "onDPadLeft",
            EventName::OnDPadRight => "onDPadRight",
            EventName::OnHorizontal => "onHorizontal",
            EventName::OnVertical => "onVertical",
        }
    }
}

impl From<ButtonId> for EventName {
    fn from(button: ButtonId) -> Self {
        match button {
            ButtonId::A => EventName::OnA,
            ButtonId::B => EventName::OnB,
            ButtonId::X => EventName::OnX,
            ButtonId::Y => EventName::OnY,
            ButtonId::LB => EventName::OnLB,
            ButtonId::RB => EventName::OnRB,
            ButtonId::LT => EventName::OnLT,
            ButtonId::RT => EventName::OnRT,
            ButtonId::Select => EventName::OnSelect,
            ButtonId::Start => EventName::OnStart,
            ButtonId::L3 => EventName::OnL3,
            ButtonId::R3 => EventName::OnR3,
            ButtonId::DPadUp => EventName::OnDPadUp,
            ButtonId::DPadDown => EventName::OnDPadDown,
            ButtonId::DPadLeft => EventName::OnDPadLeft,
            ButtonId::DPadRight => EventName::OnDPadRight,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse callback table of one listener, indexed by button.
#[derive(Default)]
pub struct ListenerCallbacks {
    buttons: [Option<ButtonCallback>; ButtonId::COUNT],
    on_horizontal: Option<AxisCallback>,
    on_vertical: Option<AxisCallback>,
}

impl ListenerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, button: ButtonId, callback: F) -> Self
    where
        F: FnMut() -> CallbackResult + 'static,
    {
        self.buttons[button.index()] = Some(Box::new(callback));
        self
    }

    pub fn on_horizontal<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Direction) -> CallbackResult + 'static,
    {
        self.on_horizontal = Some(Box::new(callback));
        self
    }

    pub fn on_vertical<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Direction) -> CallbackResult + 'static,
    {
        self.on_vertical = Some(Box::new(callback));
        self
    }

    pub fn binds(&self, button: ButtonId) -> bool {
        self.buttons[button.index()].is_some()
    }

    pub fn bound_events(&self) -> Vec<EventName> {
        let mut events: Vec<EventName> = ButtonId::ALL
            .into_iter()
            .filter(|b| self.binds(*b))
            .map(EventName::from)
            .collect();
        if self.on_horizontal.is_some() {
            events.push(EventName::OnHorizontal);
        }
        if self.on_vertical.is_some() {
            events.push(EventName::OnVertical);
        }
        events
    }

    pub(crate) fn button_mut(&mut self, button: ButtonId) -> Option<&mut ButtonCallback> {
        self.buttons[button.index()].as_mut()
    }

    pub(crate) fn horizontal_mut(&mut self) -> Option<&mut AxisCallback> {
        self.on_horizontal.as_mut()
    }

    pub(crate) fn vertical_mut(&mut self) -> Option<&mut AxisCallback> {
        self.on_vertical.as_mut()
    }
}

impl fmt::Debug for ListenerCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bound_events()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// One registration: callbacks plus the per-listener axis timestamps.
#[derive(Debug)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) priority: i32,
    pub(crate) callbacks: RefCell<ListenerCallbacks>,
    pub(crate) axis_state: Cell<AxisTimestamps>,
    active: Cell<bool>,
}

impl Listener {
    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    listeners: Vec<Rc<Listener>>,
}

/// Priority-ordered listener collection.
///
/// Clones share the same registry. Dispatch works on [`ListenerRegistry::snapshot`],
/// so registering or deregistering from inside a callback never changes which
/// listeners the running tick visits; a deregistered listener is skipped.
#[derive(Debug, Clone, Default)]
pub struct ListenerRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an id for an owner that registers repeatedly, e.g. a view
    /// that rebinds its callbacks on every state change.
    pub fn allocate_id(&self) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        ListenerId(inner.next_id)
    }

    pub fn register(&self, callbacks: ListenerCallbacks, priority: i32) -> ListenerHandle {
        let id = self.allocate_id();
        self.register_as(id, callbacks, priority)
    }

    /// Registers under `id`, superseding any registration already holding it.
    pub fn register_as(
        &self,
        id: ListenerId,
        callbacks: ListenerCallbacks,
        priority: i32,
    ) -> ListenerHandle {
        debug!(
            "Registering {} with priority {}: {:?}",
            id, priority, callbacks
        );
        let listener = Rc::new(Listener {
            id,
            priority,
            callbacks: RefCell::new(callbacks),
            axis_state: Cell::new(AxisTimestamps::default()),
            active: Cell::new(true),
        });

        let mut inner = self.inner.borrow_mut();
        inner.listeners.retain(|existing| {
            if existing.id == id {
                debug!("Superseding previous registration of {}", id);
                existing.active.set(false);
                false
            } else {
                true
            }
        });
        inner.listeners.push(Rc::clone(&listener));
        // Stable sort: equal priorities keep registration order
        inner.listeners.sort_by(|a, b| b.priority.cmp(&a.priority));

        ListenerHandle {
            id,
            listener: Rc::downgrade(&listener),
            registry: Rc::downgrade(&self.inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids and priorities in dispatch order.
    pub fn order(&self) -> Vec<(ListenerId, i32)> {
        self.inner
            .borrow()
            .listeners
            .iter()
            .map(|l| (l.id, l.priority))
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<Rc<Listener>> {
        self.inner.borrow().listeners.clone()
    }
}

/// Returned by registration; removes exactly that registration.
#[must_use = "dropping the handle keeps the listener registered with no way to remove it"]
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    listener: Weak<Listener>,
    registry: Weak<RefCell<RegistryInner>>,
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_registered(&self) -> bool {
        self.listener
            .upgrade()
            .map(|l| l.is_active())
            .unwrap_or(false)
    }

    /// Removes the registration. Calling it again, or after the registration
    /// was superseded, does nothing.
    pub fn deregister(&self) {
        let Some(listener) = self.listener.upgrade() else {
            return;
        };
        listener.active.set(false);
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .listeners
                .retain(|l| !Rc::ptr_eq(l, &listener));
            debug!("Deregistered {}", self.id);
        }
    }
}
