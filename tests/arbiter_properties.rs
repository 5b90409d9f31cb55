use color_eyre::eyre::eyre;
use input_arbiter::arbiter::{FrameQueue, ManualClock};
use input_arbiter::controller::{AxisId, ButtonId, DeviceSnapshot, ScriptedReader};
use input_arbiter::{ArbiterSettings, InputArbiter, ListenerCallbacks, ListenerHandle};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const FRAME_MS: u64 = 16;

type TestArbiter = InputArbiter<ScriptedReader, FrameQueue, ManualClock>;

struct Harness {
    arbiter: TestArbiter,
    pad: ScriptedReader,
    clock: ManualClock,
}

impl Harness {
    fn new() -> Self {
        let pad = ScriptedReader::new();
        let clock = ManualClock::new(10_000);
        let arbiter = InputArbiter::new(
            pad.clone(),
            FrameQueue::new(),
            clock.clone(),
            &ArbiterSettings::default(),
        );
        Self {
            arbiter,
            pad,
            clock,
        }
    }

    fn connected() -> Self {
        let mut harness = Self::new();
        harness.pad.connect(0, "Xbox Wireless Controller");
        harness.arbiter.pump_device_events();
        // Prime the edge detector with the idle state
        harness.frame();
        harness
    }

    fn frame(&mut self) -> usize {
        self.clock.advance(FRAME_MS);
        self.arbiter.pump_device_events();
        self.arbiter.advance_frame()
    }
}

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

fn bump(count: &Rc<Cell<u32>>) -> impl FnMut() -> color_eyre::eyre::Result<()> {
    let count = Rc::clone(count);
    move || {
        count.set(count.get() + 1);
        Ok(())
    }
}

#[test]
fn held_button_fires_once() {
    let mut h = Harness::connected();
    let presses = counter();
    let _l = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::A, bump(&presses)), 0);

    h.pad.set_button(ButtonId::A, true);
    for _ in 0..10 {
        h.frame();
    }
    assert_eq!(presses.get(), 1);

    h.pad.set_button(ButtonId::A, false);
    h.frame();
    h.pad.set_button(ButtonId::A, true);
    h.frame();
    assert_eq!(presses.get(), 2);
}

#[test]
fn higher_priority_consumes_the_press() {
    let mut h = Harness::connected();
    let (high, low) = (counter(), counter());
    let _low = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::B, bump(&low)), 5);
    let _high = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::B, bump(&high)), 10);

    h.pad.set_button(ButtonId::B, true);
    h.frame();
    assert_eq!((high.get(), low.get()), (1, 0));
}

#[test]
fn distinct_buttons_route_to_different_listeners() {
    let mut h = Harness::connected();
    let (modal_cancel, grid_confirm) = (counter(), counter());
    let _grid = h.arbiter.register_listener(
        ListenerCallbacks::new().on(ButtonId::A, bump(&grid_confirm)),
        5,
    );
    let _modal = h.arbiter.register_listener(
        ListenerCallbacks::new().on(ButtonId::B, bump(&modal_cancel)),
        10,
    );

    h.pad.set_button(ButtonId::A, true);
    h.pad.set_button(ButtonId::B, true);
    h.frame();
    assert_eq!((modal_cancel.get(), grid_confirm.get()), (1, 1));
}

#[test]
fn equal_priority_goes_to_earliest_registration() {
    let mut h = Harness::connected();
    let (first, second) = (counter(), counter());
    let _first = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::Y, bump(&first)), 3);
    let _second = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::Y, bump(&second)), 3);

    h.pad.set_button(ButtonId::Y, true);
    h.frame();
    assert_eq!((first.get(), second.get()), (1, 0));
}

#[test]
fn held_stick_repeats_at_debounce_rate() {
    let mut h = Harness::connected();
    let steps = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&steps);
    let _l = h.arbiter.register_listener(
        ListenerCallbacks::new().on_horizontal(move |direction| {
            record.borrow_mut().push(direction.as_i8());
            Ok(())
        }),
        0,
    );

    h.pad.set_axis(AxisId::LeftStickX, 0.8);
    let frames = 1000 / FRAME_MS;
    for _ in 0..frames {
        h.frame();
    }

    let fired = steps.borrow().len();
    assert!(fired >= 4, "fired {} times", fired);
    assert!(fired <= 6, "fired {} times", fired);
    assert!(steps.borrow().iter().all(|d| *d == 1));
}

#[test]
fn releasing_stick_allows_immediate_refire() {
    let mut h = Harness::connected();
    let steps = counter();
    let count = Rc::clone(&steps);
    let _l = h.arbiter.register_listener(
        ListenerCallbacks::new().on_vertical(move |_| {
            count.set(count.get() + 1);
            Ok(())
        }),
        0,
    );

    h.pad.set_axis(AxisId::LeftStickY, -0.9);
    h.frame();
    assert_eq!(steps.get(), 1);

    h.pad.set_axis(AxisId::LeftStickY, 0.0);
    h.frame();
    h.pad.set_axis(AxisId::LeftStickY, -0.9);
    h.frame();
    assert_eq!(steps.get(), 2);
}

#[test]
fn axis_timers_are_per_listener_and_never_consumed() {
    let mut h = Harness::connected();
    let (menu, grid) = (counter(), counter());
    let menu_count = Rc::clone(&menu);
    let grid_count = Rc::clone(&grid);
    let _menu = h.arbiter.register_listener(
        ListenerCallbacks::new().on_horizontal(move |_| {
            menu_count.set(menu_count.get() + 1);
            Ok(())
        }),
        10,
    );

    h.pad.set_axis(AxisId::LeftStickX, 0.8);
    h.frame();
    h.frame();

    // Registered mid-cooldown of the other listener: fires on its first tick
    let _grid = h.arbiter.register_listener(
        ListenerCallbacks::new().on_horizontal(move |_| {
            grid_count.set(grid_count.get() + 1);
            Ok(())
        }),
        0,
    );
    h.frame();

    assert_eq!(menu.get(), 1);
    assert_eq!(grid.get(), 1);
}

#[test]
fn buttons_dispatch_before_axes_across_listeners() {
    let mut h = Harness::connected();
    let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let (axis_log, button_log) = (Rc::clone(&order), Rc::clone(&order));

    let _carousel = h.arbiter.register_listener(
        ListenerCallbacks::new().on_horizontal(move |_| {
            axis_log.borrow_mut().push("axis-hi");
            Ok(())
        }),
        10,
    );
    let _grid = h.arbiter.register_listener(
        ListenerCallbacks::new().on(ButtonId::A, move || {
            button_log.borrow_mut().push("button-lo");
            Ok(())
        }),
        0,
    );

    h.pad.set_button(ButtonId::A, true);
    h.pad.set_axis(AxisId::LeftStickX, 1.0);
    h.frame();

    assert_eq!(*order.borrow(), vec!["button-lo", "axis-hi"]);
}

#[test]
fn deregistered_in_callback_receives_nothing() {
    let mut h = Harness::connected();
    let victim_calls = counter();
    let victim_slot: Rc<RefCell<Option<ListenerHandle>>> = Rc::new(RefCell::new(None));

    let slot = Rc::clone(&victim_slot);
    let _killer = h.arbiter.register_listener(
        ListenerCallbacks::new().on(ButtonId::Start, move || {
            if let Some(handle) = slot.borrow().as_ref() {
                handle.deregister();
            }
            Ok(())
        }),
        10,
    );
    let victim_count = Rc::clone(&victim_calls);
    let victim = h.arbiter.register_listener(
        ListenerCallbacks::new()
            .on(ButtonId::X, bump(&victim_calls))
            .on_vertical(move |_| {
                victim_count.set(victim_count.get() + 1);
                Ok(())
            }),
        0,
    );
    *victim_slot.borrow_mut() = Some(victim.clone());

    h.pad.set_button(ButtonId::Start, true);
    h.pad.set_button(ButtonId::X, true);
    h.pad.set_axis(AxisId::LeftStickY, 1.0);
    h.frame();
    assert_eq!(victim_calls.get(), 0);
    assert!(!victim.is_registered());

    h.pad.set_button(ButtonId::X, false);
    h.frame();
    h.pad.set_button(ButtonId::X, true);
    h.frame();
    assert_eq!(victim_calls.get(), 0);
    assert_eq!(h.arbiter.listener_count(), 1);
}

#[test]
fn listener_registered_in_callback_waits_for_next_tick() {
    let mut h = Harness::connected();
    let late_calls = counter();
    let registry = h.arbiter.registry();
    let late = Rc::clone(&late_calls);
    let handles = Rc::new(RefCell::new(Vec::new()));
    let keep = Rc::clone(&handles);
    let _opener = h.arbiter.register_listener(
        ListenerCallbacks::new().on(ButtonId::Start, move || {
            let handle = registry.register(
                ListenerCallbacks::new().on(ButtonId::A, bump(&late)),
                100,
            );
            keep.borrow_mut().push(handle);
            Ok(())
        }),
        0,
    );

    h.pad.set_button(ButtonId::Start, true);
    h.pad.set_button(ButtonId::A, true);
    h.frame();
    assert_eq!(late_calls.get(), 0);
    assert_eq!(h.arbiter.listener_count(), 2);

    h.pad.set_button(ButtonId::A, false);
    h.frame();
    h.pad.set_button(ButtonId::A, true);
    h.frame();
    assert_eq!(late_calls.get(), 1);
}

#[test]
fn double_start_runs_a_single_loop() {
    let mut h = Harness::new();
    h.pad.connect(0, "Pad");
    h.arbiter.pump_device_events();
    h.arbiter.start_loop();
    let _a = h.arbiter.register_listener(ListenerCallbacks::new(), 0);
    let _b = h.arbiter.register_listener(ListenerCallbacks::new(), 1);
    h.arbiter.device_connected(0, "Pad");

    for expected in 1..=5 {
        assert_eq!(h.frame(), 1);
        assert_eq!(h.arbiter.tick_count(), expected);
    }
}

#[test]
fn removing_last_listener_keeps_loop_running() {
    let mut h = Harness::connected();
    let outgoing = h.arbiter.register_listener(ListenerCallbacks::new(), 0);
    outgoing.deregister();
    assert_eq!(h.arbiter.listener_count(), 0);

    let before = h.arbiter.tick_count();
    h.frame();
    assert!(h.arbiter.is_running());
    assert_eq!(h.arbiter.tick_count(), before + 1);
}

#[test]
fn failing_callbacks_are_isolated() {
    let mut h = Harness::connected();
    let b_calls = counter();
    let _l = h.arbiter.register_listener(
        ListenerCallbacks::new()
            .on(ButtonId::A, || panic!("grid state poisoned"))
            .on(ButtonId::X, || Err(eyre!("cover art missing")))
            .on(ButtonId::B, bump(&b_calls)),
        0,
    );

    h.pad.set_button(ButtonId::A, true);
    h.pad.set_button(ButtonId::X, true);
    h.pad.set_button(ButtonId::B, true);
    h.frame();
    assert_eq!(b_calls.get(), 1);

    let before = h.arbiter.tick_count();
    h.frame();
    h.frame();
    assert!(h.arbiter.is_running());
    assert_eq!(h.arbiter.tick_count(), before + 2);
}

#[test]
fn device_switch_does_not_replay_held_buttons() {
    let mut h = Harness::connected();
    let presses = counter();
    let _l = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::A, bump(&presses)), 0);

    h.pad
        .set_snapshot(Some(DeviceSnapshot::new(3).with_button(ButtonId::A, true)));
    h.frame();
    h.frame();
    assert_eq!(presses.get(), 0);
}

#[test]
fn connect_press_hold_release_disconnect() {
    let mut h = Harness::new();
    let connection = h.arbiter.subscribe_connection();
    assert!(!h.arbiter.is_running());

    h.pad.connect(0, "Xbox Wireless Controller");
    h.frame();
    assert!(h.arbiter.is_running());
    assert!(*connection.borrow());

    let on_a = counter();
    let _l1 = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::A, bump(&on_a)), 10);
    h.frame();

    h.pad.set_button(ButtonId::A, true);
    h.frame();
    assert_eq!(on_a.get(), 1);

    for _ in 0..3 {
        h.frame();
    }
    assert_eq!(on_a.get(), 1);

    h.pad.set_button(ButtonId::A, false);
    h.frame();

    h.pad.disconnect();
    h.frame();
    assert!(!h.arbiter.is_running());
    assert!(!*connection.borrow());

    let halted_at = h.arbiter.tick_count();
    for _ in 0..5 {
        assert_eq!(h.frame(), 0);
    }
    assert_eq!(h.arbiter.tick_count(), halted_at);
    assert_eq!(on_a.get(), 1);
}

#[test]
fn reconnect_restarts_without_stale_edges() {
    let mut h = Harness::connected();
    let presses = counter();
    let _l = h
        .arbiter
        .register_listener(ListenerCallbacks::new().on(ButtonId::A, bump(&presses)), 0);

    h.pad.disconnect();
    h.frame();
    assert!(!h.arbiter.is_running());

    h.pad.connect(0, "Xbox Wireless Controller");
    h.pad.set_button(ButtonId::A, true);
    h.frame();
    h.frame();
    assert!(h.arbiter.is_running());
    assert_eq!(presses.get(), 0);
}
