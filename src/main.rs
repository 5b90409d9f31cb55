use chrono::Local;
use color_eyre::{eyre::eyre, Result};
use input_arbiter::{
    ArbiterSettings, ButtonId, HardwareArbiter, ListenerCallbacks, ListenerHandle,
    ListenerRegistry,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

const GRID_COLUMNS: i32 = 6;
const GRID_TITLES: i32 = 48;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let config_path = ArbiterSettings::config_path();
    ArbiterSettings::ensure_default_config(&config_path)?;
    let settings = ArbiterSettings::load_from(&config_path)?;
    info!("Loaded settings from {}", config_path.display());

    let mut arbiter = HardwareArbiter::with_gilrs(&settings)
        .map_err(|e| eyre!("Failed to set up input arbiter: {}", e))?;
    let mut connection = arbiter.subscribe_connection();

    let selected = Rc::new(Cell::new(0));
    let _grid = arbiter.register_listener(grid_listener(arbiter.registry(), selected), 0);

    run_frame_loop(&mut arbiter, &mut connection, settings.frame_interval_ms).await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

// Drives the arbiter at the configured frame rate until ctrl-c
async fn run_frame_loop(
    arbiter: &mut HardwareArbiter,
    connection: &mut tokio::sync::watch::Receiver<bool>,
    frame_interval_ms: u64,
) {
    let mut interval_timer =
        tokio::time::interval(tokio::time::Duration::from_millis(frame_interval_ms));
    interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut frames: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    info!("Entering frame loop ({} ms per frame)", frame_interval_ms);
    loop {
        tokio::select! {
            _ = interval_timer.tick() => {}
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }

        arbiter.pump_device_events();
        frames += arbiter.advance_frame() as u64;

        if connection.has_changed().unwrap_or(false) {
            let connected = *connection.borrow_and_update();
            info!(
                "Controller affordances {}",
                if connected { "shown" } else { "hidden" }
            );
        }

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
            debug!(
                "Frame loop stats: {} ticks in {} seconds ({:.1}/sec), {} listeners",
                frames,
                elapsed_seconds,
                frames as f64 / elapsed_seconds as f64,
                arbiter.listener_count()
            );
            frames = 0;
            last_stats_time = now;
        }
    }
}

// Library grid: stick and d-pad move the selection, A launches, Start opens details
fn grid_listener(registry: ListenerRegistry, selected: Rc<Cell<i32>>) -> ListenerCallbacks {
    let step = |selected: &Rc<Cell<i32>>, delta: i32| {
        let next = (selected.get() + delta).clamp(0, GRID_TITLES - 1);
        selected.set(next);
        info!("Selected title #{}", next);
    };

    let (up, down, left, right) = (
        Rc::clone(&selected),
        Rc::clone(&selected),
        Rc::clone(&selected),
        Rc::clone(&selected),
    );
    let (horizontal, vertical, launch) = (
        Rc::clone(&selected),
        Rc::clone(&selected),
        Rc::clone(&selected),
    );
    let modal: Rc<RefCell<Option<ListenerHandle>>> = Rc::new(RefCell::new(None));

    ListenerCallbacks::new()
        .on(ButtonId::DPadUp, move || {
            step(&up, -GRID_COLUMNS);
            Ok(())
        })
        .on(ButtonId::DPadDown, move || {
            step(&down, GRID_COLUMNS);
            Ok(())
        })
        .on(ButtonId::DPadLeft, move || {
            step(&left, -1);
            Ok(())
        })
        .on(ButtonId::DPadRight, move || {
            step(&right, 1);
            Ok(())
        })
        .on_horizontal(move |direction| {
            step(&horizontal, i32::from(direction.as_i8()));
            Ok(())
        })
        .on_vertical(move |direction| {
            step(&vertical, i32::from(direction.as_i8()) * GRID_COLUMNS);
            Ok(())
        })
        .on(ButtonId::A, move || {
            info!("Launching title #{}", launch.get());
            Ok(())
        })
        .on(ButtonId::Start, move || {
            if modal.borrow().as_ref().is_some_and(|h| h.is_registered()) {
                return Ok(());
            }
            info!("Opening details");
            let slot = Rc::clone(&modal);
            let handle = registry.register(
                ListenerCallbacks::new().on(ButtonId::B, move || {
                    info!("Closing details");
                    if let Some(handle) = slot.borrow_mut().take() {
                        handle.deregister();
                    }
                    Ok(())
                }),
                100,
            );
            *modal.borrow_mut() = Some(handle);
            Ok(())
        })
}
