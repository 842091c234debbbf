use eframe::egui;
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use env_logger::Builder;
use log::{LevelFilter, error, info, warn};
use std::path::PathBuf;
use std::thread;

use sensor_layout_simulator::common::SimulatorConfig;

mod simulation;
mod ui;

use ui::{AppState, UICommand, UIRefreshState};

const UI_REFRESH_QUEUE_SIZE: usize = 100;
pub type UIRefreshQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;
pub type UIRefreshQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;
pub type UIRefreshQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;

const UI_COMMAND_QUEUE_SIZE: usize = 100;
pub type UICommandQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;
pub type UICommandQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;
pub type UICommandQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;

fn embassy_init(spawner: Spawner, ui_refresh_tx: UIRefreshQueueSender, ui_command_rx: UICommandQueueReceiver, config: SimulatorConfig) {
    if let Err(err) = spawner.spawn(simulation::engine_task(ui_refresh_tx, ui_command_rx, config)) {
        error!("Failed to spawn engine task: {:?}", err);
    }
}

/// Resolve the runtime config: next to a layout given on the command line,
/// otherwise `config.toml` in the working directory.
fn load_config(layout_arg: Option<&str>) -> SimulatorConfig {
    let config_path = layout_arg.map(SimulatorConfig::config_path_from_layout).unwrap_or_else(|| PathBuf::from("config.toml"));
    let mut config = match SimulatorConfig::load_or_default(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} ({}), using defaults", err, config_path.display());
            SimulatorConfig::default()
        }
    };
    if let Some(layout) = layout_arg {
        config.layout_path = Some(layout.to_string());
    }
    config
}

fn main() {
    let layout_arg = std::env::args().nth(1);
    let config = load_config(layout_arg.as_deref());

    // Logging setup: the crate logs one level finer at the default level; RUST_LOG still wins when set
    let level = config.log_level_filter();
    let crate_level = if level == LevelFilter::Info { LevelFilter::Debug } else { level };
    Builder::new()
        .filter_level(level)
        .filter(Some("sensor_layout_simulator"), crate_level)
        .parse_default_env()
        .init();

    info!("Starting up (frame interval {} ms)", config.frame_interval_ms);
    if config.layout_path.is_none() {
        warn!("No layout configured, waiting for one to be opened");
    }

    let ui_refresh_channel: &'static UIRefreshQueue = Box::leak(Box::new(UIRefreshQueue::new()));
    let ui_command_channel: &'static UICommandQueue = Box::leak(Box::new(UICommandQueue::new()));

    let ui_refresh_tx = ui_refresh_channel.sender();
    let ui_refresh_rx = ui_refresh_channel.receiver();
    let ui_command_tx = ui_command_channel.sender();
    let ui_command_rx = ui_command_channel.receiver();

    // Spawn Embassy executor on a dedicated background thread
    let engine_config = config.clone();
    let spawned = thread::Builder::new().name("embassy-executor".to_string()).spawn(move || {
        // Leak the executor to satisfy the 'static lifetime required by run()
        let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
        executor.run(|spawner| embassy_init(spawner, ui_refresh_tx, ui_command_rx, engine_config));
    });
    if let Err(err) = spawned {
        error!("Failed to spawn embassy thread: {}", err);
        return;
    }

    // Start the GUI on the main thread (required on macOS)
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1400.0, 900.0]),
        ..Default::default()
    };
    if let Err(err) = eframe::run_native(
        "Sensor Layout Simulator",
        native_options,
        Box::new(move |cc| Ok(Box::new(AppState::new(ui_refresh_rx, ui_command_tx, cc.storage)))),
    ) {
        error!("Viewer exited with error: {}", err);
    }
}
