//! hweventd — laptop hardware event daemon.
//!
//! Watches vendor function keys, the touchpad switch, the vendor
//! kernel module, and the AC adapter, and translates the raw signals
//! into semantic events published over a local socket. Entry point:
//! resolve the hardware, wire producers to the dispatcher, run until
//! interrupted.

mod config;
mod devices;
mod dispatch;
mod events;
mod hid;
mod ipc;
mod logging;
mod model;
mod producers;
mod settings;
mod touchpad;

use std::process::ExitCode;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};

use config::Config;
use dispatch::Dispatcher;
use model::{ModelIdentity, VendorSysfs};
use settings::Settings;
use touchpad::Touchpad;

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = logging::init();
    let cfg = Config::load();
    info!(
        publish = %cfg.publish_addr,
        control = %cfg.control_addr,
        "hweventd starting"
    );

    let identity = ModelIdentity::resolve();
    if !identity.supported() {
        info!(vendor = %identity.vendor, "unsupported hardware, nothing to do");
        return ExitCode::SUCCESS;
    }
    let policy = model::policy_for(identity.model);
    let sysfs = VendorSysfs::system();

    // The keyboard is the one required device.
    let Some(keyboard_path) = devices::find_keyboard() else {
        error!("internal keyboard not found");
        return ExitCode::FAILURE;
    };
    let keyboard = match evdev::Device::open(&keyboard_path) {
        Ok(d) => d,
        Err(e) => {
            error!(path = %keyboard_path.display(), error = %e, "cannot open keyboard");
            return ExitCode::FAILURE;
        }
    };

    let settings = Settings::shared();
    let touchpad = Touchpad::detect();

    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    // Producers: one blocking thread per source, queue-only output.
    producers::keyboard::spawn(keyboard_path, keyboard, raw_tx.clone());
    if let Some(path) = devices::find_vendor_module() {
        producers::vendor::spawn(path, raw_tx.clone());
    }
    producers::power::spawn(raw_tx.clone());
    if policy.tri_state_flags && sysfs.present() {
        producers::mode_poll::spawn(
            sysfs.clone(),
            Duration::from_millis(cfg.poll_interval_ms),
            raw_tx.clone(),
        );
    }
    drop(raw_tx);

    // IPC endpoints.
    let publish_addr = cfg.publish_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = ipc::server::run_publisher(publish_addr, event_rx).await {
            error!(error = %e, "publish endpoint failed");
        }
    });
    let control_addr = cfg.control_addr.clone();
    let control_settings = settings.clone();
    tokio::spawn(async move {
        if let Err(e) = ipc::server::run_control(control_addr, control_settings).await {
            error!(error = %e, "control endpoint failed");
        }
    });

    let dispatcher = Dispatcher::new(
        settings,
        touchpad,
        sysfs,
        policy,
        Some(cfg.profile_tool.clone()),
        cfg.debounce_secs(),
        event_tx,
    );

    tokio::select! {
        _ = dispatcher.run(raw_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }
    ExitCode::SUCCESS
}
