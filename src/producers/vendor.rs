//! Vendor-module key producer.
//!
//! The vendor kernel module exposes an auxiliary input device that
//! reports some hotkeys as ordinary EV_KEY events instead of scan
//! codes. Only a fixed set of key codes is mapped; everything else is
//! discarded.

use std::path::PathBuf;
use std::thread::JoinHandle;

use evdev::{Device, InputEventKind, Key};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::events::{ProducerId, RawCode, RawEvent};

/// Fixed key-code → raw-code map for the module's hotkey device.
pub fn map_key(key: Key) -> Option<RawCode> {
    match key {
        Key::KEY_TOUCHPAD_TOGGLE => Some(RawCode::TouchpadSwitch),
        Key::KEY_PROG1 => Some(RawCode::SilentKey),
        Key::KEY_PROG2 => Some(RawCode::PerformanceKey),
        _ => None,
    }
}

/// Spawn the blocking read loop over the vendor module's input device.
pub fn spawn(path: PathBuf, tx: UnboundedSender<RawEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut device = match Device::open(&path) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot open vendor module device");
                return;
            }
        };
        info!(path = %path.display(), "vendor-module producer running");

        loop {
            let events = match device.fetch_events() {
                Ok(ev) => ev,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "vendor module read failed, producer stopping");
                    break;
                }
            };

            for ev in events {
                let InputEventKind::Key(key) = ev.kind() else {
                    continue;
                };
                // Presses only; releases and repeats carry no signal here.
                if ev.value() != 1 {
                    continue;
                }
                let Some(code) = map_key(key) else {
                    debug!(?key, "unmapped vendor key, discarding");
                    continue;
                };
                if tx
                    .send(RawEvent::now(ProducerId::VendorModule, code))
                    .is_err()
                {
                    return;
                }
            }
        }
    })
}
