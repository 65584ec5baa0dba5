//! Keyboard scan-code producer.
//!
//! Function-key combinations arrive as EV_MSC/MSC_SCAN events on the
//! internal keyboard. The firmware fires the same scan code twice per
//! physical press (press + release of the combo), so a per-code toggle
//! keeps only the press transition.

use std::collections::HashMap;
use std::path::PathBuf;
use std::thread::JoinHandle;

use evdev::{Device, InputEventKind, MiscType};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::events::{ProducerId, RawCode, RawEvent};

/// Per-scan-code press/release toggle.
///
/// The first sighting of a code is the press, the second the release,
/// and so on. Only presses qualify.
#[derive(Debug, Default)]
pub struct ScanToggle {
    pressed: HashMap<u32, bool>,
}

impl ScanToggle {
    /// Record a sighting of `code`; returns true when it is a press
    /// transition.
    pub fn is_press(&mut self, code: u32) -> bool {
        let entry = self.pressed.entry(code).or_insert(false);
        *entry = !*entry;
        *entry
    }
}

/// Spawn the blocking read loop over an already-opened keyboard
/// device. Opening happens in `main` because a missing keyboard is the
/// one fatal startup condition.
pub fn spawn(path: PathBuf, mut device: Device, tx: UnboundedSender<RawEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        info!(
            path = %path.display(),
            name = device.name().unwrap_or("unknown"),
            "keyboard producer running"
        );

        let mut toggle = ScanToggle::default();
        loop {
            let events = match device.fetch_events() {
                Ok(ev) => ev,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "keyboard read failed, producer stopping");
                    break;
                }
            };

            for ev in events {
                if ev.kind() != InputEventKind::Misc(MiscType::MSC_SCAN) {
                    continue;
                }
                let scan = ev.value() as u32;
                if !toggle.is_press(scan) {
                    continue;
                }
                let Some(code) = RawCode::from_scan_code(scan) else {
                    debug!(scan, "unknown scan code, discarding");
                    continue;
                };
                if tx.send(RawEvent::now(ProducerId::Keyboard, code)).is_err() {
                    return; // dispatcher gone
                }
            }
        }
    })
}
