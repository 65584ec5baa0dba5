//! Periodic performance-mode poller.
//!
//! Tri-state families expose the 3-way mode only as two boolean sysfs
//! flags, with no notification mechanism, so the mode is sampled at a
//! fixed interval and a raw event is emitted only when the derived
//! mode changes. An "equal flags" sample is re-read once before being
//! trusted — the flags are written one after the other by firmware and
//! a sample can land mid-transition.

use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::events::{ModeFlag, ProducerId, RawCode, RawEvent};
use crate::model::{self, VendorSysfs, FLAG_SILENT_MODE, FLAG_TURBO_MODE};

/// Change detector over derived modes: the first sample establishes a
/// baseline without emitting.
#[derive(Debug, Default)]
pub struct ModeTracker {
    last: Option<ModeFlag>,
}

impl ModeTracker {
    /// Feed one derived mode; returns it when it differs from the
    /// previous sample.
    pub fn update(&mut self, mode: ModeFlag) -> Option<ModeFlag> {
        if self.last == Some(mode) {
            return None;
        }
        let first = self.last.is_none();
        self.last = Some(mode);
        if first {
            None
        } else {
            Some(mode)
        }
    }
}

/// Spawn the fixed-interval sampling loop.
pub fn spawn(
    sysfs: VendorSysfs,
    interval: Duration,
    tx: UnboundedSender<RawEvent>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        info!(interval_ms = interval.as_millis() as u64, "mode poller running");
        let mut tracker = ModeTracker::default();

        loop {
            match sample(&sysfs, interval) {
                Ok(mode) => {
                    if let Some(changed) = tracker.update(mode) {
                        debug!(?changed, "performance mode changed");
                        let ev =
                            RawEvent::now(ProducerId::ModePoller, RawCode::ModeChanged(changed));
                        if tx.send(ev).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    // Transient sysfs failure: skip this sample.
                    warn!(error = %e, "mode flags unreadable, skipping sample");
                }
            }
            std::thread::sleep(interval);
        }
    })
}

/// One sample of the derived mode, with the double-read confirmation
/// for equal flags.
fn sample(sysfs: &VendorSysfs, interval: Duration) -> anyhow::Result<ModeFlag> {
    let silent = sysfs.read_flag(FLAG_SILENT_MODE)?;
    let turbo = sysfs.read_flag(FLAG_TURBO_MODE)?;

    if silent == turbo {
        // Could be mid-transition; confirm after a short wait.
        std::thread::sleep(interval);
        let silent = sysfs.read_flag(FLAG_SILENT_MODE)?;
        let turbo = sysfs.read_flag(FLAG_TURBO_MODE)?;
        return Ok(model::derive_mode(silent, turbo));
    }
    Ok(model::derive_mode(silent, turbo))
}
