//! Device discovery.
//!
//! Resolves the handful of device nodes the daemon cares about:
//! the internal keyboard, the vendor kernel module's auxiliary input
//! device, and the touchpad's hidraw node. "Not found" is a normal
//! outcome on hardware without the feature — callers downgrade the
//! feature, they never fail.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::hid;
use crate::hid::raw::{HidrawDevice, BUS_I2C};

const BY_PATH_DIR: &str = "/dev/input/by-path";
const DEV_DIR: &str = "/dev";

/// Touchpad controller vendor id (UNIW / Uniwill boards).
const TOUCHPAD_VENDOR: i16 = 0x093A;

/// An open touchpad hidraw node together with the feature report that
/// drives its enable switch.
#[derive(Debug)]
pub struct FeatureHandle {
    pub device: HidrawDevice,
    pub report_id: u8,
}

/// Locate the internal keyboard event node: the i8042-attached
/// `event-kbd` entry under by-path, resolved to its real `/dev/input`
/// node.
pub fn find_keyboard() -> Option<PathBuf> {
    find_by_path(|name| name.ends_with("event-kbd") && name.contains("i8042"))
}

/// Locate the vendor kernel module's hotkey input device, if the
/// module is loaded.
pub fn find_vendor_module() -> Option<PathBuf> {
    find_by_path(|name| name.ends_with("qc71_laptop-event"))
}

fn find_by_path(matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    let entries = match fs::read_dir(BY_PATH_DIR) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "cannot read {}", BY_PATH_DIR);
            return None;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !matches(name) {
            continue;
        }
        match fs::canonicalize(entry.path()) {
            Ok(real) => {
                info!(link = name, path = %real.display(), "resolved input device");
                return Some(real);
            }
            Err(e) => {
                warn!(link = name, error = %e, "broken by-path link");
            }
        }
    }
    None
}

/// Scan `/dev/hidraw*` for the touchpad: an I2C device with the known
/// vendor id whose descriptor declares a feature report carrying both
/// digitizer switch usages.
pub fn find_touchpad() -> Option<FeatureHandle> {
    let entries = match fs::read_dir(DEV_DIR) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "cannot read {}", DEV_DIR);
            return None;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with("hidraw") {
            continue;
        }
        if let Some(handle) = probe_hidraw(&entry.path()) {
            return Some(handle);
        }
    }

    info!("no touchpad feature report found on any hidraw node");
    None
}

/// Probe one hidraw node. Any failure is a skip, not an error: nodes
/// come and go, and most belong to other devices.
fn probe_hidraw(path: &Path) -> Option<FeatureHandle> {
    let device = match HidrawDevice::open(path) {
        Ok(d) => d,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot open hidraw node");
            return None;
        }
    };

    let info = match device.device_info() {
        Ok(i) => i,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "HIDIOCGRAWINFO failed");
            return None;
        }
    };
    if info.bus != BUS_I2C || info.vendor != TOUCHPAD_VENDOR {
        return None;
    }

    let descriptor = match device.report_descriptor() {
        Ok(d) => d,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read report descriptor");
            return None;
        }
    };

    let report_id = select_switch_report(&hid::parse(&descriptor))?;
    info!(
        path = %path.display(),
        vendor = %format!("{:04x}", info.vendor),
        product = %format!("{:04x}", info.product),
        report_id,
        "touchpad feature report located"
    );
    Some(FeatureHandle { device, report_id })
}

/// Pick the feature report that exposes both the surface switch and
/// the button switch — the pair the firmware uses for the enable
/// toggle.
pub fn select_switch_report(reports: &[hid::HidReport]) -> Option<u8> {
    let surface = hid::usage(hid::USAGE_PAGE_DIGITIZER, hid::USAGE_DIGITIZER_SURFACE_SWITCH);
    let button = hid::usage(hid::USAGE_PAGE_DIGITIZER, hid::USAGE_DIGITIZER_BUTTON_SWITCH);

    reports
        .iter()
        .find(|r| {
            r.kind == hid::ReportKind::Feature
                && r.usages.contains(&surface)
                && r.usages.contains(&button)
        })
        .map(|r| r.id)
}
