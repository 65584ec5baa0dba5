//! AC power-source producer.
//!
//! Reads the initial AC state from sysfs, then blocks on a udev
//! monitor for the `power_supply` subsystem and emits online/offline
//! raw events on transitions only.

use std::fs;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::thread::JoinHandle;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::events::{ProducerId, RawCode, RawEvent};

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Initial AC state: the `online` flag of the first Mains-type supply.
/// `None` when no AC adapter is exposed (desktops, odd firmware).
pub fn read_ac_online(root: &Path) -> Option<bool> {
    let entries = fs::read_dir(root).ok()?;
    for entry in entries.flatten() {
        let kind = fs::read_to_string(entry.path().join("type")).unwrap_or_default();
        if kind.trim() != "Mains" {
            continue;
        }
        // A Mains entry without the flag is skipped, not fatal.
        let Ok(online) = fs::read_to_string(entry.path().join("online")) else {
            continue;
        };
        return Some(online.trim() == "1");
    }
    None
}

/// Spawn the blocking udev monitor loop.
pub fn spawn(tx: UnboundedSender<RawEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut last = read_ac_online(Path::new(POWER_SUPPLY_DIR));
        info!(online = ?last, "power producer running");

        let socket = match monitor_socket() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "cannot open power-supply monitor, producer stopping");
                return;
            }
        };
        let fd = socket.as_raw_fd();

        loop {
            // Block until the monitor socket has events.
            let mut pfd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };
            // SAFETY: pfd points to a valid pollfd for the duration of
            // the call.
            let rc = unsafe { libc::poll(&mut pfd, 1, -1) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                warn!(error = %err, "power monitor poll failed, producer stopping");
                break;
            }

            for event in socket.iter() {
                let Some(value) = event.property_value("POWER_SUPPLY_ONLINE") else {
                    continue;
                };
                let online = value == "1";
                if last == Some(online) {
                    debug!(online, "duplicate power-supply report");
                    continue;
                }
                last = Some(online);

                let code = if online {
                    RawCode::AcOnline
                } else {
                    RawCode::AcOffline
                };
                if tx.send(RawEvent::now(ProducerId::PowerSupply, code)).is_err() {
                    return;
                }
            }
        }
    })
}

fn monitor_socket() -> std::io::Result<udev::MonitorSocket> {
    udev::MonitorBuilder::new()?
        .match_subsystem("power_supply")?
        .listen()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_mains_online_flag() {
        let dir = tempfile::tempdir().unwrap();
        let ac = dir.path().join("AC0");
        fs::create_dir(&ac).unwrap();
        fs::write(ac.join("type"), "Mains\n").unwrap();
        fs::write(ac.join("online"), "1\n").unwrap();

        assert_eq!(read_ac_online(dir.path()), Some(true));
    }

    #[test]
    fn batteries_are_not_ac() {
        let dir = tempfile::tempdir().unwrap();
        let bat = dir.path().join("BAT0");
        fs::create_dir(&bat).unwrap();
        fs::write(bat.join("type"), "Battery\n").unwrap();
        fs::write(bat.join("online"), "0\n").unwrap();

        assert_eq!(read_ac_online(dir.path()), None);
    }

    #[test]
    fn supply_without_online_flag_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("ADP0");
        fs::create_dir(&broken).unwrap();
        fs::write(broken.join("type"), "Mains\n").unwrap();
        // No `online` file on this one.
        let ac = dir.path().join("AC0");
        fs::create_dir(&ac).unwrap();
        fs::write(ac.join("type"), "Mains\n").unwrap();
        fs::write(ac.join("online"), "1\n").unwrap();

        assert_eq!(read_ac_online(dir.path()), Some(true));
    }

    #[test]
    fn empty_tree_means_unknown() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_ac_online(dir.path()), None);
    }
}
