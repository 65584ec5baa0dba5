//! Touchpad lock controller.
//!
//! Two backing strategies, fixed at construction:
//! - Feature mode: the touchpad exposes a HID feature report that
//!   enables/disables the pad in firmware. State is queried from the
//!   device, so external changes are picked up.
//! - Grab mode: no feature report exists; fall back to exclusively
//!   grabbing a generic pointer device so its events never reach the
//!   input stack. State is tracked locally.
//!
//! Enum dispatch over the backends, same shape as the adapter enums
//! elsewhere in this codebase.

use anyhow::{Context, Result};
use evdev::Key;
use tracing::{debug, info};

use crate::devices::{self, FeatureHandle};

/// Payload written to the feature report to disable the pad.
const FEATURE_LOCK: [u8; 1] = [0x00];
/// Payload written to enable it (surface + button switches on).
const FEATURE_UNLOCK: [u8; 1] = [0x03];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchpadState {
    Unknown,
    Locked,
    Unlocked,
}

enum Backend {
    Feature(FeatureHandle),
    Grab(GrabbedPointer),
    #[cfg(test)]
    Mock(MockPad),
}

/// A generic pointer device held for exclusive-grab locking.
struct GrabbedPointer {
    device: evdev::Device,
    state: TouchpadState,
}

pub struct Touchpad {
    backend: Option<Backend>,
}

impl Touchpad {
    /// Detect a backing strategy: hidraw feature report first, then a
    /// grabbable generic pointer, else an inert controller.
    pub fn detect() -> Self {
        if let Some(handle) = devices::find_touchpad() {
            info!(path = %handle.device.path().display(), "touchpad: feature-report mode");
            return Self {
                backend: Some(Backend::Feature(handle)),
            };
        }

        if let Some(device) = find_pointer_device() {
            info!(
                name = device.name().unwrap_or("unknown"),
                "touchpad: exclusive-grab mode"
            );
            return Self {
                backend: Some(Backend::Grab(GrabbedPointer {
                    device,
                    // Nothing is grabbed yet, so the pad is live.
                    state: TouchpadState::Unlocked,
                })),
            };
        }

        info!("touchpad: no backing strategy found");
        Self { backend: None }
    }

    /// Whether any backing strategy was found.
    pub fn valid(&self) -> bool {
        self.backend.is_some()
    }

    /// Current lock state. Feature mode queries the hardware; grab
    /// mode reports the locally tracked state.
    pub fn get_state(&self) -> Result<TouchpadState> {
        match &self.backend {
            Some(Backend::Feature(h)) => {
                let data = h
                    .device
                    .get_feature(h.report_id, 1)
                    .context("get-feature ioctl failed")?;
                // Low two bits are the surface/button switches; all
                // clear means the pad is off.
                let bits = data.first().copied().unwrap_or(0) & 0x03;
                Ok(if bits == 0 {
                    TouchpadState::Locked
                } else {
                    TouchpadState::Unlocked
                })
            }
            Some(Backend::Grab(g)) => Ok(g.state),
            #[cfg(test)]
            Some(Backend::Mock(m)) => Ok(m.state),
            None => Ok(TouchpadState::Unknown),
        }
    }

    pub fn lock(&mut self) -> Result<()> {
        match &mut self.backend {
            Some(Backend::Feature(h)) => h
                .device
                .set_feature(h.report_id, &FEATURE_LOCK)
                .context("set-feature ioctl failed"),
            Some(Backend::Grab(g)) => {
                g.device.grab().context("evdev grab failed")?;
                g.state = TouchpadState::Locked;
                Ok(())
            }
            #[cfg(test)]
            Some(Backend::Mock(m)) => {
                m.state = TouchpadState::Locked;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn unlock(&mut self) -> Result<()> {
        match &mut self.backend {
            Some(Backend::Feature(h)) => h
                .device
                .set_feature(h.report_id, &FEATURE_UNLOCK)
                .context("set-feature ioctl failed"),
            Some(Backend::Grab(g)) => {
                g.device.ungrab().context("evdev ungrab failed")?;
                g.state = TouchpadState::Unlocked;
                Ok(())
            }
            #[cfg(test)]
            Some(Backend::Mock(m)) => {
                m.state = TouchpadState::Unlocked;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Flip the lock state and return the new state.
    ///
    /// Re-reads the state first so the operation stays correct when
    /// something else (firmware, another tool) changed it since the
    /// last call. Unknown resolves to unlocking.
    pub fn toggle(&mut self) -> Result<TouchpadState> {
        match self.get_state()? {
            TouchpadState::Locked => {
                self.unlock()?;
                Ok(TouchpadState::Unlocked)
            }
            TouchpadState::Unlocked => {
                self.lock()?;
                Ok(TouchpadState::Locked)
            }
            TouchpadState::Unknown => {
                self.unlock()?;
                Ok(TouchpadState::Unlocked)
            }
        }
    }
}

/// First evdev device advertising a touch button — a generic pointer
/// we can grab to neutralize.
fn find_pointer_device() -> Option<evdev::Device> {
    for (path, device) in evdev::enumerate() {
        let has_touch = device
            .supported_keys()
            .map_or(false, |keys| keys.contains(Key::BTN_TOUCH));
        if has_touch {
            debug!(path = %path.display(), "grabbable pointer candidate");
            return Some(device);
        }
    }
    None
}

#[cfg(test)]
struct MockPad {
    state: TouchpadState,
}

#[cfg(test)]
impl Touchpad {
    /// Controller backed by an in-memory pad, for tests.
    pub fn mock(state: TouchpadState) -> Self {
        Self {
            backend: Some(Backend::Mock(MockPad { state })),
        }
    }

    /// Controller with no backend, for tests.
    pub fn invalid() -> Self {
        Self { backend: None }
    }
}
