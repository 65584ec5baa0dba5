//! Runtime-togglable daemon behavior flags.
//!
//! Shared between the control-channel listener (writer) and the
//! dispatcher (reader) via per-field atomics behind accessors — no
//! ambient global state, no lock held across hardware I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

/// Flag names accepted on the control channel.
const NAME_TOUCHPAD_LOCK: &str = "trackpad_lock";
const NAME_PROFILE_TOOL: &str = "profile_tool";

#[derive(Debug)]
pub struct Settings {
    /// Act on touchpad-switch events (toggle the lock).
    touchpad_lock: AtomicBool,
    /// Drive the external power-profile tool on profile transitions.
    profile_tool: AtomicBool,
}

impl Settings {
    /// A fresh settings block behind the `Arc` both endpoints share.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn touchpad_lock(&self) -> bool {
        self.touchpad_lock.load(Ordering::Acquire)
    }

    pub fn profile_tool(&self) -> bool {
        self.profile_tool.load(Ordering::Acquire)
    }

    /// Apply a named-flag map from a `load-settings` request. Unknown
    /// names are ignored.
    pub fn apply(&self, flags: &HashMap<String, bool>) {
        for (name, value) in flags {
            match name.as_str() {
                NAME_TOUCHPAD_LOCK => {
                    self.touchpad_lock.store(*value, Ordering::Release);
                    info!(value = *value, "setting updated: {}", NAME_TOUCHPAD_LOCK);
                }
                NAME_PROFILE_TOOL => {
                    self.profile_tool.store(*value, Ordering::Release);
                    info!(value = *value, "setting updated: {}", NAME_PROFILE_TOOL);
                }
                other => {
                    debug!(name = other, "ignoring unknown setting");
                }
            }
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            touchpad_lock: AtomicBool::new(true),
            profile_tool: AtomicBool::new(true),
        }
    }
}
