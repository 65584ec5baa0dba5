//! The dispatcher: single consumer of the raw-event queue.
//!
//! Loop shape: recv → debounce → resolve → act → publish. Raw codes
//! are ambiguous on arrival ("the silent key was pressed"); resolution
//! queries current hardware state and the model policy table to
//! produce a directional semantic event. All per-event I/O failures
//! are logged and swallowed — nothing aborts the loop.

use std::collections::HashMap;
use std::process::Command;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::events::{
    Profile, RawCode, RawEvent, SemanticCode, SemanticEvent,
};
use crate::model::{ModelPolicy, VendorSysfs, FLAG_SILENT_MODE, FLAG_SUPER_KEY_LOCK};
use crate::settings::Settings;
use crate::touchpad::{Touchpad, TouchpadState};

pub struct Dispatcher {
    settings: std::sync::Arc<Settings>,
    touchpad: Touchpad,
    sysfs: VendorSysfs,
    policy: ModelPolicy,
    /// External power-profile command; `None` disables invocation.
    profile_tool: Option<String>,
    /// Duplicate-suppression window in seconds.
    debounce_window: f64,
    /// Last-accepted timestamp per raw code. Entries are never
    /// removed; the code space is small and fixed.
    debounce: HashMap<RawCode, f64>,
    out: UnboundedSender<SemanticEvent>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: std::sync::Arc<Settings>,
        touchpad: Touchpad,
        sysfs: VendorSysfs,
        policy: ModelPolicy,
        profile_tool: Option<String>,
        debounce_window: f64,
        out: UnboundedSender<SemanticEvent>,
    ) -> Self {
        Self {
            settings,
            touchpad,
            sysfs,
            policy,
            profile_tool,
            debounce_window,
            debounce: HashMap::new(),
            out,
        }
    }

    /// Drain the queue until every producer has hung up.
    pub async fn run(mut self, mut rx: UnboundedReceiver<RawEvent>) {
        while let Some(ev) = rx.recv().await {
            self.handle(ev);
        }
        info!("raw event queue closed, dispatcher exiting");
    }

    /// Process one raw event end to end.
    pub fn handle(&mut self, ev: RawEvent) {
        if !self.debounce(ev) {
            debug!(code = ?ev.code, "debounced duplicate");
            return;
        }

        if let Some(code) = self.resolve(ev) {
            let published = SemanticEvent::new(code, ev.timestamp);
            debug!(?code, source = %ev.source, "publishing");
            // Fire-and-forget: a missing publisher is not our problem.
            let _ = self.out.send(published);
        }
    }

    /// Accept or suppress based on the per-code last-accepted time.
    fn debounce(&mut self, ev: RawEvent) -> bool {
        if let Some(last) = self.debounce.get(&ev.code) {
            if ev.timestamp - last < self.debounce_window {
                return false;
            }
        }
        self.debounce.insert(ev.code, ev.timestamp);
        true
    }

    /// Resolve a raw code into the semantic event to publish, applying
    /// any hardware side effects on the way. `None` means discard.
    fn resolve(&mut self, ev: RawEvent) -> Option<SemanticCode> {
        match ev.code {
            RawCode::SilentKey => self.resolve_flag(
                FLAG_SILENT_MODE,
                SemanticCode::SilentOn,
                SemanticCode::SilentOff,
            ),
            RawCode::SuperLockKey => {
                if !self.policy.super_key_lock {
                    debug!("super-key lock unsupported on this model");
                    return None;
                }
                self.resolve_flag(
                    FLAG_SUPER_KEY_LOCK,
                    SemanticCode::SuperLockOn,
                    SemanticCode::SuperLockOff,
                )
            }
            RawCode::TouchpadSwitch => self.resolve_touchpad(),
            RawCode::PerformanceKey => self.resolve_performance_key(),
            RawCode::ModeChanged(mode) => {
                Some(SemanticCode::for_profile(mode.profile()))
            }
            RawCode::AcOnline => {
                debug!("AC online");
                None // consumed internally, never republished
            }
            RawCode::AcOffline => {
                self.on_battery();
                None
            }
        }
    }

    /// Directional resolution for keys mirrored by a sysfs flag.
    fn resolve_flag(
        &self,
        flag: &str,
        on: SemanticCode,
        off: SemanticCode,
    ) -> Option<SemanticCode> {
        if !self.sysfs.present() {
            info!(flag, "vendor module not loaded, dropping key event");
            return None;
        }
        match self.sysfs.read_flag(flag) {
            Ok(0) => Some(off),
            Ok(_) => Some(on),
            Err(e) => {
                warn!(flag, error = %e, "flag read failed, dropping event");
                None
            }
        }
    }

    fn resolve_touchpad(&mut self) -> Option<SemanticCode> {
        if !self.settings.touchpad_lock() {
            debug!("touchpad lock handling disabled, dropping switch event");
            return None;
        }
        if !self.touchpad.valid() {
            debug!("no touchpad backing, dropping switch event");
            return None;
        }
        match self.touchpad.toggle() {
            Ok(TouchpadState::Locked) => Some(SemanticCode::TouchpadOff),
            Ok(TouchpadState::Unlocked) => Some(SemanticCode::TouchpadOn),
            Ok(TouchpadState::Unknown) => None,
            Err(e) => {
                warn!(error = %e, "touchpad toggle failed, dropping event");
                None
            }
        }
    }

    /// Cyclic 3-way profile transition driven by the performance key.
    fn resolve_performance_key(&mut self) -> Option<SemanticCode> {
        if !self.policy.three_way_profile {
            debug!("performance key unsupported on this model");
            return None;
        }
        let current = match self.sysfs.current_profile() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "cannot read current profile, dropping event");
                return None;
            }
        };
        let next = current.next();
        self.apply_profile(next);
        Some(SemanticCode::for_profile(next))
    }

    /// Battery policy: drop to the conservative profile. Internal
    /// only — the poller reports the resulting hardware change.
    fn on_battery(&mut self) {
        info!("AC offline");
        if self.policy.profile_writes {
            self.apply_profile(Profile::EnergySaver);
        }
    }

    fn apply_profile(&mut self, profile: Profile) {
        if self.policy.profile_writes {
            if let Err(e) = self.sysfs.write_profile(profile) {
                warn!(%profile, error = %e, "profile write failed");
            }
        }
        if self.settings.profile_tool() {
            self.run_profile_tool(profile);
        }
    }

    /// Invoke the external policy tool, fire-and-forget. The exit
    /// status is ignored, but the child still has to be reaped or it
    /// sits as a zombie for the daemon's lifetime.
    fn run_profile_tool(&self, profile: Profile) {
        let Some(tool) = &self.profile_tool else {
            return;
        };
        match Command::new(tool).arg("set").arg(profile.tool_name()).spawn() {
            Ok(mut child) => {
                debug!(%tool, %profile, "profile tool invoked");
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => warn!(%tool, error = %e, "profile tool spawn failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ModeFlag, ProducerId};
    use crate::model::policy_for;
    use crate::model::Model;
    use std::collections::HashMap as StdHashMap;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Harness {
        dispatcher: Dispatcher,
        out: UnboundedReceiver<SemanticEvent>,
        _sysfs_dir: TempDir,
    }

    fn harness(model: Model, touchpad: Touchpad) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let sysfs = VendorSysfs::at(dir.path());
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            Settings::shared(),
            touchpad,
            sysfs,
            policy_for(model),
            None, // never spawn external tools in tests
            0.75,
            tx,
        );
        Harness {
            dispatcher,
            out: rx,
            _sysfs_dir: dir,
        }
    }

    fn write_flag(h: &Harness, name: &str, value: u32) {
        fs::write(h._sysfs_dir.path().join(name), value.to_string()).unwrap();
    }

    fn event_at(code: RawCode, t: f64) -> RawEvent {
        RawEvent {
            source: ProducerId::Keyboard,
            code,
            timestamp: t,
        }
    }

    #[test]
    fn debounce_window_suppresses_duplicates() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        write_flag(&h, FLAG_SILENT_MODE, 1);

        h.dispatcher.handle(event_at(RawCode::SilentKey, 0.0));
        h.dispatcher.handle(event_at(RawCode::SilentKey, 0.3));
        h.dispatcher.handle(event_at(RawCode::SilentKey, 0.9));

        assert_eq!(h.out.try_recv().unwrap().code, SemanticCode::SilentOn);
        let second = h.out.try_recv().unwrap();
        assert_eq!(second.code, SemanticCode::SilentOn);
        assert_eq!(second.timestamp, 0.9);
        assert!(h.out.try_recv().is_err(), "t=0.3 must be suppressed");
    }

    #[test]
    fn silent_key_resolves_against_sysfs_flag() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        write_flag(&h, FLAG_SILENT_MODE, 1);
        h.dispatcher.handle(event_at(RawCode::SilentKey, 0.0));
        assert_eq!(h.out.try_recv().unwrap().code, SemanticCode::SilentOn);

        write_flag(&h, FLAG_SILENT_MODE, 0);
        h.dispatcher.handle(event_at(RawCode::SilentKey, 1.0));
        assert_eq!(h.out.try_recv().unwrap().code, SemanticCode::SilentOff);
    }

    #[test]
    fn identical_scan_200ms_later_publishes_nothing() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        write_flag(&h, FLAG_SILENT_MODE, 1);

        h.dispatcher.handle(event_at(RawCode::SilentKey, 10.0));
        h.dispatcher.handle(event_at(RawCode::SilentKey, 10.2));

        assert!(h.out.try_recv().is_ok());
        assert!(h.out.try_recv().is_err());
    }

    #[test]
    fn missing_vendor_module_drops_key_events() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        // Point at a platform directory that does not exist.
        h.dispatcher.sysfs = VendorSysfs::at("/nonexistent/qc71_laptop");
        h.dispatcher.handle(event_at(RawCode::SilentKey, 0.0));
        assert!(h.out.try_recv().is_err());
    }

    #[test]
    fn touchpad_switch_toggles_and_publishes() {
        let mut h = harness(Model::ProX, Touchpad::mock(TouchpadState::Unlocked));
        h.dispatcher.handle(event_at(RawCode::TouchpadSwitch, 0.0));
        assert_eq!(h.out.try_recv().unwrap().code, SemanticCode::TouchpadOff);

        h.dispatcher.handle(event_at(RawCode::TouchpadSwitch, 1.0));
        assert_eq!(h.out.try_recv().unwrap().code, SemanticCode::TouchpadOn);
    }

    #[test]
    fn disabled_setting_discards_touchpad_events() {
        let mut h = harness(Model::ProX, Touchpad::mock(TouchpadState::Unlocked));
        let mut flags = StdHashMap::new();
        flags.insert("trackpad_lock".to_string(), false);
        h.dispatcher.settings.apply(&flags);

        h.dispatcher.handle(event_at(RawCode::TouchpadSwitch, 0.0));
        assert!(h.out.try_recv().is_err());
    }

    #[test]
    fn missing_touchpad_backend_discards_switch_events() {
        let mut h = harness(Model::ProX, Touchpad::invalid());
        h.dispatcher.handle(event_at(RawCode::TouchpadSwitch, 0.0));
        assert!(h.out.try_recv().is_err());
    }

    #[test]
    fn performance_key_steps_the_cycle() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        let sysfs = VendorSysfs::at(h._sysfs_dir.path());
        sysfs.write_profile(Profile::Performance).unwrap();

        h.dispatcher.handle(event_at(RawCode::PerformanceKey, 0.0));
        assert_eq!(
            h.out.try_recv().unwrap().code,
            SemanticCode::ProfileEnergySaver
        );
        assert_eq!(sysfs.current_profile().unwrap(), Profile::EnergySaver);

        h.dispatcher.handle(event_at(RawCode::PerformanceKey, 1.0));
        assert_eq!(
            h.out.try_recv().unwrap().code,
            SemanticCode::ProfileBalanced
        );

        h.dispatcher.handle(event_at(RawCode::PerformanceKey, 2.0));
        assert_eq!(
            h.out.try_recv().unwrap().code,
            SemanticCode::ProfilePerformance
        );
        assert_eq!(sysfs.current_profile().unwrap(), Profile::Performance);
    }

    /// Children of this process currently in the zombie state, per
    /// `/proc/<pid>/stat` (state is the first field after the comm).
    fn zombie_child_count() -> usize {
        let me = std::process::id().to_string();
        let Ok(entries) = fs::read_dir("/proc") else {
            return 0;
        };
        let mut count = 0;
        for entry in entries.flatten() {
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            let Some(after_comm) = stat.rsplit(')').next() else {
                continue;
            };
            let mut fields = after_comm.split_whitespace();
            let state = fields.next();
            let ppid = fields.next();
            if state == Some("Z") && ppid == Some(me.as_str()) {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn profile_tool_children_are_reaped() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        h.dispatcher.profile_tool = Some("true".to_string());
        let sysfs = VendorSysfs::at(h._sysfs_dir.path());
        sysfs.write_profile(Profile::Performance).unwrap();

        h.dispatcher.handle(event_at(RawCode::PerformanceKey, 0.0));
        h.dispatcher.handle(event_at(RawCode::PerformanceKey, 1.0));
        h.dispatcher.handle(event_at(RawCode::PerformanceKey, 2.0));

        // Give the tool invocations time to exit and be collected.
        std::thread::sleep(std::time::Duration::from_millis(300));
        assert_eq!(
            zombie_child_count(),
            0,
            "every spawned tool must be reaped"
        );
    }

    #[test]
    fn performance_key_unsupported_on_binary_family() {
        let mut h = harness(Model::ProX, Touchpad::invalid());
        h.dispatcher.handle(event_at(RawCode::PerformanceKey, 0.0));
        assert!(h.out.try_recv().is_err());
    }

    #[test]
    fn mode_change_publishes_profile_event() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        h.dispatcher
            .handle(event_at(RawCode::ModeChanged(ModeFlag::Turbo), 0.0));
        assert_eq!(
            h.out.try_recv().unwrap().code,
            SemanticCode::ProfilePerformance
        );
    }

    #[test]
    fn ac_transitions_are_not_republished() {
        let mut h = harness(Model::Titan, Touchpad::invalid());
        let sysfs = VendorSysfs::at(h._sysfs_dir.path());
        sysfs.write_profile(Profile::Performance).unwrap();

        h.dispatcher.handle(event_at(RawCode::AcOffline, 0.0));
        assert!(h.out.try_recv().is_err());
        // But the battery policy took effect.
        assert_eq!(sysfs.current_profile().unwrap(), Profile::EnergySaver);

        h.dispatcher.handle(event_at(RawCode::AcOnline, 1.0));
        assert!(h.out.try_recv().is_err());
    }
}
