//! Event model: raw producer codes and outbound semantic events.
//!
//! Producers only ever emit `RawEvent`s into the shared queue; the
//! dispatcher is the single consumer and the only place raw codes are
//! resolved into `SemanticEvent`s. Both code spaces are closed enums —
//! anything the hardware sends that does not map here is discarded at
//! the edge.

use serde::Serialize;

/// Which producer thread emitted a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerId {
    Keyboard,
    VendorModule,
    PowerSupply,
    ModePoller,
}

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyboard => write!(f, "keyboard"),
            Self::VendorModule => write!(f, "vendor-module"),
            Self::PowerSupply => write!(f, "power-supply"),
            Self::ModePoller => write!(f, "mode-poller"),
        }
    }
}

/// Three-way performance profile, cycled by the performance key on
/// families that expose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    EnergySaver,
    Balanced,
    Performance,
}

impl Profile {
    /// Next profile in the fixed cycle order. Period 3:
    /// performance → energy-saver → balanced → performance.
    pub fn next(self) -> Self {
        match self {
            Self::Performance => Self::EnergySaver,
            Self::EnergySaver => Self::Balanced,
            Self::Balanced => Self::Performance,
        }
    }

    /// Name understood by the external power-profile tool.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::EnergySaver => "power-saver",
            Self::Balanced => "balanced",
            Self::Performance => "performance",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnergySaver => write!(f, "energy-saver"),
            Self::Balanced => write!(f, "balanced"),
            Self::Performance => write!(f, "performance"),
        }
    }
}

/// Coarse hardware signals, one per qualifying interrupt.
///
/// Key-derived codes are ambiguous on purpose: "the silent-mode key was
/// pressed" says nothing about the resulting state. The dispatcher
/// resolves them against current hardware state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawCode {
    SuperLockKey,
    SilentKey,
    TouchpadSwitch,
    PerformanceKey,
    /// Derived tri-state mode change from the sysfs poller.
    ModeChanged(ModeFlag),
    AcOnline,
    AcOffline,
}

/// Poller-derived tri-state mode. Kept separate from `Profile` so the
/// raw layer stays a plain signal and the policy mapping lives in the
/// dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeFlag {
    Silent,
    Normal,
    Turbo,
}

impl RawCode {
    /// Map a keyboard miscellaneous scan code to a raw code.
    ///
    /// The firmware occasionally emits large stray values (458811 has
    /// been observed in the field); anything outside the known set is
    /// `None` and gets dropped by the producer.
    pub fn from_scan_code(code: u32) -> Option<Self> {
        match code {
            104 => Some(Self::SuperLockKey),
            105 => Some(Self::SilentKey),
            118 => Some(Self::TouchpadSwitch),
            188 => Some(Self::PerformanceKey),
            _ => None,
        }
    }
}

/// One qualifying hardware interrupt, as enqueued by a producer.
#[derive(Debug, Clone, Copy)]
pub struct RawEvent {
    pub source: ProducerId,
    pub code: RawCode,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl RawEvent {
    pub fn now(source: ProducerId, code: RawCode) -> Self {
        Self {
            source,
            code,
            timestamp: epoch_seconds(),
        }
    }
}

/// Final, directional event codes published on the wire.
///
/// Wire values are stable: subscribers match on the integer, not the
/// Rust name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u32")]
#[repr(u32)]
pub enum SemanticCode {
    SuperLockOff = 10,
    SuperLockOn = 11,
    SilentOff = 20,
    SilentOn = 21,
    TouchpadOff = 30,
    TouchpadOn = 31,
    ProfileEnergySaver = 40,
    ProfileBalanced = 41,
    ProfilePerformance = 42,
    // AC codes exist for internal policy only and are never published.
    AcOffline = 50,
    AcOnline = 51,
}

impl From<SemanticCode> for u32 {
    fn from(c: SemanticCode) -> u32 {
        c as u32
    }
}

impl SemanticCode {
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::EnergySaver => Self::ProfileEnergySaver,
            Profile::Balanced => Self::ProfileBalanced,
            Profile::Performance => Self::ProfilePerformance,
        }
    }
}

/// Published outward as `{"code": <integer>, "timestamp": <float>}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SemanticEvent {
    pub code: SemanticCode,
    pub timestamp: f64,
}

impl SemanticEvent {
    pub fn new(code: SemanticCode, timestamp: f64) -> Self {
        Self { code, timestamp }
    }
}

/// Current wall-clock time as float seconds since the epoch.
pub fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
