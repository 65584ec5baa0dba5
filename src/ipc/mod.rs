//! Wire protocol for the two local endpoints.
//!
//! Outbound publish channel: one JSON line per surviving event,
//! `{"code": <integer>, "timestamp": <float>}`, fire-and-forget.
//!
//! Control channel: JSON-line request/reply. The only understood
//! request is `{"cmd": "load-settings", "settings": {<name>: bool}}`;
//! anything else is accepted silently. Every request gets the empty
//! object back.

pub mod server;

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::settings::Settings;

/// A control-channel request line.
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub cmd: String,
    #[serde(default)]
    pub settings: HashMap<String, bool>,
}

/// Reply sent for every control request, understood or not.
pub const EMPTY_REPLY: &str = "{}";

/// Apply one control request line and produce the reply.
///
/// Unknown commands and malformed lines get the same empty reply —
/// the channel never signals errors, it only stays in lockstep.
pub fn handle_request(line: &str, settings: &Settings) -> &'static str {
    match serde_json::from_str::<ControlRequest>(line) {
        Ok(req) if req.cmd == "load-settings" => {
            settings.apply(&req.settings);
        }
        Ok(req) => {
            debug!(cmd = %req.cmd, "unknown control command, ignoring");
        }
        Err(e) => {
            debug!(error = %e, "malformed control request, ignoring");
        }
    }
    EMPTY_REPLY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_settings_applies_flags() {
        let settings = Settings::default();
        let reply = handle_request(
            r#"{"cmd":"load-settings","settings":{"trackpad_lock":false}}"#,
            &settings,
        );
        assert_eq!(reply, "{}");
        assert!(!settings.touchpad_lock());
    }

    #[test]
    fn unknown_command_is_accepted_silently() {
        let settings = Settings::default();
        let reply = handle_request(r#"{"cmd":"self-destruct"}"#, &settings);
        assert_eq!(reply, "{}");
        assert!(settings.touchpad_lock(), "settings untouched");
    }

    #[test]
    fn malformed_request_still_gets_a_reply() {
        let settings = Settings::default();
        assert_eq!(handle_request("not json", &settings), "{}");
    }

    #[test]
    fn missing_settings_field_defaults_empty() {
        let settings = Settings::default();
        assert_eq!(
            handle_request(r#"{"cmd":"load-settings"}"#, &settings),
            "{}"
        );
        assert!(settings.touchpad_lock());
    }
}
