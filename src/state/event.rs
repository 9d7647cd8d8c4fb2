use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Event {
    // ─── User intent ────────────────────────────────────────────────────────
    ConnectRequested,
    DisconnectRequested,
    SessionResumed,

    // ─── Transport lifecycle ────────────────────────────────────────────────
    TransportEstablished,
    TransportFailed,
    TransportError,
    TransportClosed,

    // ─── Host network ───────────────────────────────────────────────────────
    NetworkBecameAvailable,
    NetworkBecameUnavailable,

    // ─── Server / host signals ──────────────────────────────────────────────
    ProxyControlDenied,
    DeviceLimitExceeded,
    DesktopVpnToggled {
        enabled: bool,
    },

    // ─── Scheduler (synthesized by the service loop) ────────────────────────
    RetryDelayElapsed {
        timer_id: u64,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("unknown event '{0}'")]
    Unknown(String),
    #[error("invalid desktop-vpn value '{0}': must be 'on' or 'off'")]
    InvalidToggle(String),
}

/// Parses the textual event tokens accepted on the control input.
impl FromStr for Event {
    type Err = EventParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if let Some(value) = token.strip_prefix("desktop-vpn=") {
            return match value {
                "on" => Ok(Event::DesktopVpnToggled { enabled: true }),
                "off" => Ok(Event::DesktopVpnToggled { enabled: false }),
                other => Err(EventParseError::InvalidToggle(other.to_string())),
            };
        }

        match token {
            "connect" => Ok(Event::ConnectRequested),
            "disconnect" => Ok(Event::DisconnectRequested),
            "resume" => Ok(Event::SessionResumed),
            "established" => Ok(Event::TransportEstablished),
            "failed" => Ok(Event::TransportFailed),
            "error" => Ok(Event::TransportError),
            "closed" => Ok(Event::TransportClosed),
            "online" => Ok(Event::NetworkBecameAvailable),
            "offline" => Ok(Event::NetworkBecameUnavailable),
            "proxy-denied" => Ok(Event::ProxyControlDenied),
            "device-limit" => Ok(Event::DeviceLimitExceeded),
            other => Err(EventParseError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_every_token() {
        let cases = [
            ("connect", Event::ConnectRequested),
            ("disconnect", Event::DisconnectRequested),
            ("resume", Event::SessionResumed),
            ("established", Event::TransportEstablished),
            ("failed", Event::TransportFailed),
            ("error", Event::TransportError),
            ("closed", Event::TransportClosed),
            ("online", Event::NetworkBecameAvailable),
            ("offline", Event::NetworkBecameUnavailable),
            ("proxy-denied", Event::ProxyControlDenied),
            ("device-limit", Event::DeviceLimitExceeded),
            ("desktop-vpn=on", Event::DesktopVpnToggled { enabled: true }),
            ("desktop-vpn=off", Event::DesktopVpnToggled { enabled: false }),
        ];
        for (token, expected) in cases {
            assert_eq!(token.parse::<Event>(), Ok(expected), "token {token}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!("  connect \n".parse::<Event>(), Ok(Event::ConnectRequested));
    }

    #[test]
    fn rejects_bad_toggle_value() {
        assert_eq!(
            "desktop-vpn=maybe".parse::<Event>(),
            Err(EventParseError::InvalidToggle("maybe".to_string()))
        );
    }

    proptest! {
        #[test]
        fn rejects_unknown_tokens(s in "[A-Z]{1,12}") {
            let result: Result<Event, _> = s.parse();
            prop_assert_eq!(result, Err(EventParseError::Unknown(s.clone())));
        }
    }
}
