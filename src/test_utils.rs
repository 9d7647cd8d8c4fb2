use std::time::Duration;

use proptest::prelude::*;

use crate::state::{
    BackoffPolicy, ConnectivityContext, ConnectivityMachine, ConnectivityState, Event,
};

// ─── State generators ───────────────────────────────────────────────────────

pub fn arb_state() -> impl Strategy<Value = ConnectivityState> {
    prop_oneof![
        Just(ConnectivityState::Idle),
        Just(ConnectivityState::ConnectingIdle),
        Just(ConnectivityState::Connected),
        Just(ConnectivityState::DisconnectedIdle),
        Just(ConnectivityState::DisconnectedRetrying),
        Just(ConnectivityState::ConnectingRetrying),
    ]
}

pub fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::ConnectRequested),
        Just(Event::DisconnectRequested),
        Just(Event::SessionResumed),
        Just(Event::TransportEstablished),
        Just(Event::TransportFailed),
        Just(Event::TransportError),
        Just(Event::TransportClosed),
        Just(Event::NetworkBecameAvailable),
        Just(Event::NetworkBecameUnavailable),
        Just(Event::ProxyControlDenied),
        Just(Event::DeviceLimitExceeded),
        any::<bool>().prop_map(|enabled| Event::DesktopVpnToggled { enabled }),
        (0u64..4).prop_map(|timer_id| Event::RetryDelayElapsed { timer_id }),
    ]
}

// ─── Context / policy generators ────────────────────────────────────────────

pub fn arb_context() -> impl Strategy<Value = ConnectivityContext> {
    (0u32..1000, 1000u64..=180_000, 0u64..=70_000, any::<bool>()).prop_map(
        |(retry_count, delay_ms, since_ms, desktop_vpn_enabled)| ConnectivityContext {
            retry_count,
            reconnection_delay: Duration::from_millis(delay_ms),
            time_since_last_retry_with_refresh: Duration::from_millis(since_ms),
            desktop_vpn_enabled,
        },
    )
}

pub fn arb_policy() -> impl Strategy<Value = BackoffPolicy> {
    (1u64..5_000, 0u64..600_000, 1.0f64..3.0, 1u64..300_000).prop_map(
        |(initial_ms, extra_ms, multiplier, threshold_ms)| BackoffPolicy {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(initial_ms + extra_ms),
            multiplier,
            refresh_threshold: Duration::from_millis(threshold_ms),
        },
    )
}

/// A default machine placed directly in `state`, with no armed timer.
pub fn machine_in(state: ConnectivityState) -> ConnectivityMachine {
    let mut machine = ConnectivityMachine::default();
    machine.state = state;
    machine
}
