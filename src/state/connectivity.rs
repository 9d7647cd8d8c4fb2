use serde::Serialize;

use super::{
    command::Command,
    context::{BackoffPolicy, ConnectivityContext},
    event::Event,
};
use crate::traits::MealyMachine;

// ─── State ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Idle,
    ConnectingIdle,
    Connected,
    DisconnectedIdle,
    DisconnectedRetrying,
    ConnectingRetrying,
}

impl ConnectivityState {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_connecting(self) -> bool {
        matches!(self, Self::ConnectingIdle | Self::ConnectingRetrying)
    }

    pub fn is_retrying(self) -> bool {
        matches!(self, Self::DisconnectedRetrying | Self::ConnectingRetrying)
    }

    /// Whether the user still wants the proxy on in this state.
    pub fn is_proxy_enabled(self) -> bool {
        match self {
            Self::ConnectingIdle
            | Self::Connected
            | Self::DisconnectedRetrying
            | Self::ConnectingRetrying => true,
            Self::Idle | Self::DisconnectedIdle => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivitySnapshot {
    pub state: ConnectivityState,
    pub context: ConnectivityContext,
}

// ─── Machine ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityMachine {
    pub state: ConnectivityState,
    pub context: ConnectivityContext,
    pub policy: BackoffPolicy,
    /// Id of the armed `DisconnectedRetrying` delay, if any.
    pub retry_timer: Option<u64>,
    timer_seq: u64,
}

impl Default for ConnectivityMachine {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl ConnectivityMachine {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectivityState::Idle,
            context: ConnectivityContext::new(&policy),
            policy,
            retry_timer: None,
            timer_seq: 0,
        }
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        ConnectivitySnapshot {
            state: self.state,
            context: self.context,
        }
    }

    fn next_timer_id(&mut self) -> u64 {
        self.timer_seq = self.timer_seq.saturating_add(1);
        self.timer_seq
    }

    /// Leaves the current state and enters `target`, running exit and entry
    /// actions.
    fn enter(mut self, target: ConnectivityState, commands: &mut Vec<Command>) -> Self {
        if let Some(timer_id) = self.retry_timer.take() {
            commands.push(Command::CancelRetryTimer { timer_id });
        }

        self.state = target;
        match target {
            ConnectivityState::ConnectingIdle => commands.push(Command::TurnOn),
            ConnectivityState::DisconnectedIdle => commands.push(Command::TurnOff),
            ConnectivityState::DisconnectedRetrying => {
                self.context.increment_reconnection_delay(&self.policy);
                let timer_id = self.next_timer_id();
                self.retry_timer = Some(timer_id);
                commands.push(Command::ArmRetryTimer {
                    timer_id,
                    delay: self.context.reconnection_delay,
                });
            }
            ConnectivityState::ConnectingRetrying => {
                self.context.increment_retry_count();
                let force_refresh = self.context.needs_refresh(&self.policy);
                commands.push(Command::RetryTurnOn { force_refresh });
                self.context.update_refresh_timer(&self.policy);
            }
            ConnectivityState::Connected => self.context.reset(&self.policy),
            ConnectivityState::Idle => {}
        }
        self
    }

    fn target(&self, event: Event) -> Option<ConnectivityState> {
        use ConnectivityState::*;

        match (self.state, event) {
            (Idle, Event::ConnectRequested | Event::SessionResumed) => Some(ConnectingIdle),

            (DisconnectedIdle, Event::ConnectRequested) => Some(ConnectingIdle),

            (
                DisconnectedRetrying,
                Event::ConnectRequested | Event::NetworkBecameAvailable,
            ) => Some(ConnectingRetrying),
            (DisconnectedRetrying, Event::RetryDelayElapsed { timer_id })
                if self.retry_timer == Some(timer_id) =>
            {
                Some(ConnectingRetrying)
            }
            (
                DisconnectedRetrying,
                Event::DisconnectRequested
                | Event::DeviceLimitExceeded
                | Event::DesktopVpnToggled { .. },
            ) => Some(DisconnectedIdle),

            (ConnectingIdle | ConnectingRetrying, Event::TransportEstablished) => Some(Connected),
            (
                ConnectingIdle | ConnectingRetrying,
                Event::TransportFailed | Event::TransportClosed | Event::TransportError,
            ) => Some(DisconnectedRetrying),
            (
                ConnectingIdle | ConnectingRetrying,
                Event::ProxyControlDenied
                | Event::DisconnectRequested
                | Event::DeviceLimitExceeded
                | Event::DesktopVpnToggled { .. },
            ) => Some(DisconnectedIdle),

            (Connected, Event::TransportError | Event::TransportClosed) => {
                Some(DisconnectedRetrying)
            }
            (
                Connected,
                Event::DisconnectRequested
                | Event::DeviceLimitExceeded
                | Event::DesktopVpnToggled { .. },
            ) => Some(DisconnectedIdle),

            (Idle | DisconnectedIdle, _)
            | (DisconnectedRetrying, _)
            | (ConnectingIdle | ConnectingRetrying, _)
            | (Connected, _) => None,
        }
    }
}

impl MealyMachine for ConnectivityMachine {
    type Event = Event;
    type Command = Command;

    fn transition(mut self, event: Event) -> (Self, Vec<Command>) {
        let mut commands = Vec::new();

        if let Event::DesktopVpnToggled { enabled } = event {
            self.context.desktop_vpn_enabled = enabled;
        }

        let machine = match self.target(event) {
            Some(target) => self.enter(target, &mut commands),
            None => self,
        };

        (machine, commands)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
