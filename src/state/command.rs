use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // ─── Proxy switcher ─────────────────────────────────────────────────────
    TurnOn,
    TurnOff,
    RetryTurnOn { force_refresh: bool },

    // ─── Retry scheduler ────────────────────────────────────────────────────
    ArmRetryTimer { timer_id: u64, delay: Duration },
    CancelRetryTimer { timer_id: u64 },
}
