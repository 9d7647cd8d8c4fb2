use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle, time::Instant};

use crate::{state::Command, switcher::ProxySwitcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RetryDeadline {
    pub(super) timer_id: u64,
    pub(super) deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProxyCall {
    TurnOn,
    TurnOff,
    RetryTurnOn { force_refresh: bool },
}

pub(super) struct ExecutionContext {
    pub(super) retry_deadline: Option<RetryDeadline>,
    proxy_calls: mpsc::UnboundedSender<ProxyCall>,
    proxy_worker: JoinHandle<()>,
}

impl ExecutionContext {
    /// Starts the proxy worker. Calls are applied one at a time in the order
    /// the machine emitted them, so the last one issued is the one in effect.
    pub(super) fn new(switcher: Arc<dyn ProxySwitcher>) -> Self {
        let (proxy_calls, queue) = mpsc::unbounded_channel();
        Self {
            retry_deadline: None,
            proxy_calls,
            proxy_worker: tokio::spawn(apply_proxy_calls(switcher, queue)),
        }
    }

    fn queue(&self, call: ProxyCall) {
        if self.proxy_calls.send(call).is_err() {
            tracing::warn!(?call, "proxy worker is gone, dropping call");
        }
    }

    /// Lets the worker finish queued proxy calls, aborting it after `timeout`.
    pub(super) async fn drain(self, timeout: Duration) {
        let Self {
            proxy_calls,
            mut proxy_worker,
            ..
        } = self;
        drop(proxy_calls);

        match tokio::time::timeout(timeout, &mut proxy_worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "proxy worker panicked"),
            Err(_) => {
                tracing::warn!("proxy calls still pending at shutdown, aborting");
                proxy_worker.abort();
            }
        }
    }
}

async fn apply_proxy_calls(
    switcher: Arc<dyn ProxySwitcher>,
    mut queue: mpsc::UnboundedReceiver<ProxyCall>,
) {
    while let Some(call) = queue.recv().await {
        match call {
            ProxyCall::TurnOn => match switcher.turn_on().await {
                Ok(()) => tracing::debug!("proxy turned on"),
                Err(e) => tracing::warn!(error = %e, "failed to turn proxy on"),
            },
            ProxyCall::TurnOff => match switcher.turn_off().await {
                Ok(()) => tracing::debug!("proxy turned off"),
                Err(e) => tracing::warn!(error = %e, "failed to turn proxy off"),
            },
            ProxyCall::RetryTurnOn { force_refresh } => {
                match switcher.retry_turn_on(force_refresh).await {
                    Ok(()) => tracing::debug!(force_refresh, "retry connection issued"),
                    Err(e) => {
                        tracing::warn!(force_refresh, error = %e, "failed to retry connection")
                    }
                }
            }
        }
    }
}

pub(super) fn execute_commands(commands: &[Command], ctx: &mut ExecutionContext) {
    for cmd in commands {
        match *cmd {
            Command::TurnOn => ctx.queue(ProxyCall::TurnOn),
            Command::TurnOff => ctx.queue(ProxyCall::TurnOff),
            Command::RetryTurnOn { force_refresh } => {
                tracing::info!(force_refresh, "retrying connection");
                ctx.queue(ProxyCall::RetryTurnOn { force_refresh });
            }
            Command::ArmRetryTimer { timer_id, delay } => {
                tracing::debug!(timer_id, delay_ms = delay.as_millis(), "retry timer armed");
                ctx.retry_deadline = Some(RetryDeadline {
                    timer_id,
                    deadline: Instant::now() + delay,
                });
            }
            Command::CancelRetryTimer { timer_id } => match ctx.retry_deadline {
                Some(armed) if armed.timer_id == timer_id => {
                    tracing::debug!(timer_id, "retry timer cancelled");
                    ctx.retry_deadline = None;
                }
                Some(_) | None => {}
            },
        }
    }
}
