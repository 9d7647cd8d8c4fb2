use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum SwitcherError {
    #[error("failed to run {hook} hook: {source}")]
    Spawn {
        hook: &'static str,
        source: std::io::Error,
    },
    #[error("{hook} hook exited with {status}")]
    HookFailed {
        hook: &'static str,
        status: ExitStatus,
    },
    /// For switchers that refuse a call without running a hook, e.g. an
    /// embedding application that lacks proxy control.
    #[error("proxy switch rejected: {0}")]
    Rejected(String),
}

/// Applies and removes the system proxy.
///
/// Every call may fail; the connectivity service logs failures and carries on,
/// relying on later transport events to report the real outcome.
#[async_trait]
pub trait ProxySwitcher: Send + Sync {
    async fn turn_on(&self) -> Result<(), SwitcherError>;
    async fn turn_off(&self) -> Result<(), SwitcherError>;
    /// Retries the connection; `force_refresh` re-fetches tokens, VPN info
    /// and the location list before reselecting an endpoint.
    async fn retry_turn_on(&self, force_refresh: bool) -> Result<(), SwitcherError>;
}

// ─── CommandSwitcher ────────────────────────────────────────────────────────

/// Shell hooks run through `sh -c`. A missing hook is a no-op.
#[derive(Debug, Clone, Default)]
pub struct SwitcherHooks {
    pub on: Option<String>,
    pub off: Option<String>,
    pub retry: Option<String>,
    /// Falls back to `retry` when unset.
    pub refresh: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandSwitcher {
    hooks: SwitcherHooks,
}

impl CommandSwitcher {
    pub fn new(hooks: SwitcherHooks) -> Self {
        Self { hooks }
    }

    async fn run_hook(hook: &'static str, command: Option<&str>) -> Result<(), SwitcherError> {
        let Some(command) = command else {
            tracing::debug!(hook, "no hook configured, skipping");
            return Ok(());
        };

        tracing::debug!(hook, %command, "running proxy hook");
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| SwitcherError::Spawn { hook, source })?;

        match status.success() {
            true => Ok(()),
            false => Err(SwitcherError::HookFailed { hook, status }),
        }
    }
}

#[async_trait]
impl ProxySwitcher for CommandSwitcher {
    async fn turn_on(&self) -> Result<(), SwitcherError> {
        Self::run_hook("on", self.hooks.on.as_deref()).await
    }

    async fn turn_off(&self) -> Result<(), SwitcherError> {
        Self::run_hook("off", self.hooks.off.as_deref()).await
    }

    async fn retry_turn_on(&self, force_refresh: bool) -> Result<(), SwitcherError> {
        match force_refresh {
            true => {
                let command = self.hooks.refresh.as_deref().or(self.hooks.retry.as_deref());
                Self::run_hook("refresh", command).await
            }
            false => Self::run_hook("retry", self.hooks.retry.as_deref()).await,
        }
    }
}
