use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing_subscriber::EnvFilter;
use vpn_connectivity::{
    service::{ConnectivityHandle, ConnectivityService},
    shutdown::{self, ShutdownSignal},
    state::{BackoffPolicy, ConnectivityMachine, ConnectivitySnapshot, Event},
    switcher::{CommandSwitcher, SwitcherHooks},
};

/// VPN connectivity supervisor.
///
/// Reads connectivity events from stdin, one token per line (connect,
/// disconnect, resume, established, failed, error, closed, online, offline,
/// proxy-denied, device-limit, desktop-vpn=on|off), and drives the proxy
/// hooks accordingly.
#[derive(Parser, Debug)]
#[command(name = "vpn-connectivity", version, about)]
struct Cli {
    /// Shell command that applies the proxy settings.
    #[arg(long, env = "VPN_CONNECTIVITY_ON_CMD")]
    on_cmd: Option<String>,

    /// Shell command that removes the proxy settings.
    #[arg(long, env = "VPN_CONNECTIVITY_OFF_CMD")]
    off_cmd: Option<String>,

    /// Shell command that retries the connection.
    #[arg(long, env = "VPN_CONNECTIVITY_RETRY_CMD")]
    retry_cmd: Option<String>,

    /// Shell command that refreshes endpoint data and retries (defaults to --retry-cmd).
    #[arg(long, env = "VPN_CONNECTIVITY_REFRESH_CMD")]
    refresh_cmd: Option<String>,

    /// Initial reconnection delay in milliseconds.
    #[arg(long, default_value_t = 1_000, env = "VPN_CONNECTIVITY_INITIAL_DELAY_MS")]
    initial_delay_ms: u64,

    /// Upper bound for the reconnection delay in milliseconds.
    #[arg(long, default_value_t = 180_000, env = "VPN_CONNECTIVITY_MAX_DELAY_MS")]
    max_delay_ms: u64,

    /// Growth factor applied to the delay on every failed attempt.
    #[arg(long, default_value_t = 1.3, env = "VPN_CONNECTIVITY_MULTIPLIER")]
    multiplier: f64,

    /// Accumulated delay after which a retry refreshes endpoint data.
    #[arg(long, default_value_t = 70_000, env = "VPN_CONNECTIVITY_REFRESH_THRESHOLD_MS")]
    refresh_threshold_ms: u64,

    /// Resume a previously connected session on startup.
    #[arg(long, env = "VPN_CONNECTIVITY_RESUME")]
    resume: bool,

    /// Print snapshots as JSON lines.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            refresh_threshold: Duration::from_millis(self.refresh_threshold_ms),
        }
    }

    fn hooks(&self) -> SwitcherHooks {
        SwitcherHooks {
            on: self.on_cmd.clone(),
            off: self.off_cmd.clone(),
            retry: self.retry_cmd.clone(),
            refresh: self.refresh_cmd.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let policy = cli
        .backoff_policy()
        .validate()
        .context("invalid backoff configuration")?;

    let switcher = Arc::new(CommandSwitcher::new(cli.hooks()));
    let (handle, service) = ConnectivityService::spawn(ConnectivityMachine::new(policy), switcher);
    let printer = tokio::spawn(print_snapshots(handle.subscribe(), cli.json));

    if cli.resume {
        handle.dispatch(Event::SessionResumed).await?;
    }

    let signal = read_events(&handle).await?;
    tracing::info!(%signal, "shutting down");

    handle.dispatch(Event::DisconnectRequested).await?;
    drop(handle);

    let machine = service.await.context("connectivity service task failed")?;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "snapshot printer failed");
    }
    tracing::debug!(state = %machine.state, "final state");
    Ok(())
}

/// Dispatches stdin events until a shutdown signal arrives.
async fn read_events(handle: &ConnectivityHandle) -> Result<ShutdownSignal> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    let shutdown_signal = shutdown::wait_for_signal();
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line.context("failed to read stdin")? {
                    Some(line) => dispatch_line(handle, &line).await?,
                    None => {
                        tracing::info!("input closed, waiting for shutdown signal");
                        input_open = false;
                    }
                }
            }
            result = &mut shutdown_signal => {
                return result.context("shutdown signal listener failed");
            }
        }
    }
}

async fn dispatch_line(handle: &ConnectivityHandle, line: &str) -> Result<()> {
    let token = line.trim();
    if token.is_empty() || token.starts_with('#') {
        return Ok(());
    }

    match token.parse::<Event>() {
        Ok(event) => {
            handle.dispatch(event).await?;
        }
        Err(e) => tracing::warn!(error = %e, "ignoring input line"),
    }
    Ok(())
}

async fn print_snapshots(mut snapshots: watch::Receiver<ConnectivitySnapshot>, json: bool) {
    loop {
        let snapshot = *snapshots.borrow_and_update();
        match render_snapshot(&snapshot, json) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to render snapshot"),
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }
}

fn render_snapshot(snapshot: &ConnectivitySnapshot, json: bool) -> Result<String> {
    match json {
        true => serde_json::to_string(snapshot).context("failed to serialize snapshot"),
        false => {
            let ctx = &snapshot.context;
            Ok(format!(
                "{} retry_count={} delay_ms={} since_refresh_ms={} desktop_vpn={}",
                snapshot.state,
                ctx.retry_count,
                ctx.reconnection_delay.as_millis(),
                ctx.time_since_last_retry_with_refresh.as_millis(),
                ctx.desktop_vpn_enabled,
            ))
        }
    }
}
