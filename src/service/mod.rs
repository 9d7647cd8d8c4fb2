mod execute;

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use self::execute::{ExecutionContext, execute_commands};
use crate::{
    state::{ConnectivityMachine, ConnectivitySnapshot, ConnectivityState, Event},
    switcher::ProxySwitcher,
    traits::MealyMachine,
};

const EVENT_QUEUE_CAPACITY: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("connectivity service has stopped")]
    Stopped,
}

struct Request {
    event: Event,
    ack: oneshot::Sender<ConnectivitySnapshot>,
}

// ─── Handle ─────────────────────────────────────────────────────────────────

/// Entry point for event producers and state observers.
///
/// The service runs until every handle has been dropped.
#[derive(Clone)]
pub struct ConnectivityHandle {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<ConnectivitySnapshot>,
}

impl ConnectivityHandle {
    /// Submits `event` and waits until the machine has processed it.
    pub async fn dispatch(&self, event: Event) -> Result<ConnectivitySnapshot, ServiceError> {
        let (ack, done) = oneshot::channel();
        self.requests
            .send(Request { event, ack })
            .await
            .map_err(|_| ServiceError::Stopped)?;
        done.await.map_err(|_| ServiceError::Stopped)
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        *self.snapshots.borrow()
    }

    pub fn state(&self) -> ConnectivityState {
        self.snapshots.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivitySnapshot> {
        self.snapshots.clone()
    }
}

// ─── Service ────────────────────────────────────────────────────────────────

pub struct ConnectivityService;

impl ConnectivityService {
    /// Moves `machine` onto a tokio task. The join handle resolves to the
    /// final machine once all handles are gone and queued proxy calls have
    /// settled.
    pub fn spawn(
        machine: ConnectivityMachine,
        switcher: Arc<dyn ProxySwitcher>,
    ) -> (ConnectivityHandle, JoinHandle<ConnectivityMachine>) {
        let (requests_tx, requests_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (snapshots_tx, snapshots_rx) = watch::channel(machine.snapshot());

        let task = tokio::spawn(run(machine, requests_rx, snapshots_tx, switcher));
        let handle = ConnectivityHandle {
            requests: requests_tx,
            snapshots: snapshots_rx,
        };
        (handle, task)
    }
}

async fn run(
    mut machine: ConnectivityMachine,
    mut requests: mpsc::Receiver<Request>,
    snapshots: watch::Sender<ConnectivitySnapshot>,
    switcher: Arc<dyn ProxySwitcher>,
) -> ConnectivityMachine {
    tracing::info!(state = %machine.state, "connectivity service started");
    let mut ctx = ExecutionContext::new(switcher);

    loop {
        let next_retry = ctx.retry_deadline;

        tokio::select! {
            request = requests.recv() => {
                let Some(Request { event, ack }) = request else {
                    break;
                };
                machine = process(machine, event, &snapshots, &mut ctx);
                // The caller may have stopped waiting.
                let _ = ack.send(machine.snapshot());
            }
            _ = async {
                match next_retry {
                    Some(armed) => tokio::time::sleep_until(armed.deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Some(armed) = ctx.retry_deadline.take() {
                    machine = process(
                        machine,
                        Event::RetryDelayElapsed { timer_id: armed.timer_id },
                        &snapshots,
                        &mut ctx,
                    );
                }
            }
        }
    }

    ctx.drain(SHUTDOWN_GRACE).await;
    tracing::info!(state = %machine.state, "connectivity service stopped");
    machine
}

fn process(
    machine: ConnectivityMachine,
    event: Event,
    snapshots: &watch::Sender<ConnectivitySnapshot>,
    ctx: &mut ExecutionContext,
) -> ConnectivityMachine {
    let old_state = machine.state;
    let (machine, commands) = machine.transition(event);
    tracing::debug!(event = %event, commands = commands.len(), "event processed");
    log_state_transition(old_state, machine.state, &machine);

    let next = machine.snapshot();
    snapshots.send_if_modified(|current| match *current == next {
        true => false,
        false => {
            *current = next;
            true
        }
    });
    execute_commands(&commands, ctx);
    machine
}

fn log_state_transition(
    old: ConnectivityState,
    new: ConnectivityState,
    machine: &ConnectivityMachine,
) {
    match old == new {
        true => {}
        false => {
            tracing::info!(
                from = %old,
                to = %new,
                proxy_enabled = new.is_proxy_enabled(),
                retry_count = machine.context.retry_count,
                delay_ms = machine.context.reconnection_delay.as_millis(),
                "connectivity state transition"
            );
        }
    }
}
