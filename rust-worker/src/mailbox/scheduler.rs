//! Fixed-delay poll scheduling.
//!
//! The next cycle starts `interval` after the previous one finished, so two
//! cycles never overlap. A cycle that runs past its deadline is dropped,
//! which drops (and thereby releases) its mailbox session.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{error, info};

use super::poller::{MailboxPoller, PerMessageResult};
use super::store::MailStore;
use crate::queue::EmailSink;

/// How a scheduled cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(Vec<PerMessageResult>),
    Failed,
    TimedOut,
}

/// Run a single cycle bounded by `deadline`.
pub async fn run_cycle<S, P>(poller: &MailboxPoller<S, P>, deadline: Duration) -> CycleOutcome
where
    S: MailStore,
    P: EmailSink,
{
    match timeout(deadline, poller.poll()).await {
        Ok(Ok(results)) => CycleOutcome::Completed(results),
        // Already logged and counted by the poller
        Ok(Err(_)) => CycleOutcome::Failed,
        Err(_) => {
            poller.stats().record_cycle_timeout();
            error!(
                deadline_ms = deadline.as_millis() as u64,
                "mailbox_poll_timeout"
            );
            CycleOutcome::TimedOut
        }
    }
}

/// Poll until `shutdown` resolves.
pub async fn run_scheduled<S, P, F>(
    poller: &MailboxPoller<S, P>,
    interval: Duration,
    deadline: Duration,
    shutdown: F,
) where
    S: MailStore,
    P: EmailSink,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    info!(
        interval_ms = interval.as_millis() as u64,
        deadline_ms = deadline.as_millis() as u64,
        "poll_scheduler_started"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = run_cycle(poller, deadline) => {}
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = sleep(interval) => {}
        }
    }

    info!("poll_scheduler_stopped");
}
