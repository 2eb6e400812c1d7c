//! Event loop.
//!
//! Receives messages from the broker and processes each capture event on
//! its own task, so a slow ledger call never holds up the next event.
//! In-flight events are awaited on shutdown, never cancelled.

use std::sync::Arc;

use shutter_gateway::{ContentStore, Ledger};
use shutter_store::KeyStore;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::broker::Broker;
use crate::error::Result;
use crate::notary::NotaryOutcome;
use crate::relay::{ProcessedEvent, Relay};

/// Counts kept by the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub received: u64,
    pub notarized: u64,
    pub already_notarized: u64,
    pub failed: u64,
}

impl RunStats {
    fn record(&mut self, result: Option<ProcessedEvent>) {
        match result.map(|p| p.outcome) {
            Some(NotaryOutcome::Notarized { .. }) => self.notarized += 1,
            Some(NotaryOutcome::AlreadyNotarized) => self.already_notarized += 1,
            None => self.failed += 1,
        }
    }
}

/// Run the event loop until the broker closes or shutdown is signalled.
///
/// A broker receive error also stops the loop; it is returned once the
/// in-flight events have finished.
pub async fn run_events<K, L, C, B>(
    relay: Arc<Relay<K, L, C>>,
    broker: Arc<B>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<RunStats>
where
    K: KeyStore + 'static,
    L: Ledger + 'static,
    C: ContentStore + 'static,
    B: Broker + 'static,
{
    let mut stats = RunStats::default();
    let mut tasks: JoinSet<Option<ProcessedEvent>> = JoinSet::new();
    let mut failure = None;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("shutdown requested");
                    break;
                }
            }
            message = broker.recv() => {
                let message = match message {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        info!("broker closed");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "broker receive failed");
                        failure = Some(e);
                        break;
                    }
                };
                if message.topic != relay.topic() {
                    debug!(topic = %message.topic, "ignoring message on unrelated topic");
                    continue;
                }
                stats.received += 1;
                let relay = relay.clone();
                tasks.spawn(async move { relay.handle(&message.payload).await });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                reap(&mut stats, joined);
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        reap(&mut stats, joined);
    }
    info!(
        received = stats.received,
        notarized = stats.notarized,
        already_notarized = stats.already_notarized,
        failed = stats.failed,
        "event loop stopped"
    );
    match failure {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

fn reap(
    stats: &mut RunStats,
    joined: std::result::Result<Option<ProcessedEvent>, tokio::task::JoinError>,
) {
    match joined {
        Ok(result) => stats.record(result),
        Err(e) => {
            error!(error = %e, "event task panicked");
            stats.failed += 1;
        }
    }
}
