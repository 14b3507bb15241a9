use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use refback_common::{RefbackError, RefbackSignal};

use crate::events::{RefbackEvent, RefbackNotifier};
use crate::pipeline::stages::{process_signal, RefbackOutcome};
use crate::pipeline::traits::{CommentStore, Fetcher, PostResolver};

/// Deferred half of the pipeline: a single consumer draining the signal
/// queue. Signals are independent, so processing them strictly in arrival
/// order is a simplification, not a requirement.
pub struct RefbackWorker {
    fetcher: Arc<dyn Fetcher>,
    resolver: Arc<dyn PostResolver>,
    store: Arc<dyn CommentStore>,
    notifier: Arc<dyn RefbackNotifier>,
}

impl RefbackWorker {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn PostResolver>,
        store: Arc<dyn CommentStore>,
        notifier: Arc<dyn RefbackNotifier>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            store,
            notifier,
        }
    }

    /// Spawn the consumer loop. It runs until every sender is dropped or
    /// the shutdown channel fires, whichever comes first.
    pub fn spawn(
        self,
        signal_rx: mpsc::Receiver<RefbackSignal>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(signal_rx, shutdown))
    }

    async fn run(
        self,
        mut signal_rx: mpsc::Receiver<RefbackSignal>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Refback worker started");

        loop {
            tokio::select! {
                maybe_signal = signal_rx.recv() => {
                    match maybe_signal {
                        Some(signal) => self.handle(signal).await,
                        None => break, // all senders dropped
                    }
                }
                _ = shutdown.recv() => {
                    info!("Refback worker shutting down");
                    break;
                }
            }
        }

        info!("Refback worker stopped");
    }

    async fn handle(&self, signal: RefbackSignal) {
        let outcome = process_signal(
            self.fetcher.as_ref(),
            self.resolver.as_ref(),
            self.store.as_ref(),
            &signal,
        )
        .await;

        match outcome {
            Ok(RefbackOutcome::Created {
                comment_id,
                post_id,
            }) => {
                self.notifier.notify(RefbackEvent::CommentCreated {
                    comment_id,
                    post_id,
                });
            }
            Ok(RefbackOutcome::Updated {
                comment_id,
                post_id,
                visit_count,
            }) => {
                self.notifier.notify(RefbackEvent::CommentUpdated {
                    comment_id,
                    post_id,
                    visit_count,
                });
            }
            Err(e) => {
                // Store failures are the one loud abort; everything else is
                // routine rejection of unsolicited traffic.
                if matches!(e, RefbackError::StoreFailure(_)) {
                    error!(source_url = %signal.source_url, error = %e, "Refback store write failed");
                } else {
                    debug!(source_url = %signal.source_url, error = %e, "Refback signal aborted");
                }
                self.notifier.notify(RefbackEvent::SignalRejected {
                    source_url: signal.source_url,
                    target_url: signal.target_url,
                    reason: e.to_string(),
                });
            }
        }
    }
}
