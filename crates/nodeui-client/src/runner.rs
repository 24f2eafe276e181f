//! Executes dashboard tasks in the background.
//!
//! Each [`Task`] runs on its own tokio task and reports back only by sending
//! [`Event`]s on a bounded channel. Dropping out of the event loop cancels
//! everything through the shared [`CancellationToken`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use nodeui_core::{BlockFetch, CatchupAction, Event, FeedError, FetchSource, Round, Task};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::TelemetrySource;
use crate::codec::BlockCodec;
use crate::error::ClientError;

/// Capacity of the channel carrying task results to the event loop.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Spawns tasks against a telemetry source.
#[derive(Clone)]
pub struct TaskRunner {
    source: Arc<dyn TelemetrySource>,
    codec: Arc<dyn BlockCodec>,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
}

impl TaskRunner {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        codec: Arc<dyn BlockCodec>,
        events: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            source,
            codec,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelled by [`TaskRunner::shutdown`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every running and future task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn spawn_all(&self, tasks: impl IntoIterator<Item = Task>) {
        for task in tasks {
            self.spawn(task);
        }
    }

    pub fn spawn(&self, task: Task) {
        if self.cancel.is_cancelled() {
            return;
        }
        let runner = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = runner.cancel.cancelled() => {}
                _ = runner.run(task) => {}
            }
        });
    }

    async fn post(&self, event: Event) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("Event loop gone, dropping task result");
        }
    }

    /// Run one task to completion, posting its events.
    pub async fn run(&self, task: Task) {
        match task {
            Task::FetchNetwork => self.fetch_network().await,
            Task::PollStatus { after, delay } => self.poll_status(after, delay).await,
            Task::Backfill { latest, count } => self.backfill(latest, count).await,
            Task::TailBlock { round, delay } => self.tail_block(round, delay).await,
            Task::FetchBalances { addresses, delay } => {
                self.fetch_balances(addresses, delay).await
            }
            Task::Catchup { action, network } => self.catchup(action, network).await,
        }
    }

    async fn fetch_network(&self) {
        let event = match self.source.versions().await {
            Ok(info) => Event::NetworkFetched(info),
            Err(e) => Event::NetworkFailed {
                message: e.to_string(),
            },
        };
        self.post(event).await;
    }

    async fn poll_status(&self, after: Option<Round>, delay: Duration) {
        sleep(delay).await;
        let result = match after {
            Some(round) => match self.source.status_after_round(round).await {
                Err(e) if e.is_timeout() => {
                    tracing::debug!("No round after {} before timeout, reading plain status", round);
                    self.source.status().await
                }
                other => other,
            },
            None => self.source.status().await,
        };
        let event = match result {
            Ok(snapshot) => Event::StatusFetched {
                snapshot,
                observed_at: Instant::now(),
            },
            Err(e) => Event::StatusFailed {
                message: e.to_string(),
            },
        };
        self.post(event).await;
    }

    async fn fetch_block(&self, round: Round) -> BlockFetch {
        let bytes = self
            .source
            .block_raw(round, self.codec.format())
            .await
            .map_err(|e| FeedError::transient(FetchSource::Block, format!("round {}: {}", round, e)))?;
        self.codec.decode(round, &bytes).map_err(|e| {
            tracing::warn!("Failed to decode block {}: {}", round, e);
            FeedError::Decode {
                round,
                message: e.to_string(),
            }
        })
    }

    async fn backfill(&self, latest: Round, count: usize) {
        let oldest = latest.saturating_sub(count.saturating_sub(1) as u64);
        tracing::info!("Backfilling rounds {}..={}", oldest, latest);

        // One request at a time, newest first.
        let mut results: Vec<(Round, BlockFetch)> = Vec::with_capacity(count);
        for round in (oldest..=latest).rev() {
            results.push((round, self.fetch_block(round).await));
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            tracing::warn!("Backfill: {} of {} rounds failed", failed, results.len());
        }
        self.post(Event::BackfillFinished { latest, results }).await;
    }

    /// Wait until `round` exists, then fetch it.
    async fn tail_block(&self, round: Round, delay: Duration) {
        sleep(delay).await;
        let result = match self.wait_for_round(round).await {
            Ok(()) => self.fetch_block(round).await,
            Err(e) => Err(e),
        };
        if result.is_ok() {
            tracing::debug!("Tailed block {}", round);
        }
        self.post(Event::BlockTailed { round, result }).await;
    }

    async fn wait_for_round(&self, round: Round) -> Result<(), FeedError> {
        let after = round.saturating_sub(1);
        loop {
            let status = match self.source.status_after_round(after).await {
                Ok(status) => status,
                Err(e) if e.is_timeout() => continue,
                Err(e) => {
                    return Err(FeedError::transient(
                        FetchSource::Block,
                        format!("waiting for {}: {}", round, e),
                    ));
                }
            };
            if status.last_round >= round {
                return Ok(());
            }
            if status.catchpoint_active() {
                sleep(Duration::from_secs(1)).await;
            }
        }
    }

    async fn fetch_balances(&self, addresses: Vec<String>, delay: Duration) {
        sleep(delay).await;
        let fetches = addresses.iter().map(|address| async move {
            let event = match self.source.account_info(address).await {
                Ok(balances) => Event::BalanceFetched {
                    address: address.clone(),
                    balances,
                    fetched_at: Utc::now(),
                },
                Err(e) => {
                    tracing::warn!("Failed to fetch balance for {}: {}", address, e);
                    Event::BalanceFailed {
                        address: address.clone(),
                        message: e.to_string(),
                    }
                }
            };
            self.post(event).await;
        });
        futures::future::join_all(fetches).await;
        self.post(Event::BalanceCycleFinished).await;
    }

    async fn catchup(&self, action: CatchupAction, network: String) {
        let result: Result<String, ClientError> = async {
            let catchpoint = self.source.latest_catchpoint(&network).await?;
            tracing::info!("Fast catchup {} with catchpoint {}", action.label(), catchpoint);
            match action {
                CatchupAction::Start => self.source.start_catchup(&catchpoint).await,
                CatchupAction::Stop => self.source.stop_catchup(&catchpoint).await,
            }
        }
        .await;
        let result = result.map_err(|e| e.to_string());

        if let Err(e) = &result {
            tracing::warn!("Fast catchup {} failed: {}", action.label(), e);
        }
        self.post(Event::CatchupFinished { action, result }).await;
    }
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
