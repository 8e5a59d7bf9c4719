//! The ingestion pipeline: scheduling, fetching, and the serialized worker.
//!
//! One worker task owns the [`ArticleStore`]. Every mutation (ingesting a
//! completed fetch, reprocessing after a configuration change) is a job
//! handled by that task, so at most one mutation is ever in flight. Fetches
//! themselves run as independent tasks and report back through the job
//! channel.
//!
//! ```text
//! timer tick / refresh_now / feed change
//!         │
//!         ▼
//!   spawn fetch per enabled feed ──► Job::FetchCompleted ──┐
//!                                                          ▼
//! settings change ──► reprocess ──────────────────► worker (owns ArticleStore)
//!                                                          │
//!                                                          ▼
//!                                              watch<Arc<Snapshot>>
//! ```

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::feed::{fetch_feed, parse_feed, FetchOptions, FetchResult};
use crate::settings::{Settings, SettingsChange, SettingsHandle};
use crate::store::{ArticleStore, Snapshot};

/// Shortest refresh period the timer accepts.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
/// Longest refresh period the timer accepts (one year).
const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Errors returned by [`PipelineHandle`] operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The worker has stopped and accepts no more jobs
    #[error("Pipeline worker is not running")]
    Closed,
    #[error("Pipeline worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Tuning for a [`Pipeline`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub fetch: FetchOptions,
    /// Run the repeating refresh timer. When false, fetch cycles only happen
    /// on [`PipelineHandle::refresh_now`] or a feed list change.
    pub scheduled: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            scheduled: true,
        }
    }
}

/// Totals for one fetch cycle, reported once every fetch of the cycle has
/// been ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Enabled feeds the cycle fetched.
    pub feeds: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Articles newly added to `all_articles`.
    pub inserted: usize,
}

#[derive(Debug)]
enum Job {
    FetchCompleted { result: FetchResult, cycle: u64 },
    Refresh { reply: Option<oneshot::Sender<CycleReport>> },
    Reprocess,
    Shutdown,
}

#[derive(Debug)]
struct PendingCycle {
    remaining: usize,
    report: CycleReport,
    reply: Option<oneshot::Sender<CycleReport>>,
}

/// A configured, not yet running pipeline.
#[derive(Debug)]
pub struct Pipeline {
    client: reqwest::Client,
    settings: SettingsHandle,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(client: reqwest::Client, settings: SettingsHandle, options: PipelineOptions) -> Self {
        Self {
            client,
            settings,
            options,
        }
    }

    /// Spawns the worker and begins the fetch/refresh loop.
    ///
    /// With scheduling enabled the first timer tick fires immediately, so the
    /// initial fetch of all enabled feeds starts right away.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> PipelineHandle {
        let store = ArticleStore::new();
        let snapshots = store.subscribe();
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports) = watch::channel(None);

        let mut settings_rx = self.settings.subscribe();
        let settings = settings_rx.borrow_and_update().clone();

        let worker = Worker {
            client: self.client,
            options: self.options,
            store,
            settings_rx,
            settings,
            jobs: jobs_tx.downgrade(),
            reports: reports_tx,
            cycles: HashMap::new(),
            next_cycle: 0,
        };
        let task = tokio::spawn(worker.run(jobs_rx));

        tracing::info!(scheduled = self.options.scheduled, "Pipeline started");

        PipelineHandle {
            jobs: jobs_tx,
            snapshots,
            reports,
            task,
        }
    }
}

/// Control and observation surface of a running pipeline.
///
/// Dropping the handle stops the worker once in-flight fetches have reported.
#[derive(Debug)]
pub struct PipelineHandle {
    jobs: mpsc::UnboundedSender<Job>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    reports: watch::Receiver<Option<CycleReport>>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    /// Receiver notified whenever a fetch cycle completes, scheduled or not.
    /// Holds `None` until the first cycle finishes.
    pub fn cycle_reports(&self) -> watch::Receiver<Option<CycleReport>> {
        self.reports.clone()
    }

    /// Starts an out-of-cycle fetch of all enabled feeds.
    pub fn refresh_now(&self) -> Result<(), PipelineError> {
        self.send(Job::Refresh { reply: None })
    }

    /// Starts a fetch cycle and waits until every fetch in it was ingested.
    pub async fn refresh_and_wait(&self) -> Result<CycleReport, PipelineError> {
        let (reply, rx) = oneshot::channel();
        self.send(Job::Refresh { reply: Some(reply) })?;
        rx.await.map_err(|_| PipelineError::Closed)
    }

    /// Re-matches stored articles against current settings.
    pub fn reprocess_now(&self) -> Result<(), PipelineError> {
        self.send(Job::Reprocess)
    }

    /// Stops the worker after the jobs queued before this call.
    ///
    /// In-flight fetches are not cancelled; their results are discarded.
    pub async fn shutdown(self) -> Result<(), PipelineError> {
        // Worker may already be gone; joining below reports how it ended
        let _ = self.jobs.send(Job::Shutdown);
        self.task
            .await
            .map_err(|e| PipelineError::WorkerPanicked(e.to_string()))
    }

    fn send(&self, job: Job) -> Result<(), PipelineError> {
        self.jobs.send(job).map_err(|_| PipelineError::Closed)
    }
}

struct Worker {
    client: reqwest::Client,
    options: PipelineOptions,
    store: ArticleStore,
    settings_rx: watch::Receiver<Settings>,
    /// Last settings value acted upon.
    settings: Settings,
    /// Weak so that the channel closes once the handle and every in-flight
    /// fetch have dropped their senders.
    jobs: mpsc::WeakUnboundedSender<Job>,
    reports: watch::Sender<Option<CycleReport>>,
    cycles: HashMap<u64, PendingCycle>,
    next_cycle: u64,
}

impl Worker {
    async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        let mut ticker = self
            .options
            .scheduled
            .then(|| schedule(self.settings.refresh_interval, true));
        let mut settings_open = true;

        loop {
            tokio::select! {
                job = jobs.recv() => {
                    let Some(job) = job else { break };
                    if self.handle(job).is_break() {
                        break;
                    }
                }

                changed = self.settings_rx.changed(), if settings_open => match changed {
                    Ok(()) => self.apply_settings(&mut ticker),
                    Err(_) => {
                        tracing::debug!("Settings handle dropped, configuration is now fixed");
                        settings_open = false;
                    }
                },

                _ = next_tick(&mut ticker) => self.start_cycle(None),
            }
        }

        tracing::info!(pending_cycles = self.cycles.len(), "Pipeline worker stopped");
    }

    fn handle(&mut self, job: Job) -> ControlFlow<()> {
        match job {
            Job::FetchCompleted { result, cycle } => self.ingest(result, cycle),
            Job::Refresh { reply } => self.start_cycle(reply),
            Job::Reprocess => self.reprocess(),
            Job::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn apply_settings(&mut self, ticker: &mut Option<Interval>) {
        let next = self.settings_rx.borrow_and_update().clone();
        let change = SettingsChange::between(&self.settings, &next);
        self.settings = next;

        if change.needs_reprocess() {
            self.reprocess();
        }
        if change.feeds {
            self.start_cycle(None);
        }
        if change.refresh_interval {
            if let Some(ticker) = ticker.as_mut() {
                *ticker = schedule(self.settings.refresh_interval, false);
                tracing::info!(
                    interval_secs = self.settings.refresh_interval.as_secs(),
                    "Refresh timer recreated"
                );
            }
        }
    }

    fn reprocess(&mut self) {
        let summary = self
            .store
            .reprocess(&self.settings.feeds, &self.settings.keywords);
        tracing::info!(
            kept = summary.kept,
            removed = summary.removed,
            matched = summary.matched,
            "Reprocessed articles"
        );
    }

    /// Spawns one fetch per enabled feed, unbounded in parallelism.
    fn start_cycle(&mut self, reply: Option<oneshot::Sender<CycleReport>>) {
        let Some(jobs) = self.jobs.upgrade() else {
            return;
        };
        let feeds: Vec<_> = self.settings.enabled_feeds().cloned().collect();

        let cycle = self.next_cycle;
        self.next_cycle += 1;

        if feeds.is_empty() {
            tracing::debug!(cycle, "No enabled feeds to fetch");
            self.finish_cycle(CycleReport::default(), reply);
            return;
        }

        tracing::info!(cycle, feeds = feeds.len(), "Starting fetch cycle");
        self.cycles.insert(
            cycle,
            PendingCycle {
                remaining: feeds.len(),
                report: CycleReport {
                    feeds: feeds.len(),
                    ..CycleReport::default()
                },
                reply,
            },
        );

        for feed in feeds {
            let client = self.client.clone();
            let options = self.options.fetch;
            let jobs = jobs.clone();

            tokio::spawn(async move {
                let result = fetch_feed(&client, &feed, &options).await;
                // Closed channel means the worker stopped; the result is discarded
                let _ = jobs.send(Job::FetchCompleted {
                    result: FetchResult { feed, result },
                    cycle,
                });
            });
        }
    }

    fn ingest(&mut self, fetched: FetchResult, cycle: u64) {
        let FetchResult { feed, result } = fetched;

        let inserted = match result {
            Ok(bytes) => {
                // Use the live configuration so mode changes made during the fetch apply
                let feed = self
                    .settings
                    .feeds
                    .iter()
                    .find(|f| f.id == feed.id)
                    .cloned()
                    .unwrap_or(feed);
                let parsed = parse_feed(&bytes, &feed.name);
                let summary = self
                    .store
                    .ingest(parsed.articles, &feed, &self.settings.keywords);
                Ok(summary.inserted)
            }
            Err(failure) => {
                tracing::warn!(
                    feed = %failure.feed,
                    url = %failure.url,
                    error = %failure.kind,
                    "Feed fetch failed"
                );
                Err(())
            }
        };

        self.complete_fetch(cycle, inserted);
    }

    fn complete_fetch(&mut self, cycle: u64, inserted: Result<usize, ()>) {
        let Some(pending) = self.cycles.get_mut(&cycle) else {
            return;
        };
        match inserted {
            Ok(count) => {
                pending.report.succeeded += 1;
                pending.report.inserted += count;
            }
            Err(()) => pending.report.failed += 1,
        }
        pending.remaining = pending.remaining.saturating_sub(1);

        if pending.remaining == 0 {
            if let Some(done) = self.cycles.remove(&cycle) {
                tracing::info!(
                    cycle,
                    feeds = done.report.feeds,
                    succeeded = done.report.succeeded,
                    failed = done.report.failed,
                    inserted = done.report.inserted,
                    "Fetch cycle complete"
                );
                self.finish_cycle(done.report, done.reply);
            }
        }
    }

    fn finish_cycle(&self, report: CycleReport, reply: Option<oneshot::Sender<CycleReport>>) {
        self.reports.send_replace(Some(report));
        if let Some(reply) = reply {
            let _ = reply.send(report);
        }
    }
}

/// Builds the refresh timer. `immediate` makes the first tick fire now;
/// otherwise it fires one full period from now. The period is clamped to
/// `MIN_REFRESH_INTERVAL..=MAX_REFRESH_INTERVAL`.
fn schedule(period: Duration, immediate: bool) -> Interval {
    let period = period.clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL);
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
