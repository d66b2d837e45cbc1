//! Refresh orchestration.
//!
//! A refresh cycle walks the hero list and repopulates every hero's skin
//! cache. At most one cycle runs at a time; the claim on the cycle is taken
//! and checked under a single lock, and released by a guard so a failed or
//! panicking cycle never leaves the orchestrator stuck in "refreshing".

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::extract::Extractor;

/// Default period between scheduled refreshes (12 hours).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Shortest period the scheduler accepts.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Progress through the hero list of the running cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshProgress {
    pub current: usize,
    pub total: usize,
}

/// Snapshot of the orchestrator state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub is_refreshing: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub progress: RefreshProgress,
    pub next_scheduled_refresh: Option<DateTime<Utc>>,
}

/// Result of a synchronous refresh call.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Another cycle was running; nothing was done.
    Busy(RefreshStatus),
    /// The cycle reached the end of the hero list.
    Completed { processed: usize, failed: usize },
    /// The hero list could not be obtained.
    Aborted(String),
}

/// Result of a background trigger.
#[derive(Debug)]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning(RefreshStatus),
}

type SharedStatus = Arc<Mutex<RefreshStatus>>;

fn lock(state: &SharedStatus) -> MutexGuard<'_, RefreshStatus> {
    // State is plain data; a poisoned lock still holds a usable value
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Exclusive right to run a refresh cycle.
///
/// Dropping the claim clears `is_refreshing` and resets progress. If the
/// cycle was marked complete, `last_refresh` is stamped too.
pub struct RefreshClaim {
    state: SharedStatus,
    completed: bool,
}

impl RefreshClaim {
    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for RefreshClaim {
    fn drop(&mut self) {
        let mut status = lock(&self.state);
        status.is_refreshing = false;
        status.progress = RefreshProgress::default();
        if self.completed {
            status.last_refresh = Some(Utc::now());
        }
    }
}

/// Drives refresh cycles over an [`Extractor`].
pub struct RefreshOrchestrator {
    extractor: Extractor,
    state: SharedStatus,
    interval: Duration,
}

impl RefreshOrchestrator {
    pub fn new(extractor: Extractor, interval: Duration) -> Self {
        Self {
            extractor,
            state: Arc::new(Mutex::new(RefreshStatus::default())),
            interval: interval.max(MIN_REFRESH_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current state.
    pub fn status(&self) -> RefreshStatus {
        lock(&self.state).clone()
    }

    /// Claim the refresh slot, or `None` if a cycle is already running.
    pub fn try_claim(&self) -> Option<RefreshClaim> {
        let mut status = lock(&self.state);
        if status.is_refreshing {
            return None;
        }
        status.is_refreshing = true;
        status.progress = RefreshProgress::default();
        Some(RefreshClaim {
            state: Arc::clone(&self.state),
            completed: false,
        })
    }

    /// Run one refresh cycle to completion, unless one is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        match self.try_claim() {
            Some(claim) => self.run(claim).await,
            None => {
                debug!("Refresh requested while another is running");
                RefreshOutcome::Busy(self.status())
            }
        }
    }

    /// Start a cycle in the background.
    ///
    /// The claim is taken before this returns, so a second trigger right
    /// after always reports `AlreadyRunning`.
    pub fn trigger(self: &Arc<Self>) -> TriggerOutcome {
        let Some(claim) = self.try_claim() else {
            return TriggerOutcome::AlreadyRunning(self.status());
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run(claim).await;
        });
        TriggerOutcome::Started
    }

    /// Start the periodic scheduler. The first scheduled cycle runs one
    /// interval from now.
    pub fn spawn_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let period = self.interval;
        self.schedule_next(period);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                this.schedule_next(period);
                info!("Running scheduled cache refresh");
                match this.refresh().await {
                    RefreshOutcome::Busy(_) => {
                        info!("Skipping scheduled refresh, one is already running")
                    }
                    RefreshOutcome::Aborted(e) => warn!("Scheduled refresh aborted: {}", e),
                    RefreshOutcome::Completed { .. } => {}
                }
            }
        })
    }

    fn schedule_next(&self, period: Duration) {
        let next = chrono::Duration::from_std(period)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        lock(&self.state).next_scheduled_refresh = next;
    }

    fn update_progress(&self, f: impl FnOnce(&mut RefreshProgress)) {
        f(&mut lock(&self.state).progress);
    }

    async fn run(&self, mut claim: RefreshClaim) -> RefreshOutcome {
        info!("Starting cache refresh");

        let mut heroes = match self.extractor.get_heroes().await {
            Ok(heroes) => heroes,
            Err(e) => {
                error!("Cache refresh aborted, could not load heroes: {}", e);
                return RefreshOutcome::Aborted(e.to_string());
            }
        };
        self.update_progress(|p| p.total = heroes.len());

        let mut processed = 0;
        let mut failed = 0;
        for hero in heroes.iter_mut() {
            match self.extractor.get_hero_skins(hero).await {
                Ok(skins) => {
                    debug!("{}: {} skins cached", hero.name, skins.len());
                    processed += 1;
                }
                Err(e) => {
                    warn!("Failed to refresh skins for {}: {}", hero.name, e);
                    failed += 1;
                }
            }
            self.update_progress(|p| p.current += 1);
        }

        claim.complete();
        info!(
            "Cache refresh complete: {} heroes refreshed, {} failed",
            processed, failed
        );
        RefreshOutcome::Completed { processed, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::extract::fixtures::*;
    use crate::scrapers::testing::MockFetcher;
    use tempfile::tempdir;

    fn orchestrator(fetcher: Arc<MockFetcher>, dir: &std::path::Path) -> Arc<RefreshOrchestrator> {
        let extractor = Extractor::new(fetcher, TtlCache::new(dir), BASE).unwrap();
        Arc::new(RefreshOrchestrator::new(extractor, DEFAULT_REFRESH_INTERVAL))
    }

    #[tokio::test]
    async fn test_refresh_populates_cache() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(Arc::new(groot_and_iron_man()), dir.path());

        let outcome = orch.refresh().await;
        assert!(matches!(
            outcome,
            RefreshOutcome::Completed {
                processed: 2,
                failed: 0
            }
        ));

        assert!(dir.path().join("heroes.json").exists());
        assert!(dir.path().join("skins_Groot.json").exists());
        assert!(dir.path().join("skins_Iron_Man.json").exists());

        let status = orch.status();
        assert!(!status.is_refreshing);
        assert!(status.last_refresh.is_some());
        assert_eq!(status.progress, RefreshProgress::default());
    }

    #[tokio::test]
    async fn test_hero_failure_does_not_stop_cycle() {
        let dir = tempdir().unwrap();
        let fetcher = groot_and_iron_man().with_page(
            &url("Heroes"),
            &roster(&[
                ("Broken", "Broken"),
                ("Groot", "Groot"),
                ("Iron Man", "Iron_Man"),
            ]),
        );
        let orch = orchestrator(Arc::new(fetcher), dir.path());

        let outcome = orch.refresh().await;
        assert!(matches!(
            outcome,
            RefreshOutcome::Completed {
                processed: 2,
                failed: 1
            }
        ));
        assert!(!dir.path().join("skins_Broken.json").exists());
        assert!(dir.path().join("skins_Iron_Man.json").exists());
        assert!(orch.status().last_refresh.is_some());
    }

    #[tokio::test]
    async fn test_heroes_failure_aborts_cycle() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(Arc::new(MockFetcher::new()), dir.path());

        let outcome = orch.refresh().await;
        assert!(matches!(outcome, RefreshOutcome::Aborted(_)));

        let status = orch.status();
        assert!(!status.is_refreshing);
        assert!(status.last_refresh.is_none());
    }

    #[tokio::test]
    async fn test_refresh_while_busy_does_no_work() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(groot_and_iron_man());
        let orch = orchestrator(fetcher.clone(), dir.path());

        let claim = orch.try_claim().unwrap();
        assert!(orch.try_claim().is_none());

        let outcome = orch.refresh().await;
        match outcome {
            RefreshOutcome::Busy(status) => assert!(status.is_refreshing),
            other => panic!("expected Busy, got {:?}", other),
        }
        assert_eq!(fetcher.fetch_count(), 0);

        drop(claim);
        assert!(!orch.status().is_refreshing);
        assert!(orch.status().last_refresh.is_none());
    }

    #[tokio::test]
    async fn test_trigger_is_single_flight() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(Arc::new(groot_and_iron_man()), dir.path());

        assert!(matches!(orch.trigger(), TriggerOutcome::Started));
        assert!(matches!(orch.trigger(), TriggerOutcome::AlreadyRunning(_)));

        let deadline = Instant::now() + Duration::from_secs(5);
        while orch.status().is_refreshing {
            assert!(Instant::now() < deadline, "refresh did not finish");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(orch.status().last_refresh.is_some());
        assert!(matches!(orch.trigger(), TriggerOutcome::Started));
    }

    #[tokio::test]
    async fn test_scheduler_sets_next_refresh() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(Arc::new(MockFetcher::new()), dir.path());
        assert!(orch.status().next_scheduled_refresh.is_none());

        let handle = orch.spawn_scheduler();
        let next = orch.status().next_scheduled_refresh.unwrap();
        assert!(next > Utc::now() + chrono::Duration::hours(11));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_refresh_each_interval() {
        let dir = tempdir().unwrap();
        let fetcher = Arc::new(groot_and_iron_man());
        let orch = orchestrator(fetcher.clone(), dir.path());

        let handle = orch.spawn_scheduler();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.fetch_count(), 0, "nothing runs before the first interval");
        assert!(orch.status().last_refresh.is_none());

        tokio::time::advance(DEFAULT_REFRESH_INTERVAL).await;
        for _ in 0..500 {
            if orch.status().last_refresh.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let status = orch.status();
        assert!(status.last_refresh.is_some());
        assert!(!status.is_refreshing);
        assert!(fetcher.fetch_count() > 0);
        assert!(dir.path().join("skins_Groot.json").exists());
        handle.abort();
    }

    #[test]
    fn test_status_serializes() {
        let json = serde_json::to_value(RefreshStatus::default()).unwrap();
        assert_eq!(json["is_refreshing"], false);
        assert!(json["last_refresh"].is_null());
        assert_eq!(json["progress"]["current"], 0);
        assert_eq!(json["progress"]["total"], 0);
    }
}
