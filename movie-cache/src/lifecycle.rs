use crate::analytics::genre_stats;
use crate::catalog::{CacheSearchOptions, MovieCatalog};
use crate::error::CatalogError;
use crate::store::RecordStore;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum_macros::Display;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

/// Every day at 02:00 UTC.
pub const DAILY_SWEEP_SCHEDULE: &str = "0 0 2 * * *";
/// Every six hours on the hour.
pub const STATISTICS_SCHEDULE: &str = "0 0 */6 * * *";

pub const RECENTLY_ADDED_HOURS: i64 = 24;
pub const STALE_UNUSED_DAYS: i64 = 7;
pub const COLD_AFTER_DAYS: i64 = 30;
pub const COLD_MAX_SEARCH_COUNT: u32 = 1;
const TOP_ENTRIES: usize = 10;

pub const MIN_HEALTHY_EFFICIENCY: f64 = 70.0;
pub const MAX_EXPIRED_SHARE_OF_ACTIVE: f64 = 0.3;
pub const MAX_STALE_SHARE_OF_TOTAL: f64 = 0.2;

pub const PRELOAD_TERMS: &[&str] = &[
    "batman",
    "spider-man",
    "avengers",
    "star wars",
    "harry potter",
    "lord of the rings",
    "marvel",
    "disney",
    "pixar",
    "james bond",
];
pub const PRELOAD_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid cron schedule '{0}': {1}")]
    Schedule(&'static str, cron::error::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Whether this instance runs the scheduled jobs. On-demand operations work either way.
    pub owns_schedules: bool,
    pub initial_sweep_delay: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            owns_schedules: true,
            initial_sweep_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LifecycleState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct SearchedMovie {
    pub external_id: String,
    pub title: String,
    pub total_search_count: u32,
    pub last_searched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct GenreCount {
    pub genre: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CacheStatistics {
    pub total: u32,
    pub active: u32,
    pub expired: u32,
    /// Fetched within the last 24 hours.
    pub recently_added: u32,
    /// Last fetched at least 7 days ago.
    pub stale_unused: u32,
    pub top_searched: Vec<SearchedMovie>,
    /// Over fresh records.
    pub genre_distribution: Vec<GenreCount>,
    /// Share of active records in percent, 0 when empty.
    pub cache_efficiency: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct OptimizeReport {
    pub expired_removed: u32,
    pub stale_unused_removed: u32,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Healthy,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct HealthIssue {
    pub issue: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct HealthReport {
    pub status: HealthStatus,
    pub issues: Vec<HealthIssue>,
    pub message: Option<String>,
    pub statistics: CacheStatistics,
}

/// Grades statistics against the fixed thresholds.
pub fn classify(stats: &CacheStatistics) -> (HealthStatus, Vec<HealthIssue>) {
    let mut status = HealthStatus::Healthy;
    let mut issues = vec![];

    if stats.cache_efficiency < MIN_HEALTHY_EFFICIENCY {
        status = HealthStatus::Warning;
        issues.push(HealthIssue {
            issue: format!("Low cache efficiency: {:.2}%", stats.cache_efficiency),
            recommendation: "Run cache cleanup to improve efficiency".to_string(),
        });
    }
    if f64::from(stats.expired) > f64::from(stats.active) * MAX_EXPIRED_SHARE_OF_ACTIVE {
        status = HealthStatus::Warning;
        issues.push(HealthIssue {
            issue: format!("High number of expired entries: {}", stats.expired),
            recommendation: "Schedule more frequent cache cleanups".to_string(),
        });
    }
    // Reported, but does not downgrade the status.
    if f64::from(stats.stale_unused) > f64::from(stats.total) * MAX_STALE_SHARE_OF_TOTAL {
        issues.push(HealthIssue {
            issue: format!("Many old unused entries: {}", stats.stale_unused),
            recommendation: "Consider removing old unused movie data".to_string(),
        });
    }

    if issues.is_empty() {
        status = HealthStatus::Excellent;
    }
    (status, issues)
}

struct RunningTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Expiry sweeps, eviction, statistics and the schedules that run them.
#[derive(Clone)]
pub struct CacheManager {
    catalog: MovieCatalog,
    config: LifecycleConfig,
    daily_sweep: Schedule,
    statistics_log: Schedule,
    running: Arc<Mutex<Option<RunningTasks>>>,
}

impl CacheManager {
    pub fn new(catalog: MovieCatalog, config: LifecycleConfig) -> Result<Self, LifecycleError> {
        let parse = |expr: &'static str| {
            Schedule::from_str(expr).map_err(|e| LifecycleError::Schedule(expr, e))
        };
        Ok(Self {
            catalog,
            config,
            daily_sweep: parse(DAILY_SWEEP_SCHEDULE)?,
            statistics_log: parse(STATISTICS_SCHEDULE)?,
            running: Arc::new(Mutex::new(None)),
        })
    }

    fn store(&self) -> &Arc<dyn RecordStore> {
        self.catalog.store()
    }

    pub async fn state(&self) -> LifecycleState {
        if self.running.lock().await.is_some() {
            LifecycleState::Running
        } else {
            LifecycleState::Stopped
        }
    }

    /// Spawns the scheduled jobs. No-op when already running or when this
    /// instance does not own the schedules.
    pub async fn start(&self) -> LifecycleState {
        let mut running = self.running.lock().await;
        if running.is_some() {
            log::debug!("Cache lifecycle already running");
            return LifecycleState::Running;
        }
        if !self.config.owns_schedules {
            log::info!("Cache lifecycle schedules are owned elsewhere, not starting them");
            return LifecycleState::Stopped;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);

        let manager = self.clone();
        let daily = tokio::spawn(run_on_schedule(
            "daily sweep",
            self.daily_sweep.clone(),
            shutdown_rx.clone(),
            move || {
                let manager = manager.clone();
                async move { manager.scheduled_sweep().await }
            },
        ));

        let manager = self.clone();
        let statistics = tokio::spawn(run_on_schedule(
            "statistics log",
            self.statistics_log.clone(),
            shutdown_rx.clone(),
            move || {
                let manager = manager.clone();
                async move { manager.log_statistics().await }
            },
        ));

        let manager = self.clone();
        let mut initial_shutdown = shutdown_rx;
        let initial = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(manager.config.initial_sweep_delay) => {
                    manager.initial_sweep().await
                }
                _ = initial_shutdown.changed() => {}
            }
        });

        *running = Some(RunningTasks {
            shutdown,
            handles: vec![daily, statistics, initial],
        });
        log::info!("Cache lifecycle started");
        LifecycleState::Running
    }

    pub async fn stop(&self) -> LifecycleState {
        if let Some(tasks) = self.running.lock().await.take() {
            let _ = tasks.shutdown.send(true);
            for handle in tasks.handles {
                handle.abort();
            }
            log::info!("Cache lifecycle stopped");
        }
        LifecycleState::Stopped
    }

    async fn initial_sweep(&self) {
        let stats = match self.compute_statistics().await {
            Ok(stats) => stats,
            Err(e) => {
                log::warn!("Initial cache sweep failed: {}", e);
                return;
            }
        };
        log::info!(
            "Cache status: {} active, {} expired movies",
            stats.active,
            stats.expired
        );
        if stats.expired > 0 {
            match self.sweep_expired().await {
                Ok(count) => log::info!("Cleaned up {} expired entries on startup", count),
                Err(e) => log::warn!("Initial cache sweep failed: {}", e),
            }
        }
    }

    async fn scheduled_sweep(&self) {
        let started = Instant::now();
        match self.sweep_expired().await {
            Ok(count) => log::info!(
                "Scheduled sweep deleted {} entries in {}ms",
                count,
                started.elapsed().as_millis()
            ),
            Err(e) => {
                log::warn!("Scheduled cache sweep failed: {}", e);
                return;
            }
        }
        self.log_statistics().await;
    }

    /// Deletes every expired record.
    pub async fn sweep_expired(&self) -> Result<usize, CatalogError> {
        let count = self.store().delete_expired(Utc::now()).await?;
        log::debug!("Swept {} expired records", count);
        Ok(count)
    }

    pub async fn compute_statistics(&self) -> Result<CacheStatistics, CatalogError> {
        let now = Utc::now();
        let mut records = self.store().all().await?;

        let total = records.len() as u32;
        let (fresh, expired): (Vec<_>, Vec<_>) =
            records.iter().cloned().partition(|r| r.is_fresh(now));
        let recent_cutoff = now - TimeDelta::hours(RECENTLY_ADDED_HOURS);
        let stale_cutoff = now - TimeDelta::days(STALE_UNUSED_DAYS);

        let genre_distribution = genre_stats(&fresh)
            .into_iter()
            .take(TOP_ENTRIES)
            .map(|stat| GenreCount {
                genre: stat.genre,
                count: stat.count,
            })
            .collect();

        let recently_added = records
            .iter()
            .filter(|r| r.last_fetched_at >= recent_cutoff)
            .count() as u32;
        let stale_unused = records
            .iter()
            .filter(|r| r.last_fetched_at <= stale_cutoff)
            .count() as u32;

        records.sort_by(|a, b| b.total_search_count.cmp(&a.total_search_count));
        let top_searched = records
            .into_iter()
            .take(TOP_ENTRIES)
            .map(|r| SearchedMovie {
                external_id: r.external_id,
                title: r.title,
                total_search_count: r.total_search_count,
                last_searched_at: r.last_searched_at,
            })
            .collect();

        let active = fresh.len() as u32;
        let cache_efficiency = if total > 0 {
            (f64::from(active) / f64::from(total) * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(CacheStatistics {
            total,
            active,
            expired: expired.len() as u32,
            recently_added,
            stale_unused,
            top_searched,
            genre_distribution,
            cache_efficiency,
            generated_at: now,
        })
    }

    /// Sweeps expired records, then evicts cold ones regardless of freshness.
    pub async fn optimize(&self) -> Result<OptimizeReport, CatalogError> {
        let started = Instant::now();
        let expired_removed = self.sweep_expired().await?;
        let cutoff = Utc::now() - TimeDelta::days(COLD_AFTER_DAYS);
        let stale_unused_removed = self.store().delete_cold(cutoff, COLD_MAX_SEARCH_COUNT).await?;

        let report = OptimizeReport {
            expired_removed: expired_removed as u32,
            stale_unused_removed: stale_unused_removed as u32,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log::info!(
            "Cache optimized in {}ms: {} expired, {} old unused entries removed",
            report.duration_ms,
            report.expired_removed,
            report.stale_unused_removed
        );
        Ok(report)
    }

    pub async fn health_report(&self) -> Result<HealthReport, CatalogError> {
        let statistics = self.compute_statistics().await?;
        let (status, issues) = classify(&statistics);
        Ok(HealthReport {
            status,
            message: (status == HealthStatus::Excellent)
                .then(|| "Cache is operating optimally".to_string()),
            issues,
            statistics,
        })
    }

    pub async fn log_statistics(&self) {
        match self.compute_statistics().await {
            Ok(stats) => {
                let top_genres: Vec<_> = stats
                    .genre_distribution
                    .iter()
                    .take(3)
                    .map(|g| format!("{} ({})", g.genre, g.count))
                    .collect();
                log::info!(
                    "Cache statistics: {} total, {} active, {} expired, {:.2}% efficiency, {} added in 24h, top genres: {}",
                    stats.total,
                    stats.active,
                    stats.expired,
                    stats.cache_efficiency,
                    stats.recently_added,
                    top_genres.join(", ")
                );
            }
            Err(e) => log::warn!("Failed to compute cache statistics: {}", e),
        }
    }

    /// Warms the cache for [`PRELOAD_TERMS`], one term at a time. Returns how many succeeded.
    pub async fn preload_popular(&self) -> usize {
        self.preload(PRELOAD_TERMS, PRELOAD_PAUSE).await
    }

    /// Warms the cache for `terms` with the same pacing as [`Self::preload_popular`].
    pub async fn preload_terms<S: AsRef<str> + Sync>(&self, terms: &[S]) -> usize {
        self.preload(terms, PRELOAD_PAUSE).await
    }

    pub(crate) async fn preload<S: AsRef<str> + Sync>(
        &self,
        terms: &[S],
        pause: Duration,
    ) -> usize {
        let mut loaded = 0;
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(pause).await;
            }
            match self
                .catalog
                .search_and_cache(term.as_ref(), &CacheSearchOptions::default())
                .await
            {
                Ok(result) => {
                    log::info!(
                        "Preloaded '{}' ({} movies from {})",
                        term.as_ref(),
                        result.items.len(),
                        result.source
                    );
                    loaded += 1;
                }
                Err(e) => log::warn!("Failed to preload '{}': {}", term.as_ref(), e),
            }
        }
        loaded
    }
}

async fn run_on_schedule<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    mut shutdown: watch::Receiver<bool>,
    job: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            log::warn!("No upcoming run for {}, stopping it", name);
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        log::debug!("Next {} at {}", name, next);

        tokio::select! {
            _ = tokio::time::sleep(wait) => job().await,
            _ = shutdown.changed() => {
                log::debug!("{} received shutdown signal", name);
                break;
            }
        }
    }
}
