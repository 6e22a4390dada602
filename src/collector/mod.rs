//! Collector scheduler: periodic fan-out across (pair, source).
//!
//! One tick fetches every configured pair from every enabled source
//! concurrently, bounded by a semaphore, with per-request timeout and
//! bounded exponential-backoff retry. A request failure never aborts its
//! siblings; a failed tick is indistinguishable from a skipped one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::Instrument;

use crate::config::CollectorConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::observability::tracing::trace_collect_tick;
use crate::sources::PriceSource;
use crate::store::ObservationStore;
use crate::types::Pair;
use crate::utils::helper::current_timestamp_ms;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectorStats {
    pub ticks_completed: u64,
    pub requests_succeeded: u64,
    pub requests_failed: u64,
    pub observations_stored: u64,
    pub per_source: HashMap<String, SourceStats>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    pub succeeded: u64,
    pub failed: u64,
    pub success_ratio: f64,
    pub consecutive_failures: u64,
    pub healthy: bool,
}

/// Consecutive failed attempts before a source is reported unhealthy.
const UNHEALTHY_AFTER: u64 = 3;

#[derive(Default)]
struct Counters {
    ticks_completed: AtomicU64,
    requests_succeeded: AtomicU64,
    requests_failed: AtomicU64,
    observations_stored: AtomicU64,
}

#[derive(Default)]
struct SourceCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    consecutive_failures: AtomicU64,
}

struct Shared {
    store: Arc<ObservationStore>,
    sources: Vec<Arc<dyn PriceSource>>,
    config: CollectorConfig,
    semaphore: Arc<Semaphore>,
    counters: Counters,
    per_source: HashMap<String, SourceCounters>,
}

struct RunState {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Collector {
    shared: Arc<Shared>,
    run_state: Mutex<Option<RunState>>,
}

impl Collector {
    pub fn new(
        store: Arc<ObservationStore>,
        sources: Vec<Arc<dyn PriceSource>>,
        config: CollectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let per_source = sources
            .iter()
            .map(|s| (s.id().to_string(), SourceCounters::default()))
            .collect();
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests));
        Ok(Collector {
            shared: Arc::new(Shared {
                store,
                sources,
                config,
                semaphore,
                counters: Counters::default(),
                per_source,
            }),
            run_state: Mutex::new(None),
        })
    }

    /// Spawn the tick loop. Fails if already running.
    pub fn start(&self) -> Result<()> {
        let mut state = self.run_state.lock().expect("collector lock poisoned");
        if state.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = self.shared.clone();
        let handle = tokio::spawn(run_loop(shared, shutdown_rx));

        *state = Some(RunState {
            shutdown_tx,
            handle,
        });
        metrics::set_collector_running(true);
        tracing::info!(
            pairs = self.shared.config.pairs.len(),
            sources = self.shared.sources.len(),
            interval_ms = self.shared.config.collect_interval_ms,
            "Collector started"
        );
        Ok(())
    }

    /// Signal shutdown, cancel in-flight work (including backoff sleeps),
    /// and wait for the tick loop to finish.
    pub async fn stop(&self) -> Result<()> {
        let state = {
            let mut state = self.run_state.lock().expect("collector lock poisoned");
            state.take().ok_or(Error::NotRunning)?
        };
        let _ = state.shutdown_tx.send(true);
        let _ = state.handle.await;
        metrics::set_collector_running(false);
        tracing::info!("Collector stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run_state
            .lock()
            .expect("collector lock poisoned")
            .is_some()
    }

    /// Run a single tick to completion without the interval loop.
    pub async fn collect_once(&self) {
        let (_tx, rx) = watch::channel(false);
        collect_tick(&self.shared, rx).await;
        finish_tick(&self.shared);
    }

    pub fn stats(&self) -> CollectorStats {
        let c = &self.shared.counters;
        let per_source = self
            .shared
            .per_source
            .iter()
            .map(|(id, sc)| {
                let succeeded = sc.succeeded.load(Ordering::Relaxed);
                let failed = sc.failed.load(Ordering::Relaxed);
                let consecutive_failures = sc.consecutive_failures.load(Ordering::Relaxed);
                let total = succeeded + failed;
                let success_ratio = if total == 0 {
                    0.0
                } else {
                    succeeded as f64 / total as f64
                };
                (
                    id.clone(),
                    SourceStats {
                        succeeded,
                        failed,
                        success_ratio,
                        consecutive_failures,
                        healthy: consecutive_failures < UNHEALTHY_AFTER,
                    },
                )
            })
            .collect();
        CollectorStats {
            ticks_completed: c.ticks_completed.load(Ordering::Relaxed),
            requests_succeeded: c.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: c.requests_failed.load(Ordering::Relaxed),
            observations_stored: c.observations_stored.load(Ordering::Relaxed),
            per_source,
        }
    }
}

async fn run_loop(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_millis(shared.config.collect_interval_ms));
    // A tick that overruns the interval delays the next one; ticks never
    // overlap and never burst to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick_no: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        tick_no += 1;
        let started = Instant::now();

        collect_tick(&shared, shutdown.clone())
            .instrument(trace_collect_tick(tick_no))
            .await;
        if *shutdown.borrow() {
            break;
        }

        finish_tick(&shared);
        metrics::record_tick(
            started.elapsed().as_secs_f64(),
            current_timestamp_ms() as f64 / 1_000.0,
        );
        warn_on_stale_pairs(&shared);
    }
}

async fn collect_tick(shared: &Arc<Shared>, shutdown: watch::Receiver<bool>) {
    let mut requests = Vec::with_capacity(shared.config.pairs.len() * shared.sources.len());
    for pair in &shared.config.pairs {
        for source in &shared.sources {
            requests.push(collect_one(
                shared.clone(),
                Pair::new(pair.clone()),
                source.clone(),
                shutdown.clone(),
            ));
        }
    }
    join_all(requests).await;
}

/// One (pair, source) request with retry. Fetch completes before any store
/// lock is taken; no lock is ever held across I/O.
async fn collect_one(
    shared: Arc<Shared>,
    pair: Pair,
    source: Arc<dyn PriceSource>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Ok(_permit) = shared.semaphore.acquire().await else {
        return;
    };
    let request_timeout = Duration::from_millis(shared.config.request_timeout_ms);
    let attempts = shared.config.retry_attempts.max(1);

    for attempt in 0..attempts {
        let outcome = tokio::select! {
            _ = shutdown.changed() => return,
            outcome = timeout(request_timeout, source.fetch(&pair)) => outcome,
        };
        let result = outcome
            .unwrap_or_else(|_| Err(Error::NetworkError("request timed out".to_string())));

        match result {
            Ok(obs) => {
                record_request(&shared, source.id(), true);
                shared.store.insert(&pair, obs);
                shared
                    .counters
                    .observations_stored
                    .fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) => {
                record_request(&shared, source.id(), false);
                tracing::warn!(
                    pair = %pair,
                    source = source.id(),
                    attempt = attempt + 1,
                    error = %e,
                    "Source fetch failed"
                );
                if !e.is_retryable() || attempt + 1 >= attempts {
                    return;
                }
                let backoff = Duration::from_secs(1u64 << attempt.min(6));
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }
}

fn record_request(shared: &Shared, source_id: &str, success: bool) {
    let counters = if success {
        &shared.counters.requests_succeeded
    } else {
        &shared.counters.requests_failed
    };
    counters.fetch_add(1, Ordering::Relaxed);

    if let Some(sc) = shared.per_source.get(source_id) {
        if success {
            sc.succeeded.fetch_add(1, Ordering::Relaxed);
            let streak = sc.consecutive_failures.swap(0, Ordering::Relaxed);
            if streak >= UNHEALTHY_AFTER {
                tracing::info!(source = source_id, "Source recovered");
            }
        } else {
            sc.failed.fetch_add(1, Ordering::Relaxed);
            let streak = sc.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if streak == UNHEALTHY_AFTER {
                tracing::warn!(
                    source = source_id,
                    failures = streak,
                    "Source marked unhealthy"
                );
            }
        }
    }
    metrics::record_source_request(source_id, success);
}

fn finish_tick(shared: &Shared) {
    shared
        .counters
        .ticks_completed
        .fetch_add(1, Ordering::Relaxed);
}

fn warn_on_stale_pairs(shared: &Shared) {
    let window = shared.config.collect_interval_ms.saturating_mul(2);
    for pair in &shared.config.pairs {
        let pair = Pair::new(pair.clone());
        if shared.store.snapshot(&pair, window).is_empty() {
            tracing::warn!(pair = %pair, "No fresh observations for pair");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AggregationConfig, SourceToggles};
    use crate::types::Observation;
    use async_trait::async_trait;

    struct HealthySource;

    #[async_trait]
    impl PriceSource for HealthySource {
        fn id(&self) -> &str {
            "healthy"
        }

        async fn fetch(&self, pair: &Pair) -> crate::error::Result<Observation> {
            let _ = pair;
            Ok(Observation::with_volume(
                100.0,
                10.0,
                current_timestamp_ms(),
                "healthy",
            ))
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl PriceSource for BrokenSource {
        fn id(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _pair: &Pair) -> crate::error::Result<Observation> {
            Err(Error::NetworkError("connection refused".to_string()))
        }
    }

    fn test_config(retry_attempts: u32) -> CollectorConfig {
        CollectorConfig {
            collect_interval_ms: 50,
            request_timeout_ms: 1_000,
            retry_attempts,
            max_concurrent_requests: 8,
            sources: SourceToggles::default(),
            pairs: vec!["SOL/USDC".to_string()],
            token_mappings: HashMap::new(),
        }
    }

    fn test_store() -> Arc<ObservationStore> {
        Arc::new(ObservationStore::new(AggregationConfig::default()))
    }

    #[tokio::test]
    async fn test_tick_isolates_failing_source() {
        let store = test_store();
        let sources: Vec<Arc<dyn PriceSource>> =
            vec![Arc::new(HealthySource), Arc::new(BrokenSource)];
        let collector = Collector::new(store.clone(), sources, test_config(1)).unwrap();

        collector.collect_once().await;

        let snap = store.snapshot(&Pair::new("SOL/USDC"), u64::MAX);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].source, "healthy");

        let stats = collector.stats();
        assert_eq!(stats.requests_succeeded, 1);
        assert_eq!(stats.requests_failed, 1);
        assert_eq!(stats.observations_stored, 1);
        assert_eq!(stats.per_source["healthy"].success_ratio, 1.0);
        assert_eq!(stats.per_source["broken"].success_ratio, 0.0);
    }

    #[tokio::test]
    async fn test_failed_attempts_counted_per_retry() {
        let store = test_store();
        let sources: Vec<Arc<dyn PriceSource>> = vec![Arc::new(BrokenSource)];
        let collector = Collector::new(store, sources, test_config(2)).unwrap();

        collector.collect_once().await;

        let stats = collector.stats();
        assert_eq!(stats.requests_failed, 2);
        assert_eq!(stats.requests_succeeded, 0);
        assert_eq!(stats.ticks_completed, 1);
    }

    #[tokio::test]
    async fn test_start_twice_rejected_and_stop_joins() {
        let store = test_store();
        let sources: Vec<Arc<dyn PriceSource>> = vec![Arc::new(HealthySource)];
        let collector = Collector::new(store.clone(), sources, test_config(1)).unwrap();

        collector.start().unwrap();
        assert!(matches!(collector.start(), Err(Error::AlreadyRunning)));
        assert!(collector.is_running());

        tokio::time::sleep(Duration::from_millis(120)).await;
        collector.stop().await.unwrap();
        assert!(!collector.is_running());
        assert!(matches!(collector.stop().await, Err(Error::NotRunning)));

        // At least one tick fired while running.
        assert!(collector.stats().ticks_completed >= 1);
        assert!(!store.snapshot(&Pair::new("SOL/USDC"), u64::MAX).is_empty());
    }

    #[tokio::test]
    async fn test_source_health_transitions() {
        let store = test_store();
        let sources: Vec<Arc<dyn PriceSource>> = vec![Arc::new(BrokenSource)];
        let collector = Collector::new(store, sources, test_config(1)).unwrap();

        for _ in 0..3 {
            collector.collect_once().await;
        }

        let stats = collector.stats();
        assert_eq!(stats.per_source["broken"].consecutive_failures, 3);
        assert!(!stats.per_source["broken"].healthy);
    }

    #[tokio::test]
    async fn test_unsupported_pair_not_retried() {
        struct Unsupported;

        #[async_trait]
        impl PriceSource for Unsupported {
            fn id(&self) -> &str {
                "unsupported"
            }

            async fn fetch(&self, pair: &Pair) -> crate::error::Result<Observation> {
                Err(Error::UnsupportedPair {
                    source_name: "unsupported".to_string(),
                    pair: pair.to_string(),
                })
            }
        }

        let store = test_store();
        let sources: Vec<Arc<dyn PriceSource>> = vec![Arc::new(Unsupported)];
        let collector = Collector::new(store, sources, test_config(3)).unwrap();

        collector.collect_once().await;
        assert_eq!(collector.stats().requests_failed, 1);
    }
}
