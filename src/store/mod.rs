//! Per-pair observation history.
//!
//! Each pair owns a bounded, time-windowed ring of price observations plus a
//! parallel ring for observations carrying usable volume. Inserts are
//! serialized per pair, never globally; snapshots are copies so readers
//! never race a concurrent insert.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use crate::config::AggregationConfig;
use crate::observability::metrics;
use crate::types::{Observation, Pair};
use crate::utils::helper::current_timestamp_ms;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub pairs: usize,
    pub observations: usize,
    pub volume_observations: usize,
    /// Lifetime count of accepted inserts, across purges and evictions.
    pub total_ingested: u64,
    /// Observations dropped for violating basic invariants (negative or
    /// non-finite price/volume).
    pub invalid_dropped: u64,
}

#[derive(Default)]
struct PairHistory {
    prices: VecDeque<Observation>,
    volumes: VecDeque<Observation>,
}

impl PairHistory {
    fn purge_and_cap(&mut self, now_ms: u64, max_age_ms: u64, cap: usize) {
        let cutoff = now_ms.saturating_sub(max_age_ms);
        self.prices.retain(|o| o.timestamp_ms >= cutoff);
        self.volumes.retain(|o| o.timestamp_ms >= cutoff);
        while self.prices.len() > cap {
            self.prices.pop_front();
        }
        while self.volumes.len() > cap {
            self.volumes.pop_front();
        }
    }
}

pub struct ObservationStore {
    shards: RwLock<HashMap<Pair, Arc<Mutex<PairHistory>>>>,
    config: AggregationConfig,
    total_ingested: AtomicU64,
    invalid_dropped: AtomicU64,
}

impl ObservationStore {
    pub fn new(config: AggregationConfig) -> Self {
        ObservationStore {
            shards: RwLock::new(HashMap::new()),
            config,
            total_ingested: AtomicU64::new(0),
            invalid_dropped: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Append an observation, stamping its source weight and re-establishing
    /// the retention invariants before returning.
    pub fn insert(&self, pair: &Pair, mut obs: Observation) {
        if !observation_is_valid(&obs) {
            debug_assert!(false, "invalid observation rejected: {:?}", obs);
            self.invalid_dropped.fetch_add(1, Ordering::Relaxed);
            metrics::record_invalid_observation();
            tracing::warn!(pair = %pair, source = %obs.source, "Dropping invalid observation");
            return;
        }

        obs.weight = self.config.source_weights.weight_for(&obs.source);
        self.total_ingested.fetch_add(1, Ordering::Relaxed);
        metrics::record_observation(pair.as_str(), &obs.source);

        let shard = self.shard(pair);
        let now = current_timestamp_ms();
        let mut history = shard.lock().expect("store lock poisoned");

        let has_volume = obs.volume.map_or(false, |v| v >= self.config.min_volume);
        if has_volume {
            history.volumes.push_back(obs.clone());
        }
        history.prices.push_back(obs);
        history.purge_and_cap(now, self.config.max_age_ms, self.config.max_history_size);
    }

    /// Copy of the observations with timestamp >= now - window, insertion
    /// order preserved.
    pub fn snapshot(&self, pair: &Pair, window_ms: u64) -> Vec<Observation> {
        self.snapshot_ring(pair, window_ms, |h| &h.prices)
    }

    /// Analogous copy of the volume ring.
    pub fn volume_snapshot(&self, pair: &Pair, window_ms: u64) -> Vec<Observation> {
        self.snapshot_ring(pair, window_ms, |h| &h.volumes)
    }

    pub fn clear(&self, pair: &Pair) {
        if let Some(shard) = self.existing_shard(pair) {
            let mut history = shard.lock().expect("store lock poisoned");
            history.prices.clear();
            history.volumes.clear();
        }
    }

    pub fn clear_all(&self) {
        self.shards
            .write()
            .expect("store lock poisoned")
            .clear();
    }

    pub fn stats(&self) -> StoreStats {
        let shards = self.shards.read().expect("store lock poisoned");
        let mut stats = StoreStats {
            pairs: shards.len(),
            total_ingested: self.total_ingested.load(Ordering::Relaxed),
            invalid_dropped: self.invalid_dropped.load(Ordering::Relaxed),
            ..StoreStats::default()
        };
        for shard in shards.values() {
            let history = shard.lock().expect("store lock poisoned");
            stats.observations += history.prices.len();
            stats.volume_observations += history.volumes.len();
        }
        stats
    }

    fn snapshot_ring<F>(&self, pair: &Pair, window_ms: u64, ring: F) -> Vec<Observation>
    where
        F: Fn(&PairHistory) -> &VecDeque<Observation>,
    {
        let Some(shard) = self.existing_shard(pair) else {
            return Vec::new();
        };
        let cutoff = current_timestamp_ms().saturating_sub(window_ms);
        let history = shard.lock().expect("store lock poisoned");
        ring(&history)
            .iter()
            .filter(|o| o.timestamp_ms >= cutoff)
            .cloned()
            .collect()
    }

    fn shard(&self, pair: &Pair) -> Arc<Mutex<PairHistory>> {
        if let Some(shard) = self.existing_shard(pair) {
            return shard;
        }
        let mut shards = self.shards.write().expect("store lock poisoned");
        shards
            .entry(pair.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PairHistory::default())))
            .clone()
    }

    fn existing_shard(&self, pair: &Pair) -> Option<Arc<Mutex<PairHistory>>> {
        self.shards
            .read()
            .expect("store lock poisoned")
            .get(pair)
            .cloned()
    }
}

fn observation_is_valid(obs: &Observation) -> bool {
    if !obs.price.is_finite() || obs.price < 0.0 {
        return false;
    }
    match obs.volume {
        Some(v) if !v.is_finite() || v < 0.0 => false,
        _ => true,
    }
}
