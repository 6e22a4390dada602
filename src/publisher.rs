//! Periodic publication of aggregated prices to in-process subscribers.
//!
//! Consumers that do not want to poll the facade subscribe to a broadcast
//! channel; every publish interval the best price per pair is computed and
//! fanned out. A movement guard suppresses publications that jump further
//! than the configured fraction from the previously published value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::PublisherConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::service::PriceService;
use crate::types::{AggregatedPrice, Pair};

/// Tracks the last published price per pair and rejects jumps beyond the
/// threshold fraction. The rejected value replaces the reference, so a
/// genuine regime change passes on the next round.
pub struct PriceMovementGuard {
    threshold: f64,
    last: HashMap<Pair, f64>,
}

impl PriceMovementGuard {
    pub fn new(threshold: f64) -> Self {
        PriceMovementGuard {
            threshold,
            last: HashMap::new(),
        }
    }

    pub fn check(&mut self, pair: &Pair, price: f64) -> bool {
        let passed = match self.last.get(pair) {
            Some(prev) if *prev > 0.0 => {
                let movement = (price - prev).abs() / prev;
                if movement > self.threshold {
                    tracing::error!(
                        pair = %pair,
                        previous = prev,
                        current = price,
                        movement = movement,
                        "Suppressing abnormal price movement"
                    );
                    false
                } else {
                    true
                }
            }
            _ => true,
        };
        self.last.insert(pair.clone(), price);
        passed
    }
}

struct RunState {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct PricePublisher {
    service: Arc<PriceService>,
    pairs: Vec<Pair>,
    config: PublisherConfig,
    tx: broadcast::Sender<AggregatedPrice>,
    run_state: Mutex<Option<RunState>>,
}

impl PricePublisher {
    pub fn new(service: Arc<PriceService>, pairs: Vec<Pair>, config: PublisherConfig) -> Self {
        let (tx, _) = broadcast::channel(config.buffer_size.max(1));
        PricePublisher {
            service,
            pairs,
            config,
            tx,
            run_state: Mutex::new(None),
        }
    }

    /// New subscription; receives every publication from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AggregatedPrice> {
        self.tx.subscribe()
    }

    pub fn start(&self) -> Result<()> {
        let mut state = self.run_state.lock().expect("publisher lock poisoned");
        if state.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let service = self.service.clone();
        let pairs = self.pairs.clone();
        let config = self.config.clone();
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            let mut guard = PriceMovementGuard::new(config.max_price_movement);
            let mut ticker = interval(Duration::from_millis(config.publish_interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                for pair in &pairs {
                    match service.current_price(pair) {
                        Ok(agg) => {
                            if guard.check(pair, agg.price) {
                                metrics::record_publication(pair.as_str(), "published");
                                // Send only fails with no live subscribers.
                                let _ = tx.send(agg);
                            } else {
                                metrics::record_publication(pair.as_str(), "suppressed");
                            }
                        }
                        Err(e) => {
                            metrics::record_publication(pair.as_str(), "unavailable");
                            tracing::debug!(pair = %pair, error = %e, "Nothing to publish");
                        }
                    }
                }
            }
        });

        *state = Some(RunState {
            shutdown_tx,
            handle,
        });
        tracing::info!(
            pairs = self.pairs.len(),
            interval_ms = self.config.publish_interval_ms,
            "Publisher started"
        );
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let state = {
            let mut state = self.run_state.lock().expect("publisher lock poisoned");
            state.take().ok_or(Error::NotRunning)?
        };
        let _ = state.shutdown_tx.send(true);
        let _ = state.handle.await;
        tracing::info!("Publisher stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.run_state
            .lock()
            .expect("publisher lock poisoned")
            .is_some()
    }
}
