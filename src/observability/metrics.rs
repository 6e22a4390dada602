use lazy_static::lazy_static;
use prometheus::{
    Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    // Ingestion metrics
    pub static ref OBSERVATIONS_INGESTED: IntCounterVec = register_int_counter_vec!(
        "pricefeed_observations_ingested_total",
        "Total number of observations accepted into the store",
        &["pair", "source"]
    ).unwrap();

    pub static ref INVALID_OBSERVATIONS: IntCounter = register_int_counter!(
        "pricefeed_invalid_observations_total",
        "Observations dropped for violating basic invariants"
    ).unwrap();

    // Aggregation metrics
    pub static ref AGGREGATIONS: IntCounterVec = register_int_counter_vec!(
        "pricefeed_aggregations_total",
        "Aggregation runs by algorithm and outcome",
        &["algorithm", "outcome"]
    ).unwrap();

    pub static ref OUTLIERS_REMOVED: IntCounterVec = register_int_counter_vec!(
        "pricefeed_outliers_removed_total",
        "Observations removed by the outlier pipeline",
        &["pair"]
    ).unwrap();

    pub static ref AGGREGATED_PRICE: GaugeVec = register_gauge_vec!(
        Opts::new("pricefeed_aggregated_price", "Most recent aggregated price"),
        &["pair", "algorithm"]
    ).unwrap();

    pub static ref AGGREGATION_CONFIDENCE: GaugeVec = register_gauge_vec!(
        Opts::new("pricefeed_aggregation_confidence", "Confidence of the most recent aggregation"),
        &["pair", "algorithm"]
    ).unwrap();

    // Publisher metrics
    pub static ref PUBLICATIONS: IntCounterVec = register_int_counter_vec!(
        "pricefeed_publications_total",
        "Publisher rounds by pair and outcome",
        &["pair", "outcome"]
    ).unwrap();

    // Collector metrics
    pub static ref SOURCE_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "pricefeed_source_requests_total",
        "Source fetch attempts by outcome",
        &["source", "outcome"]
    ).unwrap();

    pub static ref COLLECT_TICK_DURATION: Histogram = register_histogram!(
        HistogramOpts::new("pricefeed_collect_tick_seconds", "Wall-clock duration of one collector tick")
    ).unwrap();

    pub static ref COLLECTOR_RUNNING: IntGauge = register_int_gauge!(
        "pricefeed_collector_running",
        "Collector scheduler state (0=stopped, 1=running)"
    ).unwrap();

    pub static ref LAST_TICK_TIMESTAMP: Gauge = register_gauge!(
        "pricefeed_last_tick_timestamp_seconds",
        "Epoch time of the most recent completed tick"
    ).unwrap();
}

/// Record an accepted observation
pub fn record_observation(pair: &str, source: &str) {
    OBSERVATIONS_INGESTED
        .with_label_values(&[pair, source])
        .inc();
}

/// Record a dropped invalid observation
pub fn record_invalid_observation() {
    INVALID_OBSERVATIONS.inc();
}

/// Record an aggregation run
pub fn record_aggregation(algorithm: &str, outcome: &str) {
    AGGREGATIONS.with_label_values(&[algorithm, outcome]).inc();
}

/// Record outliers removed for a pair
pub fn record_outliers(pair: &str, removed: usize) {
    if removed > 0 {
        OUTLIERS_REMOVED
            .with_label_values(&[pair])
            .inc_by(removed as u64);
    }
}

/// Publish the latest aggregated value
pub fn record_aggregated_price(pair: &str, algorithm: &str, price: f64, confidence: f64) {
    AGGREGATED_PRICE
        .with_label_values(&[pair, algorithm])
        .set(price);
    AGGREGATION_CONFIDENCE
        .with_label_values(&[pair, algorithm])
        .set(confidence);
}

/// Record one publisher round for a pair
pub fn record_publication(pair: &str, outcome: &str) {
    PUBLICATIONS.with_label_values(&[pair, outcome]).inc();
}

/// Record one source fetch attempt
pub fn record_source_request(source: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    SOURCE_REQUESTS.with_label_values(&[source, outcome]).inc();
}

/// Record a completed collector tick
pub fn record_tick(duration_secs: f64, completed_at_secs: f64) {
    COLLECT_TICK_DURATION.observe(duration_secs);
    LAST_TICK_TIMESTAMP.set(completed_at_secs);
}

/// Flip the collector state gauge
pub fn set_collector_running(running: bool) {
    COLLECTOR_RUNNING.set(if running { 1 } else { 0 });
}
