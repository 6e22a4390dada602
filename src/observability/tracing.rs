use tracing::Span;

use crate::types::Pair;

pub fn trace_collect_tick(tick: u64) -> Span {
    tracing::info_span!(
        "collect_tick",
        tick = tick,
    )
}

pub fn trace_aggregation(pair: &Pair, algorithm: &str) -> Span {
    tracing::info_span!(
        "aggregation",
        pair = %pair,
        algorithm = algorithm,
    )
}
