pub mod aggregation;
pub mod candles;
pub mod collector;
pub mod config;
pub mod error;
pub mod observability;
pub mod publisher;
pub mod service;
pub mod sources;
pub mod stats;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::collector::Collector;
pub use crate::config::AppConfig;
pub use crate::error::{Error, Result};
pub use crate::publisher::PricePublisher;
pub use crate::service::PriceService;
pub use crate::sources::PriceSource;
pub use crate::store::ObservationStore;
pub use crate::types::{AggregatedPrice, Algorithm, Observation, Pair};
