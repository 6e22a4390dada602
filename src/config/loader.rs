use config::{Config, Environment, File};
use serde::Deserialize;

use crate::config::{AggregationConfig, CollectorConfig, MockSourceConfig, PublisherConfig};
use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub aggregation: AggregationConfig,
    pub collector: CollectorConfig,
    pub publisher: PublisherConfig,
    pub mock: MockSourceConfig,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("PRICEFEED"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        self.aggregation.validate()?;
        self.collector.validate()?;
        self.publisher.validate()
    }
}
