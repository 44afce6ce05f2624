//! Database module - AppState and the Postgres report adapter
//!
//! - `report` - `PgReportDataSource`, the sqlx implementation of `ReportDataSource`

mod report;

pub use report::PgReportDataSource;

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReportConfig;
use crate::report::source::ReportDataSource;
use crate::report::ReportPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
    pub config: ReportConfig,
}

impl AppState {
    /// Connects lazily, so an unreachable database degrades reports instead of
    /// blocking startup.
    pub fn new_with_config(config: ReportConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let database_url = config
            .database_url
            .clone()
            .ok_or("DATABASE_URL must be set")?;

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect_lazy(&database_url)?;

        let source = Arc::new(PgReportDataSource::new(pool));
        Ok(Self::new_with_source(source, config))
    }

    pub fn new_with_source(
        source: Arc<dyn ReportDataSource + Send + Sync>,
        config: ReportConfig,
    ) -> Self {
        let pipeline = Arc::new(ReportPipeline::from_config(source, &config));
        Self { pipeline, config }
    }

    pub fn new_with_pipeline(pipeline: Arc<ReportPipeline>, config: ReportConfig) -> Self {
        Self { pipeline, config }
    }
}
