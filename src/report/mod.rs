//! Daily damage report pipeline.
//!
//! - `source` - read-only query capability over the relational store
//! - `aggregator` - eight independent aggregates with per-metric degradation
//! - `fallback` - deterministic placeholder data when aggregation fails outright
//! - `chart` - donut and grouped-bar SVG renderers
//! - `composer` - printable HTML document
//! - `renderer` - HTML to validated PDF on disk
//! - `pipeline` - sequencing, locking and timeouts
//! - `handlers` - HTTP endpoints

pub mod aggregator;
pub mod chart;
pub mod composer;
pub mod fallback;
pub mod format;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod renderer;
pub mod source;

use std::time::Duration;
use thiserror::Error;

pub use aggregator::{AggregationError, AggregationSettings, Aggregator, Metric};
pub use models::{AuthContext, Orientation, RenderedReport, ReportData, ReportRequest};
pub use pipeline::{output_path_for, parse_report_date, PipelineSettings, ReportPipeline};
pub use renderer::{DocumentRenderer, PdfRenderer, RenderError, RenderOptions, RenderPolicy};
pub use source::{DataSourceError, InMemoryDataSource, ReportDataSource};

/// Errors that reach the caller of the pipeline.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("PDF render failed after {attempts} attempt(s): {last}")]
    RenderFailedAfterRetries {
        attempts: u32,
        #[source]
        last: RenderError,
    },
    #[error("PDF render failed: {0}")]
    Render(#[from] RenderError),
    #[error("report generation exceeded {}s", .0.as_secs())]
    PipelineTimeout(Duration),
}

impl ReportError {
    fn render_cause(&self) -> Option<&RenderError> {
        match self {
            Self::RenderFailedAfterRetries { last, .. } => Some(last),
            Self::Render(e) => Some(e),
            _ => None,
        }
    }

    /// A short operator-facing hint for the failures with a known fix.
    pub fn remediation_hint(&self) -> Option<&'static str> {
        if matches!(self, Self::PipelineTimeout(_)) {
            return Some(
                "The browser did not finish in time. Verify Chromium starts on this host \
                 and raise REPORT_PIPELINE_TIMEOUT_SECS or REPORT_RENDER_TIMEOUT_SECS if it is slow.",
            );
        }
        match self.render_cause()? {
            RenderError::Timeout { .. } => Some(
                "The browser did not finish in time. Verify Chromium starts on this host \
                 and raise REPORT_RENDER_TIMEOUT_SECS if it is slow.",
            ),
            RenderError::AssetAuth { .. } => Some(
                "An asset rejected the credentials. Check --authToken and that the token \
                 has not expired for --baseUrl.",
            ),
            RenderError::Launch { .. } => {
                Some("Chromium could not be started. Set CHROMIUM_PATH to a headless-capable binary.")
            }
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
