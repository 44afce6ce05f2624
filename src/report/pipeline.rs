//! Sequences aggregation, composition and rendering for one date.

use chrono::{Local, NaiveDate};
use lazy_static::lazy_static;
use log::{error, info};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;

use super::aggregator::{AggregationError, AggregationSettings, Aggregator};
use super::chart::render_charts;
use super::composer::{compose, ComposeOptions, PANEL_LOGO_PATH};
use super::fallback::synthetic_report_data;
use super::models::{RenderedReport, ReportData, ReportRequest};
use super::renderer::{ChromiumRenderer, PdfRenderer, RenderOptions, RenderPolicy};
use super::source::ReportDataSource;
use super::ReportError;
use crate::config::ReportConfig;
use crate::metrics;

lazy_static! {
    static ref DATE_FORMAT: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern");
}

pub const FILE_PREFIX: &str = "reporte_danos_";

/// Strict `YYYY-MM-DD`, checked before any I/O.
pub fn parse_report_date(raw: &str) -> Result<NaiveDate, ReportError> {
    let raw = raw.trim();
    if !DATE_FORMAT.is_match(raw) {
        return Err(ReportError::InvalidInput(format!(
            "date '{raw}' must use the YYYY-MM-DD format"
        )));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidInput(format!("'{raw}' is not a calendar date")))
}

pub fn output_file_name(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}.pdf", date.format("%Y-%m-%d"))
}

pub fn output_path_for(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir.join(output_file_name(date))
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub reduction_target_pct: f64,
    pub pipeline_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            reduction_target_pct: 5.0,
            pipeline_timeout: Duration::from_secs(180),
        }
    }
}

type DateLocks = Mutex<HashMap<NaiveDate, Arc<AsyncMutex<()>>>>;

/// Drops the per-date entry once nobody else holds or waits on it.
struct DateLease<'a> {
    locks: &'a DateLocks,
    date: NaiveDate,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for DateLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // One reference in the map, one here.
        if Arc::strong_count(&self.lock) <= 2 {
            locks.remove(&self.date);
        }
    }
}

pub struct ReportPipeline {
    aggregator: Aggregator,
    renderer: PdfRenderer,
    settings: PipelineSettings,
    in_flight: DateLocks,
}

impl ReportPipeline {
    pub fn new(aggregator: Aggregator, renderer: PdfRenderer, settings: PipelineSettings) -> Self {
        Self {
            aggregator,
            renderer,
            settings,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Production wiring: the given data source and a Chromium renderer.
    pub fn from_config(source: Arc<dyn ReportDataSource + Send + Sync>, config: &ReportConfig) -> Self {
        let aggregator = Aggregator::new(
            source,
            AggregationSettings {
                reduction_target_pct: config.reduction_target_pct,
                top_operators: config.top_operators,
            },
        );
        let backend = ChromiumRenderer::new(
            config.chromium_path.clone(),
            config.content_wait,
            config.render_timeout,
        );
        let renderer = PdfRenderer::new(
            Arc::new(backend),
            RenderPolicy {
                attempts: config.render_attempts,
                min_bytes: config.min_pdf_bytes,
                ..RenderPolicy::default()
            },
        );
        Self::new(
            aggregator,
            renderer,
            PipelineSettings {
                reduction_target_pct: config.reduction_target_pct,
                pipeline_timeout: config.pipeline_timeout,
            },
        )
    }

    fn lease(&self, date: NaiveDate) -> DateLease<'_> {
        let lock = self
            .in_flight
            .lock()
            .entry(date)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        DateLease {
            locks: &self.in_flight,
            date,
            lock,
        }
    }

    /// Number of dates with a generation running or queued.
    pub fn dates_in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Generates the PDF for `request.date`. Same-date calls run one at a time.
    pub async fn generate_daily_report_pdf(
        &self,
        request: &ReportRequest,
    ) -> Result<RenderedReport, ReportError> {
        let started = Instant::now();
        let lease = self.lease(request.date);
        let _guard = lease.lock.clone().lock_owned().await;

        info!(
            "Generating daily report for {} into {}",
            request.date,
            request.output_dir.display()
        );

        let result = match tokio::time::timeout(self.settings.pipeline_timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::PipelineTimeout(self.settings.pipeline_timeout)),
        };

        let elapsed = started.elapsed();
        match result {
            Ok(mut report) => {
                report.duration_ms = elapsed.as_millis() as u64;
                metrics::record_generation("success", elapsed.as_secs_f64());
                info!(
                    "Report {} ready: {} bytes in {} ms",
                    report.file_path.display(),
                    report.byte_size,
                    report.duration_ms
                );
                Ok(report)
            }
            Err(e) => {
                let outcome = if matches!(e, ReportError::PipelineTimeout(_)) {
                    "timeout"
                } else {
                    "failure"
                };
                metrics::record_generation(outcome, elapsed.as_secs_f64());
                error!("Report generation for {} failed: {}", request.date, e);
                Err(e)
            }
        }
    }

    async fn run(&self, request: &ReportRequest) -> Result<RenderedReport, ReportError> {
        let data = self.collect_data(request.date).await;

        let charts = render_charts(&data);
        let html = compose(
            &data,
            &charts,
            &ComposeOptions {
                only_charts: request.only_charts,
                generated_at: Some(Local::now().naive_local()),
                logo_src: request.base_url.as_ref().map(|_| PANEL_LOGO_PATH.to_string()),
            },
        );
        info!("Composed document for {} ({} bytes of HTML)", request.date, html.len());

        let options = RenderOptions {
            orientation: request.orientation,
            base_url: request.base_url.clone(),
            auth: request.auth.clone(),
            ..RenderOptions::default()
        };
        let path = output_path_for(&request.output_dir, request.date);
        self.renderer.render(&html, &options, &path).await
    }

    /// Live aggregates, or the synthetic dataset when the stage fails as a whole.
    pub async fn collect_data(&self, date: NaiveDate) -> ReportData {
        let aggregator = self.aggregator.clone();
        let outcome = match tokio::spawn(async move { aggregator.collect(date).await }).await {
            Ok(result) => result,
            Err(join) => Err(AggregationError::Aborted(join.to_string())),
        };

        match outcome {
            Ok(set) => set.into_report_data(),
            Err(e) => {
                error!(
                    "Aggregation for {} failed, rendering synthetic placeholder data: {}",
                    date, e
                );
                metrics::record_degraded_metric("all");
                synthetic_report_data(date, self.settings.reduction_target_pct, &e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report_date() {
        assert_eq!(
            parse_report_date("2025-02-28").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        for bad in ["2025-2-28", "28-02-2025", "2025-02-30", "", "2025-02-28T00:00"] {
            assert!(
                matches!(parse_report_date(bad), Err(ReportError::InvalidInput(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_output_path() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        assert_eq!(
            output_path_for(Path::new("/tmp/out"), date),
            PathBuf::from("/tmp/out/reporte_danos_2024-11-03.pdf")
        );
    }
}
