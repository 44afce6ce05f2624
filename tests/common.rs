#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use daily_damage_report::report::models::ZoneKind;
use daily_damage_report::report::source::{EntityDamage, SurfaceAreaRecord};
use daily_damage_report::report::{
    AggregationSettings, Aggregator, DocumentRenderer, InMemoryDataSource, PdfRenderer,
    PipelineSettings, RenderError, RenderOptions, RenderPolicy, ReportPipeline,
};

/// Size floor used with the fake renderer, whose PDFs are the HTML itself.
pub const TEST_MIN_BYTES: u64 = 4096;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn entity(name: &str, damage_count: i64, orders: i64, months: i64) -> EntityDamage {
    EntityDamage {
        name: name.to_string(),
        damage_count,
        affected_order_count: orders,
        months_with_damage: months,
    }
}

/// A populated source for 2025 (with 2024 as the prior year).
pub fn sample_source() -> InMemoryDataSource {
    let mut source = InMemoryDataSource::new()
        .with_surface_area(SurfaceAreaRecord {
            recorded_on: date(2025, 3, 5),
            zone_kind: ZoneKind::Female,
            area_m2: 100.0,
        })
        .with_surface_area(SurfaceAreaRecord {
            recorded_on: date(2025, 3, 20),
            zone_kind: ZoneKind::Male,
            area_m2: 50.0,
        })
        .with_surface_area(SurfaceAreaRecord {
            recorded_on: date(2025, 2, 10),
            zone_kind: ZoneKind::Female,
            area_m2: 30.0,
        })
        .with_damage_amount(2025, 1, 1_000_000.0)
        .with_damage_amount(2025, 2, 500_000.0)
        .with_damage_amount(2025, 3, 250_000.0)
        .with_damage_amount(2024, 6, 2_000_000.0)
        .with_damage_count(2025, 1, ZoneKind::Female, 3)
        .with_damage_count(2025, 1, ZoneKind::Male, 2)
        .with_damage_count(2025, 2, ZoneKind::Female, 1)
        .with_damage_count(2025, 2, ZoneKind::Male, 4)
        .with_damage_count(2024, 5, ZoneKind::Male, 120)
        .with_zone(2025, ZoneKind::Female, entity("Zona Norte", 4, 3, 2))
        .with_zone(2025, ZoneKind::Male, entity("Zona Sur", 6, 5, 2));

    for month in 1..=12 {
        source = source.with_budget(2025, month, 900_000.0);
    }
    for i in 0..12 {
        source = source.with_operator(2025, entity(&format!("Operador {i:02}"), 12 - i, 1, 1));
    }
    source
}

/// Records every document and returns it as the "PDF" body.
#[derive(Default)]
pub struct FakeRenderer {
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub documents: Mutex<Vec<String>>,
    pub options: Mutex<Vec<RenderOptions>>,
    pub failures: Mutex<VecDeque<RenderError>>,
    pub delay: Duration,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Fails the next calls with these errors, in order.
    pub fn failing_with(errors: Vec<RenderError>) -> Self {
        Self {
            failures: Mutex::new(errors.into()),
            ..Self::default()
        }
    }

    pub fn last_document(&self) -> Option<String> {
        self.documents.lock().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentRenderer for FakeRenderer {
    async fn render_to_pdf(&self, html: &str, options: &RenderOptions) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.documents.lock().push(html.to_string());
        self.options.lock().push(options.clone());
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }

        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.extend_from_slice(html.as_bytes());
        pdf.extend_from_slice(b"\n%%EOF\n");
        Ok(pdf)
    }
}

pub fn policy() -> RenderPolicy {
    RenderPolicy {
        attempts: 2,
        backoff: Duration::from_millis(5),
        min_bytes: TEST_MIN_BYTES,
    }
}

pub fn pipeline_with(
    source: Arc<InMemoryDataSource>,
    renderer: Arc<FakeRenderer>,
    settings: PipelineSettings,
) -> ReportPipeline {
    let aggregator = Aggregator::new(source, AggregationSettings::default());
    ReportPipeline::new(aggregator, PdfRenderer::new(renderer, policy()), settings)
}

pub fn pipeline(source: Arc<InMemoryDataSource>, renderer: Arc<FakeRenderer>) -> ReportPipeline {
    pipeline_with(source, renderer, PipelineSettings::default())
}
