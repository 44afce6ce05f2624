//! Turns a target date into the typed aggregates of the daily report.
//!
//! Each metric runs its own queries and absorbs its own failures: a failing
//! query yields [`Metric::Degraded`] carrying the documented zero default, so
//! one broken metric never blocks the others. Only a failed connectivity check
//! fails the whole stage.

use chrono::{Datelike, NaiveDate};
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;

use super::models::{
    rank_entities, AreaPeriod, DamageAccumulatedReport, DataOrigin, DegradedMetric,
    EntityBreakdown, EntityRow, GoalProjection, ReportData, SurfaceAreaAggregate,
    TypeDistribution, ZoneBreakdowns, ZoneKind,
};
use super::source::{
    DataSourceError, EntityDamage, MonthlyAmount, MonthlyKindCount, ReportDataSource,
    ReportWindow, SurfaceAreaRecord,
};
use crate::metrics;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("report data source unavailable: {0}")]
    Unavailable(#[source] DataSourceError),
    #[error("aggregation task aborted: {0}")]
    Aborted(String),
}

/// Outcome of one metric: the real value, or a fallback default and why.
#[derive(Debug, Clone, PartialEq)]
pub enum Metric<T> {
    Ok(T),
    Degraded { value: T, reason: String },
}

impl<T> Metric<T> {
    pub fn value(&self) -> &T {
        match self {
            Metric::Ok(value) | Metric::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Metric::Ok(value) | Metric::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Metric::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Metric::Ok(_) => None,
            Metric::Degraded { reason, .. } => Some(reason),
        }
    }
}

fn settle<T: Default>(metric: &'static str, result: Result<T, DataSourceError>) -> Metric<T> {
    match result {
        Ok(value) => Metric::Ok(value),
        Err(e) => {
            warn!("Metric '{}' degraded to default: {}", metric, e);
            metrics::record_degraded_metric(metric);
            Metric::Degraded {
                value: T::default(),
                reason: e.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregationSettings {
    pub reduction_target_pct: f64,
    pub top_operators: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            reduction_target_pct: 5.0,
            top_operators: 10,
        }
    }
}

/// The eight aggregates for one date, each tagged with its outcome.
#[derive(Debug, Clone)]
pub struct AggregateSet {
    pub window: ReportWindow,
    pub surface_area: Metric<SurfaceAreaAggregate>,
    pub damage: Metric<DamageAccumulatedReport>,
    pub goal: Metric<GoalProjection>,
    pub distribution: Metric<TypeDistribution>,
    pub operators: Metric<EntityBreakdown>,
    pub zones_consolidated: Metric<EntityBreakdown>,
    pub zones_female: Metric<EntityBreakdown>,
    pub zones_male: Metric<EntityBreakdown>,
}

impl AggregateSet {
    pub fn degraded(&self) -> Vec<DegradedMetric> {
        let reasons = [
            ("surface_area", self.surface_area.reason()),
            ("damage_accumulated", self.damage.reason()),
            ("goal_projection", self.goal.reason()),
            ("type_distribution", self.distribution.reason()),
            ("operators", self.operators.reason()),
            ("zones_consolidated", self.zones_consolidated.reason()),
            ("zones_female", self.zones_female.reason()),
            ("zones_male", self.zones_male.reason()),
        ];
        reasons
            .into_iter()
            .filter_map(|(metric, reason)| {
                reason.map(|r| DegradedMetric {
                    metric: metric.to_string(),
                    reason: r.to_string(),
                })
            })
            .collect()
    }

    pub fn into_report_data(self) -> ReportData {
        let degraded = self.degraded();
        ReportData {
            date: self.window.date,
            year: self.window.year,
            origin: DataOrigin::Live,
            surface_area: self.surface_area.into_value(),
            damage: self.damage.into_value(),
            goal: self.goal.into_value(),
            distribution: self.distribution.into_value(),
            operators: self.operators.into_value(),
            zones: ZoneBreakdowns {
                consolidated: self.zones_consolidated.into_value(),
                female: self.zones_female.into_value(),
                male: self.zones_male.into_value(),
            },
            degraded,
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn ReportDataSource + Send + Sync>,
    settings: AggregationSettings,
}

impl Aggregator {
    pub fn new(source: Arc<dyn ReportDataSource + Send + Sync>, settings: AggregationSettings) -> Self {
        Self { source, settings }
    }

    /// Runs every metric concurrently and joins the results.
    pub async fn collect(&self, date: NaiveDate) -> Result<AggregateSet, AggregationError> {
        let window = ReportWindow::for_date(date);
        self.source
            .ping()
            .await
            .map_err(AggregationError::Unavailable)?;

        info!("Aggregating report data for {}", date);

        let (
            surface_area,
            damage,
            goal,
            distribution,
            operators,
            zones_consolidated,
            zones_female,
            zones_male,
        ) = futures::join!(
            self.surface_area(&window),
            self.damage_accumulated(&window),
            self.goal_projection(&window),
            self.type_distribution(&window),
            self.operator_breakdown(&window),
            self.zone_breakdown(&window, None),
            self.zone_breakdown(&window, Some(ZoneKind::Female)),
            self.zone_breakdown(&window, Some(ZoneKind::Male)),
        );

        let set = AggregateSet {
            window,
            surface_area,
            damage,
            goal,
            distribution,
            operators,
            zones_consolidated,
            zones_female,
            zones_male,
        };
        debug!("Aggregation for {} finished with {} degraded metric(s)", date, set.degraded().len());
        Ok(set)
    }

    pub async fn surface_area(&self, window: &ReportWindow) -> Metric<SurfaceAreaAggregate> {
        let result = async {
            let (prev_start, _) = previous_month_bounds(window.date);
            let month_end = last_day_of_month(window.date.year(), window.date.month());
            let records = self
                .source
                .surface_area_records(prev_start, month_end)
                .await?;
            Ok::<_, DataSourceError>(partition_fortnights(&records, window.date))
        }
        .await;
        settle("surface_area", result)
    }

    pub async fn damage_accumulated(&self, window: &ReportWindow) -> Metric<DamageAccumulatedReport> {
        let result = async {
            let (actual, budget, prior) = futures::try_join!(
                self.source.monthly_damage_amounts(window.year),
                self.source.monthly_budget(window.year),
                self.source.monthly_damage_amounts(window.year - 1),
            )?;
            let total_prior_year: f64 = prior.iter().map(|m| m.amount.max(0.0)).sum();
            Ok::<_, DataSourceError>(DamageAccumulatedReport::from_monthly(
                &monthly_amounts(&actual),
                &monthly_amounts(&budget),
                total_prior_year,
            ))
        }
        .await;
        settle("damage_accumulated", result)
    }

    pub async fn goal_projection(&self, window: &ReportWindow) -> Metric<GoalProjection> {
        let result = async {
            let (current, prior) = futures::try_join!(
                self.source.monthly_damage_counts(window.year),
                self.source.monthly_damage_counts(window.year - 1),
            )?;
            let through = window.month();
            let (female, male) = monthly_counts(&current);
            let so_far: Vec<i64> = (0..through as usize).map(|i| female[i] + male[i]).collect();

            let actual_annual_so_far: i64 = so_far.iter().sum();
            let months_with_data = so_far.iter().filter(|c| **c > 0).count() as u32;
            let prior_year_total: i64 = prior.iter().map(|c| c.count.max(0)).sum();

            Ok::<_, DataSourceError>(GoalProjection::compute(
                prior_year_total,
                actual_annual_so_far,
                months_with_data,
                self.settings.reduction_target_pct,
            ))
        }
        .await;
        settle("goal_projection", result)
    }

    pub async fn type_distribution(&self, window: &ReportWindow) -> Metric<TypeDistribution> {
        let result = self
            .source
            .monthly_damage_counts(window.year)
            .await
            .map(|counts| {
                let (female, male) = monthly_counts(&counts);
                TypeDistribution::from_monthly(&female, &male)
            });
        settle("type_distribution", result)
    }

    pub async fn operator_breakdown(&self, window: &ReportWindow) -> Metric<EntityBreakdown> {
        let result = self
            .source
            .operator_damage(window)
            .await
            .map(|rows| rank_entities(entity_rows(rows, false), Some(self.settings.top_operators)));
        settle("operators", result)
    }

    pub async fn zone_breakdown(
        &self,
        window: &ReportWindow,
        kind: Option<ZoneKind>,
    ) -> Metric<EntityBreakdown> {
        let name = match kind {
            None => "zones_consolidated",
            Some(ZoneKind::Female) => "zones_female",
            Some(ZoneKind::Male) => "zones_male",
        };
        let result = self
            .source
            .zone_damage(window, kind)
            .await
            .map(|rows| rank_entities(entity_rows(rows, true), None));
        settle(name, result)
    }
}

fn entity_rows(rows: Vec<EntityDamage>, with_months: bool) -> Vec<EntityRow> {
    rows.into_iter()
        .map(|row| EntityRow {
            name: if row.name.trim().is_empty() {
                "Sin nombre".to_string()
            } else {
                row.name
            },
            damage_count: row.damage_count.max(0),
            affected_order_count: row.affected_order_count.max(0),
            months_with_damage: with_months.then(|| row.months_with_damage.clamp(0, 12) as u32),
        })
        .collect()
}

/// Folds month-keyed rows into a January-first array; out-of-range months are dropped.
pub fn monthly_amounts(rows: &[MonthlyAmount]) -> [f64; 12] {
    let mut out = [0.0; 12];
    for row in rows {
        if (1..=12).contains(&row.month) && row.amount.is_finite() {
            out[row.month as usize - 1] += row.amount;
        }
    }
    out
}

pub fn monthly_counts(rows: &[MonthlyKindCount]) -> ([i64; 12], [i64; 12]) {
    let mut female = [0; 12];
    let mut male = [0; 12];
    for row in rows {
        if !(1..=12).contains(&row.month) {
            continue;
        }
        let slot = row.month as usize - 1;
        match row.zone_kind {
            ZoneKind::Female => female[slot] += row.count.max(0),
            ZoneKind::Male => male[slot] += row.count.max(0),
        }
    }
    (female, male)
}

/// First and last day of the month before `date`, rolling the year over in January.
pub fn previous_month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date);
    (first, last_day_of_month(year, month))
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MIN)
}

/// Splits the target month at day 15 and sums the whole previous month.
pub fn partition_fortnights(records: &[SurfaceAreaRecord], date: NaiveDate) -> SurfaceAreaAggregate {
    let (prev_start, prev_end) = previous_month_bounds(date);
    let mut first = (0.0, 0.0);
    let mut second = (0.0, 0.0);
    let mut previous = (0.0, 0.0);

    for record in records {
        if !record.area_m2.is_finite() {
            continue;
        }
        let bucket = if record.recorded_on.year() == date.year()
            && record.recorded_on.month() == date.month()
        {
            if record.recorded_on.day() <= 15 {
                &mut first
            } else {
                &mut second
            }
        } else if record.recorded_on >= prev_start && record.recorded_on <= prev_end {
            &mut previous
        } else {
            continue;
        };

        match record.zone_kind {
            ZoneKind::Female => bucket.0 += record.area_m2,
            ZoneKind::Male => bucket.1 += record.area_m2,
        }
    }

    SurfaceAreaAggregate {
        first_fortnight: AreaPeriod::new(first.0, first.1),
        second_fortnight: AreaPeriod::new(second.0, second.1),
        previous_month: AreaPeriod::new(previous.0, previous.1),
    }
}
