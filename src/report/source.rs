//! Read-only query capability consumed by the aggregator.
//!
//! The relational store is an external collaborator; the aggregator only ever
//! sees it through [`ReportDataSource`]. `PgReportDataSource` (in `crate::db`)
//! is the production adapter and [`InMemoryDataSource`] the test double.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::models::ZoneKind;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("unexpected value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Time bounds derived from the target date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub date: NaiveDate,
    pub year: i32,
    pub start_of_year: NaiveDateTime,
    pub start_of_day: NaiveDateTime,
    pub end_of_day: NaiveDateTime,
}

impl ReportWindow {
    pub fn for_date(date: NaiveDate) -> Self {
        let year = date.year();
        let start_of_year = NaiveDate::from_ymd_opt(year, 1, 1)
            .unwrap_or(date)
            .and_time(NaiveTime::MIN);
        let start_of_day = date.and_time(NaiveTime::MIN);
        // Exclusive upper bound: midnight of the following day.
        let end_of_day = date
            .succ_opt()
            .map(|d| d.and_time(NaiveTime::MIN))
            .unwrap_or(start_of_day);

        Self {
            date,
            year,
            start_of_year,
            start_of_day,
            end_of_day,
        }
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceAreaRecord {
    pub recorded_on: NaiveDate,
    pub zone_kind: ZoneKind,
    pub area_m2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyAmount {
    /// 1-based month number.
    pub month: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyKindCount {
    pub month: u32,
    pub zone_kind: ZoneKind,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDamage {
    pub name: String,
    pub damage_count: i64,
    pub affected_order_count: i64,
    pub months_with_damage: i64,
}

#[async_trait]
pub trait ReportDataSource {
    /// Cheap connectivity check run before the aggregate queries.
    async fn ping(&self) -> Result<(), DataSourceError>;

    /// Surface-area records with `start <= recorded_on <= end`.
    async fn surface_area_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SurfaceAreaRecord>, DataSourceError>;

    /// Damage amounts summed per month of `year`.
    async fn monthly_damage_amounts(&self, year: i32) -> Result<Vec<MonthlyAmount>, DataSourceError>;

    /// Budgeted damage amounts per month of `year`.
    async fn monthly_budget(&self, year: i32) -> Result<Vec<MonthlyAmount>, DataSourceError>;

    /// Damage record counts per month and zone kind for `year`.
    async fn monthly_damage_counts(&self, year: i32) -> Result<Vec<MonthlyKindCount>, DataSourceError>;

    /// Per-operator damage rollup from the start of the year through the window's day.
    async fn operator_damage(&self, window: &ReportWindow) -> Result<Vec<EntityDamage>, DataSourceError>;

    /// Per-zone damage rollup, optionally restricted to one zone kind.
    async fn zone_damage(
        &self,
        window: &ReportWindow,
        kind: Option<ZoneKind>,
    ) -> Result<Vec<EntityDamage>, DataSourceError>;
}

/// Query names accepted by [`InMemoryDataSource::fail_query`].
pub mod query_names {
    pub const SURFACE_AREA: &str = "surface_area_records";
    pub const DAMAGE_AMOUNTS: &str = "monthly_damage_amounts";
    pub const BUDGET: &str = "monthly_budget";
    pub const DAMAGE_COUNTS: &str = "monthly_damage_counts";
    pub const OPERATORS: &str = "operator_damage";
    pub const ZONES: &str = "zone_damage";
}

/// Vector-backed data source for tests and offline runs.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    surface_areas: Vec<SurfaceAreaRecord>,
    damage_amounts: HashMap<i32, Vec<MonthlyAmount>>,
    budgets: HashMap<i32, Vec<MonthlyAmount>>,
    damage_counts: HashMap<i32, Vec<MonthlyKindCount>>,
    operators: HashMap<i32, Vec<EntityDamage>>,
    zones: HashMap<(i32, ZoneKind), Vec<EntityDamage>>,
    failing: RwLock<HashSet<&'static str>>,
    unavailable: RwLock<bool>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surface_area(mut self, record: SurfaceAreaRecord) -> Self {
        self.surface_areas.push(record);
        self
    }

    pub fn with_damage_amount(mut self, year: i32, month: u32, amount: f64) -> Self {
        self.damage_amounts
            .entry(year)
            .or_default()
            .push(MonthlyAmount { month, amount });
        self
    }

    pub fn with_budget(mut self, year: i32, month: u32, amount: f64) -> Self {
        self.budgets
            .entry(year)
            .or_default()
            .push(MonthlyAmount { month, amount });
        self
    }

    pub fn with_damage_count(mut self, year: i32, month: u32, zone_kind: ZoneKind, count: i64) -> Self {
        self.damage_counts.entry(year).or_default().push(MonthlyKindCount {
            month,
            zone_kind,
            count,
        });
        self
    }

    pub fn with_operator(mut self, year: i32, row: EntityDamage) -> Self {
        self.operators.entry(year).or_default().push(row);
        self
    }

    pub fn with_zone(mut self, year: i32, kind: ZoneKind, row: EntityDamage) -> Self {
        self.zones.entry((year, kind)).or_default().push(row);
        self
    }

    /// Make one query (see [`query_names`]) return an error from now on.
    pub fn fail_query(&self, name: &'static str) {
        self.failing.write().insert(name);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write() = unavailable;
    }

    fn check(&self, name: &'static str) -> Result<(), DataSourceError> {
        if self.failing.read().contains(name) {
            return Err(DataSourceError::Unavailable(format!(
                "query {name} configured to fail"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReportDataSource for InMemoryDataSource {
    async fn ping(&self) -> Result<(), DataSourceError> {
        if *self.unavailable.read() {
            return Err(DataSourceError::Unavailable(
                "in-memory source marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn surface_area_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SurfaceAreaRecord>, DataSourceError> {
        self.check(query_names::SURFACE_AREA)?;
        Ok(self
            .surface_areas
            .iter()
            .filter(|r| r.recorded_on >= start && r.recorded_on <= end)
            .cloned()
            .collect())
    }

    async fn monthly_damage_amounts(&self, year: i32) -> Result<Vec<MonthlyAmount>, DataSourceError> {
        self.check(query_names::DAMAGE_AMOUNTS)?;
        Ok(self.damage_amounts.get(&year).cloned().unwrap_or_default())
    }

    async fn monthly_budget(&self, year: i32) -> Result<Vec<MonthlyAmount>, DataSourceError> {
        self.check(query_names::BUDGET)?;
        Ok(self.budgets.get(&year).cloned().unwrap_or_default())
    }

    async fn monthly_damage_counts(&self, year: i32) -> Result<Vec<MonthlyKindCount>, DataSourceError> {
        self.check(query_names::DAMAGE_COUNTS)?;
        Ok(self.damage_counts.get(&year).cloned().unwrap_or_default())
    }

    async fn operator_damage(&self, window: &ReportWindow) -> Result<Vec<EntityDamage>, DataSourceError> {
        self.check(query_names::OPERATORS)?;
        Ok(self.operators.get(&window.year).cloned().unwrap_or_default())
    }

    async fn zone_damage(
        &self,
        window: &ReportWindow,
        kind: Option<ZoneKind>,
    ) -> Result<Vec<EntityDamage>, DataSourceError> {
        self.check(query_names::ZONES)?;
        let kinds: Vec<ZoneKind> = match kind {
            Some(k) => vec![k],
            None => vec![ZoneKind::Female, ZoneKind::Male],
        };
        Ok(kinds
            .into_iter()
            .filter_map(|k| self.zones.get(&(window.year, k)))
            .flatten()
            .cloned()
            .collect())
    }
}
