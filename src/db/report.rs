//! Postgres adapter for the report queries.
//!
//! Every query is parameterized; dates and kinds are bound, never formatted
//! into the SQL text.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{FromRow, PgPool};

use crate::report::models::ZoneKind;
use crate::report::source::{
    DataSourceError, EntityDamage, MonthlyAmount, MonthlyKindCount, ReportDataSource,
    ReportWindow, SurfaceAreaRecord,
};

#[derive(Clone)]
pub struct PgReportDataSource {
    pool: PgPool,
}

impl PgReportDataSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SurfaceAreaRow {
    recorded_on: NaiveDate,
    zone_kind: String,
    area_m2: f64,
}

#[derive(Debug, FromRow)]
struct MonthlyAmountRow {
    month: i32,
    amount: f64,
}

#[derive(Debug, FromRow)]
struct MonthlyKindCountRow {
    month: i32,
    zone_kind: String,
    count: i64,
}

#[derive(Debug, FromRow)]
struct EntityDamageRow {
    name: String,
    damage_count: i64,
    affected_order_count: i64,
    months_with_damage: i64,
}

fn zone_kind(code: &str) -> Result<ZoneKind, DataSourceError> {
    ZoneKind::from_code(code).ok_or_else(|| DataSourceError::InvalidValue {
        column: "zones.kind",
        value: code.to_string(),
    })
}

fn month(value: i32) -> Result<u32, DataSourceError> {
    u32::try_from(value)
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| DataSourceError::InvalidValue {
            column: "month",
            value: value.to_string(),
        })
}

/// `[Jan 1 of year, Jan 1 of year + 1)`.
fn year_bounds(year: i32) -> (NaiveDateTime, NaiveDateTime) {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN);
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap_or(NaiveDate::MAX);
    (start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
}

fn entity(row: EntityDamageRow) -> EntityDamage {
    EntityDamage {
        name: row.name,
        damage_count: row.damage_count,
        affected_order_count: row.affected_order_count,
        months_with_damage: row.months_with_damage,
    }
}

const MONTHLY_AMOUNTS_SQL: &str = r#"
    SELECT EXTRACT(MONTH FROM occurred_at)::INT4 AS month,
           COALESCE(SUM(amount), 0)::FLOAT8 AS amount
    FROM damages
    WHERE occurred_at >= $1 AND occurred_at < $2
    GROUP BY 1
    ORDER BY 1
"#;

const MONTHLY_COUNTS_SQL: &str = r#"
    SELECT EXTRACT(MONTH FROM d.occurred_at)::INT4 AS month,
           z.kind::TEXT AS zone_kind,
           COUNT(*)::INT8 AS count
    FROM damages d
    JOIN zones z ON z.id = d.zone_id
    WHERE d.occurred_at >= $1 AND d.occurred_at < $2
    GROUP BY 1, 2
    ORDER BY 1, 2
"#;

const OPERATOR_DAMAGE_SQL: &str = r#"
    SELECT o.name AS name,
           COUNT(d.id)::INT8 AS damage_count,
           COUNT(DISTINCT d.order_number)::INT8 AS affected_order_count,
           COUNT(DISTINCT EXTRACT(MONTH FROM d.occurred_at))::INT8 AS months_with_damage
    FROM damages d
    JOIN operators o ON o.id = d.operator_id
    WHERE d.occurred_at >= $1 AND d.occurred_at < $2
    GROUP BY o.id, o.name
"#;

const ZONE_DAMAGE_SQL: &str = r#"
    SELECT z.name AS name,
           COUNT(d.id)::INT8 AS damage_count,
           COUNT(DISTINCT d.order_number)::INT8 AS affected_order_count,
           COUNT(DISTINCT EXTRACT(MONTH FROM d.occurred_at))::INT8 AS months_with_damage
    FROM damages d
    JOIN zones z ON z.id = d.zone_id
    WHERE d.occurred_at >= $1 AND d.occurred_at < $2
      AND ($3::TEXT IS NULL OR z.kind = $3)
    GROUP BY z.id, z.name
"#;

#[async_trait]
impl ReportDataSource for PgReportDataSource {
    async fn ping(&self) -> Result<(), DataSourceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn surface_area_records(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SurfaceAreaRecord>, DataSourceError> {
        let rows = sqlx::query_as::<_, SurfaceAreaRow>(
            r#"
            SELECT s.recorded_on, z.kind::TEXT AS zone_kind, s.area_m2::FLOAT8 AS area_m2
            FROM surface_areas s
            JOIN zones z ON z.id = s.zone_id
            WHERE s.recorded_on >= $1 AND s.recorded_on <= $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SurfaceAreaRecord {
                    recorded_on: row.recorded_on,
                    zone_kind: zone_kind(&row.zone_kind)?,
                    area_m2: row.area_m2,
                })
            })
            .collect()
    }

    async fn monthly_damage_amounts(&self, year: i32) -> Result<Vec<MonthlyAmount>, DataSourceError> {
        let (start, end) = year_bounds(year);
        let rows = sqlx::query_as::<_, MonthlyAmountRow>(MONTHLY_AMOUNTS_SQL)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MonthlyAmount {
                    month: month(row.month)?,
                    amount: row.amount,
                })
            })
            .collect()
    }

    async fn monthly_budget(&self, year: i32) -> Result<Vec<MonthlyAmount>, DataSourceError> {
        let rows = sqlx::query_as::<_, MonthlyAmountRow>(
            "SELECT month, amount::FLOAT8 AS amount FROM damage_budgets WHERE year = $1 ORDER BY month",
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MonthlyAmount {
                    month: month(row.month)?,
                    amount: row.amount,
                })
            })
            .collect()
    }

    async fn monthly_damage_counts(&self, year: i32) -> Result<Vec<MonthlyKindCount>, DataSourceError> {
        let (start, end) = year_bounds(year);
        let rows = sqlx::query_as::<_, MonthlyKindCountRow>(MONTHLY_COUNTS_SQL)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MonthlyKindCount {
                    month: month(row.month)?,
                    zone_kind: zone_kind(&row.zone_kind)?,
                    count: row.count,
                })
            })
            .collect()
    }

    async fn operator_damage(&self, window: &ReportWindow) -> Result<Vec<EntityDamage>, DataSourceError> {
        let rows = sqlx::query_as::<_, EntityDamageRow>(OPERATOR_DAMAGE_SQL)
            .bind(window.start_of_year)
            .bind(window.end_of_day)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(entity).collect())
    }

    async fn zone_damage(
        &self,
        window: &ReportWindow,
        kind: Option<ZoneKind>,
    ) -> Result<Vec<EntityDamage>, DataSourceError> {
        let rows = sqlx::query_as::<_, EntityDamageRow>(ZONE_DAMAGE_SQL)
            .bind(window.start_of_year)
            .bind(window.end_of_day)
            .bind(kind.map(|k| k.code()))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(entity).collect())
    }
}
