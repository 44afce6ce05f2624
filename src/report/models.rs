//! Value types produced by one report run.
//!
//! Every aggregate is rebuilt from scratch per invocation; nothing here is
//! cached or mutated after construction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Spanish three-letter month labels, January first.
pub const MONTH_LABELS: [&str; 12] = [
    "ENE", "FEB", "MAR", "ABR", "MAY", "JUN", "JUL", "AGO", "SEP", "OCT", "NOV", "DIC",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Accepts the Spanish labels used by the HTTP API plus the English ones.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "vertical" | "portrait" => Some(Self::Portrait),
            "horizontal" | "landscape" => Some(Self::Landscape),
            _ => None,
        }
    }

    pub fn css_keyword(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
        }
    }
}

/// Categorical tag carried by zones and sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Female,
    Male,
}

impl ZoneKind {
    /// Parse the single-letter code stored in the `zones.kind` column.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "F" | "f" => Some(Self::Female),
            "M" | "m" => Some(Self::Male),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Female => "F",
            Self::Male => "M",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Female => "Femenino",
            Self::Male => "Masculino",
        }
    }
}

/// Credentials forwarded to live sub-resources of the document.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub bearer_token: Option<String>,
    pub cookies: Vec<(String, String)>,
}

impl AuthContext {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            cookies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub date: NaiveDate,
    pub output_dir: PathBuf,
    pub orientation: Orientation,
    pub auth: Option<AuthContext>,
    pub base_url: Option<String>,
    /// Compose only the header and the annual distribution charts.
    pub only_charts: bool,
}

impl ReportRequest {
    pub fn new(date: NaiveDate, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            date,
            output_dir: output_dir.into(),
            orientation: Orientation::Portrait,
            auth: None,
            base_url: None,
            only_charts: false,
        }
    }
}

/// Surface area for one period, in square meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaPeriod {
    pub female_zone_area: f64,
    pub male_zone_area: f64,
    pub total_area: f64,
}

impl AreaPeriod {
    pub fn new(female_zone_area: f64, male_zone_area: f64) -> Self {
        Self {
            female_zone_area,
            male_zone_area,
            total_area: female_zone_area + male_zone_area,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceAreaAggregate {
    pub first_fortnight: AreaPeriod,
    pub second_fortnight: AreaPeriod,
    pub previous_month: AreaPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySeriesPoint {
    pub month_label: String,
    pub actual_value: f64,
    pub budget_value: f64,
    pub actual_accumulated: f64,
    pub budget_accumulated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageAccumulatedReport {
    pub series: Vec<MonthlySeriesPoint>,
    pub total_actual: f64,
    pub total_budget: f64,
    pub total_prior_year: f64,
    pub year_over_year_variation_pct: f64,
}

impl Default for DamageAccumulatedReport {
    fn default() -> Self {
        Self {
            series: accumulate_series(&[0.0; 12], &[0.0; 12]),
            total_actual: 0.0,
            total_budget: 0.0,
            total_prior_year: 0.0,
            year_over_year_variation_pct: 0.0,
        }
    }
}

impl DamageAccumulatedReport {
    pub fn from_monthly(actual: &[f64; 12], budget: &[f64; 12], total_prior_year: f64) -> Self {
        let series = accumulate_series(actual, budget);
        let total_actual = series.last().map(|p| p.actual_accumulated).unwrap_or(0.0);
        let total_budget = series.last().map(|p| p.budget_accumulated).unwrap_or(0.0);

        let year_over_year_variation_pct = if total_prior_year > 0.0 {
            let raw = (total_actual - total_prior_year) / total_prior_year * 100.0;
            (raw * 10.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            series,
            total_actual,
            total_budget,
            total_prior_year,
            year_over_year_variation_pct,
        }
    }
}

/// Running sums of two parallel monthly series, reset at January.
pub fn accumulate_series(actual: &[f64; 12], budget: &[f64; 12]) -> Vec<MonthlySeriesPoint> {
    let mut actual_accumulated = 0.0;
    let mut budget_accumulated = 0.0;

    MONTH_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            // Negative amounts would break monotonicity of the running sum.
            let actual_value = actual[i].max(0.0);
            let budget_value = budget[i].max(0.0);
            actual_accumulated += actual_value;
            budget_accumulated += budget_value;
            MonthlySeriesPoint {
                month_label: label.to_string(),
                actual_value,
                budget_value,
                actual_accumulated,
                budget_accumulated,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProjection {
    pub annual_goal: i64,
    pub monthly_goal: i64,
    pub actual_annual_so_far: i64,
    pub actual_monthly_average: i64,
    pub fulfillment_pct: i64,
    pub months_with_data: u32,
    pub prior_year_total: i64,
    pub reduction_target_pct: f64,
}

impl GoalProjection {
    pub fn compute(
        prior_year_total: i64,
        actual_annual_so_far: i64,
        months_with_data: u32,
        reduction_target_pct: f64,
    ) -> Self {
        let annual_goal =
            (prior_year_total as f64 * (1.0 - reduction_target_pct / 100.0)).round() as i64;
        let monthly_goal = (annual_goal as f64 / 12.0).round() as i64;

        // Judged against the goal for the elapsed months only.
        let expected_so_far = monthly_goal * i64::from(months_with_data);
        let fulfillment_pct = if expected_so_far > 0 {
            (actual_annual_so_far as f64 / expected_so_far as f64 * 100.0).round() as i64
        } else {
            0
        };

        let actual_monthly_average = if months_with_data > 0 {
            (actual_annual_so_far as f64 / f64::from(months_with_data)).round() as i64
        } else {
            0
        };

        Self {
            annual_goal,
            monthly_goal,
            actual_annual_so_far,
            actual_monthly_average,
            fulfillment_pct,
            months_with_data,
            prior_year_total,
            reduction_target_pct,
        }
    }

    /// Progress against the full-year goal, shown in the legacy section.
    pub fn legacy_fulfillment_pct(&self) -> i64 {
        if self.annual_goal > 0 {
            (self.actual_annual_so_far as f64 / self.annual_goal as f64 * 100.0).round() as i64
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CategoryShare {
    pub total: i64,
    pub pct: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTypeBreakdown {
    pub month_label: String,
    pub female: i64,
    pub male: i64,
    pub total: i64,
    pub has_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDistribution {
    pub female: CategoryShare,
    pub male: CategoryShare,
    pub annual_total: i64,
    pub monthly_breakdown: Vec<MonthlyTypeBreakdown>,
}

impl Default for TypeDistribution {
    fn default() -> Self {
        Self::from_monthly(&[0; 12], &[0; 12])
    }
}

impl TypeDistribution {
    pub fn from_monthly(female: &[i64; 12], male: &[i64; 12]) -> Self {
        let monthly_breakdown: Vec<MonthlyTypeBreakdown> = MONTH_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let f = female[i].max(0);
                let m = male[i].max(0);
                MonthlyTypeBreakdown {
                    month_label: label.to_string(),
                    female: f,
                    male: m,
                    total: f + m,
                    has_data: f + m > 0,
                }
            })
            .collect();

        let female_total: i64 = monthly_breakdown.iter().map(|m| m.female).sum();
        let male_total: i64 = monthly_breakdown.iter().map(|m| m.male).sum();
        let annual_total = female_total + male_total;

        Self {
            female: CategoryShare {
                total: female_total,
                pct: share_pct(female_total, annual_total),
            },
            male: CategoryShare {
                total: male_total,
                pct: share_pct(male_total, annual_total),
            },
            annual_total,
            monthly_breakdown,
        }
    }
}

fn share_pct(part: i64, total: i64) -> i64 {
    if total > 0 {
        (part as f64 / total as f64 * 100.0).round() as i64
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRow {
    pub name: String,
    pub damage_count: i64,
    pub affected_order_count: i64,
    pub months_with_damage: Option<u32>,
}

pub type EntityBreakdown = Vec<EntityRow>;

/// Sorts descending by damage count (ties by name) and keeps at most `limit` rows.
pub fn rank_entities(mut rows: Vec<EntityRow>, limit: Option<usize>) -> EntityBreakdown {
    rows.sort_by(|a, b| {
        b.damage_count
            .cmp(&a.damage_count)
            .then_with(|| a.name.cmp(&b.name))
    });
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ZoneBreakdowns {
    pub consolidated: EntityBreakdown,
    pub female: EntityBreakdown,
    pub male: EntityBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Synthetic,
}

/// A metric that fell back to its zero-valued default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedMetric {
    pub metric: String,
    pub reason: String,
}

/// Everything the document needs for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub date: NaiveDate,
    pub year: i32,
    pub origin: DataOrigin,
    pub surface_area: SurfaceAreaAggregate,
    pub damage: DamageAccumulatedReport,
    pub goal: GoalProjection,
    pub distribution: TypeDistribution,
    pub operators: EntityBreakdown,
    pub zones: ZoneBreakdowns,
    pub degraded: Vec<DegradedMetric>,
}

/// The pipeline's terminal artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedReport {
    pub file_path: PathBuf,
    pub byte_size: u64,
    pub duration_ms: u64,
}

impl RenderedReport {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_projection_with_prior_year() {
        let goal = GoalProjection::compute(1000, 300, 4, 5.0);
        assert_eq!(goal.annual_goal, 950);
        assert_eq!(goal.monthly_goal, 79);
        // 300 / (79 * 4) = 94.9%
        assert_eq!(goal.fulfillment_pct, 95);
        assert_eq!(goal.actual_monthly_average, 75);
    }

    #[test]
    fn test_goal_projection_without_prior_year() {
        let goal = GoalProjection::compute(0, 42, 3, 5.0);
        assert_eq!(goal.annual_goal, 0);
        assert_eq!(goal.monthly_goal, 0);
        assert_eq!(goal.fulfillment_pct, 0);
        assert_eq!(goal.legacy_fulfillment_pct(), 0);
    }

    #[test]
    fn test_goal_projection_without_months() {
        let goal = GoalProjection::compute(1200, 0, 0, 5.0);
        assert_eq!(goal.fulfillment_pct, 0);
        assert_eq!(goal.actual_monthly_average, 0);
    }

    #[test]
    fn test_accumulated_series_is_running_sum() {
        let mut actual = [0.0; 12];
        actual[0] = 10.0;
        actual[1] = 5.0;
        actual[5] = 2.5;
        let series = accumulate_series(&actual, &[1.0; 12]);

        assert_eq!(series.len(), 12);
        assert_eq!(series[0].actual_accumulated, series[0].actual_value);
        for i in 1..12 {
            assert_eq!(
                series[i].actual_accumulated,
                series[i - 1].actual_accumulated + series[i].actual_value
            );
            assert!(series[i].actual_accumulated >= series[i - 1].actual_accumulated);
        }
        assert_eq!(series[11].actual_accumulated, 17.5);
        assert_eq!(series[11].budget_accumulated, 12.0);
        assert_eq!(series[3].month_label, "ABR");
    }

    #[test]
    fn test_damage_report_totals_and_variation() {
        let report = DamageAccumulatedReport::from_monthly(&[100.0; 12], &[90.0; 12], 1000.0);
        assert_eq!(report.total_actual, report.series[11].actual_accumulated);
        assert_eq!(report.total_actual, 1200.0);
        assert_eq!(report.total_budget, 1080.0);
        assert_eq!(report.year_over_year_variation_pct, 20.0);

        let no_prior = DamageAccumulatedReport::from_monthly(&[1.0; 12], &[0.0; 12], 0.0);
        assert_eq!(no_prior.year_over_year_variation_pct, 0.0);
    }

    #[test]
    fn test_type_distribution_shares() {
        let mut female = [0; 12];
        let mut male = [0; 12];
        female[0] = 1;
        male[0] = 1;
        male[1] = 1;
        let dist = TypeDistribution::from_monthly(&female, &male);

        assert_eq!(dist.annual_total, dist.female.total + dist.male.total);
        assert_eq!(dist.female.pct, 33);
        assert_eq!(dist.male.pct, 67);
        assert!(dist.monthly_breakdown[0].has_data);
        assert!(!dist.monthly_breakdown[2].has_data);
    }

    #[test]
    fn test_type_distribution_rounding_tolerance() {
        // Three equal thirds round to 33 + 33, but two categories always sum within 99..=101.
        for f in 0..50 {
            for m in 0..50 {
                let mut female = [0; 12];
                let mut male = [0; 12];
                female[6] = f;
                male[6] = m;
                let dist = TypeDistribution::from_monthly(&female, &male);
                let sum = dist.female.pct + dist.male.pct;
                if dist.annual_total == 0 {
                    assert_eq!(sum, 0);
                } else {
                    assert!((99..=101).contains(&sum), "f={f} m={m} sum={sum}");
                }
            }
        }
    }

    #[test]
    fn test_rank_entities_sorts_and_caps() {
        let rows = vec![
            EntityRow {
                name: "B".into(),
                damage_count: 3,
                affected_order_count: 1,
                months_with_damage: None,
            },
            EntityRow {
                name: "A".into(),
                damage_count: 3,
                affected_order_count: 2,
                months_with_damage: None,
            },
            EntityRow {
                name: "C".into(),
                damage_count: 9,
                affected_order_count: 4,
                months_with_damage: None,
            },
        ];
        let ranked = rank_entities(rows, Some(2));
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "C");
        assert_eq!(ranked[1].name, "A");
    }

    #[test]
    fn test_orientation_labels() {
        assert_eq!(Orientation::from_label("Horizontal"), Some(Orientation::Landscape));
        assert_eq!(Orientation::from_label("vertical"), Some(Orientation::Portrait));
        assert_eq!(Orientation::from_label("diagonal"), None);
    }
}
