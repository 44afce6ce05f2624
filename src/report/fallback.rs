//! Placeholder dataset used when the aggregation stage fails as a whole.
//!
//! Values are random but seeded from the date, so the degraded path renders
//! the same document for the same day.

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::models::{
    rank_entities, AreaPeriod, DamageAccumulatedReport, DataOrigin, DegradedMetric, EntityRow,
    GoalProjection, ReportData, SurfaceAreaAggregate, TypeDistribution, ZoneBreakdowns,
};

const SYNTHETIC_ZONES: [(&str, bool); 6] = [
    ("Sector Norte", true),
    ("Sector Sur", false),
    ("Bodega Central", true),
    ("Patio de Maniobras", false),
    ("Andén 3", true),
    ("Taller Mecánico", false),
];

pub fn synthetic_report_data(date: NaiveDate, reduction_target_pct: f64, reason: &str) -> ReportData {
    let mut rng = StdRng::seed_from_u64(date.num_days_from_ce() as u64);
    let through = date.month() as usize;

    let mut area = || AreaPeriod::new(rng.gen_range(500.0..5000.0_f64).round(), rng.gen_range(500.0..5000.0_f64).round());
    let surface_area = SurfaceAreaAggregate {
        first_fortnight: area(),
        second_fortnight: area(),
        previous_month: area(),
    };

    let mut actual = [0.0; 12];
    let mut budget = [0.0; 12];
    let mut prior_total = 0.0;
    for month in 0..12 {
        if month < through {
            actual[month] = rng.gen_range(100_000..2_000_000) as f64;
        }
        budget[month] = rng.gen_range(900_000..1_500_000) as f64;
        prior_total += rng.gen_range(100_000..2_000_000) as f64;
    }
    let damage = DamageAccumulatedReport::from_monthly(&actual, &budget, prior_total);

    let mut female = [0_i64; 12];
    let mut male = [0_i64; 12];
    for month in 0..through {
        female[month] = rng.gen_range(0..40);
        male[month] = rng.gen_range(0..40);
    }
    let distribution = TypeDistribution::from_monthly(&female, &male);

    let so_far: i64 = (0..through).map(|m| female[m] + male[m]).sum();
    let months_with_data = (0..through).filter(|m| female[*m] + male[*m] > 0).count() as u32;
    let goal = GoalProjection::compute(
        rng.gen_range(300..900),
        so_far,
        months_with_data,
        reduction_target_pct,
    );

    let operators = rank_entities(
        (1..=12)
            .map(|i| {
                let damage_count = rng.gen_range(0..30);
                EntityRow {
                    name: format!("Operador {i:02}"),
                    damage_count,
                    affected_order_count: (damage_count / 2).max(0),
                    months_with_damage: None,
                }
            })
            .collect(),
        Some(10),
    );

    let zone_rows: Vec<(EntityRow, bool)> = SYNTHETIC_ZONES
        .iter()
        .map(|(name, female)| {
            let damage_count = rng.gen_range(0..50);
            (
                EntityRow {
                    name: name.to_string(),
                    damage_count,
                    affected_order_count: damage_count / 3,
                    months_with_damage: Some(rng.gen_range(0..=through as u32)),
                },
                *female,
            )
        })
        .collect();
    let pick = |female: Option<bool>| {
        rank_entities(
            zone_rows
                .iter()
                .filter(|(_, f)| female.map_or(true, |want| want == *f))
                .map(|(row, _)| row.clone())
                .collect(),
            None,
        )
    };
    let zones = ZoneBreakdowns {
        consolidated: pick(None),
        female: pick(Some(true)),
        male: pick(Some(false)),
    };

    ReportData {
        date,
        year: date.year(),
        origin: DataOrigin::Synthetic,
        surface_area,
        damage,
        goal,
        distribution,
        operators,
        zones,
        degraded: vec![DegradedMetric {
            metric: "all".to_string(),
            reason: reason.to_string(),
        }],
    }
}
