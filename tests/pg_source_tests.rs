//! Runs `PgReportDataSource` against a real Postgres.
//!
//! Set `TEST_DATABASE_URL` to enable; each run applies the migration inside a
//! throwaway schema and drops it afterwards. Without the variable the tests
//! return early.

use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use daily_damage_report::db::PgReportDataSource;
use daily_damage_report::report::models::ZoneKind;
use daily_damage_report::report::source::{
    EntityDamage, MonthlyAmount, MonthlyKindCount, ReportDataSource, ReportWindow,
};

const MIGRATION: &str = include_str!("../migrations/0001_report_schema.sql");

const SEED: &str = r#"
    INSERT INTO zones (id, name, kind) VALUES
        (1, 'Zona Norte', 'F'),
        (2, 'Zona Sur', 'M'),
        (3, 'Zona Este', 'F');
    INSERT INTO operators (id, name) VALUES (1, 'Ana'), (2, 'Luis');
    INSERT INTO surface_areas (zone_id, recorded_on, area_m2) VALUES
        (1, '2025-01-05', 100),
        (2, '2025-01-18', 50),
        (1, '2024-12-10', 80),
        (2, '2025-02-01', 999);
    INSERT INTO damages (occurred_at, zone_id, operator_id, order_number, amount) VALUES
        ('2025-01-03 08:00', 1, 1, 'OT-1', 100),
        ('2025-01-10 09:00', 1, 1, 'OT-1', 50),
        ('2025-01-20 23:30', 2, 2, 'OT-2', 25),
        ('2025-01-21 00:00', 3, 2, 'OT-3', 10),
        ('2024-12-15 10:00', 2, 1, 'OT-9', 400),
        ('2024-03-01 10:00', 3, NULL, NULL, 600);
    INSERT INTO damage_budgets (year, month, amount) VALUES
        (2025, 1, 500),
        (2025, 2, 450),
        (2024, 12, 300);
"#;

struct TestSchema {
    admin: PgPool,
    name: String,
    pool: PgPool,
}

impl TestSchema {
    async fn teardown(self) {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.name))
            .execute(&self.admin)
            .await
            .unwrap();
    }
}

async fn setup_test_schema() -> Option<TestSchema> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping Postgres adapter test");
        return None;
    };

    let admin = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to TEST_DATABASE_URL");
    let name = format!(
        "report_test_{}_{}",
        std::process::id(),
        chrono::Utc::now().timestamp_micros()
    );
    sqlx::query(&format!("CREATE SCHEMA {name}"))
        .execute(&admin)
        .await
        .unwrap();

    let search_path = format!("SET search_path TO {name}");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                sqlx::query(&search_path).execute(conn).await?;
                Ok(())
            })
        })
        .connect(&database_url)
        .await
        .unwrap();

    sqlx::raw_sql(MIGRATION).execute(&pool).await.unwrap();
    sqlx::raw_sql(SEED).execute(&pool).await.unwrap();

    Some(TestSchema { admin, name, pool })
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn by_name(mut rows: Vec<EntityDamage>) -> Vec<EntityDamage> {
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

fn entity(name: &str, damage_count: i64, affected_order_count: i64, months_with_damage: i64) -> EntityDamage {
    EntityDamage {
        name: name.to_string(),
        damage_count,
        affected_order_count,
        months_with_damage,
    }
}

#[tokio::test]
async fn test_pg_source_reads_the_migrated_schema() {
    let Some(schema) = setup_test_schema().await else {
        return;
    };
    let source = PgReportDataSource::new(schema.pool.clone());
    source.ping().await.unwrap();

    // January report: the previous month falls in the prior year.
    let areas = source
        .surface_area_records(date(2024, 12, 1), date(2025, 1, 31))
        .await
        .unwrap();
    assert_eq!(areas.len(), 3);
    assert!(areas
        .iter()
        .any(|r| r.recorded_on == date(2024, 12, 10) && r.zone_kind == ZoneKind::Female && r.area_m2 == 80.0));
    assert!(areas
        .iter()
        .any(|r| r.recorded_on == date(2025, 1, 18) && r.zone_kind == ZoneKind::Male));

    assert_eq!(
        source.monthly_damage_amounts(2025).await.unwrap(),
        vec![MonthlyAmount { month: 1, amount: 185.0 }]
    );
    assert_eq!(
        source.monthly_damage_amounts(2024).await.unwrap(),
        vec![
            MonthlyAmount { month: 3, amount: 600.0 },
            MonthlyAmount { month: 12, amount: 400.0 },
        ]
    );
    assert_eq!(
        source.monthly_budget(2025).await.unwrap(),
        vec![
            MonthlyAmount { month: 1, amount: 500.0 },
            MonthlyAmount { month: 2, amount: 450.0 },
        ]
    );

    assert_eq!(
        source.monthly_damage_counts(2025).await.unwrap(),
        vec![
            MonthlyKindCount { month: 1, zone_kind: ZoneKind::Female, count: 3 },
            MonthlyKindCount { month: 1, zone_kind: ZoneKind::Male, count: 1 },
        ]
    );
    assert_eq!(
        source.monthly_damage_counts(2024).await.unwrap(),
        vec![
            MonthlyKindCount { month: 3, zone_kind: ZoneKind::Female, count: 1 },
            MonthlyKindCount { month: 12, zone_kind: ZoneKind::Male, count: 1 },
        ]
    );

    // The window ends at midnight after Jan 20, so the Jan 21 record is out.
    let window = ReportWindow::for_date(date(2025, 1, 20));
    assert_eq!(
        by_name(source.operator_damage(&window).await.unwrap()),
        vec![entity("Ana", 2, 1, 1), entity("Luis", 1, 1, 1)]
    );
    assert_eq!(
        by_name(source.zone_damage(&window, None).await.unwrap()),
        vec![entity("Zona Norte", 2, 1, 1), entity("Zona Sur", 1, 1, 1)]
    );
    assert_eq!(
        source.zone_damage(&window, Some(ZoneKind::Female)).await.unwrap(),
        vec![entity("Zona Norte", 2, 1, 1)]
    );
    assert_eq!(
        source.zone_damage(&window, Some(ZoneKind::Male)).await.unwrap(),
        vec![entity("Zona Sur", 1, 1, 1)]
    );

    schema.teardown().await;
}

#[tokio::test]
async fn test_pg_source_empty_year_returns_no_rows() {
    let Some(schema) = setup_test_schema().await else {
        return;
    };
    let source = PgReportDataSource::new(schema.pool.clone());

    assert!(source.monthly_damage_amounts(2030).await.unwrap().is_empty());
    assert!(source.monthly_damage_counts(2030).await.unwrap().is_empty());
    assert!(source.monthly_budget(2030).await.unwrap().is_empty());
    let window = ReportWindow::for_date(date(2030, 6, 1));
    assert!(source.operator_damage(&window).await.unwrap().is_empty());
    assert!(source.zone_damage(&window, Some(ZoneKind::Male)).await.unwrap().is_empty());

    schema.teardown().await;
}
