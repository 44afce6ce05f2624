//! Printable HTML document for the daily report.
//!
//! Pure templating: every value arrives already aggregated. The document
//! carries the content anchor (`#report-content`) and sets the readiness flag
//! the renderer probes before printing.

use chrono::NaiveDateTime;
use super::chart::ChartMarkup;
use super::format::{
    escape_html, format_area, format_currency, format_long_date, format_number, format_pct,
    format_pct_int,
};
use super::models::{AreaPeriod, DataOrigin, EntityBreakdown, ReportData};

pub const CONTENT_ANCHOR_ID: &str = "report-content";
pub const READY_ATTRIBUTE: &str = "data-report-ready";

const STYLE: &str = r#"
body { font-family: "DejaVu Sans", Arial, sans-serif; color: #212529; font-size: 11px; margin: 0; }
header { border-bottom: 3px solid #1c7ed6; margin-bottom: 12px; padding-bottom: 6px; }
header h1 { font-size: 20px; margin: 0; }
header .date { font-size: 13px; color: #495057; }
header .generated { font-size: 9px; color: #868e96; }
header .logo { float: right; max-height: 40px; }
section { margin-bottom: 16px; page-break-inside: avoid; }
h2 { font-size: 14px; color: #1c7ed6; border-bottom: 1px solid #dee2e6; padding-bottom: 2px; }
table { width: 100%; border-collapse: collapse; margin-top: 4px; }
th, td { border: 1px solid #dee2e6; padding: 3px 6px; }
th { background: #f1f3f5; text-align: left; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
tr.total td { font-weight: bold; background: #f8f9fa; }
tr.no-data td { color: #adb5bd; }
.notice { background: #fff3bf; border: 1px solid #fcc419; padding: 6px 8px; margin-bottom: 10px; }
.kpis { display: flex; gap: 12px; }
.kpi { flex: 1; border: 1px solid #dee2e6; padding: 6px; }
.kpi .value { font-size: 16px; font-weight: bold; }
.charts { display: flex; gap: 16px; align-items: flex-start; flex-wrap: wrap; }
.empty-row td { text-align: center; color: #868e96; }
"#;

/// Panel logo, relative to the panel origin. Served behind the panel's auth.
pub const PANEL_LOGO_PATH: &str = "/assets/logo.png";

#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// Only the header and the annual distribution charts.
    pub only_charts: bool,
    pub generated_at: Option<NaiveDateTime>,
    /// Header logo, usually [`PANEL_LOGO_PATH`] resolved against the panel base URL.
    pub logo_src: Option<String>,
}

pub fn compose(data: &ReportData, charts: &ChartMarkup, options: &ComposeOptions) -> String {
    let mut html = String::with_capacity(64 * 1024);
    html.push_str("<!DOCTYPE html><html lang=\"es\"><head><meta charset=\"utf-8\">");
    html.push_str(&format!(
        "<title>Reporte de daños {}</title>",
        data.date.format("%Y-%m-%d")
    ));
    html.push_str("<style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body>");
    html.push_str(&format!(r#"<main id="{CONTENT_ANCHOR_ID}">"#));

    write_header(&mut html, data, options);

    if options.only_charts {
        write_distribution(&mut html, data, charts);
    } else {
        write_surface_area(&mut html, data);
        write_damage_accumulated(&mut html, data);
        write_goal(&mut html, data);
        write_distribution(&mut html, data, charts);
        write_legacy_goal(&mut html, data);
        write_entity_table(
            &mut html,
            "Daños por operador",
            "Operador",
            &data.operators,
            false,
        );
        write_entity_table(
            &mut html,
            "Daños por zona (consolidado)",
            "Zona",
            &data.zones.consolidated,
            true,
        );
        write_entity_table(
            &mut html,
            "Daños por zona - Femenino",
            "Zona",
            &data.zones.female,
            true,
        );
        write_entity_table(
            &mut html,
            "Daños por zona - Masculino",
            "Zona",
            &data.zones.male,
            true,
        );
    }

    html.push_str("</main>");
    html.push_str(&format!(
        "<script>window.reportReady = true; document.body.setAttribute('{READY_ATTRIBUTE}', 'true');</script>"
    ));
    html.push_str("</body></html>");
    html
}

fn write_header(html: &mut String, data: &ReportData, options: &ComposeOptions) {
    html.push_str("<header>");
    if let Some(src) = &options.logo_src {
        html.push_str(&format!(
            r#"<img class="logo" src="{}" alt="Logo">"#,
            escape_html(src)
        ));
    }
    html.push_str("<h1>Reporte diario de daños</h1>");
    html.push_str(&format!(
        r#"<div class="date">{}</div>"#,
        escape_html(&format_long_date(data.date))
    ));
    if let Some(generated_at) = options.generated_at {
        html.push_str(&format!(
            r#"<div class="generated">Generado el {}</div>"#,
            generated_at.format("%d-%m-%Y %H:%M")
        ));
    }
    html.push_str("</header>");

    if data.origin == DataOrigin::Synthetic {
        html.push_str(
            r#"<div class="notice">Los datos no pudieron obtenerse. Este documento contiene valores de referencia y no refleja la operación real.</div>"#,
        );
    } else if !data.degraded.is_empty() {
        let names: Vec<String> = data
            .degraded
            .iter()
            .map(|d| escape_html(metric_title(&d.metric)))
            .collect();
        html.push_str(&format!(
            r#"<div class="notice">Algunas métricas no pudieron calcularse y se muestran en cero: {}.</div>"#,
            names.join(", ")
        ));
    }
}

/// Section title shown to readers for an aggregate identifier.
fn metric_title(metric: &str) -> &str {
    match metric {
        "surface_area" => "Superficie por quincena",
        "damage_accumulated" => "Daños acumulados",
        "goal_projection" => "Meta y proyección",
        "type_distribution" => "Distribución anual por tipo de zona",
        "operators" => "Daños por operador",
        "zones_consolidated" => "Daños por zona (consolidado)",
        "zones_female" => "Daños por zona - Femenino",
        "zones_male" => "Daños por zona - Masculino",
        other => other,
    }
}

fn area_row(html: &mut String, label: &str, period: &AreaPeriod) {
    html.push_str(&format!(
        r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td></tr>"#,
        label,
        format_area(period.female_zone_area),
        format_area(period.male_zone_area),
        format_area(period.total_area)
    ));
}

fn write_surface_area(html: &mut String, data: &ReportData) {
    html.push_str(r#"<section id="surface-area"><h2>Superficie por quincena</h2><table>"#);
    html.push_str("<tr><th>Periodo</th><th>Zonas femeninas</th><th>Zonas masculinas</th><th>Total</th></tr>");
    let area = &data.surface_area;
    area_row(html, "Primera quincena", &area.first_fortnight);
    area_row(html, "Segunda quincena", &area.second_fortnight);
    area_row(html, "Mes anterior", &area.previous_month);
    html.push_str("</table></section>");
}

fn write_damage_accumulated(html: &mut String, data: &ReportData) {
    let damage = &data.damage;
    html.push_str(r#"<section id="damage-accumulated"><h2>Daños acumulados</h2>"#);
    html.push_str(&format!(
        r#"<div class="kpis"><div class="kpi"><div>Total real</div><div class="value">{}</div></div><div class="kpi"><div>Presupuesto</div><div class="value">{}</div></div><div class="kpi"><div>Año anterior</div><div class="value">{}</div></div><div class="kpi"><div>Variación anual</div><div class="value">{}</div></div></div>"#,
        format_currency(damage.total_actual),
        format_currency(damage.total_budget),
        format_currency(damage.total_prior_year),
        format_pct(damage.year_over_year_variation_pct)
    ));
    html.push_str("<table><tr><th>Mes</th><th>Real</th><th>Presupuesto</th><th>Real acumulado</th><th>Presupuesto acumulado</th></tr>");
    for point in &damage.series {
        html.push_str(&format!(
            r#"<tr><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td></tr>"#,
            escape_html(&point.month_label),
            format_currency(point.actual_value),
            format_currency(point.budget_value),
            format_currency(point.actual_accumulated),
            format_currency(point.budget_accumulated)
        ));
    }
    html.push_str(&format!(
        r#"<tr class="total"><td>Total</td><td class="num">{}</td><td class="num">{}</td><td></td><td></td></tr>"#,
        format_currency(damage.total_actual),
        format_currency(damage.total_budget)
    ));
    html.push_str("</table></section>");
}

fn write_goal(html: &mut String, data: &ReportData) {
    let goal = &data.goal;
    html.push_str(r#"<section id="goal-projection"><h2>Meta y proyección</h2><table>"#);
    let rows = [
        ("Total año anterior", format_number(goal.prior_year_total)),
        (
            "Meta de reducción",
            format_pct(goal.reduction_target_pct),
        ),
        ("Meta anual", format_number(goal.annual_goal)),
        ("Meta mensual", format_number(goal.monthly_goal)),
        ("Real acumulado del año", format_number(goal.actual_annual_so_far)),
        ("Meses con registros", goal.months_with_data.to_string()),
        ("Promedio mensual real", format_number(goal.actual_monthly_average)),
        ("Cumplimiento a la fecha", format_pct_int(goal.fulfillment_pct)),
    ];
    for (label, value) in rows {
        html.push_str(&format!(r#"<tr><th>{label}</th><td class="num">{value}</td></tr>"#));
    }
    html.push_str("</table></section>");
}

fn write_distribution(html: &mut String, data: &ReportData, charts: &ChartMarkup) {
    let dist = &data.distribution;
    html.push_str(r#"<section id="annual-distribution"><h2>Distribución anual por tipo de zona</h2>"#);
    html.push_str(&format!(
        r#"<div class="charts"><div class="chart-donut-wrap">{}</div><div class="chart-bars-wrap">{}</div></div>"#,
        charts.donut, charts.bars
    ));
    html.push_str("<table><tr><th>Mes</th><th>Femenino</th><th>Masculino</th><th>Total</th></tr>");
    for month in &dist.monthly_breakdown {
        let class = if month.has_data { "" } else { r#" class="no-data""# };
        html.push_str(&format!(
            r#"<tr{class}><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num">{}</td></tr>"#,
            escape_html(&month.month_label),
            format_number(month.female),
            format_number(month.male),
            format_number(month.total)
        ));
    }
    html.push_str(&format!(
        r#"<tr class="total"><td>Total</td><td class="num">{} ({})</td><td class="num">{} ({})</td><td class="num">{}</td></tr>"#,
        format_number(dist.female.total),
        format_pct_int(dist.female.pct),
        format_number(dist.male.total),
        format_pct_int(dist.male.pct),
        format_number(dist.annual_total)
    ));
    html.push_str("</table></section>");
}

fn write_legacy_goal(html: &mut String, data: &ReportData) {
    let goal = &data.goal;
    html.push_str(r#"<section id="legacy-goal"><h2>Meta anual (formato anterior)</h2><table>"#);
    html.push_str(&format!(
        r#"<tr><th>Meta anual</th><td class="num">{}</td></tr><tr><th>Real acumulado</th><td class="num">{}</td></tr><tr><th>Avance sobre meta anual</th><td class="num">{}</td></tr>"#,
        format_number(goal.annual_goal),
        format_number(goal.actual_annual_so_far),
        format_pct_int(goal.legacy_fulfillment_pct())
    ));
    html.push_str("</table></section>");
}

fn write_entity_table(
    html: &mut String,
    title: &str,
    name_header: &str,
    rows: &EntityBreakdown,
    with_months: bool,
) {
    html.push_str(&format!("<section><h2>{}</h2><table><tr><th>#</th><th>{}</th><th>Daños</th><th>Órdenes afectadas</th>", escape_html(title), escape_html(name_header)));
    if with_months {
        html.push_str("<th>Meses con daños</th>");
    }
    html.push_str("</tr>");

    if rows.is_empty() {
        let span = if with_months { 5 } else { 4 };
        html.push_str(&format!(
            r#"<tr class="empty-row"><td colspan="{span}">Sin registros</td></tr>"#
        ));
    }

    for (i, row) in rows.iter().enumerate() {
        html.push_str(&format!(
            r#"<tr><td class="num">{}</td><td>{}</td><td class="num">{}</td><td class="num">{}</td>"#,
            i + 1,
            escape_html(&row.name),
            format_number(row.damage_count),
            format_number(row.affected_order_count)
        ));
        if with_months {
            html.push_str(&format!(
                r#"<td class="num">{}</td>"#,
                row.months_with_damage.unwrap_or(0)
            ));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table></section>");
}
