//! Monthly female/male breakdown as a grouped bar chart.

use super::geometry::{BarGeometry, Margins};
use super::{empty_state, FEMALE_COLOR, MALE_COLOR};
use crate::report::format::{format_decimal, format_number};
use crate::report::models::MonthlyTypeBreakdown;

const CHART_WIDTH: f64 = 720.0;
const CHART_HEIGHT: f64 = 300.0;
const MARGINS: Margins = Margins {
    top: 24.0,
    right: 16.0,
    bottom: 56.0,
    left: 48.0,
};
const BAR_GAP: f64 = 2.0;
const GRID_DIVISIONS: usize = 5;
/// Height of the flat marker drawn for a zero value.
pub const ZERO_MARKER_HEIGHT: f64 = 2.0;

pub fn bar_geometry(breakdown: &[MonthlyTypeBreakdown]) -> Option<BarGeometry> {
    let max_value = breakdown
        .iter()
        .flat_map(|m| [m.female, m.male])
        .max()
        .unwrap_or(0);
    if max_value <= 0 {
        return None;
    }
    Some(BarGeometry::new(
        CHART_WIDTH,
        CHART_HEIGHT,
        MARGINS,
        breakdown.len(),
        BAR_GAP,
        max_value as f64,
    ))
}

/// Gridline positions and their labels, interpolated from the max down to 0.
/// Labels carry one decimal unless every step is a whole number.
pub fn axis_ticks(geometry: &BarGeometry) -> Vec<(f64, String)> {
    let step = geometry.max_value / GRID_DIVISIONS as f64;
    let whole_steps = step.fract() == 0.0;
    geometry
        .gridlines(GRID_DIVISIONS)
        .into_iter()
        .map(|(y, value)| {
            let label = if whole_steps {
                format_number(value.round() as i64)
            } else {
                format_decimal(value, 1)
            };
            (y, label)
        })
        .collect()
}

pub fn render_grouped_bars(breakdown: &[MonthlyTypeBreakdown]) -> String {
    let geometry = match bar_geometry(breakdown) {
        Some(g) => g,
        None => return empty_state(CHART_WIDTH, CHART_HEIGHT, "Sin daños registrados por mes"),
    };

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="chart chart-bars" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    ));

    let x0 = geometry.margins.left;
    let x1 = geometry.margins.left + geometry.plot_width();
    for (y, label) in axis_ticks(&geometry) {
        svg.push_str(&format!(
            r##"<line class="gridline" x1="{x0:.2}" y1="{y:.2}" x2="{x1:.2}" y2="{y:.2}" stroke="#dee2e6" stroke-width="1"/><text x="{:.2}" y="{:.2}" text-anchor="end" font-size="10" fill="#6c757d">{}</text>"##,
            x0 - 6.0,
            y + 3.0,
            label
        ));
    }

    let baseline = geometry.baseline_y();
    for (slot, month) in breakdown.iter().enumerate() {
        for (series, (value, color)) in [(month.female, FEMALE_COLOR), (month.male, MALE_COLOR)]
            .into_iter()
            .enumerate()
        {
            let x = geometry.bar_x(slot, series);
            if value <= 0 {
                // Flat marker keeps the slot visible and distinguishes zero from no data.
                svg.push_str(&format!(
                    r#"<rect class="bar bar-zero" x="{x:.2}" y="{:.2}" width="{:.2}" height="{ZERO_MARKER_HEIGHT:.2}" fill="{color}" opacity="0.5"/>"#,
                    baseline - ZERO_MARKER_HEIGHT,
                    geometry.bar_width
                ));
                continue;
            }

            let height = geometry.bar_height(value as f64);
            let y = baseline - height;
            svg.push_str(&format!(
                r#"<rect class="bar" x="{x:.2}" y="{y:.2}" width="{:.2}" height="{height:.2}" fill="{color}"/>"#,
                geometry.bar_width
            ));
            svg.push_str(&format!(
                r##"<text class="bar-value" x="{:.2}" y="{:.2}" text-anchor="middle" font-size="9" fill="#212529">{}</text>"##,
                x + geometry.bar_width / 2.0,
                y - 3.0,
                format_number(value)
            ));
        }

        svg.push_str(&format!(
            r##"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-size="10" fill="#495057">{}</text>"##,
            geometry.slot_x(slot) + geometry.per_month_slot_width / 2.0,
            baseline + 14.0,
            month.month_label
        ));
    }

    svg.push_str(&format!(
        r##"<line x1="{x0:.2}" y1="{baseline:.2}" x2="{x1:.2}" y2="{baseline:.2}" stroke="#495057" stroke-width="1"/>"##
    ));

    let legend_y = CHART_HEIGHT - 14.0;
    for (i, (label, color)) in [("Femenino", FEMALE_COLOR), ("Masculino", MALE_COLOR)]
        .into_iter()
        .enumerate()
    {
        let x = x0 + i as f64 * 110.0;
        svg.push_str(&format!(
            r##"<rect x="{x:.2}" y="{:.2}" width="12" height="12" fill="{color}"/><text x="{:.2}" y="{legend_y:.2}" font-size="11" fill="#212529">{label}</text>"##,
            legend_y - 10.0,
            x + 16.0
        ));
    }

    svg.push_str("</svg>");
    svg
}
