//! Annual female/male distribution as a donut chart.

use super::geometry::DonutGeometry;
use super::{empty_state, FEMALE_COLOR, MALE_COLOR};
use crate::report::format::{escape_html, format_number, format_pct_int};
use crate::report::models::TypeDistribution;

const SIZE: f64 = 240.0;
const RADIUS: f64 = 100.0;
const INNER_RADIUS: f64 = 58.0;
const LEGEND_HEIGHT: f64 = 56.0;

pub fn donut_geometry(distribution: &TypeDistribution) -> Option<DonutGeometry> {
    DonutGeometry::for_values(
        &[distribution.female.total as f64, distribution.male.total as f64],
        SIZE / 2.0,
        SIZE / 2.0,
        RADIUS,
        INNER_RADIUS,
    )
}

pub fn render_donut(distribution: &TypeDistribution) -> String {
    let geometry = match donut_geometry(distribution) {
        Some(g) if distribution.annual_total > 0 => g,
        _ => return empty_state(SIZE, SIZE + LEGEND_HEIGHT, "Sin daños registrados en el año"),
    };

    let categories = [
        ("Femenino", FEMALE_COLOR, distribution.female.total, distribution.female.pct),
        ("Masculino", MALE_COLOR, distribution.male.total, distribution.male.pct),
    ];

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="chart chart-donut" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = SIZE,
        h = SIZE + LEGEND_HEIGHT
    ));

    for (slice, (label, color, total, _)) in geometry.slice_angles.iter().zip(categories.iter()) {
        if slice.sweep() <= super::geometry::ANGLE_EPSILON {
            continue;
        }
        if slice.is_full_circle() {
            // A single arc cannot start and end on the same point.
            svg.push_str(&format!(
                r#"<circle class="slice" cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"><title>{}: {}</title></circle>"#,
                geometry.center_x,
                geometry.center_y,
                geometry.radius,
                color,
                escape_html(label),
                format_number(*total)
            ));
        } else {
            svg.push_str(&format!(
                r##"<path class="slice" d="{}" fill="{}" stroke="#ffffff" stroke-width="1"><title>{}: {}</title></path>"##,
                geometry.sector_path(slice),
                color,
                escape_html(label),
                format_number(*total)
            ));
        }
    }

    // The hole that turns the pie into a ring.
    svg.push_str(&format!(
        r##"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="#ffffff"/>"##,
        geometry.center_x, geometry.center_y, geometry.inner_radius
    ));
    svg.push_str(&format!(
        r##"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-size="22" font-weight="bold" fill="#212529">{}</text>"##,
        geometry.center_x,
        geometry.center_y + 4.0,
        format_number(distribution.annual_total)
    ));
    svg.push_str(&format!(
        r##"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-size="11" fill="#6c757d">daños</text>"##,
        geometry.center_x,
        geometry.center_y + 20.0
    ));

    for (slice, (_, _, _, pct)) in geometry.slice_angles.iter().zip(categories.iter()) {
        if slice.sweep() < 18.0 {
            continue;
        }
        let anchor = geometry.label_anchor(slice);
        svg.push_str(&format!(
            r##"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-size="12" font-weight="bold" fill="#ffffff">{}</text>"##,
            anchor.x,
            anchor.y + 4.0,
            format_pct_int(*pct)
        ));
    }

    for (i, (label, color, total, pct)) in categories.iter().enumerate() {
        let y = SIZE + 14.0 + i as f64 * 20.0;
        svg.push_str(&format!(
            r##"<rect x="40" y="{:.2}" width="12" height="12" fill="{}"/><text x="58" y="{:.2}" font-size="12" fill="#212529">{}: {} ({})</text>"##,
            y - 10.0,
            color,
            y,
            escape_html(label),
            format_number(*total),
            format_pct_int(*pct)
        ));
    }

    svg.push_str("</svg>");
    svg
}
