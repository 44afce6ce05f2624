//! Chart renderers - deterministic SVG markup, no I/O.
//!
//! - `donut` - annual female/male distribution
//! - `bars` - monthly female/male breakdown as grouped bars
//! - `geometry` - angle, sector and bar layout math shared by both

pub mod bars;
pub mod donut;
pub mod geometry;

pub use bars::render_grouped_bars;
pub use donut::render_donut;

use crate::report::format::escape_html;
use crate::report::models::ReportData;

pub const FEMALE_COLOR: &str = "#d6336c";
pub const MALE_COLOR: &str = "#1c7ed6";

/// SVG markup for both charts of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartMarkup {
    pub donut: String,
    pub bars: String,
}

pub fn render_charts(data: &ReportData) -> ChartMarkup {
    ChartMarkup {
        donut: render_donut(&data.distribution),
        bars: render_grouped_bars(&data.distribution.monthly_breakdown),
    }
}

/// Placeholder drawn when a chart has nothing to show.
pub fn empty_state(width: f64, height: f64, message: &str) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" class="chart chart-empty" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect x="0.5" y="0.5" width="{iw}" height="{ih}" fill="#f8f9fa" stroke="#ced4da" stroke-dasharray="4 3"/><text x="{cx}" y="{cy}" text-anchor="middle" font-size="13" fill="#6c757d">{msg}</text></svg>"##,
        w = width,
        h = height,
        iw = width - 1.0,
        ih = height - 1.0,
        cx = width / 2.0,
        cy = height / 2.0,
        msg = escape_html(message)
    )
}
