//! Geometry shared by the chart renderers.
//!
//! Angles are in degrees measured clockwise from 12 o'clock; conversion to
//! screen coordinates subtracts 90° so angle 0 lands at the top of the circle.

use serde::Serialize;

/// Slices narrower than this are treated as empty.
pub const ANGLE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

pub fn polar_to_cartesian(center_x: f64, center_y: f64, radius: f64, angle_deg: f64) -> Point {
    let radians = (angle_deg - 90.0).to_radians();
    Point {
        x: center_x + radius * radians.cos(),
        y: center_y + radius * radians.sin(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SliceAngle {
    pub start: f64,
    pub end: f64,
}

impl SliceAngle {
    pub fn sweep(&self) -> f64 {
        self.end - self.start
    }

    /// 1 iff the slice spans more than half the circle.
    pub fn large_arc_flag(&self) -> u8 {
        if self.sweep() > 180.0 {
            1
        } else {
            0
        }
    }

    pub fn is_full_circle(&self) -> bool {
        self.sweep() >= 360.0 - ANGLE_EPSILON
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonutGeometry {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    pub inner_radius: f64,
    pub slice_angles: Vec<SliceAngle>,
}

impl DonutGeometry {
    /// Lays the values out clockwise from the top. `None` when nothing is positive.
    pub fn for_values(
        values: &[f64],
        center_x: f64,
        center_y: f64,
        radius: f64,
        inner_radius: f64,
    ) -> Option<Self> {
        let total: f64 = values.iter().filter(|v| v.is_finite() && **v > 0.0).sum();
        if total <= 0.0 {
            return None;
        }

        let mut cursor = 0.0;
        let slice_angles = values
            .iter()
            .map(|v| {
                let share = if v.is_finite() && *v > 0.0 { v / total } else { 0.0 };
                let slice = SliceAngle {
                    start: cursor,
                    end: cursor + share * 360.0,
                };
                cursor = slice.end;
                slice
            })
            .collect();

        Some(Self {
            center_x,
            center_y,
            radius,
            inner_radius,
            slice_angles,
        })
    }

    /// Closed circular-sector path for one slice.
    pub fn sector_path(&self, slice: &SliceAngle) -> String {
        let start = polar_to_cartesian(self.center_x, self.center_y, self.radius, slice.start);
        let end = polar_to_cartesian(self.center_x, self.center_y, self.radius, slice.end);
        format!(
            "M {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 {} 1 {:.2} {:.2} Z",
            self.center_x,
            self.center_y,
            start.x,
            start.y,
            self.radius,
            self.radius,
            slice.large_arc_flag(),
            end.x,
            end.y
        )
    }

    /// Point halfway along the slice, between the inner and outer radius.
    pub fn label_anchor(&self, slice: &SliceAngle) -> Point {
        let mid = slice.start + slice.sweep() / 2.0;
        let r = (self.radius + self.inner_radius) / 2.0;
        polar_to_cartesian(self.center_x, self.center_y, r, mid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarGeometry {
    pub chart_width: f64,
    pub chart_height: f64,
    pub margins: Margins,
    pub per_month_slot_width: f64,
    pub bar_width: f64,
    pub bar_gap: f64,
    pub max_value: f64,
}

impl BarGeometry {
    /// Two bars per slot, each `slot / 2 - gap` wide.
    pub fn new(
        chart_width: f64,
        chart_height: f64,
        margins: Margins,
        slots: usize,
        bar_gap: f64,
        max_value: f64,
    ) -> Self {
        let plot_width = (chart_width - margins.left - margins.right).max(0.0);
        let per_month_slot_width = if slots > 0 { plot_width / slots as f64 } else { 0.0 };
        let bar_width = (per_month_slot_width / 2.0 - bar_gap).max(0.0);

        Self {
            chart_width,
            chart_height,
            margins,
            per_month_slot_width,
            bar_width,
            bar_gap,
            max_value,
        }
    }

    pub fn plot_width(&self) -> f64 {
        (self.chart_width - self.margins.left - self.margins.right).max(0.0)
    }

    pub fn plot_height(&self) -> f64 {
        (self.chart_height - self.margins.top - self.margins.bottom).max(0.0)
    }

    pub fn baseline_y(&self) -> f64 {
        self.margins.top + self.plot_height()
    }

    /// Height proportional to `max_value`, clamped into the plot area.
    pub fn bar_height(&self, value: f64) -> f64 {
        if self.max_value <= 0.0 || !value.is_finite() {
            return 0.0;
        }
        (value / self.max_value).clamp(0.0, 1.0) * self.plot_height()
    }

    pub fn slot_x(&self, slot: usize) -> f64 {
        self.margins.left + slot as f64 * self.per_month_slot_width
    }

    /// Left edge of bar `series` (0 or 1) inside `slot`.
    pub fn bar_x(&self, slot: usize, series: usize) -> f64 {
        self.slot_x(slot) + series as f64 * (self.per_month_slot_width / 2.0) + self.bar_gap / 2.0
    }

    /// `(y, value)` for `divisions + 1` gridlines from the top (max) down to the baseline (0).
    pub fn gridlines(&self, divisions: usize) -> Vec<(f64, f64)> {
        if divisions == 0 {
            return Vec::new();
        }
        (0..=divisions)
            .map(|i| {
                let fraction = i as f64 / divisions as f64;
                let y = self.margins.top + fraction * self.plot_height();
                let value = self.max_value * (1.0 - fraction);
                (y, value)
            })
            .collect()
    }
}
