//! Radial chart geometry: time of day on the angle, glucose on the radius.
//!
//! Everything here is backend independent. [`build_polar_chart`] produces a
//! [`PolarChart`] scene in chart-centered coordinates (origin in the middle,
//! y growing downward) that a drawing backend only has to translate and stroke.
//!
//! Angle convention: 0 points up (midnight at 12 o'clock) and grows clockwise,
//! so a point at angle `a` and radius `r` sits at `(r sin a, -r cos a)`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::glucose::GlucoseReading;

pub const CHART_WIDTH: u32 = 600;
pub const CHART_HEIGHT: u32 = 600;
pub const CHART_MARGIN: f64 = 40.0;
pub const INNER_RADIUS: f64 = 50.0;
pub const GRID_CIRCLES: usize = 5;
pub const SPOKE_EVERY_HOURS: u32 = 3;
pub const LABEL_EVERY_HOURS: u32 = 6;
pub const HOURS_PER_DAY: f64 = 24.0;

pub const RADIUS_CAPTION: &str = "Glucose (mg/dL)";
pub const ANGLE_CAPTION: &str = "Time of Day";

const CARDINAL_TENSION: f64 = 0.0;
const GRID_LABEL_GAP: f64 = 5.0;

// Nice-step thresholds: sqrt(50), sqrt(10), sqrt(2).
const TICK_E10: f64 = 7.0710678118654755;
const TICK_E5: f64 = 3.1622776601683795;
const TICK_E2: f64 = std::f64::consts::SQRT_2;

/// Continuous linear map from `domain` onto `range`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Map `value`. A zero-width domain maps everything to the range midpoint.
    pub fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let span = d1 - d0;
        let t = if span.is_nan() {
            f64::NAN
        } else if span == 0.0 {
            0.5
        } else {
            (value - d0) / span
        };
        let (r0, r1) = self.range;
        r0 * (1.0 - t) + r1 * t
    }

    /// Roughly `count` round values spanning the domain.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        nice_ticks(self.domain.0, self.domain.1, count as f64)
    }
}

/// Evenly spaced values at a 1, 2 or 5 times power-of-ten step inside
/// `[start, stop]`.
pub fn nice_ticks(start: f64, stop: f64, count: f64) -> Vec<f64> {
    if !(count > 0.0) {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }
    let reverse = stop < start;
    let (i1, i2, inc) = if reverse {
        tick_bounds(stop, start, count)
    } else {
        tick_bounds(start, stop, count)
    };
    if !(i2 >= i1) {
        return Vec::new();
    }
    let n = (i2 - i1) as usize + 1;
    (0..n)
        .map(|i| {
            let k = if reverse { i2 - i as f64 } else { i1 + i as f64 };
            if inc < 0.0 {
                k / -inc
            } else {
                k * inc
            }
        })
        .collect()
}

// Returns (first index, last index, increment). A negative increment encodes
// a fractional step as its reciprocal to keep tick values exact.
fn tick_bounds(start: f64, stop: f64, count: f64) -> (f64, f64, f64) {
    let step = (stop - start) / count.max(0.0);
    let power = step.log10().floor();
    let error = step / 10f64.powi(power as i32);
    let factor = if error >= TICK_E10 {
        10.0
    } else if error >= TICK_E5 {
        5.0
    } else if error >= TICK_E2 {
        2.0
    } else {
        1.0
    };

    let (mut i1, mut i2, inc);
    if power < 0.0 {
        let scale = 10f64.powi(-power as i32) / factor;
        i1 = round_half_up(start * scale);
        i2 = round_half_up(stop * scale);
        if i1 / scale < start {
            i1 += 1.0;
        }
        if i2 / scale > stop {
            i2 -= 1.0;
        }
        inc = -scale;
    } else {
        let width = 10f64.powi(power as i32) * factor;
        i1 = round_half_up(start / width);
        i2 = round_half_up(stop / width);
        if i1 * width < start {
            i1 += 1.0;
        }
        if i2 * width > stop {
            i2 -= 1.0;
        }
        inc = width;
    }

    if i2 < i1 && (0.5..2.0).contains(&count) {
        return tick_bounds(start, stop, count * 2.0);
    }
    (i1, i2, inc)
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// `(min, max)` over the finite values, or `None` when there are none.
pub fn finite_extent(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// One reading placed on the dial. The date is discarded, so readings from
/// different days share the same 24 hour circle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolarPoint {
    pub angle_hours: f64,
    pub radius: f64,
}

impl From<&GlucoseReading> for PolarPoint {
    fn from(reading: &GlucoseReading) -> Self {
        Self {
            angle_hours: reading.hour_of_day(),
            radius: reading.glucose_mg_dl,
        }
    }
}

pub fn project(series: &[GlucoseReading]) -> Vec<PolarPoint> {
    series.iter().map(PolarPoint::from).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartLayout {
    pub width: u32,
    pub height: u32,
    pub margin: f64,
    pub inner_radius: f64,
    pub grid_circles: usize,
    pub spoke_every_hours: u32,
    pub label_every_hours: u32,
    /// Distance of hour labels beyond the outer radius.
    pub label_offset: f64,
    /// Distance of the axis captions beyond the outer radius.
    pub caption_offset: f64,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
            margin: CHART_MARGIN,
            inner_radius: INNER_RADIUS,
            grid_circles: GRID_CIRCLES,
            spoke_every_hours: SPOKE_EVERY_HOURS,
            label_every_hours: LABEL_EVERY_HOURS,
            label_offset: 20.0,
            caption_offset: 40.0,
        }
    }
}

impl ChartLayout {
    pub fn outer_radius(&self) -> f64 {
        self.width.min(self.height) as f64 / 2.0 - self.margin
    }

    /// Hours `[0, 24)` onto radians `[0, 2pi)`.
    pub fn angle_scale(&self) -> LinearScale {
        LinearScale::new((0.0, HOURS_PER_DAY), (0.0, 2.0 * PI))
    }

    /// Glucose extent onto `[inner_radius, outer_radius]`.
    pub fn radius_scale(&self, glucose_extent: (f64, f64)) -> LinearScale {
        LinearScale::new(glucose_extent, (self.inner_radius, self.outer_radius()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathCommand {
    MoveTo {
        x: f64,
        y: f64,
    },
    LineTo {
        x: f64,
        y: f64,
    },
    CubicTo {
        c1: (f64, f64),
        c2: (f64, f64),
        to: (f64, f64),
    },
    Close,
}

/// Cartesian position of a radial-line point.
pub fn radial_point(angle: f64, radius: f64) -> (f64, f64) {
    (radius * angle.sin(), -radius * angle.cos())
}

/// Position on the spoke/label convention (`cos(a - pi/2)`, `sin(a - pi/2)`).
fn spoke_point(angle: f64, radius: f64) -> (f64, f64) {
    (
        radius * (angle - PI / 2.0).cos(),
        radius * (angle - PI / 2.0).sin(),
    )
}

/// Closed cardinal spline through `points` in the given order.
///
/// The path starts at the second point and wraps the last point back to the
/// first. One point degenerates to move+close and two points to a closed
/// straight segment.
pub fn cardinal_closed(points: &[(f64, f64)], tension: f64) -> Vec<PathCommand> {
    let n = points.len();
    let k = (1.0 - tension) / 6.0;
    match n {
        0 => Vec::new(),
        1 => {
            let (x, y) = points[0];
            vec![PathCommand::MoveTo { x, y }, PathCommand::Close]
        }
        2 => {
            let (x1, y1) = points[1];
            let (x0, y0) = points[0];
            vec![
                PathCommand::MoveTo { x: x1, y: y1 },
                PathCommand::LineTo { x: x0, y: y0 },
                PathCommand::Close,
            ]
        }
        _ => {
            let at = |i: usize| points[i % n];
            let (x, y) = points[1];
            let mut out = Vec::with_capacity(n + 1);
            out.push(PathCommand::MoveTo { x, y });
            for i in 1..=n {
                let prev = at(i - 1);
                let from = at(i);
                let to = at(i + 1);
                let next = at(i + 2);
                out.push(PathCommand::CubicTo {
                    c1: (from.0 + k * (to.0 - prev.0), from.1 + k * (to.1 - prev.1)),
                    c2: (to.0 - k * (next.0 - from.0), to.1 - k * (next.1 - from.1)),
                    to,
                });
            }
            out
        }
    }
}

/// Sample a path into a polyline, `steps` points per cubic segment.
pub fn flatten_path(commands: &[PathCommand], steps: usize) -> Vec<(f64, f64)> {
    let steps = steps.max(1);
    let mut out = Vec::new();
    let mut start: Option<(f64, f64)> = None;
    let mut cursor = (0.0, 0.0);
    for command in commands {
        match *command {
            PathCommand::MoveTo { x, y } => {
                cursor = (x, y);
                start = Some(cursor);
                out.push(cursor);
            }
            PathCommand::LineTo { x, y } => {
                cursor = (x, y);
                out.push(cursor);
            }
            PathCommand::CubicTo { c1, c2, to } => {
                let from = cursor;
                for s in 1..=steps {
                    let t = s as f64 / steps as f64;
                    let u = 1.0 - t;
                    let b0 = u * u * u;
                    let b1 = 3.0 * u * u * t;
                    let b2 = 3.0 * u * t * t;
                    let b3 = t * t * t;
                    out.push((
                        b0 * from.0 + b1 * c1.0 + b2 * c2.0 + b3 * to.0,
                        b0 * from.1 + b1 * c1.1 + b2 * c2.1 + b3 * to.1,
                    ));
                }
                cursor = to;
            }
            PathCommand::Close => {
                if let Some(first) = start {
                    if out.last() != Some(&first) {
                        out.push(first);
                    }
                    cursor = first;
                }
            }
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridCircle {
    pub value: f64,
    pub radius: f64,
    pub label: String,
    /// Right edge of the label, left of the circle on the horizontal axis.
    pub label_x: f64,
    pub label_y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spoke {
    pub hour: u32,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HourLabel {
    pub hour: u32,
    pub text: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub rotation_deg: f64,
}

/// Complete drawing description of one subject's radial chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolarChart {
    pub width: u32,
    pub height: u32,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub glucose_extent: Option<(f64, f64)>,
    pub curve: Vec<PathCommand>,
    pub plotted_points: usize,
    /// Readings left off the curve because their angle or radius was not finite.
    pub dropped_points: usize,
    pub grid: Vec<GridCircle>,
    pub spokes: Vec<Spoke>,
    pub hour_labels: Vec<HourLabel>,
    pub captions: Vec<Caption>,
}

impl PolarChart {
    pub fn curve_polyline(&self, steps_per_segment: usize) -> Vec<(f64, f64)> {
        flatten_path(&self.curve, steps_per_segment)
    }
}

/// Lay out one subject's series on the dial.
///
/// Readings are connected in series order, not sorted by time, so the
/// closing segment joins the last reading back to the first.
pub fn build_polar_chart(series: &[GlucoseReading], layout: &ChartLayout) -> PolarChart {
    let angle_scale = layout.angle_scale();
    let outer_radius = layout.outer_radius();
    let points = project(series);
    let glucose_extent = finite_extent(points.iter().map(|p| p.radius));

    let mut curve_points = Vec::with_capacity(points.len());
    let mut grid = Vec::new();
    if let Some(extent) = glucose_extent {
        let radius_scale = layout.radius_scale(extent);
        for point in &points {
            let angle = angle_scale.apply(point.angle_hours);
            let radius = radius_scale.apply(point.radius);
            if angle.is_finite() && radius.is_finite() {
                curve_points.push(radial_point(angle, radius));
            }
        }
        for tick in radius_scale.ticks(layout.grid_circles) {
            let radius = radius_scale.apply(tick);
            grid.push(GridCircle {
                value: tick,
                radius,
                label: tick.to_string(),
                label_x: -radius - GRID_LABEL_GAP,
                label_y: 0.0,
            });
        }
    }

    let dropped_points = points.len() - curve_points.len();
    if dropped_points > 0 {
        warn!(
            dropped = dropped_points,
            total = points.len(),
            "readings without a usable time or glucose value left off the curve"
        );
    }

    let spokes = (0..24)
        .step_by(layout.spoke_every_hours.max(1) as usize)
        .map(|hour| {
            let (x, y) = spoke_point(angle_scale.apply(hour as f64), outer_radius);
            Spoke { hour, x, y }
        })
        .collect();

    let label_radius = outer_radius + layout.label_offset;
    let hour_labels = (0..24)
        .step_by(layout.label_every_hours.max(1) as usize)
        .map(|hour| {
            let (x, y) = spoke_point(angle_scale.apply(hour as f64), label_radius);
            HourLabel {
                hour,
                text: format!("{hour}:00"),
                x,
                y,
            }
        })
        .collect();

    let caption_radius = outer_radius + layout.caption_offset;
    let captions = vec![
        Caption {
            text: RADIUS_CAPTION.to_string(),
            x: 0.0,
            y: caption_radius,
            rotation_deg: 0.0,
        },
        Caption {
            text: ANGLE_CAPTION.to_string(),
            x: caption_radius,
            y: 0.0,
            rotation_deg: 90.0,
        },
    ];

    PolarChart {
        width: layout.width,
        height: layout.height,
        inner_radius: layout.inner_radius,
        outer_radius,
        glucose_extent,
        curve: cardinal_closed(&curve_points, CARDINAL_TENSION),
        plotted_points: curve_points.len(),
        dropped_points,
        grid,
        spokes,
        hour_labels,
        captions,
    }
}
