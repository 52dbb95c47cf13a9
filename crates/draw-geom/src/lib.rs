pub mod triangle;

pub use triangle::{DegenerateTriangle, Incircle, incircle, side_lengths};

/// Cartesian point on the 2D drawing canvas.
pub type Point = [f64; 2];

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point, b: Point) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Perpendicular distance from `point` to the infinite line through `p1` and
/// `p2`. Falls back to point-to-point distance when the endpoints coincide.
pub fn point_to_line_distance(point: Point, p1: Point, p2: Point) -> f64 {
    let [x0, y0] = point;
    let [x1, y1] = p1;
    let [x2, y2] = p2;

    let denominator = (y2 - y1).hypot(x2 - x1);
    if denominator == 0.0 {
        return distance(point, p1);
    }

    let numerator = ((y2 - y1) * x0 - (x2 - x1) * y0 + x2 * y1 - y2 * x1).abs();
    numerator / denominator
}

/// Rounds `value` to the given number of decimal places.
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
