use std::error::Error;
use std::fmt;

use crate::{Point, distance, round_to};

/// Error raised when an incircle is requested for a triangle whose vertices
/// all coincide (zero perimeter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegenerateTriangle;

impl fmt::Display for DegenerateTriangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("degenerate triangle: vertices have zero perimeter")
    }
}

impl Error for DegenerateTriangle {}

/// Inscribed circle of a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Incircle {
    pub center: Point,
    pub radius: f64,
}

/// Side lengths `[a, b, c]` of the triangle `ABC`, where `a` is the side
/// opposite vertex `A`, `b` opposite `B`, and `c` opposite `C`.
pub fn side_lengths(a: Point, b: Point, c: Point) -> [f64; 3] {
    [distance(b, c), distance(c, a), distance(a, b)]
}

/// Computes the incircle of the triangle `ABC`.
///
/// The incenter is the side-length-weighted average of the vertices,
/// `(a·A + b·B + c·C) / (a + b + c)`, and the inradius is the triangle area
/// divided by the semiperimeter. Both are rounded to 6 decimal places so that
/// downstream equality and tangency checks stay stable.
pub fn incircle(a: Point, b: Point, c: Point) -> Result<Incircle, DegenerateTriangle> {
    let [sa, sb, sc] = side_lengths(a, b, c);
    let perimeter = sa + sb + sc;
    if perimeter == 0.0 {
        return Err(DegenerateTriangle);
    }

    let cx = (sa * a[0] + sb * b[0] + sc * c[0]) / perimeter;
    let cy = (sa * a[1] + sb * b[1] + sc * c[1]) / perimeter;

    let semiperimeter = perimeter / 2.0;
    let area = ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])).abs() / 2.0;
    let radius = area / semiperimeter;

    Ok(Incircle {
        center: [round_to(cx, 6), round_to(cy, 6)],
        radius: round_to(radius, 6),
    })
}
