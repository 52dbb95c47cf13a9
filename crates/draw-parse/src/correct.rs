use draw_geom::{Point, incircle, point_to_line_distance, round_to};
use serde_json::{Map, Value, json};

use crate::PipelineError;
use crate::annotate::{parse_point, triangle_points};

/// Tolerance for the plain tangency predicate.
pub const TANGENT_EPS: f64 = 1e-3;

/// Relaxed tolerance used when deciding whether a model-provided circle is
/// close enough to the true incircle to be trusted.
pub const CORRECTION_TANGENT_EPS: f64 = 1e-2;

const INCIRCLE_PHRASES: [&str; 8] = [
    "incircle",
    "in circle",
    "in-circle",
    "inscribed circle",
    "incenter circle",
    "circle tangent to all sides",
    "draw the incircle",
    "add incircle",
];

/// When the incircle corrector recomputes and replaces the circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionPolicy {
    /// Any triangle in the document gets a freshly computed incircle.
    AlwaysIfTriangle,
    /// A model-provided circle that passes the tangency check is trusted;
    /// a missing or mismatched circle is replaced.
    OnlyIfMismatched,
    /// Correction runs only when the query asks for an inscribed circle.
    #[default]
    OnlyIfRequested,
}

/// True when the query contains one of the fixed incircle request phrases.
pub fn requests_incircle(query: &str) -> bool {
    let query = query.to_lowercase();
    INCIRCLE_PHRASES.iter().any(|phrase| query.contains(phrase))
}

/// True when the circle is tangent to all three sides of the triangle,
/// treating each side as an infinite line and comparing the center-to-side
/// distance against the radius within `eps`.
pub fn is_tangent(center: Point, radius: f64, triangle: &[Point; 3], eps: f64) -> bool {
    let [a, b, c] = *triangle;
    [(a, b), (b, c), (c, a)]
        .into_iter()
        .all(|(p1, p2)| (point_to_line_distance(center, p1, p2) - radius).abs() <= eps)
}

/// Ensures the document's circle is the true incircle of its triangle,
/// according to `policy`.
///
/// On replacement, every existing circle shape is removed, a corrected circle
/// (with unit and 2-decimal `dimension.radius`) is appended, and
/// `meta.server_computed_incircle` is set. Without a triangle the document is
/// never touched. A zero-perimeter triangle propagates
/// [`PipelineError::DegenerateTriangle`] and aborts the invocation.
pub fn correct_incircle(
    document: &mut Value,
    query: &str,
    unit: &str,
    policy: CorrectionPolicy,
) -> Result<(), PipelineError> {
    let root = document
        .as_object_mut()
        .ok_or_else(|| PipelineError::MalformedResponse("response root is not a JSON object".to_string()))?;
    let Some(shapes) = root.get_mut("shapes") else {
        return Ok(());
    };
    let shapes = shapes
        .as_array_mut()
        .ok_or_else(|| PipelineError::MalformedResponse("'shapes' is not a list".to_string()))?;

    // The last triangle and circle in the collection win, matching the
    // original scan order.
    let mut triangle: Option<[Point; 3]> = None;
    let mut circle: Option<(Point, f64)> = None;
    for shape in shapes.iter() {
        let Some(shape) = shape.as_object() else {
            continue;
        };
        match shape.get("type").and_then(Value::as_str) {
            Some("triangle") => triangle = Some(triangle_points(shape)?),
            Some("circle") => circle = circle_fields(shape),
            _ => {}
        }
    }

    let Some(triangle) = triangle else {
        if policy == CorrectionPolicy::OnlyIfRequested && requests_incircle(query) {
            log::debug!("incircle requested but no triangle present; skipping correction");
        }
        return Ok(());
    };

    let replace = match policy {
        CorrectionPolicy::AlwaysIfTriangle => true,
        CorrectionPolicy::OnlyIfRequested => requests_incircle(query),
        CorrectionPolicy::OnlyIfMismatched => match circle {
            // An unreadable circle counts as mismatched.
            None => true,
            Some((center, radius)) => {
                !is_tangent(center, radius, &triangle, CORRECTION_TANGENT_EPS)
            }
        },
    };
    if !replace {
        return Ok(());
    }

    let corrected = incircle(triangle[0], triangle[1], triangle[2])?;
    log::debug!(
        "replacing circle with computed incircle at ({}, {}) r={}",
        corrected.center[0],
        corrected.center[1],
        corrected.radius
    );

    shapes.retain(|shape| shape.get("type").and_then(Value::as_str) != Some("circle"));
    shapes.push(json!({
        "type": "circle",
        "center": [corrected.center[0], corrected.center[1]],
        "radius": corrected.radius,
        "unit": unit,
        "dimension": { "radius": round_to(corrected.radius, 2) },
    }));

    let meta = root
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    let meta = meta
        .as_object_mut()
        .ok_or_else(|| PipelineError::MalformedResponse("'meta' is not an object".to_string()))?;
    meta.insert("server_computed_incircle".to_string(), Value::Bool(true));

    Ok(())
}

fn circle_fields(shape: &Map<String, Value>) -> Option<(Point, f64)> {
    let center = parse_point(shape.get("center")?)?;
    let radius = shape.get("radius")?.as_f64()?;
    Some((center, radius))
}
