use draw_geom::{Point, distance, round_to};
use serde_json::{Map, Value, json};

use crate::PipelineError;

/// Attaches the resolved `unit` and a type-specific `dimension` mapping to
/// every shape in the document, and records the unit under `meta.units`.
///
/// Dimensions are rounded to 2 decimal places: circles carry `{radius}`,
/// rectangles `{width, height}`, triangles `{sides: {AB, BC, CA}}` over
/// consecutive points in input order. Lines, ellipses and polygons only get
/// the unit. Annotation is a pure function of the geometric fields, so
/// running it twice yields the same values.
///
/// No schema validation happens here, but a shape that is missing a field its
/// own kind requires surfaces as [`PipelineError::MalformedResponse`].
pub fn annotate_dimensions(document: &mut Value, unit: &str) -> Result<(), PipelineError> {
    let root = document
        .as_object_mut()
        .ok_or_else(|| malformed("response root is not a JSON object"))?;

    if let Some(shapes) = root.get_mut("shapes") {
        let shapes = shapes
            .as_array_mut()
            .ok_or_else(|| malformed("'shapes' is not a list"))?;
        for shape in shapes {
            annotate_shape(shape, unit)?;
        }
    }

    let meta = root
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    let meta = meta
        .as_object_mut()
        .ok_or_else(|| malformed("'meta' is not an object"))?;
    meta.insert("units".to_string(), Value::String(unit.to_string()));

    Ok(())
}

fn annotate_shape(shape: &mut Value, unit: &str) -> Result<(), PipelineError> {
    let shape = shape
        .as_object_mut()
        .ok_or_else(|| malformed("shape entry is not an object"))?;

    let dimension = match shape.get("type").and_then(Value::as_str) {
        Some("circle") => {
            let radius = require_number(shape, "circle", "radius")?;
            Some(json!({ "radius": round_to(radius, 2) }))
        }
        Some("rectangle") => {
            let width = require_number(shape, "rectangle", "width")?;
            let height = require_number(shape, "rectangle", "height")?;
            Some(json!({ "width": round_to(width, 2), "height": round_to(height, 2) }))
        }
        Some("triangle") => {
            let [a, b, c] = triangle_points(shape)?;
            Some(json!({
                "sides": {
                    "AB": round_to(distance(a, b), 2),
                    "BC": round_to(distance(b, c), 2),
                    "CA": round_to(distance(c, a), 2),
                }
            }))
        }
        // Lines, ellipses, polygons and unrecognized tags are labeled with
        // the unit only; unknown tags are left for schema validation.
        _ => None,
    };

    shape.insert("unit".to_string(), Value::String(unit.to_string()));
    if let Some(dimension) = dimension {
        shape.insert("dimension".to_string(), dimension);
    }

    Ok(())
}

/// Reads the three triangle vertices from a raw shape mapping.
pub(crate) fn triangle_points(shape: &Map<String, Value>) -> Result<[Point; 3], PipelineError> {
    let points = shape
        .get("points")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("triangle shape is missing a 'points' list"))?;
    if points.len() < 3 {
        return Err(malformed("triangle shape needs three [x, y] points"));
    }

    let mut vertices = [[0.0; 2]; 3];
    for (vertex, value) in vertices.iter_mut().zip(points) {
        *vertex = parse_point(value)
            .ok_or_else(|| malformed("triangle point is not an [x, y] number pair"))?;
    }
    Ok(vertices)
}

pub(crate) fn parse_point(value: &Value) -> Option<Point> {
    let pair = value.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    Some([pair[0].as_f64()?, pair[1].as_f64()?])
}

fn require_number(shape: &Map<String, Value>, kind: &str, key: &str) -> Result<f64, PipelineError> {
    shape
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed(format!("{kind} shape is missing a numeric '{key}' field")))
}

fn malformed(message: impl Into<String>) -> PipelineError {
    PipelineError::MalformedResponse(message.into())
}
