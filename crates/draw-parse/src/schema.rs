use draw_geom::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PipelineError;

pub type JsonMap = serde_json::Map<String, Value>;

/// Metadata attached to every shape by post-processing. Not part of the
/// shape's geometric identity; unknown extra fields are preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<JsonMap>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Closed union over the six drawing shape kinds, dispatched on the `type`
/// tag. Required geometric fields are strict; everything else rides along in
/// [`Annotations`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Triangle {
        points: Vec<Point>,
        #[serde(flatten)]
        annotations: Annotations,
    },
    Circle {
        center: Point,
        radius: f64,
        #[serde(flatten)]
        annotations: Annotations,
    },
    Rectangle {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(flatten)]
        annotations: Annotations,
    },
    Line {
        points: Vec<Point>,
        #[serde(flatten)]
        annotations: Annotations,
    },
    Ellipse {
        center: Point,
        rx: f64,
        ry: f64,
        #[serde(flatten)]
        annotations: Annotations,
    },
    Polygon {
        points: Vec<Point>,
        #[serde(flatten)]
        annotations: Annotations,
    },
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Triangle { .. } => "triangle",
            Shape::Circle { .. } => "circle",
            Shape::Rectangle { .. } => "rectangle",
            Shape::Line { .. } => "line",
            Shape::Ellipse { .. } => "ellipse",
            Shape::Polygon { .. } => "polygon",
        }
    }

    pub fn annotations(&self) -> &Annotations {
        match self {
            Shape::Triangle { annotations, .. }
            | Shape::Circle { annotations, .. }
            | Shape::Rectangle { annotations, .. }
            | Shape::Line { annotations, .. }
            | Shape::Ellipse { annotations, .. }
            | Shape::Polygon { annotations, .. } => annotations,
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Shape::Triangle { points, .. } => {
                expect_point_count(points, 3, "triangle")?;
                finite_points(points, "triangle")
            }
            Shape::Circle { center, radius, .. } => {
                finite_point(*center, "circle")?;
                positive("circle", "radius", *radius)
            }
            Shape::Rectangle {
                x,
                y,
                width,
                height,
                ..
            } => {
                for (name, value) in [("x", *x), ("y", *y), ("width", *width), ("height", *height)]
                {
                    finite("rectangle", name, value)?;
                }
                Ok(())
            }
            Shape::Line { points, .. } => {
                expect_point_count(points, 2, "line")?;
                finite_points(points, "line")
            }
            Shape::Ellipse {
                center, rx, ry, ..
            } => {
                finite_point(*center, "ellipse")?;
                positive("ellipse", "rx", *rx)?;
                positive("ellipse", "ry", *ry)
            }
            Shape::Polygon { points, .. } => {
                if points.len() < 3 {
                    return Err(format!(
                        "polygon needs at least 3 points, found {}",
                        points.len()
                    ));
                }
                finite_points(points, "polygon")
            }
        }
    }
}

/// A validated drawing: an ordered shape sequence plus an open metadata
/// mapping. A drawing with zero shapes is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub meta: JsonMap,
    #[serde(flatten)]
    pub extra: JsonMap,
}

/// Maps a corrected raw document onto the closed [`Drawing`] type.
///
/// Unknown `type` tags and required fields that fail coercion are
/// [`PipelineError::SchemaViolation`]s; unknown additional fields on shapes
/// or on the document are preserved, not rejected. Coordinates are not range
/// checked: the upstream prompt asks for 0-500 but out-of-range values pass
/// through.
pub fn validate_document(document: Value) -> Result<Drawing, PipelineError> {
    let drawing: Drawing = serde_json::from_value(document)
        .map_err(|err| PipelineError::SchemaViolation(err.to_string()))?;

    for (index, shape) in drawing.shapes.iter().enumerate() {
        shape
            .check()
            .map_err(|message| PipelineError::SchemaViolation(format!("shape {index}: {message}")))?;
    }

    Ok(drawing)
}

fn expect_point_count(points: &[Point], expected: usize, kind: &str) -> Result<(), String> {
    if points.len() != expected {
        return Err(format!(
            "{kind} must have exactly {expected} points, found {}",
            points.len()
        ));
    }
    Ok(())
}

fn finite_points(points: &[Point], kind: &str) -> Result<(), String> {
    for point in points {
        finite_point(*point, kind)?;
    }
    Ok(())
}

fn finite_point(point: Point, kind: &str) -> Result<(), String> {
    if !point[0].is_finite() || !point[1].is_finite() {
        return Err(format!("{kind} has a non-finite point"));
    }
    Ok(())
}

fn finite(kind: &str, name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{kind} field '{name}' is not finite"));
    }
    Ok(())
}

fn positive(kind: &str, name: &str, value: f64) -> Result<(), String> {
    finite(kind, name, value)?;
    if value <= 0.0 {
        return Err(format!("{kind} field '{name}' must be positive, found {value}"));
    }
    Ok(())
}
