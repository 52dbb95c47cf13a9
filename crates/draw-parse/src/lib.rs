pub mod annotate;
pub mod correct;
pub mod extract;
pub mod schema;
pub mod units;

use std::error::Error;
use std::fmt;

use draw_geom::DegenerateTriangle;

pub use annotate::annotate_dimensions;
pub use correct::{
    CORRECTION_TANGENT_EPS, CorrectionPolicy, TANGENT_EPS, correct_incircle, is_tangent,
    requests_incircle,
};
pub use extract::extract_json;
pub use schema::{Annotations, Drawing, JsonMap, Shape, validate_document};
pub use units::{DEFAULT_UNIT, resolve_unit};

/// Failure of a single pipeline invocation. All variants are unrecoverable:
/// the pipeline never retries or partially repairs a document.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The response text held no recoverable JSON object, or a shape was
    /// missing a field its kind requires during annotation or correction.
    MalformedResponse(String),
    /// Incircle computation was attempted on a zero-perimeter triangle.
    DegenerateTriangle,
    /// The corrected document does not conform to the drawing schema.
    SchemaViolation(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MalformedResponse(message) => {
                write!(f, "malformed model response: {message}")
            }
            PipelineError::DegenerateTriangle => {
                f.write_str("degenerate triangle: vertices have zero perimeter")
            }
            PipelineError::SchemaViolation(message) => {
                write!(f, "schema violation: {message}")
            }
        }
    }
}

impl Error for PipelineError {}

impl From<DegenerateTriangle> for PipelineError {
    fn from(_: DegenerateTriangle) -> Self {
        PipelineError::DegenerateTriangle
    }
}

/// Runs the full response-to-document pipeline: JSON extraction, unit
/// resolution, dimension annotation, incircle correction, and schema
/// validation.
///
/// `response_text` is the raw model output (JSON, possibly wrapped in prose
/// or code fences); `query` is the original user request it was produced
/// from. The call is pure and deterministic: same inputs, same output.
pub fn parse_drawing(
    response_text: &str,
    query: &str,
    policy: CorrectionPolicy,
) -> Result<Drawing, PipelineError> {
    let mut document = extract_json(response_text)?;
    let unit = resolve_unit(query);
    annotate_dimensions(&mut document, &unit)?;
    correct_incircle(&mut document, query, &unit, policy)?;
    validate_document(document)
}
