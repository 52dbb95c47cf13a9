use serde_json::Value;

use crate::PipelineError;

/// Recovers the single JSON object embedded in arbitrary model output.
///
/// The text may carry leading or trailing prose and markdown code fences.
/// When the trimmed text opens with a fence, the fence-delimited segment whose
/// content starts with `{` is selected; otherwise the whole text is the
/// candidate. The candidate is parsed directly first, then as the slice from
/// the first `{` to the last `}` inclusive.
///
/// Known limitation: brace characters inside string values can defeat the
/// bracket slice. That fragility is accepted rather than worked around.
pub fn extract_json(raw_text: &str) -> Result<Value, PipelineError> {
    let text = raw_text.trim();

    let candidate = if text.starts_with("```") {
        log::debug!("model response is fenced; selecting object segment");
        text.split("```")
            .find(|segment| segment.trim_start().starts_with('{'))
            .unwrap_or(text)
    } else {
        text
    };

    if let Ok(value) = serde_json::from_str::<Value>(candidate.trim())
        && value.is_object()
    {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}')) else {
        return Err(PipelineError::MalformedResponse(format!(
            "no JSON object found in model response: {raw_text}"
        )));
    };
    if end < start {
        return Err(PipelineError::MalformedResponse(format!(
            "no JSON object found in model response: {raw_text}"
        )));
    }

    let blob = &candidate[start..=end];
    serde_json::from_str(blob).map_err(|err| {
        PipelineError::MalformedResponse(format!("response is not valid JSON ({err}): {blob}"))
    })
}
