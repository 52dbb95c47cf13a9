use std::error::Error;
use std::fmt;
use std::time::Duration;

use draw_parse::{CorrectionPolicy, Drawing, parse_drawing};
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You must output ONLY valid JSON. No explanations. No extra text.
The JSON describes 2D geometric shapes on a drawing canvas.

Valid shape formats:

1) Triangle:
   { "type": "triangle",
     "points": [[x1,y1], [x2,y2], [x3,y3]] }

2) Circle:
   { "type": "circle",
     "center": [cx,cy], "radius": r }

3) Rectangle:
   { "type": "rectangle",
     "x": X, "y": Y, "width": W, "height": H }

4) Line:
   { "type": "line",
     "points": [[x1,y1], [x2,y2]] }

5) Ellipse:
   { "type": "ellipse",
     "center": [cx,cy], "rx": RX, "ry": RY }

6) Polygon:
   { "type": "polygon",
     "points": [[x1,y1], ..., [xn,yn]] }

Rules:
- Use only numbers.
- Coordinates must lie between 0 and 500.
- Shapes should be concise and approximate if needed.
- Output MUST be valid JSON.
- Final required structure:

{
  "shapes": [...],
  "meta": {
    "units": "user-space"
  }
}
"#;

pub fn default_system_prompt() -> &'static str {
    DEFAULT_SYSTEM_PROMPT
}

/// One request to a language model provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    pub user_query: &'a str,
    /// Pipeline errors from the previous attempt, empty on the first one.
    pub pipeline_errors: &'a [String],
    pub attempt: usize,
}

/// Renders the user-facing message for a chat completion call, appending
/// validation feedback on retry attempts.
pub fn render_user_message(request: &GenerationRequest<'_>) -> String {
    if request.pipeline_errors.is_empty() {
        return request.user_query.to_string();
    }

    let mut message = String::from(request.user_query);
    message.push_str("\n\nYour previous response failed validation:\n");
    for error in request.pipeline_errors {
        message.push_str("- ");
        message.push_str(error);
        message.push('\n');
    }
    message.push_str("Return corrected JSON only.");
    message
}

pub trait LanguageModel {
    fn generate_drawing(&mut self, request: GenerationRequest<'_>) -> Result<String, String>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for Box<M> {
    fn generate_drawing(&mut self, request: GenerationRequest<'_>) -> Result<String, String> {
        (**self).generate_drawing(request)
    }
}

/// Offline development model returning a fixed triangle with its incircle.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockModel;

impl LanguageModel for MockModel {
    fn generate_drawing(&mut self, _request: GenerationRequest<'_>) -> Result<String, String> {
        Ok(json!({
            "shapes": [
                {"type": "triangle", "points": [[0, 100], [0, 0], [100, 0]]},
                {"type": "circle", "center": [29.2895, 29.2895], "radius": 29.2895}
            ],
            "meta": {"units": "user-space", "note": "mock incircle"}
        })
        .to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    MissingApiKey(&'static str),
    UnknownProvider(String),
    Http(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::MissingApiKey(variable) => {
                write!(f, "environment variable {variable} is not set")
            }
            ProviderError::UnknownProvider(name) => {
                write!(f, "unknown LLM_PROVIDER '{name}' (expected mock, openai or groq)")
            }
            ProviderError::Http(message) => {
                write!(f, "failed to build HTTP client: {message}")
            }
        }
    }
}

impl Error for ProviderError {}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);
const MAX_COMPLETION_TOKENS: u32 = 800;

/// Provider speaking the OpenAI-compatible chat completions protocol.
pub struct ChatCompletionModel {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionModel {
    pub fn openai_from_env() -> Result<Self, ProviderError> {
        Self::from_env_with(
            "https://api.openai.com/v1/chat/completions",
            "OPENAI_API_KEY",
            "OPENAI_MODEL",
            "gpt-4o-mini",
        )
    }

    pub fn groq_from_env() -> Result<Self, ProviderError> {
        Self::from_env_with(
            "https://api.groq.com/openai/v1/chat/completions",
            "GROQ_API_KEY",
            "GROQ_MODEL",
            "openai/gpt-oss-120b",
        )
    }

    fn from_env_with(
        endpoint: &str,
        key_variable: &'static str,
        model_variable: &str,
        default_model: &str,
    ) -> Result<Self, ProviderError> {
        let api_key =
            std::env::var(key_variable).map_err(|_| ProviderError::MissingApiKey(key_variable))?;
        let model =
            std::env::var(model_variable).unwrap_or_else(|_| default_model.to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ProviderError::Http(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
            model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl LanguageModel for ChatCompletionModel {
    fn generate_drawing(&mut self, request: GenerationRequest<'_>) -> Result<String, String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": render_user_message(&request)}
            ],
            "temperature": 0,
            "max_tokens": MAX_COMPLETION_TOKENS,
        });

        log::debug!("chat completion attempt {} against {}", request.attempt, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| format!("chat completion request failed: {err}"))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|err| format!("failed to read chat completion body: {err}"))?;
        if !status.is_success() {
            return Err(format!("chat completion endpoint returned {status}: {body}"));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|err| format!("unexpected chat completion payload ({err}): {body}"))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| "chat completion response had no choices".to_string())
    }
}

/// Builds the model named by `LLM_PROVIDER` (default `mock`).
pub fn provider_from_env() -> Result<Box<dyn LanguageModel + Send>, ProviderError> {
    let provider = std::env::var("LLM_PROVIDER")
        .unwrap_or_else(|_| "mock".to_string())
        .to_lowercase();

    match provider.as_str() {
        "mock" => Ok(Box::new(MockModel)),
        "openai" => Ok(Box::new(ChatCompletionModel::openai_from_env()?)),
        "groq" => Ok(Box::new(ChatCompletionModel::groq_from_env()?)),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_retries: usize,
    pub policy: CorrectionPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            policy: CorrectionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSuccess {
    pub document: Drawing,
    pub raw_response: String,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    Model(String),
    ExhaustedRetries {
        attempts: usize,
        last_errors: Vec<String>,
    },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Model(message) => {
                write!(f, "model request failed: {message}")
            }
            GenerationError::ExhaustedRetries {
                attempts,
                last_errors,
            } => {
                write!(
                    f,
                    "failed to produce a valid drawing after {attempts} attempt(s): {}",
                    last_errors.join("; ")
                )
            }
        }
    }
}

impl Error for GenerationError {}

/// Runs the model-then-pipeline loop: ask the model for a drawing, push the
/// response through the parsing pipeline, and on failure re-ask with the
/// pipeline error attached, up to `max_retries` attempts.
///
/// The pipeline itself never retries; all retrying lives here, outside the
/// core transformation.
pub struct DrawingGenerator<C: LanguageModel> {
    client: C,
    config: GenerationConfig,
    system_prompt: String,
}

impl<C: LanguageModel> DrawingGenerator<C> {
    pub fn new(client: C, config: GenerationConfig) -> Self {
        Self {
            client,
            config,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub fn generate(&mut self, query: &str) -> Result<GenerationSuccess, GenerationError> {
        let max_attempts = self.config.max_retries.max(1);
        let mut pipeline_errors = Vec::new();

        for attempt in 1..=max_attempts {
            let candidate = self
                .client
                .generate_drawing(GenerationRequest {
                    system_prompt: &self.system_prompt,
                    user_query: query,
                    pipeline_errors: &pipeline_errors,
                    attempt,
                })
                .map_err(GenerationError::Model)?;

            match parse_drawing(&candidate, query, self.config.policy) {
                Ok(document) => {
                    return Ok(GenerationSuccess {
                        document,
                        raw_response: candidate,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    log::debug!("attempt {attempt} rejected by pipeline: {err}");
                    pipeline_errors = vec![err.to_string()];
                }
            }
        }

        Err(GenerationError::ExhaustedRetries {
            attempts: max_attempts,
            last_errors: pipeline_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use draw_parse::{CorrectionPolicy, Shape};

    use super::{
        DrawingGenerator, GenerationConfig, GenerationError, GenerationRequest, LanguageModel,
        MockModel, default_system_prompt, render_user_message,
    };

    #[derive(Debug, Clone)]
    struct RequestLog {
        query: String,
        attempt: usize,
        pipeline_errors: Vec<String>,
    }

    #[derive(Default)]
    struct ScriptedModel {
        responses: VecDeque<String>,
        logs: Vec<RequestLog>,
    }

    impl ScriptedModel {
        fn with_responses(responses: Vec<&str>) -> Self {
            Self {
                responses: responses.into_iter().map(str::to_string).collect(),
                logs: Vec::new(),
            }
        }
    }

    impl LanguageModel for ScriptedModel {
        fn generate_drawing(&mut self, request: GenerationRequest<'_>) -> Result<String, String> {
            self.logs.push(RequestLog {
                query: request.user_query.to_string(),
                attempt: request.attempt,
                pipeline_errors: request.pipeline_errors.to_vec(),
            });
            self.responses
                .pop_front()
                .ok_or_else(|| "no remaining scripted responses".to_string())
        }
    }

    #[test]
    fn system_prompt_covers_all_shape_formats() {
        let prompt = default_system_prompt();
        for kind in ["triangle", "circle", "rectangle", "line", "ellipse", "polygon"] {
            assert!(prompt.contains(kind), "prompt should mention {kind}");
        }
        assert!(prompt.contains("between 0 and 500"));
        assert!(prompt.contains("ONLY valid JSON"));
    }

    #[test]
    fn mock_model_produces_a_valid_document_first_try() {
        let mut generator = DrawingGenerator::new(MockModel, GenerationConfig::default());
        let success = generator
            .generate("draw a triangle with its incircle")
            .expect("mock response should survive the pipeline");

        assert_eq!(success.attempts, 1);
        assert_eq!(success.document.shapes.len(), 2);
        assert_eq!(
            success.document.meta["server_computed_incircle"],
            true,
            "incircle request should be recomputed server-side"
        );
    }

    #[test]
    fn retry_feeds_pipeline_errors_back_to_the_model() {
        let good = r#"{"shapes": [{"type": "circle", "center": [50, 50], "radius": 20}]}"#;
        let model = ScriptedModel::with_responses(vec!["sorry, no JSON here", good]);
        let mut generator = DrawingGenerator::new(model, GenerationConfig::default());

        let success = generator
            .generate("draw a circle")
            .expect("second attempt should succeed");
        assert_eq!(success.attempts, 2);
        assert!(matches!(success.document.shapes[0], Shape::Circle { .. }));

        let model = generator.into_client();
        assert!(model.logs[0].pipeline_errors.is_empty());
        assert_eq!(model.logs[1].attempt, 2);
        assert!(
            model.logs[1].pipeline_errors[0].contains("malformed model response"),
            "feedback: {:?}",
            model.logs[1].pipeline_errors
        );
        assert_eq!(model.logs[1].query, "draw a circle");
    }

    #[test]
    fn exhausted_retries_carry_the_last_pipeline_error() {
        let model = ScriptedModel::with_responses(vec!["nope", "still nope", "nothing"]);
        let mut generator = DrawingGenerator::new(model, GenerationConfig::default());

        let err = generator
            .generate("draw a circle")
            .expect_err("generation should give up");
        match err {
            GenerationError::ExhaustedRetries {
                attempts,
                last_errors,
            } => {
                assert_eq!(attempts, 3);
                assert!(!last_errors.is_empty());
            }
            other => panic!("expected ExhaustedRetries, got {other:?}"),
        }
    }

    #[test]
    fn model_failure_is_not_retried() {
        let model = ScriptedModel::default();
        let mut generator = DrawingGenerator::new(model, GenerationConfig::default());

        let err = generator
            .generate("draw a circle")
            .expect_err("model error should surface");
        assert!(matches!(err, GenerationError::Model(_)));
    }

    #[test]
    fn generator_honors_the_configured_policy() {
        let mut generator = DrawingGenerator::new(
            MockModel,
            GenerationConfig {
                max_retries: 1,
                policy: CorrectionPolicy::OnlyIfRequested,
            },
        );
        let success = generator
            .generate("draw a plain triangle")
            .expect("mock response should survive the pipeline");
        assert!(
            !success.document.meta.contains_key("server_computed_incircle"),
            "no incircle keyword, so the mock circle must be left alone"
        );
    }

    #[test]
    fn user_message_carries_retry_feedback() {
        let errors = vec!["schema violation: shape 0: circle field 'radius' must be positive, found 0".to_string()];
        let request = GenerationRequest {
            system_prompt: "sys",
            user_query: "draw a circle",
            pipeline_errors: &errors,
            attempt: 2,
        };
        let message = render_user_message(&request);
        assert!(message.starts_with("draw a circle"));
        assert!(message.contains("failed validation"));
        assert!(message.contains("radius"));
    }
}
