//! Vertex AI `generateContent` client.
//!
//! Sends `template + "\n" + input` as a single user turn with fixed
//! decoding parameters and all safety filters switched off, and asks the
//! model to answer with a JSON envelope of the form `{"response": ...}`.
//! See: <https://cloud.google.com/vertex-ai/generative-ai/docs/model-reference/inference>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::{GenerationConfig, GenerativeModel, PromptSpec, ResponseShape};
use crate::types::Payload;
use crate::{ModelError, Result};

/// Harm categories whose filters are disabled on every request.
const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// Envelope field holding the result.
const RESPONSE_FIELD: &str = "response";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client bound to one model, one prompt template, and one response shape.
#[derive(Clone)]
pub struct VertexClient {
    http: Client,
    base_url: String,
    project_id: String,
    location: String,
    model: String,
    access_token: Option<String>,
    prompt: PromptSpec,
    generation: GenerationConfig,
}

impl VertexClient {
    /// Create a client for the regional Vertex AI endpoint of `location`.
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        model: impl Into<String>,
        prompt: PromptSpec,
        generation: GenerationConfig,
    ) -> Self {
        let location = location.into();
        let base_url = format!("https://{location}-aiplatform.googleapis.com");
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url,
            project_id: project_id.into(),
            location,
            model: model.into(),
            access_token: None,
            prompt,
            generation,
        }
    }

    /// Override the endpoint (for testing with wiremock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// OAuth bearer token sent with every request.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn prompt(&self) -> &PromptSpec {
        &self.prompt
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.base_url, self.project_id, self.location, self.model
        )
    }

    fn request_body(&self, prompt_input: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: self.prompt.render(prompt_input),
                }],
            }],
            generation_config: GenerationConfigBody {
                temperature: self.generation.temperature,
                top_p: self.generation.top_p,
                max_output_tokens: self.generation.max_output_tokens,
                response_modalities: vec!["TEXT"],
                response_mime_type: self.prompt.response_mime_type.clone(),
                response_schema: serde_json::json!({
                    "type": "OBJECT",
                    "properties": { RESPONSE_FIELD: { "type": "STRING" } },
                    "required": [RESPONSE_FIELD],
                }),
            },
            safety_settings: SAFETY_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "OFF",
                })
                .collect(),
        }
    }

    async fn handle_response_errors(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(ModelError::Upstream(format!("HTTP {}: {message}", status.as_u16())).into())
    }
}

#[async_trait]
impl GenerativeModel for VertexClient {
    fn name(&self) -> &str {
        "vertex"
    }

    async fn generate(&self, prompt_input: &str) -> Result<Payload> {
        let mut request = self
            .http
            .post(self.endpoint())
            .json(&self.request_body(prompt_input));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        let response = Self::handle_response_errors(response).await?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(format!("unexpected API body: {e}")))?;

        if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::Upstream(format!("prompt blocked: {reason}")).into());
        }

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .ok_or(ModelError::MissingField("candidates"))?;

        parse_envelope(&text, self.prompt.shape)
    }
}

/// Decode the model's JSON envelope into a payload of the expected shape.
///
/// - text that is not a JSON object → `MalformedResponse`
/// - an `error` field → `Upstream`
/// - no `response` field → `MissingField`
/// - `response` of the wrong shape → `MalformedResponse`
///
/// For [`ResponseShape::Structured`], `response` may be an object or a
/// string containing a JSON object.
pub fn parse_envelope(text: &str, shape: ResponseShape) -> Result<Payload> {
    let envelope: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ModelError::MalformedResponse(format!("model text is not valid JSON: {e}")))?;
    let mut envelope = match envelope {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(ModelError::MalformedResponse(format!(
                "expected a JSON object envelope, got {other}"
            ))
            .into());
        }
    };

    if let Some(error) = envelope.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(ModelError::Upstream(format!("model error: {message}")).into());
    }

    let value = envelope
        .remove(RESPONSE_FIELD)
        .ok_or(ModelError::MissingField(RESPONSE_FIELD))?;

    match (shape, value) {
        (ResponseShape::PlainText, serde_json::Value::String(s)) => Ok(Payload::Text(s)),
        (ResponseShape::Structured, serde_json::Value::Object(map)) => {
            Ok(Payload::Structured(serde_json::Value::Object(map)))
        }
        (ResponseShape::Structured, serde_json::Value::String(s)) => {
            match serde_json::from_str::<serde_json::Value>(&s) {
                Ok(inner @ serde_json::Value::Object(_)) => Ok(Payload::Structured(inner)),
                _ => Err(ModelError::MalformedResponse(
                    "response field does not hold a JSON object".into(),
                )
                .into()),
            }
        }
        (shape, other) => Err(ModelError::MalformedResponse(format!(
            "response field has the wrong shape for {shape:?}: {other}"
        ))
        .into()),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfigBody,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigBody {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    response_modalities: Vec<&'static str>,
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}
