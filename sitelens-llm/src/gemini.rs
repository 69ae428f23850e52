use crate::traits::{InlineImage, LlmClient, LlmRequest, LlmResponse};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sitelens_common::{Result, SiteLensError};
use sitelens_http::{Auth, HttpClient, HttpError, RequestOpts};
use std::borrow::Cow;
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<GeminiSafetySetting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text(TextPart),
    Inline(InlinePart),
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlinePart {
    inline_data: GeminiBlob,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        GeminiPart::Text(TextPart {
            text: text.to_string(),
        })
    }

    fn image(image: &InlineImage) -> Self {
        GeminiPart::Inline(InlinePart {
            inline_data: GeminiBlob {
                mime_type: image.mime_type.clone(),
                data: BASE64.encode(&image.data),
            },
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiModelInfo {
    #[serde(default)]
    name: String,
}

/// Google Gemini API client.
///
/// Requires a valid API key and internet access.
pub struct GeminiClient {
    http: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a new client using the provided API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let http = Self::http_for(GEMINI_BASE_URL)?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    /// Point the client at a different API root (proxies, tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        let timeout = self.http.default_timeout;
        let retries = self.http.max_retries;
        self.http = Self::http_for(endpoint)?
            .with_timeout(timeout)
            .with_retries(retries);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.http = self.http.with_retries(retries);
        self
    }

    fn http_for(endpoint: &str) -> Result<HttpClient> {
        // Url::join drops the last segment unless the base ends with '/'.
        let base = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{endpoint}/")
        };
        HttpClient::new(&base)
            .map(|c| c.with_timeout(Duration::from_secs(180)))
            .map_err(|e| SiteLensError::Config(format!("Invalid Gemini endpoint: {e}")))
    }

    fn opts(&self) -> RequestOpts<'_> {
        RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: Cow::Borrowed(self.api_key.as_str()),
            }),
            ..Default::default()
        }
    }

    fn create_safety_settings() -> Vec<GeminiSafetySetting> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| GeminiSafetySetting {
            category,
            threshold: "BLOCK_MEDIUM_AND_ABOVE",
        })
        .collect()
    }

    fn build_request(request: &LlmRequest) -> GeminiRequest {
        let generation_config = if request.max_tokens.is_some() || request.json_output {
            Some(GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                response_mime_type: request.json_output.then_some("application/json"),
            })
        } else {
            None
        };

        // Handle system instruction (Gemini's system prompt)
        let system_instruction =
            request
                .system_prompt
                .as_deref()
                .map(|sys_prompt| GeminiSystemInstruction {
                    parts: vec![GeminiPart::text(sys_prompt)],
                });

        let mut parts = Vec::with_capacity(1 + request.images.len());
        parts.push(GeminiPart::text(&request.prompt));
        parts.extend(request.images.iter().map(GeminiPart::image));

        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts,
            }],
            generation_config,
            safety_settings: Some(Self::create_safety_settings()),
            system_instruction,
        }
    }
}

fn map_http_error(err: HttpError) -> SiteLensError {
    match err.status().map(|s| s.as_u16()) {
        Some(429) => SiteLensError::Llm(format!("Gemini rate limit exceeded: {err}")),
        Some(401) | Some(403) => SiteLensError::Llm(format!("Gemini rejected the API key: {err}")),
        _ => SiteLensError::Llm(format!("Gemini request failed: {err}")),
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let path = format!("models/{}:generateContent", self.model);
        let body = Self::build_request(request);

        tracing::debug!(
            model = %self.model,
            images = request.images.len(),
            image_bytes = request.images.iter().map(|i| i.data.len()).sum::<usize>(),
            json_output = request.json_output,
            "gemini.generate"
        );

        let gemini_response: GeminiResponse = self
            .http
            .post_json_opts(&path, &body, self.opts())
            .await
            .map_err(map_http_error)?;

        let Some(candidate) = gemini_response.candidates.first() else {
            let reason = gemini_response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!(" (prompt blocked: {r})"))
                .unwrap_or_default();
            return Err(SiteLensError::Llm(format!(
                "No candidates returned from Gemini{reason}"
            )));
        };

        // Check for safety blocks
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(SiteLensError::Llm(
                "Content blocked by Gemini safety filters".to_string(),
            ));
        }

        let text: String = candidate
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.is_empty() {
            return Err(SiteLensError::Llm(
                "No content parts in Gemini response".to_string(),
            ));
        }

        Ok(LlmResponse {
            text,
            model: Some(self.model.clone()),
            tokens_used: gemini_response
                .usage_metadata
                .and_then(|u| u.total_token_count),
            finish_reason: candidate.finish_reason.clone(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let path = format!("models/{}", self.model);
        match self.http.get_json::<GeminiModelInfo>(&path, self.opts()).await {
            Ok(info) => {
                tracing::debug!(model = %info.name, "gemini.health_check.ok");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
