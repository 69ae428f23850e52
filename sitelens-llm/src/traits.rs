use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitelens_common::Result;

/// An image sent inline with a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data,
        }
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

/// A single multimodal generation request.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// Attached after the prompt text, in order.
    pub images: Vec<InlineImage>,
    pub max_tokens: Option<u32>,
    /// Ask the provider to constrain output to JSON.
    pub json_output: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response for the prompt and any attached images.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// System prompt used for design reviews.
    fn default_review_system_prompt(&self) -> &str {
        r#"You are a senior web designer and UX reviewer who compares live websites from screenshots.

Guidelines:
- Judge only what is visible in the screenshots
- Be specific: name colors, fonts, spacing and components you can see
- Score consistently across sites so the numbers are comparable
- Answer with JSON only, following the requested structure exactly"#
    }
}
