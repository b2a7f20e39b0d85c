//! Client for the hosted text generation model.
//!
//! Services depend on [`TextGenerator`] only, so tests can swap in a
//! scripted implementation.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GeminiConfig;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub history: Vec<Turn>,
    pub message: String,
    /// Ask the model for a JSON document instead of prose.
    pub json_response: bool,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> CoreResult<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn build_body(request: &GenerationRequest) -> GeminiRequest<'_> {
    let mut contents: Vec<Content<'_>> = request
        .history
        .iter()
        .map(|turn| Content {
            role: turn.role.as_str(),
            parts: vec![Part { text: &turn.text }],
        })
        .collect();
    contents.push(Content {
        role: Role::User.as_str(),
        parts: vec![Part {
            text: &request.message,
        }],
    });

    GeminiRequest {
        contents,
        system_instruction: (!request.system_instruction.is_empty()).then(|| SystemInstruction {
            parts: vec![Part {
                text: &request.system_instruction,
            }],
        }),
        generation_config: request.json_response.then_some(GenerationConfig {
            response_mime_type: "application/json",
        }),
    }
}

fn extract_text(response: GeminiResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> CoreResult<String> {
        if self.config.api_key.is_empty() {
            return Err(CoreError::external("text generation is not configured"));
        }

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&build_body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::external("request timed out")
                } else {
                    CoreError::external(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            tracing::error!("Gemini returned {}: {}", status, snippet);
            return Err(CoreError::external(format!("upstream returned {}", status)));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| CoreError::external(format!("unreadable response: {}", e)))?;

        extract_text(parsed).ok_or_else(|| CoreError::external("empty response"))
    }
}
