use serde::Deserialize;
use std::sync::Arc;

use super::gemini_client::{GenerationRequest, TextGenerator};
use super::prompts;
use crate::metrics::{track_llm_request, GRAMMAR_ANALYSIS_FAILURES_TOTAL};
use crate::models::chat::{ErrorSeverity, GrammarCorrection};

const NASAL_VOWELS: &[char] = &[
    'ã', 'ẽ', 'ĩ', 'õ', 'ũ', 'ỹ', 'Ã', 'Ẽ', 'Ĩ', 'Õ', 'Ũ', 'Ỹ',
];

/// Only messages that look like written Guaraní are sent for review.
pub fn has_nasal_vowel(text: &str) -> bool {
    text.chars().any(|c| NASAL_VOWELS.contains(&c))
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarParseError {
    #[error("response is not valid corrections JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("correction {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
}

impl GrammarParseError {
    fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_json",
            Self::EmptyField { .. } => "invalid_field",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CorrectionsPayload {
    List(Vec<RawCorrection>),
    Wrapped { corrections: Vec<RawCorrection> },
}

#[derive(Deserialize)]
struct RawCorrection {
    original_text: String,
    corrected_text: String,
    error_type: String,
    explanation: String,
    #[serde(default)]
    severity: ErrorSeverity,
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (```json) up to the first newline
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses the model's answer against the corrections schema. A bare array and
/// an object with a `corrections` array are both accepted, optionally wrapped
/// in a markdown code fence.
pub fn parse_corrections(raw: &str) -> Result<Vec<GrammarCorrection>, GrammarParseError> {
    let payload: CorrectionsPayload = serde_json::from_str(strip_fences(raw))?;
    let raw_items = match payload {
        CorrectionsPayload::List(items) => items,
        CorrectionsPayload::Wrapped { corrections } => corrections,
    };

    raw_items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let required = [
                ("original_text", &item.original_text),
                ("corrected_text", &item.corrected_text),
                ("error_type", &item.error_type),
            ];
            if let Some(&(field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
                return Err(GrammarParseError::EmptyField { index, field });
            }
            Ok(GrammarCorrection {
                original_text: item.original_text.trim().to_string(),
                corrected_text: item.corrected_text.trim().to_string(),
                error_type: item.error_type.trim().to_lowercase(),
                explanation: item.explanation.trim().to_string(),
                severity: item.severity,
            })
        })
        .collect()
}

pub struct GrammarAnalyzer {
    llm: Arc<dyn TextGenerator>,
}

impl GrammarAnalyzer {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Best effort: any failure is counted and yields no corrections.
    pub async fn analyze(&self, message: &str) -> Vec<GrammarCorrection> {
        if !has_nasal_vowel(message) {
            return Vec::new();
        }

        let request = GenerationRequest {
            system_instruction: prompts::GRAMMAR_SYSTEM_INSTRUCTION.to_string(),
            history: Vec::new(),
            message: prompts::grammar_prompt(message),
            json_response: true,
        };

        let raw = match track_llm_request("grammar", self.llm.generate(&request)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Grammar analysis request failed: {}", e);
                GRAMMAR_ANALYSIS_FAILURES_TOTAL
                    .with_label_values(&["request_failed"])
                    .inc();
                return Vec::new();
            }
        };

        match parse_corrections(&raw) {
            Ok(corrections) => corrections,
            Err(e) => {
                tracing::warn!("Discarding grammar analysis: {}", e);
                GRAMMAR_ANALYSIS_FAILURES_TOTAL
                    .with_label_values(&[e.reason()])
                    .inc();
                Vec::new()
            }
        }
    }
}
