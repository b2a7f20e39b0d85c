use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use crate::store::Record;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// A named conversation scenario. `key` is the stable lowercase slug
/// (`market`, `greetings`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMode {
    pub key: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub system_prompt: String,
    pub example_phrases: Vec<String>,
    pub difficulty_level: Difficulty,
    pub is_active: bool,
}

impl Record for ConversationMode {
    const COLLECTION: &'static str = "conversation_modes";

    fn id(&self) -> String {
        self.key.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub mode: Option<String>,
    pub difficulty_level: Difficulty,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub message_count: u32,
    pub words_used: u32,
    pub grammar_errors: u32,
    pub pronunciation_score: Option<f64>,
}

impl Record for ChatSession {
    const COLLECTION: &'static str = "chat_sessions";

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl ChatSession {
    pub fn open(
        id: String,
        user_id: &str,
        mode: Option<String>,
        difficulty_level: Difficulty,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            mode,
            difficulty_level,
            started_at: now,
            ended_at: None,
            duration_seconds: 0,
            message_count: 0,
            words_used: 0,
            grammar_errors: 0,
            pronunciation_score: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrammarCorrection {
    pub original_text: String,
    pub corrected_text: String,
    pub error_type: String,
    pub explanation: String,
    pub severity: ErrorSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub message: String,
    pub response: String,
    pub word_count: u32,
    pub corrections: Vec<GrammarCorrection>,
    pub created_at: DateTime<Utc>,
}

impl Record for ChatMessage {
    const COLLECTION: &'static str = "chat_messages";

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Performance {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionAnalysis {
    pub duration_minutes: i64,
    pub messages_sent: u32,
    pub words_used: u32,
    pub grammar_errors: u32,
    pub accuracy_rate: f64,
    pub most_common_words: Vec<WordCount>,
    pub error_breakdown: BTreeMap<String, u32>,
    pub performance: Performance,
}

#[derive(Debug, Serialize)]
pub struct ChatSessionView {
    #[serde(flatten)]
    pub session: ChatSession,
    pub mode_name: Option<String>,
    pub mode_icon: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatSessionDetail {
    #[serde(flatten)]
    pub session: ChatSessionView,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct OpenSessionRequest {
    #[validate(length(min = 1, max = 50))]
    pub mode: Option<String>,
    pub difficulty_level: Option<Difficulty>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub session_id: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub mode: Option<String>,
    pub difficulty_level: Option<Difficulty>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub session_id: String,
    pub response: String,
    pub message: ChatMessage,
    pub corrections: Vec<GrammarCorrection>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloseSessionRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct CloseSessionResponse {
    pub session: ChatSession,
    pub analysis: SessionAnalysis,
}
