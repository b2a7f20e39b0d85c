use serde::{Deserialize, Serialize};

use crate::store::Record;

pub const GRAMMAR_SCORE_STEP: f64 = 0.5;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
}

impl CefrLevel {
    pub fn for_score(overall: f64) -> Self {
        match overall {
            s if s < 20.0 => Self::A1,
            s if s < 40.0 => Self::A2,
            s if s < 60.0 => Self::B1,
            s if s < 80.0 => Self::B2,
            _ => Self::C1,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::A1 => "Principiante",
            Self::A2 => "Elemental",
            Self::B1 => "Intermedio",
            Self::B2 => "Intermedio alto",
            Self::C1 => "Avanzado",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConversationLevel {
    pub user_id: String,
    pub current_level: CefrLevel,
    pub total_sessions: u32,
    pub total_messages: u32,
    pub total_time_minutes: u32,
    pub vocabulary_size: u32,
    pub grammar_score: f64,
    pub vocabulary_score: f64,
    pub fluency_score: f64,
    pub comprehension_score: f64,
}

impl Record for UserConversationLevel {
    const COLLECTION: &'static str = "conversation_levels";

    fn id(&self) -> String {
        self.user_id.clone()
    }
}

impl UserConversationLevel {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_level: CefrLevel::A1,
            total_sessions: 0,
            total_messages: 0,
            total_time_minutes: 0,
            vocabulary_size: 0,
            grammar_score: 0.0,
            vocabulary_score: 0.0,
            fluency_score: 0.0,
            comprehension_score: 0.0,
        }
    }

    pub fn overall_score(&self) -> f64 {
        0.30 * self.grammar_score
            + 0.25 * self.vocabulary_score
            + 0.25 * self.fluency_score
            + 0.20 * self.comprehension_score
    }

    pub fn record_message(&mut self, word_count: u32, correction_count: usize) {
        self.total_messages += 1;
        if correction_count == 0 {
            self.grammar_score = (self.grammar_score + GRAMMAR_SCORE_STEP).min(MAX_SCORE);
        }
        self.vocabulary_size += word_count.saturating_sub(2);
    }

    pub fn record_session(&mut self, minutes: u32) {
        self.total_sessions += 1;
        self.total_time_minutes += minutes;
        self.current_level = CefrLevel::for_score(self.overall_score());
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationLevelView {
    #[serde(flatten)]
    pub level: UserConversationLevel,
    pub level_name: &'static str,
    pub overall_score: f64,
}

impl From<UserConversationLevel> for ConversationLevelView {
    fn from(level: UserConversationLevel) -> Self {
        Self {
            level_name: level.current_level.display_name(),
            overall_score: (level.overall_score() * 10.0).round() / 10.0,
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_score_uses_weights() {
        let mut level = UserConversationLevel::new("u1");
        level.grammar_score = 100.0;
        level.vocabulary_score = 40.0;
        level.fluency_score = 20.0;
        level.comprehension_score = 50.0;
        // 30 + 10 + 5 + 10
        assert!((level.overall_score() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn clean_messages_raise_grammar_until_cap() {
        let mut level = UserConversationLevel::new("u1");
        level.grammar_score = 99.8;
        level.record_message(5, 0);
        assert_eq!(level.grammar_score, 100.0);
        assert_eq!(level.vocabulary_size, 3);

        level.record_message(1, 2);
        assert_eq!(level.grammar_score, 100.0);
        assert_eq!(level.vocabulary_size, 3);
        assert_eq!(level.total_messages, 2);
    }

    #[test]
    fn closing_a_session_rederives_the_level() {
        let mut level = UserConversationLevel::new("u1");
        level.grammar_score = 100.0;
        level.vocabulary_score = 100.0;
        level.record_session(12);
        assert_eq!(level.current_level, CefrLevel::B1);
        assert_eq!(level.total_sessions, 1);
        assert_eq!(level.total_time_minutes, 12);
    }
}
