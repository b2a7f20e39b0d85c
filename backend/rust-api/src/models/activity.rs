use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{owned_key, Record};

/// Largest XP amount a single raw activity entry may carry.
pub const MAX_LOGGED_XP: u64 = 10_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Lesson,
    Flashcard,
    Chatbot,
    Time,
}

/// One row per user and calendar day. Counters only grow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityLog {
    pub user_id: String,
    pub date: NaiveDate,
    pub lessons_completed: u32,
    pub flashcards_reviewed: u32,
    pub chatbot_messages: u32,
    pub time_studied_minutes: u32,
    pub xp_earned: u64,
}

impl Record for ActivityLog {
    const COLLECTION: &'static str = "activity_logs";

    fn id(&self) -> String {
        owned_key(&self.user_id, &self.date.to_string())
    }
}

impl ActivityLog {
    pub fn new(user_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            lessons_completed: 0,
            flashcards_reviewed: 0,
            chatbot_messages: 0,
            time_studied_minutes: 0,
            xp_earned: 0,
        }
    }

    /// Adds `value` to the counter of `kind` and `xp` to the day's XP.
    /// Returns `false` without touching the row when either would overflow.
    pub fn apply(&mut self, kind: Option<ActivityKind>, value: u32, xp: u64) -> bool {
        let Some(xp_earned) = self
            .xp_earned
            .checked_add(xp)
            .filter(|total| i64::try_from(*total).is_ok())
        else {
            return false;
        };
        if let Some(kind) = kind {
            let counter = match kind {
                ActivityKind::Lesson => &mut self.lessons_completed,
                ActivityKind::Flashcard => &mut self.flashcards_reviewed,
                ActivityKind::Chatbot => &mut self.chatbot_messages,
                ActivityKind::Time => &mut self.time_studied_minutes,
            };
            let Some(count) = counter.checked_add(value) else {
                return false;
            };
            *counter = count;
        }
        self.xp_earned = xp_earned;
        true
    }
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct PeriodTotals {
    pub lessons: u32,
    pub flashcards: u32,
    pub messages: u32,
    pub time: u32,
    pub xp: u64,
}

impl PeriodTotals {
    pub fn add(&mut self, log: &ActivityLog) {
        self.lessons += log.lessons_completed;
        self.flashcards += log.flashcards_reviewed;
        self.messages += log.chatbot_messages;
        self.time += log.time_studied_minutes;
        self.xp += log.xp_earned;
    }
}

#[derive(Debug, Serialize)]
pub struct StudyStats {
    pub total_time_minutes: u32,
    pub total_time_hours: f64,
    pub week: PeriodTotals,
    pub month: PeriodTotals,
    pub best_study_hour: Option<u32>,
    pub total_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: String,
    pub user_id: String,
    pub activity_type: String,
    pub lesson_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
}

impl Record for StudySession {
    const COLLECTION: &'static str = "study_sessions";

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartStudySessionRequest {
    #[validate(length(min = 1, max = 50))]
    pub activity_type: String,
    pub lesson_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EndStudySessionRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LogActivityRequest {
    pub kind: ActivityKind,
    #[validate(range(min = 0, max = 1440))]
    pub value: u32,
    #[validate(range(max = MAX_LOGGED_XP))]
    #[serde(default)]
    pub xp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_routes_value_to_matching_counter() {
        let mut log = ActivityLog::new("u1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(log.apply(Some(ActivityKind::Lesson), 1, 50));
        assert!(log.apply(Some(ActivityKind::Time), 25, 0));
        assert!(log.apply(Some(ActivityKind::Chatbot), 1, 5));
        assert!(log.apply(None, 0, 20));

        assert_eq!(log.lessons_completed, 1);
        assert_eq!(log.time_studied_minutes, 25);
        assert_eq!(log.chatbot_messages, 1);
        assert_eq!(log.flashcards_reviewed, 0);
        assert_eq!(log.xp_earned, 75);
    }

    #[test]
    fn overflowing_entry_leaves_the_row_untouched() {
        let mut log = ActivityLog::new("u1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        log.time_studied_minutes = u32::MAX;
        assert!(!log.apply(Some(ActivityKind::Time), 1, 5));
        assert_eq!(log.xp_earned, 0);

        log.xp_earned = i64::MAX as u64;
        assert!(!log.apply(Some(ActivityKind::Lesson), 1, 1));
        assert_eq!(log.lessons_completed, 0);
    }
}
