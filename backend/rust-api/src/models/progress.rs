use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{owned_key, Record};

/// Running XP and level of a learner, kept next to the mascot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerTotals {
    pub user_id: String,
    pub total_xp: u64,
    pub level: u32,
}

impl Record for LearnerTotals {
    const COLLECTION: &'static str = "learner_totals";

    fn id(&self) -> String {
        self.user_id.clone()
    }
}

impl LearnerTotals {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            total_xp: 0,
            level: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    pub lesson_id: String,
    pub completed: bool,
    pub score: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Record for UserProgress {
    const COLLECTION: &'static str = "lesson_progress";

    fn id(&self) -> String {
        Self::key(&self.user_id, &self.lesson_id)
    }
}

impl UserProgress {
    pub fn key(user_id: &str, lesson_id: &str) -> String {
        owned_key(user_id, lesson_id)
    }

    pub fn new(user_id: &str, lesson_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            completed: false,
            score: 0,
            completed_at: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[validate(length(min = 1, max = 100))]
    pub lesson_id: String,
    #[serde(default)]
    pub completed: bool,
    #[validate(range(max = 100))]
    #[serde(default)]
    pub score: u32,
}

#[derive(Debug, Serialize)]
pub struct ProgressUpdateResponse {
    pub progress: UserProgress,
    pub newly_completed: bool,
}
