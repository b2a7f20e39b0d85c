use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{owned_key, Record};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    FirstLesson,
    FiveLessons,
    TenLessons,
    WeekStreak,
}

impl AchievementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstLesson => "first_lesson",
            Self::FiveLessons => "five_lessons",
            Self::TenLessons => "ten_lessons",
            Self::WeekStreak => "week_streak",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::FirstLesson => "Primer paso",
            Self::FiveLessons => "Aprendiz constante",
            Self::TenLessons => "Estudiante dedicado",
            Self::WeekStreak => "Semana completa",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::FirstLesson => "Completaste tu primera lección",
            Self::FiveLessons => "Completaste 5 lecciones",
            Self::TenLessons => "Completaste 10 lecciones",
            Self::WeekStreak => "Estudiaste 7 días seguidos",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Self::FirstLesson => "🌱",
            Self::FiveLessons => "📚",
            Self::TenLessons => "🎓",
            Self::WeekStreak => "🔥",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub user_id: String,
    pub achievement_type: AchievementType,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

impl Record for Achievement {
    const COLLECTION: &'static str = "achievements";

    fn id(&self) -> String {
        owned_key(&self.user_id, self.achievement_type.as_str())
    }
}

impl Achievement {
    pub fn unlock(user_id: &str, achievement_type: AchievementType, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            achievement_type,
            title: achievement_type.title().to_string(),
            description: achievement_type.description().to_string(),
            icon: achievement_type.icon().to_string(),
            unlocked_at: now,
        }
    }
}
