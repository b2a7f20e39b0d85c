use mongodb::bson::doc;
use std::sync::Arc;

use super::AppState;
use crate::error::CoreResult;
use crate::metrics::ACHIEVEMENTS_UNLOCKED_TOTAL;
use crate::models::achievement::{Achievement, AchievementType};
use crate::models::progress::UserProgress;
use crate::models::streak::UserStreak;
use crate::store::Repository;
use crate::utils::time::Clock;

const WEEK_STREAK_DAYS: u32 = 7;

/// Achievements whose rule holds for the given counters. Lesson milestones
/// fire on the exact count.
pub fn earned(completed_lessons: usize, current_streak: u32) -> Vec<AchievementType> {
    let mut earned = Vec::new();
    match completed_lessons {
        1 => earned.push(AchievementType::FirstLesson),
        5 => earned.push(AchievementType::FiveLessons),
        10 => earned.push(AchievementType::TenLessons),
        _ => {}
    }
    if current_streak >= WEEK_STREAK_DAYS {
        earned.push(AchievementType::WeekStreak);
    }
    earned
}

#[derive(Clone)]
pub struct AchievementService {
    achievements: Repository<Achievement>,
    lessons: Repository<UserProgress>,
    streaks: Repository<UserStreak>,
    clock: Arc<dyn Clock>,
}

impl AchievementService {
    pub fn new(state: &AppState) -> Self {
        Self {
            achievements: Repository::new(state.store.clone()),
            lessons: Repository::new(state.store.clone()),
            streaks: Repository::new(state.store.clone()),
            clock: state.clock.clone(),
        }
    }

    /// Re-checks every rule and returns what this call unlocked.
    pub async fn evaluate(&self, user_id: &str) -> CoreResult<Vec<Achievement>> {
        let completed_lessons = self
            .lessons
            .find(doc! { "user_id": user_id, "completed": true })
            .await?
            .len();
        let current_streak = self
            .streaks
            .get(user_id)
            .await?
            .map(|s| s.current_streak)
            .unwrap_or(0);

        let now = self.clock.now();
        let mut unlocked = Vec::new();
        for achievement_type in earned(completed_lessons, current_streak) {
            let (achievement, created) = self
                .achievements
                .create(&Achievement::unlock(user_id, achievement_type, now))
                .await?;
            if created {
                ACHIEVEMENTS_UNLOCKED_TOTAL
                    .with_label_values(&[achievement_type.as_str()])
                    .inc();
                tracing::info!("User {} unlocked {}", user_id, achievement_type.as_str());
                unlocked.push(achievement);
            }
        }
        Ok(unlocked)
    }

    pub async fn list(&self, user_id: &str) -> CoreResult<Vec<Achievement>> {
        let mut achievements = self.achievements.find(doc! { "user_id": user_id }).await?;
        achievements.sort_by_key(|a| a.unlocked_at);
        Ok(achievements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_milestones_match_exact_counts() {
        assert_eq!(earned(1, 0), vec![AchievementType::FirstLesson]);
        assert_eq!(earned(5, 0), vec![AchievementType::FiveLessons]);
        assert_eq!(earned(10, 0), vec![AchievementType::TenLessons]);
        assert!(earned(2, 0).is_empty());
        assert!(earned(11, 6).is_empty());
    }

    #[test]
    fn week_streak_needs_seven_days() {
        assert_eq!(earned(0, 7), vec![AchievementType::WeekStreak]);
        assert_eq!(
            earned(1, 30),
            vec![AchievementType::FirstLesson, AchievementType::WeekStreak]
        );
    }
}
