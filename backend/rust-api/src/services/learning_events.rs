//! Fan-out of a single learning action.
//!
//! Every XP-producing action goes through [`LearningEvents::record`], which
//! pays the reward, re-checks achievements, advances the matching daily
//! challenges and finally writes the day's activity row (which is what
//! moves the streak).

use serde::Serialize;

use super::achievement_service::AchievementService;
use super::activity_service::{ActivityService, ActivityUpdate};
use super::challenge_service::{ChallengeProgressUpdate, ChallengeService};
use super::progression_service::{ProgressionService, RewardOutcome};
use super::AppState;
use crate::config::RewardsConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::achievement::Achievement;
use crate::models::activity::ActivityKind;
use crate::models::challenge::ChallengeType;

/// Lessons scored at or above this count toward the SCORE challenge.
pub const HIGH_SCORE: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningEvent {
    LessonCompleted { score: Option<u32> },
    FlashcardReviewed { correct: bool },
    FlashcardCreated,
    ChatMessageSent,
    StudyTime { minutes: u32 },
}

impl LearningEvent {
    pub fn source(self) -> &'static str {
        match self {
            Self::LessonCompleted { .. } => "lesson",
            Self::FlashcardReviewed { .. } | Self::FlashcardCreated => "flashcard",
            Self::ChatMessageSent => "chatbot",
            Self::StudyTime { .. } => "study_time",
        }
    }
}

/// What an event is worth, computed before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPlan {
    pub xp: u64,
    pub activity: ActivityKind,
    pub activity_value: u32,
    pub challenges: Vec<(ChallengeType, u32)>,
}

pub fn plan(event: LearningEvent, rewards: &RewardsConfig) -> EventPlan {
    let (xp, activity, activity_value, mut challenges) = match event {
        LearningEvent::LessonCompleted { score } => {
            let mut challenges = vec![(ChallengeType::Lessons, 1)];
            if score.is_some_and(|s| s >= HIGH_SCORE) {
                challenges.push((ChallengeType::Score, 1));
            }
            (rewards.lesson_xp, ActivityKind::Lesson, 1, challenges)
        }
        LearningEvent::FlashcardReviewed { correct } => {
            let xp = if correct { rewards.flashcard_correct_xp } else { 0 };
            (xp, ActivityKind::Flashcard, 1, vec![(ChallengeType::Flashcards, 1)])
        }
        LearningEvent::FlashcardCreated => {
            (0, ActivityKind::Flashcard, 0, vec![(ChallengeType::Vocab, 1)])
        }
        LearningEvent::ChatMessageSent => (
            rewards.chat_message_xp,
            ActivityKind::Chatbot,
            1,
            vec![(ChallengeType::Chatbot, 1)],
        ),
        LearningEvent::StudyTime { minutes } => (
            rewards.study_time_xp.saturating_mul(u64::from(minutes)),
            ActivityKind::Time,
            minutes,
            Vec::new(),
        ),
    };

    if xp > 0 {
        challenges.push((ChallengeType::Xp, u32::try_from(xp).unwrap_or(u32::MAX)));
    }

    EventPlan {
        xp,
        activity,
        activity_value,
        challenges,
    }
}

#[derive(Debug, Serialize)]
pub struct EventOutcome {
    pub xp_awarded: u64,
    pub reward: Option<RewardOutcome>,
    pub achievements_unlocked: Vec<Achievement>,
    pub challenges: Vec<ChallengeProgressUpdate>,
    pub activity: ActivityUpdate,
}

#[derive(Clone)]
pub struct LearningEvents {
    progression: ProgressionService,
    achievements: AchievementService,
    challenges: ChallengeService,
    activity: ActivityService,
    rewards: RewardsConfig,
}

impl LearningEvents {
    pub fn new(state: &AppState) -> Self {
        Self {
            progression: ProgressionService::new(state),
            achievements: AchievementService::new(state),
            challenges: ChallengeService::new(state),
            activity: ActivityService::new(state),
            rewards: state.config.rewards.clone(),
        }
    }

    pub async fn record(&self, user_id: &str, event: LearningEvent) -> CoreResult<EventOutcome> {
        let plan = plan(event, &self.rewards);

        let reward = if plan.xp > 0 {
            Some(
                self.progression
                    .grant_reward(user_id, plan.xp, event.source())
                    .await?,
            )
        } else {
            None
        };

        let mut achievements_unlocked = self.achievements.evaluate(user_id).await?;

        let mut challenges = Vec::with_capacity(plan.challenges.len());
        for (challenge_type, increment) in plan.challenges {
            match self
                .challenges
                .record_progress(user_id, challenge_type, increment)
                .await
            {
                Ok(update) => challenges.push(update),
                Err(CoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let activity = self
            .activity
            .log_activity(user_id, plan.activity, plan.activity_value, plan.xp)
            .await?;

        // Challenge payouts and the activity step both credit the streak,
        // so streak badges are checked again once either has run.
        let streak_moved = activity.streak_outcome.changed()
            || challenges.iter().any(|update| update.just_completed);
        if streak_moved {
            achievements_unlocked.extend(self.achievements.evaluate(user_id).await?);
        }

        tracing::debug!(
            "Recorded {:?} for {} (+{} XP, streak {})",
            event,
            user_id,
            plan.xp,
            activity.streak_outcome.as_str()
        );

        Ok(EventOutcome {
            xp_awarded: plan.xp,
            reward,
            achievements_unlocked,
            challenges,
            activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(plan: &EventPlan) -> Vec<ChallengeType> {
        plan.challenges.iter().map(|(t, _)| *t).collect()
    }

    #[test]
    fn high_scoring_lesson_feeds_score_challenge() {
        let rewards = RewardsConfig::default();
        let plan = plan(LearningEvent::LessonCompleted { score: Some(85) }, &rewards);
        assert_eq!(plan.xp, 50);
        assert_eq!(plan.activity, ActivityKind::Lesson);
        assert_eq!(
            types(&plan),
            vec![ChallengeType::Lessons, ChallengeType::Score, ChallengeType::Xp]
        );
        assert_eq!(plan.challenges[2], (ChallengeType::Xp, 50));
    }

    #[test]
    fn low_or_missing_score_skips_score_challenge() {
        let rewards = RewardsConfig::default();
        for score in [None, Some(79)] {
            let plan = plan(LearningEvent::LessonCompleted { score }, &rewards);
            assert!(!types(&plan).contains(&ChallengeType::Score));
        }
    }

    #[test]
    fn wrong_flashcard_answer_earns_nothing() {
        let rewards = RewardsConfig::default();
        let plan = plan(LearningEvent::FlashcardReviewed { correct: false }, &rewards);
        assert_eq!(plan.xp, 0);
        assert_eq!(plan.activity_value, 1);
        assert_eq!(types(&plan), vec![ChallengeType::Flashcards]);
    }

    #[test]
    fn created_card_counts_toward_vocabulary_only() {
        let plan = plan(LearningEvent::FlashcardCreated, &RewardsConfig::default());
        assert_eq!(plan.xp, 0);
        assert_eq!(plan.activity_value, 0);
        assert_eq!(types(&plan), vec![ChallengeType::Vocab]);
    }

    #[test]
    fn study_time_routes_minutes() {
        let plan = plan(LearningEvent::StudyTime { minutes: 25 }, &RewardsConfig::default());
        assert_eq!(plan.activity, ActivityKind::Time);
        assert_eq!(plan.activity_value, 25);
        assert!(plan.challenges.is_empty());
    }
}
