use chrono::{Datelike, NaiveDate};
use mongodb::bson::doc;
use rand::{rngs::StdRng, seq::IndexedRandom, SeedableRng};
use serde::Serialize;
use std::sync::Arc;

use super::activity_service::ActivityService;
use super::progression_service::ProgressionService;
use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::metrics::CHALLENGES_COMPLETED_TOTAL;
use crate::models::challenge::{
    ChallengeProgressView, ChallengeType, DailyChallenge, UserChallengeProgress, CATALOG,
    CHALLENGES_PER_DAY,
};
use crate::store::Repository;
use crate::utils::time::Clock;

/// Picks the day's batch: distinct templates, one target each.
///
/// The generator is seeded from the date, so every replica and every retry
/// draws the same batch and concurrent first requests of the day converge
/// on the same three records.
pub fn draw_daily_batch(date: NaiveDate) -> Vec<DailyChallenge> {
    let seed = u64::from(date.num_days_from_ce().unsigned_abs()) ^ 0x9E37_79B9_7F4A_7C15;
    let mut rng = StdRng::seed_from_u64(seed);

    CATALOG
        .choose_multiple(&mut rng, CHALLENGES_PER_DAY)
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|template| {
            let target = *template.targets.choose(&mut rng)?;
            Some(DailyChallenge::from_template(template, target, date))
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ChallengeProgressUpdate {
    pub progress: ChallengeProgressView,
    pub just_completed: bool,
}

#[derive(Clone)]
pub struct ChallengeService {
    challenges: Repository<DailyChallenge>,
    progress: Repository<UserChallengeProgress>,
    progression: ProgressionService,
    activity: ActivityService,
    clock: Arc<dyn Clock>,
}

impl ChallengeService {
    pub fn new(state: &AppState) -> Self {
        Self {
            challenges: Repository::new(state.store.clone()),
            progress: Repository::new(state.store.clone()),
            progression: ProgressionService::new(state),
            activity: ActivityService::new(state),
            clock: state.clock.clone(),
        }
    }

    /// Idempotent per date.
    pub async fn ensure_daily_challenges(&self, date: NaiveDate) -> CoreResult<Vec<DailyChallenge>> {
        let existing = self.for_date(date).await?;
        if existing.len() >= CHALLENGES_PER_DAY {
            return Ok(existing);
        }

        let mut created = 0;
        for challenge in draw_daily_batch(date) {
            let (_, inserted) = self.challenges.create(&challenge).await?;
            if inserted {
                created += 1;
            }
        }
        if created > 0 {
            tracing::info!("Generated {} daily challenges for {}", created, date);
        }

        self.for_date(date).await
    }

    pub async fn for_date(&self, date: NaiveDate) -> CoreResult<Vec<DailyChallenge>> {
        let mut challenges = self
            .challenges
            .find(doc! { "date": date.to_string(), "is_active": true })
            .await?;
        challenges.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(challenges)
    }

    /// Today's challenges with the learner's progress, creating rows on first access.
    pub async fn daily_progress(&self, user_id: &str) -> CoreResult<Vec<ChallengeProgressView>> {
        let challenges = self.ensure_daily_challenges(self.clock.today()).await?;

        let mut views = Vec::with_capacity(challenges.len());
        for challenge in challenges {
            let key = UserChallengeProgress::key(user_id, &challenge.id);
            let progress = self
                .progress
                .get_or_create(&key, || UserChallengeProgress::new(user_id, &challenge))
                .await?;
            views.push(ChallengeProgressView::new(progress, challenge));
        }
        Ok(views)
    }

    /// Adds `increment` to the learner's progress on today's challenge of
    /// `challenge_type`. `NotFound` when no such challenge is scheduled today.
    pub async fn record_progress(
        &self,
        user_id: &str,
        challenge_type: ChallengeType,
        increment: u32,
    ) -> CoreResult<ChallengeProgressUpdate> {
        let today = self.clock.today();
        let challenge = self
            .ensure_daily_challenges(today)
            .await?
            .into_iter()
            .find(|c| c.challenge_type == challenge_type)
            .ok_or_else(|| {
                CoreError::not_found(format!("{} challenge for {}", challenge_type.as_str(), today))
            })?;

        let key = UserChallengeProgress::key(user_id, &challenge.id);
        self.progress
            .modify(&key, || UserChallengeProgress::new(user_id, &challenge), |p| {
                p.current_value = p.current_value.saturating_add(increment);
            })
            .await?;

        let (progress, just_completed) = self.check_completion(user_id, &challenge).await?;
        Ok(ChallengeProgressUpdate {
            progress: ChallengeProgressView::new(progress, challenge),
            just_completed,
        })
    }

    /// Completes the learner's row once its target is met and pays the
    /// reward into the ledger and today's activity row. Only the call that
    /// flips the flag pays.
    pub async fn check_completion(
        &self,
        user_id: &str,
        challenge: &DailyChallenge,
    ) -> CoreResult<(UserChallengeProgress, bool)> {
        let now = self.clock.now();
        let key = UserChallengeProgress::key(user_id, &challenge.id);

        let (progress, transitioned) = self
            .progress
            .modify(&key, || UserChallengeProgress::new(user_id, challenge), |p| {
                p.try_complete(challenge.target_value, now)
            })
            .await?;

        if transitioned {
            CHALLENGES_COMPLETED_TOTAL
                .with_label_values(&[challenge.challenge_type.as_str()])
                .inc();
            tracing::info!(
                "User {} completed challenge {} (+{} XP)",
                user_id,
                challenge.id,
                challenge.xp_reward
            );
            if challenge.xp_reward > 0 {
                let xp = u64::from(challenge.xp_reward);
                self.progression.grant_reward(user_id, xp, "challenge").await?;
                self.activity.log_reward(user_id, xp).await?;
            }
        }

        Ok((progress, transitioned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn batch_has_three_distinct_types_with_valid_targets() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for offset in 0..60 {
            let date = start + chrono::Days::new(offset);
            let batch = draw_daily_batch(date);
            assert_eq!(batch.len(), CHALLENGES_PER_DAY);

            let types: HashSet<_> = batch.iter().map(|c| c.challenge_type).collect();
            assert_eq!(types.len(), CHALLENGES_PER_DAY);

            for challenge in &batch {
                let template = CATALOG
                    .iter()
                    .find(|t| t.challenge_type == challenge.challenge_type)
                    .unwrap();
                assert!(template.targets.contains(&challenge.target_value));
                assert_eq!(challenge.date, date);
                assert!(challenge.is_active);
            }
        }
    }

    #[test]
    fn batch_is_stable_for_a_date() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 9).unwrap();
        let first: Vec<_> = draw_daily_batch(date).into_iter().map(|c| c.id).collect();
        let second: Vec<_> = draw_daily_batch(date).into_iter().map(|c| c.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn batches_vary_across_days() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let distinct: HashSet<Vec<ChallengeType>> = (0..30)
            .map(|offset| {
                let mut types: Vec<_> = draw_daily_batch(start + chrono::Days::new(offset))
                    .into_iter()
                    .map(|c| c.challenge_type)
                    .collect();
                types.sort_by_key(|t| t.as_str());
                types
            })
            .collect();
        assert!(distinct.len() > 1);
    }
}
