use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::metrics::{LEVEL_UPS_TOTAL, STREAK_TRANSITIONS_TOTAL, XP_GRANTED_TOTAL};
use crate::models::mascot::{Mascot, MAX_XP_GRANT};
use crate::models::progress::LearnerTotals;
use crate::models::streak::{FreezePolicy, StreakOutcome, UserStreak};
use crate::store::Repository;
use crate::utils::time::Clock;

#[derive(Debug, Clone, Serialize)]
pub struct RewardOutcome {
    pub mascot: Mascot,
    pub totals: LearnerTotals,
    pub leveled_up: bool,
}

/// XP, mascot level and streak bookkeeping.
#[derive(Clone)]
pub struct ProgressionService {
    mascots: Repository<Mascot>,
    streaks: Repository<UserStreak>,
    totals: Repository<LearnerTotals>,
    clock: Arc<dyn Clock>,
    freeze_policy: FreezePolicy,
}

impl ProgressionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            mascots: Repository::new(state.store.clone()),
            streaks: Repository::new(state.store.clone()),
            totals: Repository::new(state.store.clone()),
            clock: state.clock.clone(),
            freeze_policy: state.config.rewards.freeze_policy(),
        }
    }

    pub async fn get_or_create_mascot(&self, user_id: &str) -> CoreResult<Mascot> {
        let now = self.clock.now();
        Ok(self
            .mascots
            .get_or_create(user_id, || Mascot::new(user_id, now))
            .await?)
    }

    /// Credits the mascot only. Callers that pay out rewards go through
    /// [`grant_reward`](Self::grant_reward) so totals never drift from it.
    pub async fn add_xp(&self, user_id: &str, amount: i64) -> CoreResult<(Mascot, bool)> {
        if amount <= 0 {
            return Err(CoreError::invalid_argument("XP amount must be positive"));
        }
        if amount > MAX_XP_GRANT {
            return Err(CoreError::invalid_argument(format!(
                "XP amount must not exceed {}",
                MAX_XP_GRANT
            )));
        }
        let amount = amount as u64;
        let now = self.clock.now();

        let (mascot, leveled_up) = self
            .mascots
            .modify(user_id, || Mascot::new(user_id, now), |m| m.add_xp(amount, now))
            .await?;
        let leveled_up = leveled_up
            .ok_or_else(|| CoreError::invalid_argument("XP total out of range"))?;

        if leveled_up {
            LEVEL_UPS_TOTAL.inc();
            tracing::info!(
                "Mascot of user {} reached level {} ({} XP total)",
                user_id,
                mascot.level,
                mascot.total_xp
            );
        }

        Ok((mascot, leveled_up))
    }

    /// Pays `xp` to the learner: mascot first, then the running totals.
    /// Both writes are compare-and-swap protected.
    pub async fn grant_reward(&self, user_id: &str, xp: u64, source: &str) -> CoreResult<RewardOutcome> {
        let amount = i64::try_from(xp)
            .map_err(|_| CoreError::invalid_argument("XP amount out of range"))?;
        let (mascot, leveled_up) = self.add_xp(user_id, amount).await?;

        let level = mascot.level;
        let (totals, _) = self
            .totals
            .modify(user_id, || LearnerTotals::new(user_id), |t| {
                t.total_xp = t.total_xp.saturating_add(xp);
                t.level = t.level.max(level);
            })
            .await?;

        XP_GRANTED_TOTAL.with_label_values(&[source]).inc_by(xp);
        tracing::debug!("Granted {} XP to {} from {}", xp, user_id, source);

        Ok(RewardOutcome {
            mascot,
            totals,
            leveled_up,
        })
    }

    pub async fn get_totals(&self, user_id: &str) -> CoreResult<LearnerTotals> {
        Ok(self
            .totals
            .get_or_create(user_id, || LearnerTotals::new(user_id))
            .await?)
    }

    pub async fn get_streak(&self, user_id: &str) -> CoreResult<UserStreak> {
        Ok(self
            .streaks
            .get_or_create(user_id, || UserStreak::new(user_id))
            .await?)
    }

    /// Credits today's activity to the streak.
    pub async fn update_streak(&self, user_id: &str) -> CoreResult<(UserStreak, StreakOutcome)> {
        let today = self.clock.today();
        let policy = self.freeze_policy;

        let (streak, outcome) = self
            .streaks
            .modify(user_id, || UserStreak::new(user_id), |s| {
                s.register_activity(today, &policy)
            })
            .await?;

        STREAK_TRANSITIONS_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();
        if outcome == StreakOutcome::Reset {
            tracing::info!("Streak of user {} reset on {}", user_id, today);
        }

        Ok((streak, outcome))
    }
}
