use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakOutcome {
    Advanced,
    NoOp,
    Reset,
}

impl StreakOutcome {
    pub fn changed(self) -> bool {
        self != Self::NoOp
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Advanced => "advanced",
            Self::NoOp => "no_op",
            Self::Reset => "reset",
        }
    }
}

/// How streak freezes are earned.
#[derive(Debug, Clone, Copy)]
pub struct FreezePolicy {
    /// A freeze is earned whenever a consecutive-day advance lands on a
    /// multiple of this many days. Zero disables earning.
    pub earn_every_days: u32,
    pub max_banked: u32,
}

impl Default for FreezePolicy {
    fn default() -> Self {
        Self {
            earn_every_days: 7,
            max_banked: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStreak {
    pub user_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub freeze_count: u32,
    pub total_days_studied: u32,
}

impl Record for UserStreak {
    const COLLECTION: &'static str = "streaks";

    fn id(&self) -> String {
        self.user_id.clone()
    }
}

impl UserStreak {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            freeze_count: 0,
            total_days_studied: 0,
        }
    }

    /// Credits activity on `today`.
    ///
    /// A freeze only bridges a gap of exactly two days. Longer gaps reset the
    /// streak even when freezes are banked. A `today` that is not after the
    /// last recorded day is a no-op.
    pub fn register_activity(&mut self, today: NaiveDate, policy: &FreezePolicy) -> StreakOutcome {
        let Some(last) = self.last_activity_date else {
            self.current_streak = 1;
            self.credit_day(today);
            return StreakOutcome::Advanced;
        };

        match (today - last).num_days() {
            gap if gap <= 0 => StreakOutcome::NoOp,
            1 => {
                self.current_streak += 1;
                self.credit_day(today);
                self.maybe_earn_freeze(policy);
                StreakOutcome::Advanced
            }
            2 if self.freeze_count > 0 => {
                self.freeze_count -= 1;
                self.current_streak += 1;
                self.credit_day(today);
                StreakOutcome::Advanced
            }
            _ => {
                self.current_streak = 1;
                self.credit_day(today);
                StreakOutcome::Reset
            }
        }
    }

    fn credit_day(&mut self, today: NaiveDate) {
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.total_days_studied += 1;
        self.last_activity_date = Some(today);
    }

    fn maybe_earn_freeze(&mut self, policy: &FreezePolicy) {
        if policy.earn_every_days == 0 || self.current_streak % policy.earn_every_days != 0 {
            return;
        }
        if self.freeze_count < policy.max_banked {
            self.freeze_count += 1;
        }
    }
}
