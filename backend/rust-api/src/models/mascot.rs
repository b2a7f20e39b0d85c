use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::Record;

pub const DEFAULT_MASCOT_NAME: &str = "Tatú";

/// Largest single XP grant the ledger accepts.
pub const MAX_XP_GRANT: i64 = 100_000;

/// XP totals are stored as BSON int64.
const MAX_TOTAL_XP: u64 = i64::MAX as u64;

/// XP needed to leave `level`.
pub fn xp_for_next_level(level: u32) -> u64 {
    100 * u64::from(level)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MascotState {
    Happy,
    Celebrating,
    Sleeping,
    Evolving,
    Normal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionStage {
    Baby,
    Young,
    Adult,
    Elder,
    Master,
}

impl EvolutionStage {
    pub fn for_level(level: u32) -> Self {
        match level {
            0..=4 => Self::Baby,
            5..=9 => Self::Young,
            10..=19 => Self::Adult,
            20..=29 => Self::Elder,
            _ => Self::Master,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mascot {
    pub user_id: String,
    pub name: String,
    pub level: u32,
    pub current_xp: u64,
    pub total_xp: u64,
    pub state: MascotState,
    pub last_interaction: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Record for Mascot {
    const COLLECTION: &'static str = "mascots";

    fn id(&self) -> String {
        self.user_id.clone()
    }
}

impl Mascot {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: DEFAULT_MASCOT_NAME.to_string(),
            level: 1,
            current_xp: 0,
            total_xp: 0,
            state: MascotState::Normal,
            last_interaction: now,
            created_at: now,
        }
    }

    /// Credits `amount` XP, carrying overflow into as many level-ups as it
    /// covers. Returns whether the level changed, or `None` without touching
    /// the mascot when the totals would leave the storable range.
    pub fn add_xp(&mut self, amount: u64, now: DateTime<Utc>) -> Option<bool> {
        let total_xp = self
            .total_xp
            .checked_add(amount)
            .filter(|total| *total <= MAX_TOTAL_XP)?;
        let current_xp = self.current_xp.checked_add(amount)?;
        self.current_xp = current_xp;
        self.total_xp = total_xp;
        self.last_interaction = now;

        let mut leveled_up = false;
        while self.current_xp >= xp_for_next_level(self.level) {
            self.current_xp -= xp_for_next_level(self.level);
            self.level += 1;
            leveled_up = true;
        }

        self.state = if leveled_up {
            MascotState::Evolving
        } else {
            MascotState::Happy
        };
        Some(leveled_up)
    }

    pub fn xp_percentage(&self) -> u32 {
        (self.current_xp * 100 / xp_for_next_level(self.level)) as u32
    }

    pub fn evolution_stage(&self) -> EvolutionStage {
        EvolutionStage::for_level(self.level)
    }
}

#[derive(Debug, Serialize)]
pub struct MascotView {
    #[serde(flatten)]
    pub mascot: Mascot,
    pub xp_for_next_level: u64,
    pub evolution_stage: EvolutionStage,
    pub xp_percentage: u32,
}

impl From<Mascot> for MascotView {
    fn from(mascot: Mascot) -> Self {
        Self {
            xp_for_next_level: xp_for_next_level(mascot.level),
            evolution_stage: mascot.evolution_stage(),
            xp_percentage: mascot.xp_percentage(),
            mascot,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddXpRequest {
    #[validate(range(min = 1, max = MAX_XP_GRANT))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct AddXpResponse {
    pub mascot: MascotView,
    pub leveled_up: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Mascot {
        Mascot::new("u1", Utc::now())
    }

    #[test]
    fn threshold_grows_linearly() {
        for level in 1..50 {
            assert_eq!(xp_for_next_level(level), 100 * u64::from(level));
        }
    }

    #[test]
    fn overflow_carries_into_next_level() {
        let mut mascot = fresh();
        assert_eq!(mascot.add_xp(150, Utc::now()), Some(true));
        assert_eq!(mascot.level, 2);
        assert_eq!(mascot.current_xp, 50);
        assert_eq!(mascot.total_xp, 150);
        assert_eq!(mascot.state, MascotState::Evolving);
    }

    #[test]
    fn one_grant_can_cross_several_levels() {
        let mut mascot = fresh();
        // 100 + 200 + 300 = 600 takes level 1 to level 4
        assert_eq!(mascot.add_xp(650, Utc::now()), Some(true));
        assert_eq!(mascot.level, 4);
        assert_eq!(mascot.current_xp, 50);
    }

    #[test]
    fn current_xp_stays_below_threshold() {
        let mut mascot = fresh();
        for amount in [1, 7, 99, 100, 250, 1_000, 3, 4_999] {
            let before = mascot.total_xp;
            mascot.add_xp(amount, Utc::now()).unwrap();
            assert!(mascot.current_xp < xp_for_next_level(mascot.level));
            assert_eq!(mascot.total_xp, before + amount);
        }
    }

    #[test]
    fn small_grant_makes_mascot_happy() {
        let mut mascot = fresh();
        assert_eq!(mascot.state, MascotState::Normal);
        assert_eq!(mascot.add_xp(10, Utc::now()), Some(false));
        assert_eq!(mascot.state, MascotState::Happy);
        assert_eq!(mascot.xp_percentage(), 10);
    }

    #[test]
    fn grant_past_the_storable_total_is_refused() {
        let mut mascot = fresh();
        mascot.total_xp = MAX_TOTAL_XP - 10;
        assert_eq!(mascot.add_xp(11, Utc::now()), None);
        assert_eq!(mascot.total_xp, MAX_TOTAL_XP - 10);
        assert_eq!(mascot.state, MascotState::Normal);
        assert_eq!(mascot.add_xp(10, Utc::now()), Some(false));
    }

    #[test]
    fn evolution_stages_follow_level_bands() {
        assert_eq!(EvolutionStage::for_level(1), EvolutionStage::Baby);
        assert_eq!(EvolutionStage::for_level(5), EvolutionStage::Young);
        assert_eq!(EvolutionStage::for_level(19), EvolutionStage::Adult);
        assert_eq!(EvolutionStage::for_level(20), EvolutionStage::Elder);
        assert_eq!(EvolutionStage::for_level(30), EvolutionStage::Master);
    }
}
