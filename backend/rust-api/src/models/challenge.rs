use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::{owned_key, Record};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeType {
    Flashcards,
    Lessons,
    Chatbot,
    Score,
    Xp,
    Vocab,
}

impl ChallengeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flashcards => "FLASHCARDS",
            Self::Lessons => "LESSONS",
            Self::Chatbot => "CHATBOT",
            Self::Score => "SCORE",
            Self::Xp => "XP",
            Self::Vocab => "VOCAB",
        }
    }
}

pub struct ChallengeTemplate {
    pub challenge_type: ChallengeType,
    description: &'static str,
    pub targets: &'static [u32],
    pub xp_reward: u32,
}

impl ChallengeTemplate {
    pub fn describe(&self, target: u32) -> String {
        self.description.replace("{n}", &target.to_string())
    }
}

pub const CHALLENGES_PER_DAY: usize = 3;

pub static CATALOG: [ChallengeTemplate; 6] = [
    ChallengeTemplate {
        challenge_type: ChallengeType::Flashcards,
        description: "Repasá {n} flashcards",
        targets: &[10, 15, 20],
        xp_reward: 30,
    },
    ChallengeTemplate {
        challenge_type: ChallengeType::Lessons,
        description: "Completá {n} lecciones",
        targets: &[1, 2, 3],
        xp_reward: 50,
    },
    ChallengeTemplate {
        challenge_type: ChallengeType::Chatbot,
        description: "Enviá {n} mensajes al chatbot",
        targets: &[5, 10, 15],
        xp_reward: 40,
    },
    ChallengeTemplate {
        challenge_type: ChallengeType::Score,
        description: "Terminá {n} lecciones con 80% o más",
        targets: &[1, 2],
        xp_reward: 45,
    },
    ChallengeTemplate {
        challenge_type: ChallengeType::Xp,
        description: "Ganá {n} XP",
        targets: &[50, 100, 150],
        xp_reward: 25,
    },
    ChallengeTemplate {
        challenge_type: ChallengeType::Vocab,
        description: "Agregá {n} palabras nuevas a tus flashcards",
        targets: &[5, 10],
        xp_reward: 35,
    },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyChallenge {
    pub id: String,
    pub challenge_type: ChallengeType,
    pub description: String,
    pub target_value: u32,
    pub xp_reward: u32,
    pub date: NaiveDate,
    pub is_active: bool,
}

impl Record for DailyChallenge {
    const COLLECTION: &'static str = "daily_challenges";

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl DailyChallenge {
    pub fn key(date: NaiveDate, challenge_type: ChallengeType) -> String {
        format!("{}:{}", date, challenge_type.as_str())
    }

    pub fn from_template(template: &ChallengeTemplate, target: u32, date: NaiveDate) -> Self {
        Self {
            id: Self::key(date, template.challenge_type),
            challenge_type: template.challenge_type,
            description: template.describe(target),
            target_value: target,
            xp_reward: template.xp_reward,
            date,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserChallengeProgress {
    pub user_id: String,
    pub challenge_id: String,
    pub challenge_type: ChallengeType,
    pub date: NaiveDate,
    pub current_value: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Record for UserChallengeProgress {
    const COLLECTION: &'static str = "challenge_progress";

    fn id(&self) -> String {
        Self::key(&self.user_id, &self.challenge_id)
    }
}

impl UserChallengeProgress {
    pub fn key(user_id: &str, challenge_id: &str) -> String {
        owned_key(user_id, challenge_id)
    }

    pub fn new(user_id: &str, challenge: &DailyChallenge) -> Self {
        Self {
            user_id: user_id.to_string(),
            challenge_id: challenge.id.clone(),
            challenge_type: challenge.challenge_type,
            date: challenge.date,
            current_value: 0,
            completed: false,
            completed_at: None,
        }
    }

    /// Marks the row completed once the target is reached. Returns `true`
    /// only on the transition; a completed row never transitions again.
    pub fn try_complete(&mut self, target_value: u32, now: DateTime<Utc>) -> bool {
        if self.completed || self.current_value < target_value {
            return false;
        }
        self.completed = true;
        self.completed_at = Some(now);
        true
    }
}

pub fn progress_percentage(current_value: u32, target_value: u32) -> u32 {
    if target_value == 0 {
        return 0;
    }
    (u64::from(current_value) * 100 / u64::from(target_value)).min(100) as u32
}

#[derive(Debug, Serialize)]
pub struct ChallengeProgressView {
    pub id: String,
    pub challenge: DailyChallenge,
    pub current_value: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress_percentage: u32,
}

impl ChallengeProgressView {
    pub fn new(progress: UserChallengeProgress, challenge: DailyChallenge) -> Self {
        Self {
            id: progress.id(),
            progress_percentage: progress_percentage(progress.current_value, challenge.target_value),
            current_value: progress.current_value,
            completed: progress.completed,
            completed_at: progress.completed_at,
            challenge,
        }
    }
}

pub const MAX_CHALLENGE_INCREMENT: u32 = 100;

fn default_increment() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateChallengeRequest {
    pub challenge_type: ChallengeType,
    #[serde(default = "default_increment")]
    #[validate(range(min = 1, max = MAX_CHALLENGE_INCREMENT))]
    pub increment: u32,
}

/// `completed` is true only on the call that completed the challenge.
#[derive(Debug, Serialize)]
pub struct UpdateChallengeResponse {
    pub progress: ChallengeProgressView,
    pub completed: bool,
}
