use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::Record;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub user_id: String,
    pub spanish_text: String,
    pub guarani_text: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Translation {
    const COLLECTION: &'static str = "translations";

    fn id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TranslateRequest {
    #[validate(length(max = 2000))]
    pub text: String,
}
