use mongodb::bson::doc;
use std::sync::Arc;
use uuid::Uuid;

use super::gemini_client::{GenerationRequest, TextGenerator};
use super::{prompts, AppState};
use crate::error::{CoreError, CoreResult};
use crate::metrics::track_llm_request;
use crate::models::translation::Translation;
use crate::store::Repository;
use crate::utils::time::Clock;

pub const HISTORY_LIMIT: usize = 20;

#[derive(Clone)]
pub struct TranslationService {
    translations: Repository<Translation>,
    llm: Arc<dyn TextGenerator>,
    clock: Arc<dyn Clock>,
}

impl TranslationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            translations: Repository::new(state.store.clone()),
            llm: state.llm.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Spanish to Guaraní. Nothing is stored when generation fails.
    pub async fn translate(&self, user_id: &str, text: &str) -> CoreResult<Translation> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::invalid_argument("text is required"));
        }

        let request = GenerationRequest {
            system_instruction: prompts::TRANSLATION_SYSTEM_INSTRUCTION.to_string(),
            history: Vec::new(),
            message: prompts::translation_prompt(text),
            json_response: false,
        };
        let generated = track_llm_request("translate", self.llm.generate(&request)).await?;
        let guarani_text = generated.trim().trim_matches('"').trim();
        if guarani_text.is_empty() {
            return Err(CoreError::external("empty translation"));
        }

        let translation = Translation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            spanish_text: text.to_string(),
            guarani_text: guarani_text.to_string(),
            created_at: self.clock.now(),
        };
        let (translation, _) = self.translations.create(&translation).await?;
        Ok(translation)
    }

    pub async fn history(&self, user_id: &str) -> CoreResult<Vec<Translation>> {
        let mut rows = self.translations.find(doc! { "user_id": user_id }).await?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(HISTORY_LIMIT);
        Ok(rows)
    }
}
