use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::store::Record;

pub const DEFAULT_DECK: &str = "General";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub user_id: String,
    pub spanish_word: String,
    pub guarani_word: String,
    pub example: String,
    pub notes: String,
    pub deck_name: String,
    pub is_favorite: bool,
    pub times_reviewed: u32,
    pub times_correct: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Flashcard {
    const COLLECTION: &'static str = "flashcards";

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl Flashcard {
    pub fn accuracy(&self) -> u32 {
        if self.times_reviewed == 0 {
            return 0;
        }
        (f64::from(self.times_correct) / f64::from(self.times_reviewed) * 100.0).round() as u32
    }

    pub fn record_review(&mut self, is_correct: bool, now: DateTime<Utc>) {
        self.times_reviewed += 1;
        if is_correct {
            self.times_correct += 1;
        }
        self.last_reviewed = Some(now);
        self.updated_at = now;
    }
}

#[derive(Debug, Serialize)]
pub struct FlashcardView {
    #[serde(flatten)]
    pub card: Flashcard,
    pub accuracy: u32,
}

impl From<Flashcard> for FlashcardView {
    fn from(card: Flashcard) -> Self {
        Self {
            accuracy: card.accuracy(),
            card,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateFlashcardRequest {
    #[validate(length(min = 1, max = 200))]
    pub spanish_word: String,
    #[validate(length(min = 1, max = 200))]
    pub guarani_word: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub notes: String,
    #[validate(length(max = 100))]
    pub deck_name: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewFlashcardRequest {
    #[validate(length(min = 1))]
    pub flashcard_id: String,
    pub is_correct: bool,
}

/// Partial edit; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateFlashcardRequest {
    #[validate(length(min = 1, max = 200))]
    pub spanish_word: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub guarani_word: Option<String>,
    pub example: Option<String>,
    pub notes: Option<String>,
    #[validate(length(max = 100))]
    pub deck_name: Option<String>,
    pub is_favorite: Option<bool>,
}

impl UpdateFlashcardRequest {
    /// Applies the edit. Blank words are ignored and a blank deck falls
    /// back to the default one.
    pub fn apply_to(&self, card: &mut Flashcard, now: DateTime<Utc>) {
        if let Some(word) = self.spanish_word.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
            card.spanish_word = word.to_string();
        }
        if let Some(word) = self.guarani_word.as_deref().map(str::trim).filter(|w| !w.is_empty()) {
            card.guarani_word = word.to_string();
        }
        if let Some(example) = &self.example {
            card.example = example.clone();
        }
        if let Some(notes) = &self.notes {
            card.notes = notes.clone();
        }
        if let Some(deck) = self.deck_name.as_deref().map(str::trim) {
            let deck = if deck.is_empty() { DEFAULT_DECK } else { deck };
            card.deck_name = deck.to_string();
        }
        if let Some(is_favorite) = self.is_favorite {
            card.is_favorite = is_favorite;
        }
        card.updated_at = now;
    }
}

pub const MAX_BULK_FLASHCARDS: u64 = 100;

/// Items are checked one by one so a bad entry does not sink the batch.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkCreateFlashcardsRequest {
    #[validate(length(min = 1, max = MAX_BULK_FLASHCARDS))]
    pub flashcards: Vec<CreateFlashcardRequest>,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateFlashcardsResponse {
    pub created: usize,
    pub errors: Vec<String>,
    pub flashcards: Vec<FlashcardView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckSummary {
    pub deck_name: String,
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct FlashcardListQuery {
    pub deck: Option<String>,
    pub favorites: Option<bool>,
}
