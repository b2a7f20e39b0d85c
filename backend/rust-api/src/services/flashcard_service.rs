use mongodb::bson::doc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::models::flashcard::{
    CreateFlashcardRequest, DeckSummary, Flashcard, UpdateFlashcardRequest, DEFAULT_DECK,
};
use crate::store::Repository;
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct FlashcardService {
    cards: Repository<Flashcard>,
    clock: Arc<dyn Clock>,
}

impl FlashcardService {
    pub fn new(state: &AppState) -> Self {
        Self {
            cards: Repository::new(state.store.clone()),
            clock: state.clock.clone(),
        }
    }

    pub async fn create(&self, user_id: &str, req: CreateFlashcardRequest) -> CoreResult<Flashcard> {
        let spanish_word = req.spanish_word.trim();
        let guarani_word = req.guarani_word.trim();
        if spanish_word.is_empty() || guarani_word.is_empty() {
            return Err(CoreError::invalid_argument(
                "spanish_word and guarani_word are required",
            ));
        }

        let deck_name = req
            .deck_name
            .as_deref()
            .map(str::trim)
            .filter(|deck| !deck.is_empty())
            .unwrap_or(DEFAULT_DECK);

        let now = self.clock.now();
        let card = Flashcard {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            spanish_word: spanish_word.to_string(),
            guarani_word: guarani_word.to_string(),
            example: req.example,
            notes: req.notes,
            deck_name: deck_name.to_string(),
            is_favorite: req.is_favorite,
            times_reviewed: 0,
            times_correct: 0,
            last_reviewed: None,
            created_at: now,
            updated_at: now,
        };

        let (card, _) = self.cards.create(&card).await?;
        Ok(card)
    }

    /// Creates each valid entry and reports the rest as
    /// `"Flashcard <n>: <reason>"`, numbered from 1.
    pub async fn bulk_create(
        &self,
        user_id: &str,
        requests: Vec<CreateFlashcardRequest>,
    ) -> CoreResult<(Vec<Flashcard>, Vec<String>)> {
        let mut created = Vec::with_capacity(requests.len());
        let mut errors = Vec::new();

        for (index, req) in requests.into_iter().enumerate() {
            let position = index + 1;
            if let Err(e) = req.validate() {
                errors.push(format!("Flashcard {}: {}", position, e));
                continue;
            }
            match self.create(user_id, req).await {
                Ok(card) => created.push(card),
                Err(CoreError::InvalidArgument(reason)) => {
                    errors.push(format!("Flashcard {}: {}", position, reason));
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "User {} bulk-created {} flashcards ({} rejected)",
            user_id,
            created.len(),
            errors.len()
        );
        Ok((created, errors))
    }

    pub async fn list(
        &self,
        user_id: &str,
        deck: Option<&str>,
        favorites_only: bool,
    ) -> CoreResult<Vec<Flashcard>> {
        let mut filter = doc! { "user_id": user_id };
        if let Some(deck) = deck.filter(|d| !d.is_empty()) {
            filter.insert("deck_name", deck);
        }
        if favorites_only {
            filter.insert("is_favorite", true);
        }
        let mut cards = self.cards.find(filter).await?;
        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(cards)
    }

    /// Card counts per deck, ordered by deck name.
    pub async fn decks(&self, user_id: &str) -> CoreResult<Vec<DeckSummary>> {
        let cards = self.cards.find(doc! { "user_id": user_id }).await?;

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for card in cards {
            *counts.entry(card.deck_name).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(deck_name, count)| DeckSummary { deck_name, count })
            .collect())
    }

    /// Unknown cards and cards of other learners are both `NotFound`.
    async fn owned(&self, user_id: &str, card_id: &str) -> CoreResult<Flashcard> {
        self.cards
            .get(card_id)
            .await?
            .filter(|card| card.user_id == user_id)
            .ok_or_else(|| CoreError::not_found(format!("Flashcard {}", card_id)))
    }

    pub async fn update(
        &self,
        user_id: &str,
        card_id: &str,
        edit: &UpdateFlashcardRequest,
    ) -> CoreResult<Flashcard> {
        let existing = self.owned(user_id, card_id).await?;

        let now = self.clock.now();
        let (card, _) = self
            .cards
            .modify(card_id, || existing.clone(), |card| edit.apply_to(card, now))
            .await?;
        Ok(card)
    }

    pub async fn delete(&self, user_id: &str, card_id: &str) -> CoreResult<()> {
        self.owned(user_id, card_id).await?;
        if !self.cards.delete(card_id).await? {
            return Err(CoreError::not_found(format!("Flashcard {}", card_id)));
        }
        tracing::info!("User {} deleted flashcard {}", user_id, card_id);
        Ok(())
    }

    pub async fn review(&self, user_id: &str, card_id: &str, is_correct: bool) -> CoreResult<Flashcard> {
        let existing = self.owned(user_id, card_id).await?;

        let now = self.clock.now();
        let (card, _) = self
            .cards
            .modify(card_id, || existing.clone(), |card| {
                card.record_review(is_correct, now)
            })
            .await?;
        Ok(card)
    }
}
