//! Lessons, flashcards and translation. Every write that earns XP is
//! forwarded to the learning-event pipeline after it has been stored.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResult};
use crate::{
    extractors::ValidatedJson,
    middlewares::auth::JwtClaims,
    models::{
        flashcard::{
            BulkCreateFlashcardsRequest, BulkCreateFlashcardsResponse, CreateFlashcardRequest,
            DeckSummary, FlashcardListQuery, FlashcardView, ReviewFlashcardRequest,
            UpdateFlashcardRequest,
        },
        progress::{UpdateProgressRequest, UserProgress},
        translation::{TranslateRequest, Translation},
    },
    services::{
        flashcard_service::FlashcardService,
        learning_events::{EventOutcome, LearningEvent, LearningEvents},
        lesson_progress_service::LessonProgressService,
        translation_service::TranslationService,
        AppState,
    },
};

#[derive(Debug, Serialize)]
pub struct LessonProgressResponse {
    pub progress: UserProgress,
    pub newly_completed: bool,
    /// Present only when this call completed the lesson.
    pub event: Option<EventOutcome>,
}

pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<UpdateProgressRequest>,
) -> ApiResult<LessonProgressResponse> {
    let update = LessonProgressService::new(&state)
        .update(&claims.sub, &req)
        .await?;

    let event = if update.newly_completed {
        let event = LearningEvent::LessonCompleted {
            score: Some(update.progress.score),
        };
        Some(LearningEvents::new(&state).record(&claims.sub, event).await?)
    } else {
        None
    };

    Ok(Json(LessonProgressResponse {
        progress: update.progress,
        newly_completed: update.newly_completed,
        event,
    }))
}

pub async fn list_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<Vec<UserProgress>> {
    let rows = LessonProgressService::new(&state).list(&claims.sub).await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct FlashcardResponse {
    pub flashcard: FlashcardView,
    pub event: EventOutcome,
}

pub async fn create_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<CreateFlashcardRequest>,
) -> ApiResult<FlashcardResponse> {
    let card = FlashcardService::new(&state).create(&claims.sub, req).await?;
    let event = LearningEvents::new(&state)
        .record(&claims.sub, LearningEvent::FlashcardCreated)
        .await?;

    Ok(Json(FlashcardResponse {
        flashcard: card.into(),
        event,
    }))
}

pub async fn list_flashcards(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<FlashcardListQuery>,
) -> ApiResult<Vec<FlashcardView>> {
    let cards = FlashcardService::new(&state)
        .list(
            &claims.sub,
            query.deck.as_deref(),
            query.favorites.unwrap_or(false),
        )
        .await?;
    Ok(Json(cards.into_iter().map(FlashcardView::from).collect()))
}

/// Every created card is a separate creation event, so the batch earns
/// what the same cards would earn one at a time.
pub async fn bulk_create_flashcards(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<BulkCreateFlashcardsRequest>,
) -> ApiResult<BulkCreateFlashcardsResponse> {
    let (cards, errors) = FlashcardService::new(&state)
        .bulk_create(&claims.sub, req.flashcards)
        .await?;

    let events = LearningEvents::new(&state);
    for _ in &cards {
        events
            .record(&claims.sub, LearningEvent::FlashcardCreated)
            .await?;
    }

    Ok(Json(BulkCreateFlashcardsResponse {
        created: cards.len(),
        errors,
        flashcards: cards.into_iter().map(FlashcardView::from).collect(),
    }))
}

pub async fn flashcard_decks(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<Vec<DeckSummary>> {
    let decks = FlashcardService::new(&state).decks(&claims.sub).await?;
    Ok(Json(decks))
}

pub async fn update_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(card_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateFlashcardRequest>,
) -> ApiResult<FlashcardView> {
    let card = FlashcardService::new(&state)
        .update(&claims.sub, &card_id, &req)
        .await?;
    Ok(Json(card.into()))
}

pub async fn delete_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(card_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    FlashcardService::new(&state)
        .delete(&claims.sub, &card_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn review_flashcard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<ReviewFlashcardRequest>,
) -> ApiResult<FlashcardResponse> {
    let card = FlashcardService::new(&state)
        .review(&claims.sub, &req.flashcard_id, req.is_correct)
        .await?;
    let event = LearningEvents::new(&state)
        .record(
            &claims.sub,
            LearningEvent::FlashcardReviewed {
                correct: req.is_correct,
            },
        )
        .await?;

    Ok(Json(FlashcardResponse {
        flashcard: card.into(),
        event,
    }))
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<TranslateRequest>,
) -> ApiResult<Translation> {
    let translation = TranslationService::new(&state)
        .translate(&claims.sub, &req.text)
        .await?;
    Ok(Json(translation))
}

pub async fn translation_history(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<Vec<Translation>> {
    let history = TranslationService::new(&state).history(&claims.sub).await?;
    Ok(Json(history))
}
