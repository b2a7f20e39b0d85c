use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use super::ApiResult;
use crate::{
    error::CoreError,
    extractors::ValidatedJson,
    middlewares::auth::JwtClaims,
    models::{
        achievement::Achievement,
        challenge::{ChallengeProgressView, UpdateChallengeRequest, UpdateChallengeResponse},
        mascot::{AddXpRequest, AddXpResponse, MascotView},
        progress::LearnerTotals,
        streak::UserStreak,
    },
    services::{
        achievement_service::AchievementService, activity_service::ActivityService,
        challenge_service::ChallengeService,
        progression_service::ProgressionService, AppState,
    },
};

pub async fn get_mascot(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<MascotView> {
    let mascot = ProgressionService::new(&state)
        .get_or_create_mascot(&claims.sub)
        .await?;
    Ok(Json(mascot.into()))
}

/// Direct XP grant. Goes through the reward path so the learner totals
/// move with the mascot, and through the recorder so the day's XP does too.
pub async fn add_xp(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<AddXpRequest>,
) -> ApiResult<AddXpResponse> {
    let xp = u64::try_from(req.amount)
        .map_err(|_| CoreError::invalid_argument("XP amount must be positive"))?;
    let outcome = ProgressionService::new(&state)
        .grant_reward(&claims.sub, xp, "manual")
        .await?;
    let activity = ActivityService::new(&state)
        .log_reward(&claims.sub, xp)
        .await?;
    if activity.streak_outcome.changed() {
        AchievementService::new(&state).evaluate(&claims.sub).await?;
    }

    Ok(Json(AddXpResponse {
        mascot: outcome.mascot.into(),
        leveled_up: outcome.leveled_up,
    }))
}

pub async fn get_totals(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<LearnerTotals> {
    let totals = ProgressionService::new(&state).get_totals(&claims.sub).await?;
    Ok(Json(totals))
}

pub async fn get_streak(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<UserStreak> {
    let streak = ProgressionService::new(&state).get_streak(&claims.sub).await?;
    Ok(Json(streak))
}

pub async fn daily_challenges(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<Vec<ChallengeProgressView>> {
    let views = ChallengeService::new(&state)
        .daily_progress(&claims.sub)
        .await?;
    Ok(Json(views))
}

/// Manual progress on one of today's challenges. A type that is not
/// scheduled today is `NotFound`.
pub async fn update_challenge(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<UpdateChallengeRequest>,
) -> ApiResult<UpdateChallengeResponse> {
    let update = ChallengeService::new(&state)
        .record_progress(&claims.sub, req.challenge_type, req.increment)
        .await?;
    if update.just_completed {
        AchievementService::new(&state).evaluate(&claims.sub).await?;
    }

    Ok(Json(UpdateChallengeResponse {
        progress: update.progress,
        completed: update.just_completed,
    }))
}

pub async fn list_achievements(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<Vec<Achievement>> {
    let achievements = AchievementService::new(&state).list(&claims.sub).await?;
    Ok(Json(achievements))
}
