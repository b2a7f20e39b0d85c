use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use super::ApiResult;
use crate::{
    extractors::ValidatedJson,
    middlewares::auth::JwtClaims,
    models::activity::{
        ActivityLog, EndStudySessionRequest, LogActivityRequest, StartStudySessionRequest,
        StudySession, StudyStats,
    },
    services::{
        activity_service::{ActivityService, ActivityUpdate},
        learning_events::{EventOutcome, LearningEvent, LearningEvents},
        AppState,
    },
};

pub async fn heatmap(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<Vec<ActivityLog>> {
    let logs = ActivityService::new(&state).heatmap(&claims.sub).await?;
    Ok(Json(logs))
}

pub async fn study_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<StudyStats> {
    let stats = ActivityService::new(&state).study_stats(&claims.sub).await?;
    Ok(Json(stats))
}

/// Raw activity write. XP reported here is recorded on the day's row only;
/// it is not paid to the mascot.
pub async fn log_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<LogActivityRequest>,
) -> ApiResult<ActivityUpdate> {
    let update = ActivityService::new(&state)
        .log_activity(&claims.sub, req.kind, req.value, req.xp)
        .await?;
    Ok(Json(update))
}

pub async fn start_study_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<StartStudySessionRequest>,
) -> ApiResult<StudySession> {
    let session = ActivityService::new(&state)
        .start_study_session(&claims.sub, req)
        .await?;
    Ok(Json(session))
}

#[derive(Debug, Serialize)]
pub struct EndStudySessionResponse {
    pub session: StudySession,
    pub event: EventOutcome,
}

pub async fn end_study_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<EndStudySessionRequest>,
) -> ApiResult<EndStudySessionResponse> {
    let session = ActivityService::new(&state)
        .end_study_session(&claims.sub, &req.session_id)
        .await?;

    let event = LearningEvents::new(&state)
        .record(
            &claims.sub,
            LearningEvent::StudyTime {
                minutes: session.duration_minutes,
            },
        )
        .await?;

    Ok(Json(EndStudySessionResponse { session, event }))
}
