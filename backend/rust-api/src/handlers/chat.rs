use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::ApiResult;
use crate::{
    extractors::ValidatedJson,
    middlewares::auth::JwtClaims,
    models::{
        chat::{
            ChatSession, ChatSessionDetail, ChatSessionView, CloseSessionRequest,
            CloseSessionResponse, ConversationMode, OpenSessionRequest, SendMessageRequest,
            SendMessageResponse,
        },
        conversation::ConversationLevelView,
    },
    services::{
        chat_service::ChatService,
        learning_events::{EventOutcome, LearningEvent, LearningEvents},
        AppState,
    },
};

pub async fn list_modes(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ConversationMode>> {
    let modes = ChatService::new(&state).list_modes().await?;
    Ok(Json(modes))
}

pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<OpenSessionRequest>,
) -> ApiResult<ChatSession> {
    let session = ChatService::new(&state)
        .open_session(&claims.sub, req.mode.as_deref(), req.difficulty_level)
        .await?;
    Ok(Json(session))
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub reply: SendMessageResponse,
    pub event: EventOutcome,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> ApiResult<ChatReply> {
    let reply = ChatService::new(&state)
        .send_message(&claims.sub, &req)
        .await?;
    let event = LearningEvents::new(&state)
        .record(&claims.sub, LearningEvent::ChatMessageSent)
        .await?;

    Ok(Json(ChatReply { reply, event }))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<CloseSessionRequest>,
) -> ApiResult<CloseSessionResponse> {
    let closed = ChatService::new(&state)
        .close_session(&claims.sub, &req.session_id)
        .await?;
    Ok(Json(closed))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<Vec<ChatSessionView>> {
    let sessions = ChatService::new(&state).list_sessions(&claims.sub).await?;
    Ok(Json(sessions))
}

pub async fn session_detail(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> ApiResult<ChatSessionDetail> {
    let detail = ChatService::new(&state)
        .session_detail(&claims.sub, &session_id)
        .await?;
    Ok(Json(detail))
}

pub async fn conversation_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> ApiResult<ConversationLevelView> {
    let stats = ChatService::new(&state)
        .conversation_stats(&claims.sub)
        .await?;
    Ok(Json(stats))
}
