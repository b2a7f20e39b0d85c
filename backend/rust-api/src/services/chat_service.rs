use mongodb::bson::doc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::gemini_client::{GenerationRequest, Role, TextGenerator, Turn};
use super::grammar_service::GrammarAnalyzer;
use super::session_analysis::{self, count_words};
use super::{prompts, AppState};
use crate::error::{CoreError, CoreResult};
use crate::metrics::{track_llm_request, CHAT_SESSIONS_ACTIVE, CHAT_SESSIONS_TOTAL};
use crate::models::chat::{
    ChatMessage, ChatSession, ChatSessionDetail, ChatSessionView, CloseSessionResponse,
    ConversationMode, Difficulty, SendMessageRequest, SendMessageResponse,
};
use crate::models::conversation::{ConversationLevelView, UserConversationLevel};
use crate::store::Repository;
use crate::utils::time::Clock;

pub const RECENT_SESSIONS_LIMIT: usize = 20;

const CLOSE_ATTEMPTS: u32 = 40;
const CLOSE_RETRY_DELAY: Duration = Duration::from_millis(25);

enum CloseStep {
    Closed,
    AlreadyClosed,
    Pending,
}

/// Last `pairs` exchanges of a session, oldest first, as alternating turns.
pub fn history_turns(messages: &[ChatMessage], pairs: usize) -> Vec<Turn> {
    let skip = messages.len().saturating_sub(pairs);
    messages[skip..]
        .iter()
        .flat_map(|m| {
            [
                Turn {
                    role: Role::User,
                    text: m.message.clone(),
                },
                Turn {
                    role: Role::Model,
                    text: m.response.clone(),
                },
            ]
        })
        .collect()
}

#[derive(Clone)]
pub struct ChatService {
    sessions: Repository<ChatSession>,
    messages: Repository<ChatMessage>,
    modes: Repository<ConversationMode>,
    levels: Repository<UserConversationLevel>,
    llm: Arc<dyn TextGenerator>,
    clock: Arc<dyn Clock>,
    history_pairs: usize,
}

impl ChatService {
    pub fn new(state: &AppState) -> Self {
        Self {
            sessions: Repository::new(state.store.clone()),
            messages: Repository::new(state.store.clone()),
            modes: Repository::new(state.store.clone()),
            levels: Repository::new(state.store.clone()),
            llm: state.llm.clone(),
            clock: state.clock.clone(),
            history_pairs: state.config.chat_history_pairs,
        }
    }

    /// Writes the built-in conversation modes, replacing earlier versions.
    pub async fn seed_modes(&self) -> CoreResult<usize> {
        let modes = prompts::builtin_modes();
        for mode in &modes {
            self.modes.put(mode).await?;
        }
        tracing::info!("Seeded {} conversation modes", modes.len());
        Ok(modes.len())
    }

    pub async fn list_modes(&self) -> CoreResult<Vec<ConversationMode>> {
        let mut modes = self.modes.find(doc! { "is_active": true }).await?;
        modes.sort_by_key(|m| (prompts::mode_rank(&m.key), m.key.clone()));
        Ok(modes)
    }

    async fn find_mode(&self, key: &str) -> CoreResult<ConversationMode> {
        self.modes
            .get(key)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| CoreError::not_found(format!("Conversation mode {}", key)))
    }

    pub async fn open_session(
        &self,
        user_id: &str,
        mode: Option<&str>,
        difficulty: Option<Difficulty>,
    ) -> CoreResult<ChatSession> {
        let (session, _) = self.new_session(user_id, mode, difficulty).await?;
        self.store_session(&session).await
    }

    /// Builds an open session without storing it.
    async fn new_session(
        &self,
        user_id: &str,
        mode: Option<&str>,
        difficulty: Option<Difficulty>,
    ) -> CoreResult<(ChatSession, Option<ConversationMode>)> {
        let mode = match mode {
            Some(key) => Some(self.find_mode(key).await?),
            None => None,
        };
        let difficulty = difficulty
            .or_else(|| mode.as_ref().map(|m| m.difficulty_level))
            .unwrap_or_default();

        let session = ChatSession::open(
            Uuid::new_v4().to_string(),
            user_id,
            mode.as_ref().map(|m| m.key.clone()),
            difficulty,
            self.clock.now(),
        );
        Ok((session, mode))
    }

    async fn store_session(&self, session: &ChatSession) -> CoreResult<ChatSession> {
        let (session, _) = self.sessions.create(session).await?;

        CHAT_SESSIONS_TOTAL.with_label_values(&["opened"]).inc();
        CHAT_SESSIONS_ACTIVE.inc();
        tracing::info!("Chat session {} opened by {}", session.id, session.user_id);
        Ok(session)
    }

    /// Sessions of other learners are reported as missing.
    async fn owned_session(&self, user_id: &str, session_id: &str) -> CoreResult<ChatSession> {
        self.sessions
            .get(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| CoreError::not_found(format!("Chat session {}", session_id)))
    }

    async fn session_messages(&self, session_id: &str) -> CoreResult<Vec<ChatMessage>> {
        let mut messages = self.messages.find(doc! { "session_id": session_id }).await?;
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    /// One learner turn. The reply is generated before anything is stored,
    /// so a failed generation leaves no trace, not even an implicit session.
    pub async fn send_message(
        &self,
        user_id: &str,
        req: &SendMessageRequest,
    ) -> CoreResult<SendMessageResponse> {
        let text = req.message.trim();
        if text.is_empty() {
            return Err(CoreError::invalid_argument("message is required"));
        }

        let (session, mode, history, implicit) = match req.session_id.as_deref() {
            Some(id) => {
                let session = self.owned_session(user_id, id).await?;
                if !session.is_open() {
                    return Err(CoreError::invalid_state("Chat session is closed"));
                }
                let mode = match session.mode.as_deref() {
                    Some(key) => self.modes.get(key).await?,
                    None => None,
                };
                let history = self.session_messages(&session.id).await?;
                (session, mode, history, false)
            }
            None => {
                let (session, mode) = self
                    .new_session(user_id, req.mode.as_deref(), req.difficulty_level)
                    .await?;
                (session, mode, Vec::new(), true)
            }
        };

        let request = GenerationRequest {
            system_instruction: prompts::system_instruction(session.difficulty_level, mode.as_ref()),
            history: history_turns(&history, self.history_pairs),
            message: text.to_string(),
            json_response: false,
        };
        let response = track_llm_request("chat", self.llm.generate(&request))
            .await
            .inspect_err(|e| tracing::error!("Chat reply for session {} failed: {}", session.id, e))?;

        let corrections = GrammarAnalyzer::new(self.llm.clone()).analyze(text).await;
        let word_count = count_words(text);
        let error_count = corrections.len() as u32;

        let session = if implicit {
            self.store_session(&session).await?
        } else {
            session
        };

        // The session may have been closed while the reply was generated.
        // Counting the message only while it is still open keeps closed
        // sessions final.
        let (_, accepted) = self
            .sessions
            .modify(&session.id, || session.clone(), |s| {
                if !s.is_open() {
                    return false;
                }
                s.message_count += 1;
                s.words_used += word_count;
                s.grammar_errors += error_count;
                true
            })
            .await?;
        if !accepted {
            return Err(CoreError::invalid_state("Chat session is closed"));
        }

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            user_id: user_id.to_string(),
            message: text.to_string(),
            response: response.clone(),
            word_count,
            corrections: corrections.clone(),
            created_at: self.clock.now(),
        };
        let message = match self.messages.create(&message).await {
            Ok((message, _)) => message,
            Err(e) => {
                self.sessions
                    .modify(&session.id, || session.clone(), |s| {
                        if s.is_open() {
                            s.message_count = s.message_count.saturating_sub(1);
                            s.words_used = s.words_used.saturating_sub(word_count);
                            s.grammar_errors = s.grammar_errors.saturating_sub(error_count);
                        }
                    })
                    .await?;
                return Err(e.into());
            }
        };

        self.update_conversation_level(user_id, &message).await?;

        Ok(SendMessageResponse {
            session_id: session.id,
            response,
            message,
            corrections,
        })
    }

    pub async fn update_conversation_level(
        &self,
        user_id: &str,
        message: &ChatMessage,
    ) -> CoreResult<UserConversationLevel> {
        let (level, _) = self
            .levels
            .modify(user_id, || UserConversationLevel::new(user_id), |level| {
                level.record_message(message.word_count, message.corrections.len())
            })
            .await?;
        Ok(level)
    }

    /// Finalizes a session: duration, totals summed from its messages, and
    /// the analysis report. Closing twice is `InvalidState`.
    ///
    /// A turn counts itself on the session before storing its message, so
    /// the close waits briefly until every counted message is readable.
    pub async fn close_session(&self, user_id: &str, session_id: &str) -> CoreResult<CloseSessionResponse> {
        let session = self.owned_session(user_id, session_id).await?;
        if !session.is_open() {
            return Err(CoreError::invalid_state("Chat session is already closed"));
        }

        let mut attempt = 0;
        let (session, messages) = loop {
            attempt += 1;
            let settle = attempt >= CLOSE_ATTEMPTS;

            let messages = self.session_messages(session_id).await?;
            let stored = messages.len() as u32;
            let words_used: u32 = messages.iter().map(|m| m.word_count).sum();
            let grammar_errors: u32 = messages.iter().map(|m| m.corrections.len() as u32).sum();
            let now = self.clock.now();

            let (closed, step) = self
                .sessions
                .modify(session_id, || session.clone(), |s| {
                    if !s.is_open() {
                        return CloseStep::AlreadyClosed;
                    }
                    if s.message_count != stored && !settle {
                        return CloseStep::Pending;
                    }
                    s.ended_at = Some(now);
                    s.duration_seconds = (now - s.started_at).num_seconds().max(0);
                    s.message_count = stored;
                    s.words_used = words_used;
                    s.grammar_errors = grammar_errors;
                    CloseStep::Closed
                })
                .await?;

            match step {
                CloseStep::Closed => break (closed, messages),
                CloseStep::AlreadyClosed => {
                    return Err(CoreError::invalid_state("Chat session is already closed"))
                }
                CloseStep::Pending => {
                    tracing::debug!("Session {} has a message in flight, waiting", session_id);
                    tokio::time::sleep(CLOSE_RETRY_DELAY).await;
                }
            }
        };

        let analysis = session_analysis::analyze(&session, &messages);
        let minutes = (session.duration_seconds / 60) as u32;
        self.levels
            .modify(user_id, || UserConversationLevel::new(user_id), |level| {
                level.record_session(minutes)
            })
            .await?;

        CHAT_SESSIONS_TOTAL.with_label_values(&["closed"]).inc();
        CHAT_SESSIONS_ACTIVE.dec();
        tracing::info!(
            "Chat session {} closed: {} messages, accuracy {}%",
            session.id,
            session.message_count,
            analysis.accuracy_rate
        );

        Ok(CloseSessionResponse { session, analysis })
    }

    async fn mode_lookup(&self) -> CoreResult<HashMap<String, ConversationMode>> {
        Ok(self
            .modes
            .find(doc! {})
            .await?
            .into_iter()
            .map(|m| (m.key.clone(), m))
            .collect())
    }

    fn view(session: ChatSession, modes: &HashMap<String, ConversationMode>) -> ChatSessionView {
        let mode = session.mode.as_ref().and_then(|key| modes.get(key));
        ChatSessionView {
            mode_name: mode.map(|m| m.name.clone()),
            mode_icon: mode.map(|m| m.icon.clone()),
            session,
        }
    }

    pub async fn list_sessions(&self, user_id: &str) -> CoreResult<Vec<ChatSessionView>> {
        let mut sessions = self.sessions.find(doc! { "user_id": user_id }).await?;
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(RECENT_SESSIONS_LIMIT);

        let modes = self.mode_lookup().await?;
        Ok(sessions
            .into_iter()
            .map(|session| Self::view(session, &modes))
            .collect())
    }

    pub async fn session_detail(&self, user_id: &str, session_id: &str) -> CoreResult<ChatSessionDetail> {
        let session = self.owned_session(user_id, session_id).await?;
        let messages = self.session_messages(session_id).await?;
        let modes = self.mode_lookup().await?;
        Ok(ChatSessionDetail {
            session: Self::view(session, &modes),
            messages,
        })
    }

    pub async fn conversation_stats(&self, user_id: &str) -> CoreResult<ConversationLevelView> {
        let level = self
            .levels
            .get_or_create(user_id, || UserConversationLevel::new(user_id))
            .await?;
        Ok(level.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn exchange(n: usize) -> ChatMessage {
        ChatMessage {
            id: n.to_string(),
            session_id: "s".to_string(),
            user_id: "u".to_string(),
            message: format!("q{}", n),
            response: format!("a{}", n),
            word_count: 1,
            corrections: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn history_keeps_only_the_latest_pairs() {
        let messages: Vec<_> = (0..14).map(exchange).collect();
        let turns = history_turns(&messages, 10);
        assert_eq!(turns.len(), 20);
        assert_eq!(turns[0].text, "q4");
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[19].text, "a13");
        assert_eq!(turns[19].role, Role::Model);
    }

    #[test]
    fn short_history_is_kept_whole() {
        let messages: Vec<_> = (0..2).map(exchange).collect();
        assert_eq!(history_turns(&messages, 10).len(), 4);
        assert!(history_turns(&[], 10).is_empty());
    }
}
