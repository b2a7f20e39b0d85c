#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use guarani_api::{
    config::Config,
    create_router,
    error::{CoreError, CoreResult},
    middlewares::auth::{JwtClaims, JwtService},
    services::{
        chat_service::ChatService,
        gemini_client::{GenerationRequest, TextGenerator},
        prompts, AppState,
    },
    store::MemoryStore,
    utils::time::ManualClock,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tower::ServiceExt;

pub const DEFAULT_REPLY: &str = "¡Mba'éichapa! Che ha'e Arami.";

/// Holds one chat reply back: `entered` fires once generation has started,
/// and the reply is produced only after `release` is notified.
#[derive(Clone, Default)]
pub struct ReplyGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Text generator with canned answers. Chat replies are served from a queue
/// (falling back to [`DEFAULT_REPLY`]); grammar and translation calls get
/// their own fixed answers. Every request is recorded.
#[derive(Default)]
pub struct ScriptedGenerator {
    chat_replies: Mutex<VecDeque<CoreResult<String>>>,
    chat_gate: Mutex<Option<ReplyGate>>,
    grammar_reply: Mutex<Option<String>>,
    translation_reply: Mutex<Option<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn push_reply(&self, reply: &str) {
        self.chat_replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self) {
        self.chat_replies
            .lock()
            .unwrap()
            .push_back(Err(CoreError::external("upstream timed out")));
    }

    pub fn hold_next_reply(&self) -> ReplyGate {
        let gate = ReplyGate::default();
        *self.chat_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn set_grammar_reply(&self, reply: &str) {
        *self.grammar_reply.lock().unwrap() = Some(reply.to_string());
    }

    pub fn set_translation_reply(&self, reply: &str) {
        *self.translation_reply.lock().unwrap() = Some(reply.to_string());
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> CoreResult<String> {
        self.requests.lock().unwrap().push(request.clone());

        if request.system_instruction == prompts::GRAMMAR_SYSTEM_INSTRUCTION {
            return Ok(self
                .grammar_reply
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| "[]".to_string()));
        }
        if request.system_instruction == prompts::TRANSLATION_SYSTEM_INSTRUCTION {
            return self
                .translation_reply
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CoreError::external("translation not scripted"));
        }

        let gate = self.chat_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.chat_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub llm: Arc<ScriptedGenerator>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap()
}

pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let clock = Arc::new(ManualClock::new(start_time()));
    let llm = Arc::new(ScriptedGenerator::default());
    let state = Arc::new(AppState::from_parts(
        Config::default(),
        Arc::new(MemoryStore::new()),
        llm.clone(),
        clock.clone(),
    ));

    ChatService::new(&state)
        .seed_modes()
        .await
        .expect("Failed to seed conversation modes");

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
        llm,
    }
}

impl TestApp {
    pub fn token_for(&self, user_id: &str) -> String {
        let now = Utc::now().timestamp() as usize;
        let claims = JwtClaims {
            sub: user_id.to_string(),
            role: Some("student".to_string()),
            exp: now + 3600,
            iat: now,
        };
        JwtService::new(&self.state.config.jwt_secret)
            .generate_token(&claims)
            .expect("Failed to sign test token")
    }

    pub async fn get(&self, user_id: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token_for(user_id)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub fn json_request(&self, method: &str, user_id: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token_for(user_id)))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn post(&self, user_id: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.json_request("POST", user_id, uri, body)).await
    }

    pub async fn patch(&self, user_id: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.json_request("PATCH", user_id, uri, body)).await
    }

    pub async fn delete(&self, user_id: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token_for(user_id)))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}
