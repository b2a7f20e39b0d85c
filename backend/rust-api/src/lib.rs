use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// Adds a Content-Security-Policy header to every response. The API serves
/// JSON only, so nothing is allowed to load.
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1", api_routes(app_state.clone()))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Routes that call the text generation service are throttled per learner.
    let generation_routes = Router::new()
        .route("/chatbot", post(handlers::chat::send_message))
        .route(
            "/translate",
            post(handlers::learning::translate).get(handlers::learning::translation_history),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::llm_rate_limit_middleware,
        ));

    Router::new()
        // Mascot, streak and rewards
        .route("/mascot", get(handlers::progression::get_mascot))
        .route("/mascot/add-xp", post(handlers::progression::add_xp))
        .route("/totals", get(handlers::progression::get_totals))
        .route("/streak", get(handlers::progression::get_streak))
        .route(
            "/challenges/daily",
            get(handlers::progression::daily_challenges),
        )
        .route(
            "/challenges/update",
            post(handlers::progression::update_challenge),
        )
        .route(
            "/achievements",
            get(handlers::progression::list_achievements),
        )
        // Activity
        .route("/activity/heatmap", get(handlers::activity::heatmap))
        .route("/activity/stats", get(handlers::activity::study_stats))
        .route("/activity/log", post(handlers::activity::log_activity))
        .route(
            "/study-sessions/start",
            post(handlers::activity::start_study_session),
        )
        .route(
            "/study-sessions/end",
            post(handlers::activity::end_study_session),
        )
        // Lessons and flashcards
        .route(
            "/progress",
            get(handlers::learning::list_progress).post(handlers::learning::update_progress),
        )
        .route(
            "/flashcards",
            get(handlers::learning::list_flashcards).post(handlers::learning::create_flashcard),
        )
        .route(
            "/flashcards/review",
            post(handlers::learning::review_flashcard),
        )
        .route("/flashcards/decks", get(handlers::learning::flashcard_decks))
        .route(
            "/flashcards/bulk-create",
            post(handlers::learning::bulk_create_flashcards),
        )
        .route(
            "/flashcards/{id}",
            patch(handlers::learning::update_flashcard)
                .delete(handlers::learning::delete_flashcard),
        )
        // Conversation practice
        .route("/chatbot/modes", get(handlers::chat::list_modes))
        .route(
            "/chatbot/sessions",
            get(handlers::chat::list_sessions).post(handlers::chat::open_session),
        )
        .route("/chatbot/sessions/end", post(handlers::chat::close_session))
        .route(
            "/chatbot/sessions/{id}",
            get(handlers::chat::session_detail),
        )
        .route("/chatbot/stats", get(handlers::chat::conversation_stats))
        .merge(generation_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}
