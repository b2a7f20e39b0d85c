use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use serde_json::json;

mod common;

#[tokio::test]
async fn health_reports_store_status() {
    let app = common::create_test_app().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["store"]["status"], "healthy");
    assert!(body["dependencies"].get("redis").is_none());
}

#[tokio::test]
async fn responses_carry_a_trace_id() {
    let app = common::create_test_app().await;

    let request = Request::builder()
        .uri("/health")
        .header("x-trace-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.headers()["x-trace-id"], "abc-123");
}

#[tokio::test]
async fn study_session_minutes_reach_the_activity_log() {
    let app = common::create_test_app().await;

    let (status, started) = app
        .post(
            "student-a",
            "/api/v1/study-sessions/start",
            json!({ "activity_type": "lesson", "lesson_id": "verbos-1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = started["id"].as_str().unwrap().to_string();

    app.clock.advance(Duration::minutes(25) + Duration::seconds(40));
    let (status, ended) = app
        .post(
            "student-a",
            "/api/v1/study-sessions/end",
            json!({ "session_id": session_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["session"]["duration_minutes"], 25);
    assert_eq!(ended["event"]["activity"]["log"]["time_studied_minutes"], 25);
    assert_eq!(ended["event"]["activity"]["streak"]["current_streak"], 1);

    let (status, _) = app
        .post(
            "student-a",
            "/api/v1/study-sessions/end",
            json!({ "session_id": session_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            "student-a",
            "/api/v1/study-sessions/end",
            json!({ "session_id": "does-not-exist" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = app.get("student-a", "/api/v1/activity/stats").await;
    assert_eq!(stats["total_time_minutes"], 25);
    assert_eq!(stats["total_sessions"], 1);
    assert_eq!(stats["best_study_hour"], 12);
    assert_eq!(stats["week"]["time"], 25);
}

#[tokio::test]
async fn heatmap_only_covers_the_last_year() {
    let app = common::create_test_app().await;

    app.post(
        "student-b",
        "/api/v1/activity/log",
        json!({ "kind": "flashcard", "value": 3 }),
    )
    .await;
    app.clock.advance_days(400);
    app.post(
        "student-b",
        "/api/v1/activity/log",
        json!({ "kind": "chatbot", "value": 2 }),
    )
    .await;

    let (_, heatmap) = app.get("student-b", "/api/v1/activity/heatmap").await;
    let days = heatmap.as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["chatbot_messages"], 2);
}

#[tokio::test]
async fn flashcards_are_created_listed_and_reviewed() {
    let app = common::create_test_app().await;

    let (status, created) = app
        .post(
            "student-c",
            "/api/v1/flashcards",
            json!({ "spanish_word": "agua", "guarani_word": "y", "deck_name": "Comida" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["flashcard"]["deck_name"], "Comida");
    assert_eq!(created["flashcard"]["accuracy"], 0);
    assert_eq!(created["event"]["xp_awarded"], 0);

    app.post(
        "student-c",
        "/api/v1/flashcards",
        json!({ "spanish_word": "sol", "guarani_word": "kuarahy" }),
    )
    .await;

    let (_, all) = app.get("student-c", "/api/v1/flashcards").await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    let (_, general) = app.get("student-c", "/api/v1/flashcards?deck=General").await;
    let general = general.as_array().unwrap();
    assert_eq!(general.len(), 1);
    assert_eq!(general[0]["guarani_word"], "kuarahy");

    let card_id = created["flashcard"]["id"].as_str().unwrap().to_string();
    let (status, reviewed) = app
        .post(
            "student-c",
            "/api/v1/flashcards/review",
            json!({ "flashcard_id": card_id, "is_correct": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["flashcard"]["times_reviewed"], 1);
    assert_eq!(reviewed["flashcard"]["accuracy"], 100);
    assert_eq!(reviewed["event"]["xp_awarded"], 5);
    assert_eq!(reviewed["event"]["activity"]["log"]["flashcards_reviewed"], 1);

    let (_, reviewed) = app
        .post(
            "student-c",
            "/api/v1/flashcards/review",
            json!({ "flashcard_id": card_id, "is_correct": false }),
        )
        .await;
    assert_eq!(reviewed["flashcard"]["accuracy"], 50);
    assert_eq!(reviewed["event"]["xp_awarded"], 0);

    let (status, _) = app
        .post(
            "someone-else",
            "/api/v1/flashcards/review",
            json!({ "flashcard_id": card_id, "is_correct": true }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn flashcards_are_edited_and_deleted_by_their_owner_only() {
    let app = common::create_test_app().await;

    let (_, created) = app
        .post(
            "student-g",
            "/api/v1/flashcards",
            json!({ "spanish_word": "perro", "guarani_word": "jagua" }),
        )
        .await;
    app.post(
        "student-g",
        "/api/v1/flashcards",
        json!({ "spanish_word": "gato", "guarani_word": "mbarakaja" }),
    )
    .await;
    let card_id = created["flashcard"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/flashcards/{}", card_id);

    let (status, edited) = app
        .patch(
            "student-g",
            &uri,
            json!({ "is_favorite": true, "notes": "animal", "deck_name": "Animales" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["is_favorite"], true);
    assert_eq!(edited["notes"], "animal");
    assert_eq!(edited["deck_name"], "Animales");
    assert_eq!(edited["guarani_word"], "jagua");

    let (status, _) = app
        .patch("student-g", &uri, json!({ "spanish_word": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, favorites) = app
        .get("student-g", "/api/v1/flashcards?favorites=true")
        .await;
    let favorites = favorites.as_array().unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0]["id"], card_id.as_str());
    let (_, all) = app.get("student-g", "/api/v1/flashcards?favorites=false").await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = app
        .patch("someone-else", &uri, json!({ "is_favorite": false }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete("someone-else", &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete("student-g", &uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete("student-g", &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(
            "student-g",
            "/api/v1/flashcards/review",
            json!({ "flashcard_id": card_id, "is_correct": true }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, remaining) = app.get("student-g", "/api/v1/flashcards").await;
    let remaining = remaining.as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["guarani_word"], "mbarakaja");
}

#[tokio::test]
async fn bulk_create_keeps_good_entries_and_decks_are_counted() {
    let app = common::create_test_app().await;

    let (status, body) = app
        .post(
            "student-h",
            "/api/v1/flashcards/bulk-create",
            json!({ "flashcards": [
                { "spanish_word": "agua", "guarani_word": "y", "deck_name": "Comida" },
                { "spanish_word": "sol", "guarani_word": "kuarahy" },
                { "spanish_word": "luna", "guarani_word": "" },
                { "spanish_word": "casa", "guarani_word": "   " },
            ] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], 2);
    assert_eq!(body["flashcards"].as_array().unwrap().len(), 2);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].as_str().unwrap().starts_with("Flashcard 3:"));
    assert!(errors[1].as_str().unwrap().starts_with("Flashcard 4:"));

    app.post(
        "student-h",
        "/api/v1/flashcards",
        json!({ "spanish_word": "pan", "guarani_word": "mbujape", "deck_name": "Comida" }),
    )
    .await;
    app.post(
        "someone-else",
        "/api/v1/flashcards",
        json!({ "spanish_word": "mesa", "guarani_word": "mesa" }),
    )
    .await;

    let (status, decks) = app.get("student-h", "/api/v1/flashcards/decks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        decks,
        json!([
            { "deck_name": "Comida", "count": 2 },
            { "deck_name": "General", "count": 1 },
        ])
    );

    let (status, _) = app
        .post(
            "student-h",
            "/api/v1/flashcards/bulk-create",
            json!({ "flashcards": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn translations_are_stored_and_listed() {
    let app = common::create_test_app().await;
    app.llm.set_translation_reply("\"Aguyje\"\n");

    let (status, body) = app
        .post("student-d", "/api/v1/translate", json!({ "text": "Gracias" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["spanish_text"], "Gracias");
    assert_eq!(body["guarani_text"], "Aguyje");

    let (_, history) = app.get("student-d", "/api/v1/translate").await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, _) = app
        .post("student-d", "/api/v1/translate", json!({ "text": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn translation_failure_is_a_bad_gateway() {
    let app = common::create_test_app().await;

    let (status, body) = app
        .post("student-e", "/api/v1/translate", json!({ "text": "Buenas noches" }))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], 502);

    let (_, history) = app.get("student-e", "/api/v1/translate").await;
    assert!(history.as_array().unwrap().is_empty());
}
