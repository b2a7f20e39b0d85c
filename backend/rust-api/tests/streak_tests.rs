use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

async fn log_lesson(app: &common::TestApp, user: &str) -> Value {
    let (status, body) = app
        .post(
            user,
            "/api/v1/activity/log",
            json!({ "kind": "lesson", "value": 1, "xp": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn first_activity_writes_log_and_starts_streak() {
    let app = common::create_test_app().await;

    let body = log_lesson(&app, "streak-a").await;
    assert_eq!(body["log"]["lessons_completed"], 1);
    assert_eq!(body["log"]["xp_earned"], 50);
    assert_eq!(body["streak"]["current_streak"], 1);
    assert_eq!(body["streak"]["longest_streak"], 1);
    assert_eq!(body["streak_outcome"], "advanced");
}

#[tokio::test]
async fn same_day_activity_accumulates_without_moving_streak() {
    let app = common::create_test_app().await;

    log_lesson(&app, "streak-b").await;
    let body = log_lesson(&app, "streak-b").await;
    assert_eq!(body["log"]["lessons_completed"], 2);
    assert_eq!(body["log"]["xp_earned"], 100);
    assert_eq!(body["streak"]["current_streak"], 1);
    assert_eq!(body["streak_outcome"], "no_op");
}

#[tokio::test]
async fn consecutive_days_extend_and_long_gaps_reset() {
    let app = common::create_test_app().await;

    for expected in 1..=3 {
        let body = log_lesson(&app, "streak-c").await;
        assert_eq!(body["streak"]["current_streak"], expected);
        app.clock.advance_days(1);
    }

    // last activity was three days before this one
    app.clock.advance_days(2);
    let body = log_lesson(&app, "streak-c").await;
    assert_eq!(body["streak_outcome"], "reset");
    assert_eq!(body["streak"]["current_streak"], 1);
    assert_eq!(body["streak"]["longest_streak"], 3);
}

#[tokio::test]
async fn banked_freeze_bridges_a_single_missed_day() {
    let app = common::create_test_app().await;

    let mut body = Value::Null;
    for _ in 0..7 {
        body = log_lesson(&app, "streak-d").await;
        app.clock.advance_days(1);
    }
    assert_eq!(body["streak"]["current_streak"], 7);
    assert_eq!(body["streak"]["freeze_count"], 1);

    // skip one day
    app.clock.advance_days(1);
    let body = log_lesson(&app, "streak-d").await;
    assert_eq!(body["streak_outcome"], "advanced");
    assert_eq!(body["streak"]["current_streak"], 8);
    assert_eq!(body["streak"]["freeze_count"], 0);

    let (_, streak) = app.get("streak-d", "/api/v1/streak").await;
    assert_eq!(streak["current_streak"], 8);
    assert_eq!(streak["total_days_studied"], 8);
}

#[tokio::test]
async fn freeze_does_not_cover_longer_gaps() {
    let app = common::create_test_app().await;

    for _ in 0..7 {
        log_lesson(&app, "streak-e").await;
        app.clock.advance_days(1);
    }
    app.clock.advance_days(2);

    let body = log_lesson(&app, "streak-e").await;
    assert_eq!(body["streak_outcome"], "reset");
    assert_eq!(body["streak"]["current_streak"], 1);
    assert_eq!(body["streak"]["freeze_count"], 1);
}

#[tokio::test]
async fn seven_days_of_lessons_unlock_streak_and_lesson_badges() {
    let app = common::create_test_app().await;

    for day in 0..7 {
        let (status, _) = app
            .post(
                "streak-f",
                "/api/v1/progress",
                json!({ "lesson_id": format!("lesson-{}", day), "completed": true, "score": 60 }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        app.clock.advance_days(1);
    }

    let (status, body) = app.get("streak-f", "/api/v1/achievements").await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["achievement_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, vec!["first_lesson", "five_lessons", "week_streak"]);
}
