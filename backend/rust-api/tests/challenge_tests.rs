use axum::http::StatusCode;
use guarani_api::{
    error::CoreError,
    models::challenge::{ChallengeType, CATALOG},
    services::challenge_service::{draw_daily_batch, ChallengeService},
    utils::time::Clock,
};
use serde_json::json;
use std::collections::HashSet;

mod common;

#[tokio::test]
async fn daily_batch_is_created_once_per_day() {
    let app = common::create_test_app().await;

    let (status, first) = app.get("challenger-a", "/api/v1/challenges/daily").await;
    assert_eq!(status, StatusCode::OK);
    let first = first.as_array().unwrap().clone();
    assert_eq!(first.len(), 3);

    let types: HashSet<_> = first
        .iter()
        .map(|c| c["challenge"]["challenge_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types.len(), 3);
    for view in &first {
        assert_eq!(view["current_value"], 0);
        assert_eq!(view["progress_percentage"], 0);
        assert_eq!(view["completed"], false);
    }

    // another learner sees the same three challenges
    let (_, second) = app.get("challenger-b", "/api/v1/challenges/daily").await;
    let ids = |views: &[serde_json::Value]| -> HashSet<String> {
        views
            .iter()
            .map(|c| c["challenge"]["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(ids(&first), ids(second.as_array().unwrap()));

    let service = ChallengeService::new(&app.state);
    let today = app.clock.today();
    service.ensure_daily_challenges(today).await.unwrap();
    assert_eq!(service.for_date(today).await.unwrap().len(), 3);
}

#[tokio::test]
async fn a_new_day_brings_a_new_batch() {
    let app = common::create_test_app().await;

    let (_, today) = app.get("challenger-c", "/api/v1/challenges/daily").await;
    app.clock.advance_days(1);
    let (_, tomorrow) = app.get("challenger-c", "/api/v1/challenges/daily").await;

    let date = |views: &serde_json::Value| views[0]["challenge"]["date"].clone();
    assert_ne!(date(&today), date(&tomorrow));
}

#[tokio::test]
async fn completion_pays_exactly_once() {
    let app = common::create_test_app().await;
    let service = ChallengeService::new(&app.state);
    let batch = draw_daily_batch(app.clock.today());
    let challenge = &batch[0];

    let update = service
        .record_progress("challenger-d", challenge.challenge_type, challenge.target_value)
        .await
        .unwrap();
    assert!(update.just_completed);
    assert!(update.progress.completed);
    assert_eq!(update.progress.progress_percentage, 100);

    let again = service
        .record_progress("challenger-d", challenge.challenge_type, 5)
        .await
        .unwrap();
    assert!(!again.just_completed);
    assert_eq!(again.progress.progress_percentage, 100);

    let (completed, _) = service
        .check_completion("challenger-d", challenge)
        .await
        .unwrap();
    assert!(completed.completed);

    let (_, mascot) = app.get("challenger-d", "/api/v1/mascot").await;
    assert_eq!(mascot["total_xp"], challenge.xp_reward);
}

#[tokio::test]
async fn unscheduled_challenge_type_is_not_found() {
    let app = common::create_test_app().await;
    let scheduled: HashSet<ChallengeType> = draw_daily_batch(app.clock.today())
        .iter()
        .map(|c| c.challenge_type)
        .collect();
    let missing = CATALOG
        .iter()
        .map(|t| t.challenge_type)
        .find(|t| !scheduled.contains(t))
        .unwrap();

    let result = ChallengeService::new(&app.state)
        .record_progress("challenger-e", missing, 1)
        .await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn manual_update_completes_and_pays_into_the_day() {
    let app = common::create_test_app().await;
    let batch = draw_daily_batch(app.clock.today());
    let challenge = batch
        .iter()
        .find(|c| c.challenge_type != ChallengeType::Xp)
        .unwrap();
    let kind = challenge.challenge_type.as_str();

    if challenge.target_value > 1 {
        let (status, body) = app
            .post(
                "challenger-f",
                "/api/v1/challenges/update",
                json!({ "challenge_type": kind, "increment": challenge.target_value - 1 }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"], false);
        assert_eq!(body["progress"]["current_value"], challenge.target_value - 1);
    }

    // increment defaults to one
    let (status, body) = app
        .post(
            "challenger-f",
            "/api/v1/challenges/update",
            json!({ "challenge_type": kind }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
    assert_eq!(body["progress"]["completed"], true);
    assert_eq!(body["progress"]["progress_percentage"], 100);

    let (_, body) = app
        .post(
            "challenger-f",
            "/api/v1/challenges/update",
            json!({ "challenge_type": kind, "increment": 3 }),
        )
        .await;
    assert_eq!(body["completed"], false);
    assert_eq!(body["progress"]["completed"], true);

    let (_, mascot) = app.get("challenger-f", "/api/v1/mascot").await;
    assert_eq!(mascot["total_xp"], challenge.xp_reward);
    let (_, heatmap) = app.get("challenger-f", "/api/v1/activity/heatmap").await;
    assert_eq!(heatmap[0]["xp_earned"], challenge.xp_reward);
}

#[tokio::test]
async fn manual_update_rejects_bad_increments_and_unscheduled_types() {
    let app = common::create_test_app().await;
    let batch = draw_daily_batch(app.clock.today());
    let kind = batch[0].challenge_type.as_str();

    for increment in [0, 101] {
        let (status, _) = app
            .post(
                "challenger-g",
                "/api/v1/challenges/update",
                json!({ "challenge_type": kind, "increment": increment }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app
        .post(
            "challenger-g",
            "/api/v1/challenges/update",
            json!({ "challenge_type": "KARAI", "increment": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let scheduled: HashSet<ChallengeType> = batch.iter().map(|c| c.challenge_type).collect();
    let missing = CATALOG
        .iter()
        .map(|t| t.challenge_type)
        .find(|t| !scheduled.contains(t))
        .unwrap();
    let (status, _) = app
        .post(
            "challenger-g",
            "/api/v1/challenges/update",
            json!({ "challenge_type": missing.as_str(), "increment": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, views) = app.get("challenger-g", "/api/v1/challenges/daily").await;
    assert!(views
        .as_array()
        .unwrap()
        .iter()
        .all(|v| v["current_value"] == 0));
}
