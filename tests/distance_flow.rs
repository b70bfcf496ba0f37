mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_json, date, TestApp};
use jobtracker::geo::Coordinates;
use jobtracker::models::{JobStatus, Role};
use serde_json::Value;

const BOARD: &str = "/api/jobs/active?mode=all&date=2026-01-09&lat=43.65&lng=-79.38";

fn distance_of(board: &Value, job_id: uuid::Uuid) -> Value {
    board
        .as_array()
        .and_then(|jobs| jobs.iter().find(|job| job["id"] == job_id.to_string()))
        .map(|job| job["distance"].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn distances_are_cached_per_date() -> Result<()> {
    let app = TestApp::new();
    app.geocoder.place("M4P 2L5", Coordinates::new(43.71, -79.39));
    let worker = app.insert_profile("Gray", Role::Employee).await?;
    let token = app.token(worker, Role::Employee)?;
    let job = app
        .insert_job(date(2026, 1, 9), "Acme", "851 MOUNT PLEASENT RD, TORONTO, ON CA M4P2L5")
        .await?;

    let response = app.get(BOARD, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let board: Value = body_json(response).await?;
    assert_eq!(distance_of(&board, job.id).as_f64(), Some(12.3));
    let calls = app.geocoder.calls();
    assert!(calls > 0);

    let response = app.get(BOARD, Some(&token)).await?;
    let board: Value = body_json(response).await?;
    assert_eq!(distance_of(&board, job.id).as_f64(), Some(12.3));
    assert_eq!(app.geocoder.calls(), calls);

    let response = app.get(&format!("{BOARD}&refresh=true"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.geocoder.calls() > calls);
    Ok(())
}

#[tokio::test]
async fn changing_the_date_drops_cached_distances() -> Result<()> {
    let app = TestApp::new();
    app.geocoder.place("M5V 3L9", Coordinates::new(43.64, -79.39));
    let worker = app.insert_profile("Harper", Role::Employee).await?;
    let token = app.token(worker, Role::Employee)?;
    app.insert_job(date(2026, 1, 9), "Acme", "290 Bremner Blvd, Toronto, ON M5V3L9")
        .await?;
    app.insert_job(date(2026, 1, 10), "Acme", "290 Bremner Blvd, Toronto, ON M5V3L9")
        .await?;

    app.get(BOARD, Some(&token)).await?;
    let after_first = app.geocoder.calls();

    app.get(
        "/api/jobs/active?mode=all&date=2026-01-10&lat=43.65&lng=-79.38",
        Some(&token),
    )
    .await?;
    let after_second = app.geocoder.calls();
    assert!(after_second > after_first);

    app.get(BOARD, Some(&token)).await?;
    assert!(app.geocoder.calls() > after_second);
    Ok(())
}

#[tokio::test]
async fn hits_outside_service_area_have_no_distance() -> Result<()> {
    let app = TestApp::new();
    app.geocoder.place("Vancouver", Coordinates::new(49.28, -123.12));
    let worker = app.insert_profile("Indy", Role::Employee).await?;
    let token = app.token(worker, Role::Employee)?;
    let job = app
        .insert_job(date(2026, 1, 9), "Initech", "1 Main St, Vancouver, BC")
        .await?;

    let response = app.get(BOARD, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let board: Value = body_json(response).await?;
    assert_eq!(distance_of(&board, job.id), Value::Null);
    Ok(())
}

#[tokio::test]
async fn missing_route_falls_back_to_straight_line() -> Result<()> {
    let app = TestApp::with_route_distance(None);
    app.geocoder.place("M4P 2L5", Coordinates::new(43.71, -79.39));
    let worker = app.insert_profile("Jules", Role::Employee).await?;
    let token = app.token(worker, Role::Employee)?;
    let job = app
        .insert_job(date(2026, 1, 9), "Acme", "851 Mount Pleasant Rd, Toronto, ON M4P 2L5")
        .await?;

    let board: Value = body_json(app.get(BOARD, Some(&token)).await?).await?;
    let km = distance_of(&board, job.id).as_f64().expect("distance present");
    assert!(km > 5.0 && km < 8.0, "unexpected straight-line distance {km}");
    Ok(())
}

#[tokio::test]
async fn board_shows_only_assigned_jobs_by_default() -> Result<()> {
    let app = TestApp::new();
    let worker = app.insert_profile("Kai", Role::Employee).await?;
    let partner = app.insert_profile("Lane", Role::Employee).await?;
    let token = app.token(worker, Role::Employee)?;
    let mine = app.insert_job(date(2026, 1, 9), "Acme", "1 King St").await?;
    app.insert_job(date(2026, 1, 9), "Globex", "2 King St").await?;
    app.assign(mine.id, worker, JobStatus::OnWay).await?;
    app.assign(mine.id, partner, JobStatus::Pending).await?;

    let board: Value = body_json(app.get("/api/jobs/active", Some(&token)).await?).await?;
    let jobs = board.as_array().expect("array");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], mine.id.to_string());
    assert_eq!(jobs[0]["assignees"].as_array().map(Vec::len), Some(2));

    let response = app.get("/api/jobs/active?lat=43.6", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = app.get("/api/jobs/active?mode=everyone", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
