mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_json, date, TestApp};
use jobtracker::models::{JobStatus, Role};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn profile_role_decides_admin_access() -> Result<()> {
    let app = TestApp::new();
    let admin = app.insert_profile("Harper", Role::Admin).await?;
    let worker = app.insert_profile("Indy", Role::Employee).await?;
    let admin_token = app.token(admin, Role::Admin)?;
    // Claims an admin role the profile does not have.
    let worker_token = app.token(worker, Role::Admin)?;

    let response = app.get("/api/dashboard", Some(&worker_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .patch_json(
            &format!("/api/profiles/{worker}"),
            &json!({ "role": "admin" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get("/api/dashboard", Some(&worker_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .patch_json(
            &format!("/api/profiles/{admin}"),
            &json!({ "role": "employee" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get("/api/dashboard", Some(&admin_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn pending_accounts_only_see_themselves() -> Result<()> {
    let app = TestApp::new();
    let admin = app.insert_profile("Jules", Role::Admin).await?;
    let worker = app.insert_profile("Kai", Role::Employee).await?;
    let admin_token = app.token(admin, Role::Admin)?;
    let worker_token = app.token(worker, Role::Employee)?;
    let job = app.insert_job(date(2026, 1, 9), "Acme", "1 King St").await?;
    app.assign(job.id, worker, JobStatus::Pending).await?;

    let response = app
        .patch_json(
            &format!("/api/profiles/{worker}"),
            &json!({ "status": "pending" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/jobs/active?mode=all", Some(&worker_token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .post_json(
            &format!("/api/jobs/{}/status", job.id),
            &json!({ "status": "on_way", "confirm_assign": true }),
            Some(&worker_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stored = app.state.store.get_job(job.id).await?.expect("job exists");
    assert_eq!(stored.status, JobStatus::Pending);

    let response = app.get("/api/me", Some(&worker_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = body_json(response).await?;
    assert_eq!(me["active"], false);
    assert_eq!(me["profile"]["status"], "pending");

    let response = app
        .patch_json(
            &format!("/api/profiles/{worker}"),
            &json!({ "status": "active" }),
            Some(&admin_token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get("/api/jobs/active?mode=all", Some(&worker_token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn users_without_a_profile_are_refused() -> Result<()> {
    let app = TestApp::new();
    let stranger = Uuid::new_v4();
    let token = app.token(stranger, Role::Admin)?;

    let response = app.get("/api/dashboard", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/me", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = body_json(response).await?;
    assert_eq!(me["active"], false);
    assert_eq!(me["profile"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn users_edit_their_own_name_but_not_their_role() -> Result<()> {
    let app = TestApp::new();
    let worker = app.insert_profile("Lane", Role::Employee).await?;
    let other = app.insert_profile("Mika", Role::Employee).await?;
    let token = app.token(worker, Role::Employee)?;

    let response = app
        .patch_json(
            &format!("/api/profiles/{worker}"),
            &json!({ "full_name": " Lane Park ", "contact_number": "555-0199" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let profile: Value = body_json(response).await?;
    assert_eq!(profile["full_name"], "Lane Park");
    assert_eq!(profile["contact_number"], "555-0199");

    let response = app
        .patch_json(
            &format!("/api/profiles/{worker}"),
            &json!({ "role": "admin" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .patch_json(
            &format!("/api/profiles/{other}"),
            &json!({ "full_name": "Renamed" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .patch_json(
            &format!("/api/profiles/{worker}"),
            &json!({ "full_name": "  " }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
