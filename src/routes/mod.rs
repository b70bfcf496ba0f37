use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    auth::{AuthenticatedUser, SignedInUser},
    state::AppState,
};

pub mod assignments;
pub mod dashboard;
pub mod health;
pub mod import;
pub mod jobs;
pub mod profiles;
pub mod push;

fn cors_layer(allowed: Option<&String>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_ref());

    let jobs_routes = Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/active", get(jobs::active_jobs))
        .route("/changes", get(jobs::job_changes))
        .route("/:id", delete(jobs::delete_job))
        .route("/:id/status", post(jobs::update_status))
        .route("/:id/status/resolve", post(jobs::resolve_status))
        .route(
            "/:id/assignments",
            get(assignments::list_assignments).put(assignments::sync_assignments),
        );

    let dashboard_routes = Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/shares", post(dashboard::create_share));

    let import_routes = Router::new()
        .route("/extract", post(import::extract_jobs))
        .route("/approve", post(import::approve_job))
        .route("/approve-all", post(import::approve_all));

    let push_routes = Router::new()
        .route("/public-key", get(push::public_key))
        .route("/subscriptions", post(push::subscribe))
        .route("/send", post(push::send_notification));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/jobs", jobs_routes)
        .route("/api/assignments", delete(assignments::unassign_date))
        .route("/api/profiles", get(profiles::list_profiles))
        .route("/api/profiles/:id", patch(profiles::update_profile))
        .nest("/api/dashboard", dashboard_routes)
        .nest("/api/import", import_routes)
        .nest("/api/push", push_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let signed_in_routes = Router::new()
        .route("/api/me", get(profiles::me))
        .layer(middleware::from_extractor_with_state::<SignedInUser, _>(state.clone()));

    Router::new()
        .merge(protected_routes)
        .merge(signed_in_routes)
        .route("/api/shared/:token", get(dashboard::shared_dashboard))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 8))
}
