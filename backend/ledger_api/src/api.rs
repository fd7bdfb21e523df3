//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use fund_ledger::{Donation, Project};
use serde::Serialize;

use crate::auth::{Admin, TokenVerifier, User};
use crate::db;
use crate::dto::{DonationBody, DonationCreate, DonationView, ProjectCreate, ProjectUpdate};
use crate::errors::{LedgerError, Result};
use crate::funding::Ledger;

pub struct ApiState {
    pub ledger: Ledger,
    pub tokens: TokenVerifier,
    pub app_title: String,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct WelcomeResponse {
    pub message: String,
}

// ─────────────────────────────────────────────────────────
// Routing
// ─────────────────────────────────────────────────────────

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
        .route(
            "/charity_project",
            get(list_projects).post(create_project),
        )
        .route(
            "/charity_project/:id",
            patch(update_project).delete(delete_project),
        )
        .route("/donation", get(list_donations).post(create_donation))
        .route("/donation/my", get(my_donations))
        .route("/donation/:id", get(get_donation))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /`
pub async fn welcome(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(WelcomeResponse {
        message: format!("Welcome to the {} API", state.app_title),
    })
}

/// `POST /charity_project`
///
/// Creates a project and immediately funds it from open donations.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    _admin: Admin,
    Json(body): Json<ProjectCreate>,
) -> Result<Json<Project>> {
    body.validate()?;
    let project = state.ledger.open_project(body).await?;
    Ok(Json(project))
}

/// `GET /charity_project`
pub async fn list_projects(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<Project>>> {
    let projects = db::fetch_all::<Project>(state.ledger.pool()).await?;
    Ok(Json(projects))
}

/// `PATCH /charity_project/:id`
pub async fn update_project(
    State(state): State<Arc<ApiState>>,
    _admin: Admin,
    Path(id): Path<i64>,
    Json(body): Json<ProjectUpdate>,
) -> Result<Json<Project>> {
    body.validate()?;
    let project = state.ledger.update_project(id, body).await?;
    Ok(Json(project))
}

/// `DELETE /charity_project/:id`
///
/// Only projects that never received money can be deleted.
pub async fn delete_project(
    State(state): State<Arc<ApiState>>,
    _admin: Admin,
    Path(id): Path<i64>,
) -> Result<Json<Project>> {
    let project = state.ledger.delete_project(id).await?;
    Ok(Json(project))
}

/// `POST /donation`
///
/// Records a donation, spreads it over open projects and returns the donor's view of it.
pub async fn create_donation(
    State(state): State<Arc<ApiState>>,
    user: User,
    Json(body): Json<DonationCreate>,
) -> Result<Json<DonationView>> {
    body.validate()?;
    let donation = state.ledger.accept_donation(user.user_id, body).await?;
    Ok(Json(DonationView::from(&donation)))
}

/// `GET /donation/my`
pub async fn my_donations(
    State(state): State<Arc<ApiState>>,
    user: User,
) -> Result<Json<Vec<DonationView>>> {
    let donations = db::donations_for_user(state.ledger.pool(), user.user_id).await?;
    Ok(Json(donations.iter().map(DonationView::from).collect()))
}

/// `GET /donation/:id`
///
/// The owner and superusers see the full record, anyone else the donor view.
pub async fn get_donation(
    State(state): State<Arc<ApiState>>,
    user: User,
    Path(id): Path<i64>,
) -> Result<Json<DonationBody>> {
    let donation = db::get_donation(state.ledger.pool(), id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("Donation #{id} does not exist")))?;
    Ok(Json(DonationBody::for_viewer(
        donation,
        user.user_id,
        user.is_superuser,
    )))
}

/// `GET /donation`
///
/// Full records, including owner and bookkeeping fields.
pub async fn list_donations(
    State(state): State<Arc<ApiState>>,
    _admin: Admin,
) -> Result<Json<Vec<Donation>>> {
    let donations = db::fetch_all::<Donation>(state.ledger.pool()).await?;
    Ok(Json(donations))
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
