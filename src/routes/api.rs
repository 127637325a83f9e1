// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    CertificationSetting, Entitlement, EventRegistration, NotificationPreferences, Profile,
    UserCertification, VideoProgress,
};
use crate::services::{DirectoryEntry, Qualification, VideoAccess};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/modules/{id}", get(get_module))
        .route("/api/videos/{id}/complete", post(complete_video))
        .route("/api/certifications", get(list_certifications))
        .route("/api/certifications/{id}/progress", get(get_progress))
        .route("/api/certifications/{id}/submit", post(submit_certification))
        .route("/api/directory", get(get_directory))
        .route(
            "/api/events/{id}/register",
            post(register_for_event).delete(cancel_registration),
        )
        .route("/api/preferences", get(get_preferences).put(put_preferences))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct MeResponse {
    pub profile: Profile,
    pub entitlement: Option<Entitlement>,
    pub has_access: bool,
    pub is_admin: bool,
    pub certifications: Vec<UserCertification>,
}

/// Get current user profile, access tier and certifications.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = state
        .db
        .get_profile(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user.user_id)))?;
    let entitlement = state.db.get_entitlement(user.user_id).await?;
    let certifications = state.db.list_user_certifications_for(user.user_id).await?;

    Ok(Json(MeResponse {
        has_access: entitlement
            .as_ref()
            .is_some_and(|e| e.status.grants_access()),
        is_admin: user.is_admin,
        profile,
        entitlement,
        certifications,
    }))
}

// ─── Curriculum ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct ModuleResponse {
    pub module_id: Uuid,
    /// False when the subscription lapsed; videos are listed without streams
    pub has_access: bool,
    pub videos: Vec<VideoAccess>,
}

/// Videos of a module with their unlock state for the caller.
async fn get_module(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<Uuid>,
) -> Result<Json<ModuleResponse>> {
    let membership = state.curriculum.membership(user.user_id).await?;
    let videos = state
        .curriculum
        .module_for_user(module_id, user.user_id, &membership, Utc::now())
        .await?;
    Ok(Json(ModuleResponse {
        module_id,
        has_access: membership.has_access,
        videos,
    }))
}

async fn complete_video(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<VideoProgress>> {
    let progress = state
        .curriculum
        .complete_video(user.user_id, video_id, Utc::now())
        .await?;
    Ok(Json(progress))
}

// ─── Certifications ──────────────────────────────────────────

async fn list_certifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CertificationSetting>>> {
    Ok(Json(state.db.list_certification_settings(true).await?))
}

async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(certification_id): Path<Uuid>,
) -> Result<Json<Qualification>> {
    let progress = state
        .qualification
        .progress(user.user_id, certification_id)
        .await?;
    Ok(Json(progress))
}

/// Certification submission request.
#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmitRequest {
    /// Storage path of the uploaded video, under the caller's folder
    #[validate(length(min = 1, max = 1024))]
    pub video_path: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

async fn submit_certification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(certification_id): Path<Uuid>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<UserCertification>> {
    body.validate()?;

    let notes = body
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let uc = state
        .certifications
        .submit(
            user.user_id,
            certification_id,
            body.video_path.trim(),
            notes,
            Utc::now(),
        )
        .await?;
    Ok(Json(uc))
}

// ─── Directory ───────────────────────────────────────────────

#[derive(Deserialize)]
struct DirectoryQuery {
    city: Option<String>,
}

async fn get_directory(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DirectoryQuery>,
) -> Result<Json<Vec<DirectoryEntry>>> {
    Ok(Json(state.directory.list(params.city.as_deref()).await?))
}

// ─── Events ──────────────────────────────────────────────────

async fn register_for_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EventRegistration>)> {
    let registration = state
        .events
        .register(user.user_id, event_id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn cancel_registration(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.events.cancel(user.user_id, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Notification Preferences ────────────────────────────────

async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NotificationPreferences>> {
    let prefs = state
        .db
        .get_notification_preferences(user.user_id)
        .await?
        .unwrap_or_else(|| NotificationPreferences::defaults_for(user.user_id));
    Ok(Json(prefs))
}

/// Preferences update; omitted fields keep their current value.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PreferencesUpdate {
    pub certification_updates: Option<bool>,
    pub billing: Option<bool>,
    pub events: Option<bool>,
    pub marketing: Option<bool>,
}

async fn put_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<NotificationPreferences>> {
    let mut prefs = state
        .db
        .get_notification_preferences(user.user_id)
        .await?
        .unwrap_or_else(|| NotificationPreferences::defaults_for(user.user_id));

    if let Some(v) = update.certification_updates {
        prefs.certification_updates = v;
    }
    if let Some(v) = update.billing {
        prefs.billing = v;
    }
    if let Some(v) = update.events {
        prefs.events = v;
    }
    if let Some(v) = update.marketing {
        prefs.marketing = v;
    }

    state.db.upsert_notification_preferences(&prefs).await?;
    tracing::info!(user_id = %user.user_id, ?prefs, "Notification preferences updated");
    Ok(Json(prefs))
}
