// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: curriculum scheduling, certification review, analytics.

use crate::db::VideoSchedule;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::UserCertification;
use crate::services::{AnalyticsSummary, DripSchedule, ReviewDecision, SubmissionSummary};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Admin routes. Auth and admin-role middleware are applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/modules/{id}/drip", put(put_drip_schedule))
        .route("/admin/modules/{id}/order", put(put_video_order))
        .route("/admin/certifications/submissions", get(list_submissions))
        .route(
            "/admin/certifications/review/{user_certification_id}",
            post(review_submission),
        )
        .route("/admin/analytics", get(get_analytics))
}

/// New schedule for one video, as returned to the dashboard.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VideoScheduleResponse {
    pub video_id: Uuid,
    pub sort_order: i32,
    pub drip_days: i32,
}

impl From<VideoSchedule> for VideoScheduleResponse {
    fn from(s: VideoSchedule) -> Self {
        Self {
            video_id: s.video_id,
            sort_order: s.sort_order,
            drip_days: s.drip_days,
        }
    }
}

// ─── Curriculum ──────────────────────────────────────────────

async fn put_drip_schedule(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<Uuid>,
    Json(schedule): Json<DripSchedule>,
) -> Result<Json<Vec<VideoScheduleResponse>>> {
    let planned = state.curriculum.apply_schedule(module_id, &schedule).await?;
    Ok(Json(planned.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderRequest {
    #[validate(length(min = 1))]
    pub video_ids: Vec<Uuid>,
}

async fn put_video_order(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<Uuid>,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<Vec<VideoScheduleResponse>>> {
    body.validate()?;
    let planned = state.curriculum.reorder(module_id, &body.video_ids).await?;
    Ok(Json(planned.into_iter().map(Into::into).collect()))
}

// ─── Certification Review ────────────────────────────────────

async fn list_submissions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SubmissionSummary>>> {
    Ok(Json(state.certifications.pending_reviews().await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

async fn review_submission(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_certification_id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<UserCertification>> {
    body.validate()?;
    let uc = state
        .certifications
        .review(
            admin.user_id,
            user_certification_id,
            body.decision,
            body.feedback,
            Utc::now(),
        )
        .await?;
    Ok(Json(uc))
}

// ─── Analytics ───────────────────────────────────────────────

async fn get_analytics(State(state): State<Arc<AppState>>) -> Result<Json<AnalyticsSummary>> {
    Ok(Json(state.analytics.summary().await?))
}
