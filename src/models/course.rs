// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Course content: modules, videos and per-user watch progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A module groups videos inside a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub title: String,
    pub sort_order: i32,
    pub published: bool,
}

/// A hosted video. Belongs to at most one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub module_id: Option<Uuid>,
    pub title: String,
    /// Mux playback id used to build stream and thumbnail URLs
    pub mux_playback_id: Option<String>,
    pub duration_seconds: Option<i32>,
    pub sort_order: i32,
    /// Days after enrollment before the video unlocks
    #[serde(default)]
    pub drip_days: i32,
    pub published: bool,
}

/// Completion marker for a (user, video) pair (`video_progress`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProgress {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}
