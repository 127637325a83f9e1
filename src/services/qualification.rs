// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Certification qualification engine.
//!
//! A user qualifies for a certification when every published video of every
//! required module is in their completed set. Progress counts only videos
//! that belong to required modules.

use crate::db::SupabaseDb;
use crate::error::{AppError, Result};
use crate::models::{CertificationSetting, Video};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A required module and the ids of its published videos.
#[derive(Debug, Clone)]
pub struct RequiredModule {
    pub module_id: Uuid,
    pub title: String,
    pub video_ids: HashSet<Uuid>,
}

/// Progress through one required module.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ModuleProgress {
    pub module_id: Uuid,
    pub title: String,
    pub completed_videos: u32,
    pub total_videos: u32,
    /// All published videos watched; false for a module with none
    pub complete: bool,
}

/// Result of evaluating a user against a certification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Qualification {
    pub qualified: bool,
    pub completed_videos: u32,
    pub total_videos: u32,
    pub progress_percentage: u32,
    pub modules: Vec<ModuleProgress>,
}

/// `round(100 * completed / total)`, or 0 when there is nothing to complete.
pub fn progress_percentage(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((100.0 * completed as f64) / total as f64).round() as u32
}

/// Evaluate completion of the required modules against a completed-video set.
pub fn evaluate(required: &[RequiredModule], completed: &HashSet<Uuid>) -> Qualification {
    let modules: Vec<ModuleProgress> = required
        .iter()
        .map(|m| {
            let total = m.video_ids.len() as u32;
            let done = m.video_ids.intersection(completed).count() as u32;
            ModuleProgress {
                module_id: m.module_id,
                title: m.title.clone(),
                completed_videos: done,
                total_videos: total,
                complete: total > 0 && done == total,
            }
        })
        .collect();

    let total_videos = modules.iter().map(|m| m.total_videos).sum();
    let completed_videos = modules.iter().map(|m| m.completed_videos).sum();
    let qualified = !modules.is_empty() && modules.iter().all(|m| m.complete);

    Qualification {
        qualified,
        completed_videos,
        total_videos,
        progress_percentage: progress_percentage(completed_videos, total_videos),
        modules,
    }
}

/// Group published videos under the certification's required modules.
///
/// Required modules that no longer exist still appear, with no videos, so
/// they block qualification instead of silently dropping out.
pub fn required_modules(
    setting: &CertificationSetting,
    titles: &HashMap<Uuid, String>,
    videos: &[Video],
) -> Vec<RequiredModule> {
    let mut seen = HashSet::new();
    setting
        .required_module_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .map(|&module_id| RequiredModule {
            module_id,
            title: titles.get(&module_id).cloned().unwrap_or_default(),
            video_ids: videos
                .iter()
                .filter(|v| v.published && v.module_id == Some(module_id))
                .map(|v| v.id)
                .collect(),
        })
        .collect()
}

/// Loads the rows the engine needs and evaluates them.
#[derive(Clone)]
pub struct QualificationService {
    db: SupabaseDb,
}

impl QualificationService {
    pub fn new(db: SupabaseDb) -> Self {
        Self { db }
    }

    /// Compute a user's progress toward a certification.
    pub async fn progress(&self, user_id: Uuid, certification_id: Uuid) -> Result<Qualification> {
        let setting = self
            .db
            .get_certification_setting(certification_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Certification {} not found", certification_id))
            })?;

        self.progress_for(user_id, &setting).await
    }

    /// Same as [`progress`](Self::progress) with the setting already loaded.
    pub async fn progress_for(
        &self,
        user_id: Uuid,
        setting: &CertificationSetting,
    ) -> Result<Qualification> {
        let modules = self.db.list_modules(&setting.required_module_ids).await?;
        let titles: HashMap<Uuid, String> = modules.into_iter().map(|m| (m.id, m.title)).collect();
        let videos = self
            .db
            .list_published_videos(&setting.required_module_ids)
            .await?;
        let completed = self.db.completed_video_ids(user_id).await?;

        let result = evaluate(&required_modules(setting, &titles, &videos), &completed);

        tracing::debug!(
            %user_id,
            certification_id = %setting.id,
            qualified = result.qualified,
            completed = result.completed_videos,
            total = result.total_videos,
            "Evaluated certification progress"
        );

        Ok(result)
    }
}
