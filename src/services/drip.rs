// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drip-bucket scheduler for module videos.
//!
//! Every video in a module carries `drip_days`, the number of days after
//! enrollment before it unlocks. Admins set these manually, spread the
//! videos evenly over a number of buckets, or space them at a fixed
//! interval. Videos are always handled in `sort_order`.

use crate::db::{SupabaseDb, VideoSchedule};
use crate::error::{AppError, Result};
use crate::models::{Video, VideoProgress};
use crate::services::mux;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How to (re)compute a module's drip delays.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DripSchedule {
    /// Explicit delays for some videos; the rest keep theirs.
    Manual { drip_days: HashMap<Uuid, i32> },
    /// Split videos into `buckets` contiguous groups, one interval apart.
    Even {
        buckets: u32,
        interval_days: Option<u32>,
    },
    /// Video `i` unlocks after `i * interval_days`.
    Interval { interval_days: Option<u32> },
}

/// Longest delay an admin may set, ten years.
pub const MAX_DRIP_DAYS: i32 = 3650;

fn delay(steps: usize, interval_days: u32) -> Result<i32> {
    (steps as u64)
        .checked_mul(interval_days as u64)
        .and_then(|d| i32::try_from(d).ok())
        .filter(|d| *d <= MAX_DRIP_DAYS)
        .ok_or_else(|| {
            AppError::BadRequest(format!("Drip delay exceeds {} days", MAX_DRIP_DAYS))
        })
}

/// Delays for `n` videos split as evenly as possible over `buckets` groups.
///
/// The first `n % buckets` groups get one extra video. More buckets than
/// videos collapses to one video per bucket.
pub fn distribute_evenly(n: usize, buckets: u32, interval_days: u32) -> Result<Vec<i32>> {
    if buckets == 0 {
        return Err(AppError::BadRequest(
            "Bucket count must be at least 1".to_string(),
        ));
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let buckets = (buckets as usize).min(n);
    let base = n / buckets;
    let extra = n % buckets;

    let mut out = Vec::with_capacity(n);
    for bucket in 0..buckets {
        let size = base + usize::from(bucket < extra);
        let days = delay(bucket, interval_days)?;
        out.extend(std::iter::repeat(days).take(size));
    }
    Ok(out)
}

/// Delays for `n` videos spaced `interval_days` apart by position.
pub fn fixed_interval(n: usize, interval_days: u32) -> Result<Vec<i32>> {
    (0..n).map(|i| delay(i, interval_days)).collect()
}

fn in_sort_order(videos: &[Video]) -> Vec<&Video> {
    let mut ordered: Vec<&Video> = videos.iter().collect();
    ordered.sort_by_key(|v| (v.sort_order, v.id));
    ordered
}

/// Pair videos (in sort order) with computed delays, normalizing positions to 0..N.
fn positional(videos: &[Video], delays: &[i32]) -> Vec<VideoSchedule> {
    in_sort_order(videos)
        .into_iter()
        .zip(delays)
        .enumerate()
        .map(|(i, (v, &drip_days))| VideoSchedule {
            video_id: v.id,
            sort_order: i as i32,
            drip_days,
        })
        .collect()
}

/// Override delays for named videos; others keep their current delay.
pub fn assign_manual(videos: &[Video], drip_days: &HashMap<Uuid, i32>) -> Result<Vec<VideoSchedule>> {
    let known: HashSet<Uuid> = videos.iter().map(|v| v.id).collect();
    for (id, days) in drip_days {
        if !known.contains(id) {
            return Err(AppError::BadRequest(format!(
                "Video {} is not in this module",
                id
            )));
        }
        if !(0..=MAX_DRIP_DAYS).contains(days) {
            return Err(AppError::BadRequest(format!(
                "Drip days for video {} must be between 0 and {}",
                id, MAX_DRIP_DAYS
            )));
        }
    }

    Ok(in_sort_order(videos)
        .into_iter()
        .map(|v| VideoSchedule {
            video_id: v.id,
            sort_order: v.sort_order,
            drip_days: drip_days.get(&v.id).copied().unwrap_or(v.drip_days),
        })
        .collect())
}

/// Compute the new schedule for a module's videos.
pub fn plan_schedule(
    videos: &[Video],
    schedule: &DripSchedule,
    default_interval_days: u32,
) -> Result<Vec<VideoSchedule>> {
    match schedule {
        DripSchedule::Manual { drip_days } => assign_manual(videos, drip_days),
        DripSchedule::Even {
            buckets,
            interval_days,
        } => {
            let delays = distribute_evenly(
                videos.len(),
                *buckets,
                interval_days.unwrap_or(default_interval_days),
            )?;
            Ok(positional(videos, &delays))
        }
        DripSchedule::Interval { interval_days } => {
            let delays =
                fixed_interval(videos.len(), interval_days.unwrap_or(default_interval_days))?;
            Ok(positional(videos, &delays))
        }
    }
}

/// Move videos into a new order.
///
/// Positions become 0..N in `new_order`. The module's existing delays are
/// sorted ascending and handed out by position, so the set of delays is
/// preserved while each delay stays with its slot rather than its video.
pub fn reorder(videos: &[Video], new_order: &[Uuid]) -> Result<Vec<VideoSchedule>> {
    let known: HashSet<Uuid> = videos.iter().map(|v| v.id).collect();
    let requested: HashSet<Uuid> = new_order.iter().copied().collect();
    if new_order.len() != videos.len() || requested.len() != new_order.len() || requested != known
    {
        return Err(AppError::BadRequest(
            "Order must list every video of the module exactly once".to_string(),
        ));
    }

    let mut delays: Vec<i32> = videos.iter().map(|v| v.drip_days).collect();
    delays.sort_unstable();

    Ok(new_order
        .iter()
        .zip(delays)
        .enumerate()
        .map(|(i, (&video_id, drip_days))| VideoSchedule {
            video_id,
            sort_order: i as i32,
            drip_days,
        })
        .collect())
}

/// When a video unlocks. Stored delays outside the accepted range are
/// clamped so the date always exists.
pub fn unlock_date(enrolled_at: DateTime<Utc>, drip_days: i32) -> DateTime<Utc> {
    let days = Duration::days(i64::from(drip_days.clamp(0, MAX_DRIP_DAYS)));
    enrolled_at
        .checked_add_signed(days)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn is_unlocked(enrolled_at: DateTime<Utc>, drip_days: i32, now: DateTime<Utc>) -> bool {
    now >= unlock_date(enrolled_at, drip_days)
}

/// A video as seen by an enrolled user.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VideoAccess {
    pub id: Uuid,
    pub title: String,
    pub sort_order: i32,
    pub drip_days: i32,
    pub unlocked: bool,
    pub unlocks_at: DateTime<Utc>,
    pub completed: bool,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    /// Only present once the video is unlocked and the subscription is active
    pub stream_url: Option<String>,
}

/// Where a user stands for drip purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub enrolled_at: DateTime<Utc>,
    /// Entitlement is active or trialing
    pub has_access: bool,
}

/// Module-level curriculum operations backed by the database.
#[derive(Clone)]
pub struct CurriculumService {
    db: SupabaseDb,
    default_interval_days: u32,
}

impl CurriculumService {
    pub fn new(db: SupabaseDb, default_interval_days: u32) -> Self {
        Self {
            db,
            default_interval_days,
        }
    }

    async fn module_videos(&self, module_id: Uuid) -> Result<Vec<Video>> {
        self.db
            .get_module(module_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Module {} not found", module_id)))?;
        self.db.list_module_videos(module_id).await
    }

    /// Recompute and store drip delays for a module.
    pub async fn apply_schedule(
        &self,
        module_id: Uuid,
        schedule: &DripSchedule,
    ) -> Result<Vec<VideoSchedule>> {
        let videos = self.module_videos(module_id).await?;
        let planned = plan_schedule(&videos, schedule, self.default_interval_days)?;
        self.db.batch_update_video_schedule(&planned).await?;

        tracing::info!(
            %module_id,
            videos = planned.len(),
            ?schedule,
            "Applied drip schedule"
        );
        Ok(planned)
    }

    /// Store a new video order for a module.
    pub async fn reorder(&self, module_id: Uuid, new_order: &[Uuid]) -> Result<Vec<VideoSchedule>> {
        let videos = self.module_videos(module_id).await?;
        let planned = reorder(&videos, new_order)?;
        self.db.batch_update_video_schedule(&planned).await?;

        tracing::info!(%module_id, videos = planned.len(), "Reordered module videos");
        Ok(planned)
    }

    /// A user's drip clock and whether their subscription currently
    /// grants access to content.
    ///
    /// The clock starts when the subscription started, or when the profile
    /// was created if the user never subscribed.
    pub async fn membership(&self, user_id: Uuid) -> Result<Membership> {
        let entitlement = self.db.get_entitlement(user_id).await?;
        let has_access = entitlement
            .as_ref()
            .is_some_and(|e| e.status.grants_access());

        let enrolled_at = match entitlement.and_then(|e| e.started_at) {
            Some(started_at) => started_at,
            None => self
                .db
                .get_profile(user_id)
                .await?
                .map(|p| p.created_at)
                .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user_id)))?,
        };

        Ok(Membership {
            enrolled_at,
            has_access,
        })
    }

    /// Mark an unlocked, published video as watched.
    ///
    /// Needs an entitlement that grants access.
    pub async fn complete_video(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<VideoProgress> {
        let video = self
            .db
            .get_video(video_id)
            .await?
            .filter(|v| v.published)
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

        let membership = self.membership(user_id).await?;
        if !membership.has_access {
            tracing::debug!(%user_id, %video_id, "Completion refused without active subscription");
            return Err(AppError::Forbidden);
        }
        if !is_unlocked(membership.enrolled_at, video.drip_days, now) {
            return Err(AppError::Forbidden);
        }

        let progress = VideoProgress {
            user_id,
            video_id,
            completed: true,
            completed_at: Some(now),
        };
        self.db.mark_video_completed(&progress).await?;
        tracing::info!(%user_id, %video_id, "Video completed");
        Ok(progress)
    }

    /// Published videos of a module with lock state for one user.
    pub async fn module_for_user(
        &self,
        module_id: Uuid,
        user_id: Uuid,
        membership: &Membership,
        now: DateTime<Utc>,
    ) -> Result<Vec<VideoAccess>> {
        let enrolled_at = membership.enrolled_at;
        let module = self
            .db
            .get_module(module_id)
            .await?
            .filter(|m| m.published)
            .ok_or_else(|| AppError::NotFound(format!("Module {} not found", module_id)))?;

        let videos = self.db.list_module_videos(module.id).await?;
        let completed = self.db.completed_video_ids(user_id).await?;

        Ok(videos
            .into_iter()
            .filter(|v| v.published)
            .map(|v| {
                let unlocked = is_unlocked(enrolled_at, v.drip_days, now);
                VideoAccess {
                    id: v.id,
                    title: v.title,
                    sort_order: v.sort_order,
                    drip_days: v.drip_days,
                    unlocked,
                    unlocks_at: unlock_date(enrolled_at, v.drip_days),
                    completed: completed.contains(&v.id),
                    thumbnail_url: v
                        .mux_playback_id
                        .as_deref()
                        .map(|id| mux::thumbnail_url(id, None)),
                    preview_url: v.mux_playback_id.as_deref().map(mux::animated_preview_url),
                    stream_url: v
                        .mux_playback_id
                        .as_deref()
                        .filter(|_| unlocked && membership.has_access)
                        .map(mux::stream_url),
                }
            })
            .collect())
    }
}
