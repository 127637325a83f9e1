// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles and notification preferences
//! - Modules, videos and watch progress
//! - Certification settings and user certifications
//! - Billing mirrors (subscriptions, entitlements, payments, processed events)
//! - Events and registrations
//!
//! Rows go through PostgREST (`/rest/v1`) using the service-role key. An
//! in-memory backend evaluates the same [`Query`] filters for tests and
//! local development.

use crate::db::{tables, Query};
use crate::error::AppError;
use crate::models::{
    CertificationSetting, CertificationStatus, Entitlement, Event, EventRegistration, Module,
    NotificationPreferences, PaymentRecord, PricePlan, ProcessedStripeEvent, Profile,
    SubscriptionRecord, UserCertification, Video, VideoProgress,
};
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const MAX_CONCURRENT_DB_OPS: usize = 20;

/// Supabase database client.
#[derive(Clone)]
pub struct SupabaseDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Rest(RestClient),
    Memory(Arc<DashMap<&'static str, Vec<Value>>>),
}

#[derive(Clone)]
struct RestClient {
    http: reqwest::Client,
    rest_url: String,
    service_key: String,
}

/// New position and unlock delay for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSchedule {
    pub video_id: Uuid,
    pub sort_order: i32,
    pub drip_days: i32,
}

impl SupabaseDb {
    /// Create a client for a Supabase project.
    pub fn new(supabase_url: &str, service_key: &str) -> Self {
        let rest_url = format!("{}/rest/v1", supabase_url.trim_end_matches('/'));
        tracing::info!(url = %rest_url, "Configured Supabase REST client");

        Self {
            backend: Backend::Rest(RestClient {
                http: reqwest::Client::new(),
                rest_url,
                service_key: service_key.to_string(),
            }),
        }
    }

    /// Create an empty in-memory database (tests and local development).
    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
        }
    }

    // ─── Generic Row Operations ──────────────────────────────────

    /// Select all rows matching a query.
    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, AppError> {
        let rows: Vec<Value> = match &self.backend {
            Backend::Rest(rest) => {
                let response = rest
                    .request(reqwest::Method::GET, query.table_name())
                    .query(&query.to_params())
                    .send()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                check_response(response)
                    .await?
                    .json()
                    .await
                    .map_err(|e| AppError::Database(format!("Invalid row payload: {}", e)))?
            }
            Backend::Memory(tables) => tables
                .get(query.table_name())
                .map(|rows| query.apply(&rows))
                .unwrap_or_default(),
        };

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AppError::Database(format!(
                        "Failed to decode {} row: {}",
                        query.table_name(),
                        e
                    ))
                })
            })
            .collect()
    }

    /// Select the first row matching a query.
    pub async fn select_one<T: DeserializeOwned>(&self, query: Query) -> Result<Option<T>, AppError> {
        let rows = self.select(&query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert one row. Unique violations surface as `Conflict`.
    pub async fn insert<T: Serialize>(&self, table: &'static str, row: &T) -> Result<(), AppError> {
        let row = to_row(row)?;
        match &self.backend {
            Backend::Rest(rest) => {
                let response = rest
                    .request(reqwest::Method::POST, table)
                    .header("Prefer", "return=minimal")
                    .json(&row)
                    .send()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                check_response(response).await?;
            }
            Backend::Memory(tables) => tables.entry(table).or_default().push(row),
        }
        Ok(())
    }

    /// Insert a row, or merge it into the row sharing the `on_conflict` columns.
    pub async fn upsert<T: Serialize>(
        &self,
        table: &'static str,
        row: &T,
        on_conflict: &str,
    ) -> Result<(), AppError> {
        let row = to_row(row)?;
        match &self.backend {
            Backend::Rest(rest) => {
                let response = rest
                    .request(reqwest::Method::POST, table)
                    .query(&[("on_conflict", on_conflict)])
                    .header("Prefer", "resolution=merge-duplicates,return=minimal")
                    .json(&row)
                    .send()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                check_response(response).await?;
            }
            Backend::Memory(tables) => {
                let keys: Vec<&str> = on_conflict.split(',').map(str::trim).collect();
                let mut rows = tables.entry(table).or_default();
                match rows
                    .iter_mut()
                    .find(|existing| keys.iter().all(|k| existing.get(*k) == row.get(*k)))
                {
                    Some(existing) => merge_into(existing, &row),
                    None => rows.push(row),
                }
            }
        }
        Ok(())
    }

    /// Patch every row matching a query. Returns the number of rows changed.
    pub async fn update<T: Serialize>(&self, query: &Query, patch: &T) -> Result<usize, AppError> {
        let patch = to_row(patch)?;
        match &self.backend {
            Backend::Rest(rest) => {
                let response = rest
                    .request(reqwest::Method::PATCH, query.table_name())
                    .query(&query.to_params())
                    .header("Prefer", "return=representation")
                    .json(&patch)
                    .send()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                let changed: Vec<Value> = check_response(response)
                    .await?
                    .json()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(changed.len())
            }
            Backend::Memory(tables) => {
                let mut rows = tables.entry(query.table_name()).or_default();
                let mut changed = 0;
                for row in rows.iter_mut().filter(|r| query.matches(r)) {
                    merge_into(row, &patch);
                    changed += 1;
                }
                Ok(changed)
            }
        }
    }

    /// Delete every row matching a query. Returns the number of rows removed.
    pub async fn delete(&self, query: &Query) -> Result<usize, AppError> {
        match &self.backend {
            Backend::Rest(rest) => {
                let response = rest
                    .request(reqwest::Method::DELETE, query.table_name())
                    .query(&query.to_params())
                    .header("Prefer", "return=representation")
                    .send()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                let removed: Vec<Value> = check_response(response)
                    .await?
                    .json()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(removed.len())
            }
            Backend::Memory(tables) => {
                let mut rows = tables.entry(query.table_name()).or_default();
                let before = rows.len();
                rows.retain(|r| !query.matches(r));
                Ok(before - rows.len())
            }
        }
    }

    // ─── Profile Operations ──────────────────────────────────────

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        self.select_one(Query::table(tables::PROFILES).eq("id", user_id))
            .await
    }

    /// Create or replace a profile.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.upsert(tables::PROFILES, profile, "id").await
    }

    /// Find the profile linked to a Stripe customer.
    pub async fn get_profile_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Profile>, AppError> {
        self.select_one(Query::table(tables::PROFILES).eq("stripe_customer_id", customer_id))
            .await
    }

    pub async fn link_stripe_customer(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<(), AppError> {
        let changed = self
            .update(
                &Query::table(tables::PROFILES).eq("id", user_id),
                &serde_json::json!({ "stripe_customer_id": customer_id }),
            )
            .await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("Profile {} not found", user_id)));
        }
        Ok(())
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        self.select(&Query::table(tables::PROFILES)).await
    }

    /// Profiles opted in to the directory, optionally limited to one city.
    pub async fn list_directory_profiles(
        &self,
        city: Option<&str>,
    ) -> Result<Vec<Profile>, AppError> {
        let mut query = Query::table(tables::PROFILES).eq("directory_listed", true);
        if let Some(city) = city {
            query = query.eq("city", city);
        }
        self.select(&query.order("full_name", true)).await
    }

    pub async fn get_notification_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<Option<NotificationPreferences>, AppError> {
        self.select_one(Query::table(tables::NOTIFICATION_PREFERENCES).eq("user_id", user_id))
            .await
    }

    pub async fn upsert_notification_preferences(
        &self,
        prefs: &NotificationPreferences,
    ) -> Result<(), AppError> {
        self.upsert(tables::NOTIFICATION_PREFERENCES, prefs, "user_id")
            .await
    }

    // ─── Module & Video Operations ───────────────────────────────

    pub async fn get_module(&self, module_id: Uuid) -> Result<Option<Module>, AppError> {
        self.select_one(Query::table(tables::MODULES).eq("id", module_id))
            .await
    }

    pub async fn list_modules(&self, module_ids: &[Uuid]) -> Result<Vec<Module>, AppError> {
        if module_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            &Query::table(tables::MODULES)
                .in_list("id", module_ids)
                .order("sort_order", true),
        )
        .await
    }

    pub async fn get_video(&self, video_id: Uuid) -> Result<Option<Video>, AppError> {
        self.select_one(Query::table(tables::VIDEOS).eq("id", video_id))
            .await
    }

    /// All videos of a module (published or not) in sort order.
    pub async fn list_module_videos(&self, module_id: Uuid) -> Result<Vec<Video>, AppError> {
        self.select(
            &Query::table(tables::VIDEOS)
                .eq("module_id", module_id)
                .order("sort_order", true),
        )
        .await
    }

    /// Published videos belonging to any of the given modules.
    pub async fn list_published_videos(&self, module_ids: &[Uuid]) -> Result<Vec<Video>, AppError> {
        if module_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            &Query::table(tables::VIDEOS)
                .in_list("module_id", module_ids)
                .eq("published", true)
                .order("sort_order", true),
        )
        .await
    }

    /// Write new positions and drip delays for a set of videos.
    ///
    /// Uses concurrent writes with a limit; the rewrite is not atomic.
    pub async fn batch_update_video_schedule(
        &self,
        schedule: &[VideoSchedule],
    ) -> Result<(), AppError> {
        let results: Vec<Result<usize, AppError>> = stream::iter(schedule.to_vec())
            .map(|entry| async move {
                self.update(
                    &Query::table(tables::VIDEOS).eq("id", entry.video_id),
                    &serde_json::json!({
                        "sort_order": entry.sort_order,
                        "drip_days": entry.drip_days,
                    }),
                )
                .await
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        for result in results {
            result?;
        }
        Ok(())
    }

    // ─── Progress Operations ─────────────────────────────────────

    pub async fn mark_video_completed(&self, progress: &VideoProgress) -> Result<(), AppError> {
        self.upsert(tables::VIDEO_PROGRESS, progress, "user_id,video_id")
            .await
    }

    /// Ids of every video the user has completed.
    pub async fn completed_video_ids(&self, user_id: Uuid) -> Result<HashSet<Uuid>, AppError> {
        let rows: Vec<VideoProgress> = self
            .select(
                &Query::table(tables::VIDEO_PROGRESS)
                    .eq("user_id", user_id)
                    .eq("completed", true),
            )
            .await?;
        Ok(rows.into_iter().map(|p| p.video_id).collect())
    }

    // ─── Certification Operations ────────────────────────────────

    pub async fn get_certification_setting(
        &self,
        certification_id: Uuid,
    ) -> Result<Option<CertificationSetting>, AppError> {
        self.select_one(Query::table(tables::CERTIFICATION_SETTINGS).eq("id", certification_id))
            .await
    }

    pub async fn list_certification_settings(
        &self,
        active_only: bool,
    ) -> Result<Vec<CertificationSetting>, AppError> {
        let mut query = Query::table(tables::CERTIFICATION_SETTINGS);
        if active_only {
            query = query.eq("is_active", true);
        }
        self.select(&query.order("title", true)).await
    }

    pub async fn get_user_certification(
        &self,
        user_id: Uuid,
        certification_id: Uuid,
    ) -> Result<Option<UserCertification>, AppError> {
        self.select_one(
            Query::table(tables::USER_CERTIFICATIONS)
                .eq("user_id", user_id)
                .eq("certification_id", certification_id),
        )
        .await
    }

    pub async fn get_user_certification_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<UserCertification>, AppError> {
        self.select_one(Query::table(tables::USER_CERTIFICATIONS).eq("id", id))
            .await
    }

    /// Create or update a user certification (one row per user and certification).
    pub async fn save_user_certification(&self, uc: &UserCertification) -> Result<(), AppError> {
        self.upsert(tables::USER_CERTIFICATIONS, uc, "user_id,certification_id")
            .await
    }

    pub async fn list_user_certifications(
        &self,
        status: Option<CertificationStatus>,
    ) -> Result<Vec<UserCertification>, AppError> {
        let mut query = Query::table(tables::USER_CERTIFICATIONS);
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        self.select(&query.order("created_at", true)).await
    }

    /// All certifications a user has started, any status.
    pub async fn list_user_certifications_for(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserCertification>, AppError> {
        self.select(
            &Query::table(tables::USER_CERTIFICATIONS)
                .eq("user_id", user_id)
                .order("created_at", true),
        )
        .await
    }

    // ─── Billing Operations ──────────────────────────────────────

    pub async fn get_price_plan(&self, price_id: &str) -> Result<Option<PricePlan>, AppError> {
        self.select_one(Query::table(tables::PRICE_PLANS).eq("price_id", price_id))
            .await
    }

    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, AppError> {
        self.select_one(
            Query::table(tables::SUBSCRIPTIONS).eq("stripe_subscription_id", subscription_id),
        )
        .await
    }

    pub async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<(), AppError> {
        self.upsert(tables::SUBSCRIPTIONS, record, "stripe_subscription_id")
            .await
    }

    pub async fn get_entitlement(&self, user_id: Uuid) -> Result<Option<Entitlement>, AppError> {
        self.select_one(Query::table(tables::ENTITLEMENTS).eq("user_id", user_id))
            .await
    }

    pub async fn upsert_entitlement(&self, entitlement: &Entitlement) -> Result<(), AppError> {
        self.upsert(tables::ENTITLEMENTS, entitlement, "user_id")
            .await
    }

    pub async fn list_entitlements(&self) -> Result<Vec<Entitlement>, AppError> {
        self.select(&Query::table(tables::ENTITLEMENTS)).await
    }

    /// Record a payment. Keyed by Stripe object id, so redelivery is harmless.
    pub async fn upsert_payment(&self, payment: &PaymentRecord) -> Result<(), AppError> {
        self.upsert(tables::PAYMENTS, payment, "id").await
    }

    pub async fn list_payments(&self) -> Result<Vec<PaymentRecord>, AppError> {
        self.select(&Query::table(tables::PAYMENTS)).await
    }

    pub async fn is_stripe_event_processed(&self, event_id: &str) -> Result<bool, AppError> {
        let row: Option<ProcessedStripeEvent> = self
            .select_one(Query::table(tables::STRIPE_EVENTS).eq("id", event_id))
            .await?;
        Ok(row.is_some())
    }

    pub async fn record_stripe_event(&self, event: &ProcessedStripeEvent) -> Result<(), AppError> {
        self.upsert(tables::STRIPE_EVENTS, event, "id").await
    }

    // ─── Event Operations ────────────────────────────────────────

    pub async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>, AppError> {
        self.select_one(Query::table(tables::EVENTS).eq("id", event_id))
            .await
    }

    /// Registrations for one event, or for all events when `None`.
    pub async fn list_event_registrations(
        &self,
        event_id: Option<Uuid>,
    ) -> Result<Vec<EventRegistration>, AppError> {
        let mut query = Query::table(tables::EVENT_REGISTRATIONS);
        if let Some(event_id) = event_id {
            query = query.eq("event_id", event_id);
        }
        self.select(&query).await
    }

    pub async fn get_event_registration(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EventRegistration>, AppError> {
        self.select_one(
            Query::table(tables::EVENT_REGISTRATIONS)
                .eq("event_id", event_id)
                .eq("user_id", user_id),
        )
        .await
    }

    pub async fn insert_event_registration(
        &self,
        registration: &EventRegistration,
    ) -> Result<(), AppError> {
        self.insert(tables::EVENT_REGISTRATIONS, registration).await
    }

    pub async fn delete_event_registration(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<usize, AppError> {
        self.delete(
            &Query::table(tables::EVENT_REGISTRATIONS)
                .eq("event_id", event_id)
                .eq("user_id", user_id),
        )
        .await
    }
}

impl RestClient {
    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::CONFLICT {
        return Err(AppError::Conflict(body));
    }
    Err(AppError::Database(format!("HTTP {}: {}", status, body)))
}

fn to_row<T: Serialize>(row: &T) -> Result<Value, AppError> {
    serde_json::to_value(row).map_err(|e| AppError::Internal(e.into()))
}

/// Overwrite the fields of `target` with the fields present in `patch`.
fn merge_into(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}
