// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Marketing CRM contact tagging.

use crate::db::SupabaseDb;
use crate::error::{AppError, Result};
use crate::models::{NotificationCategory, NotificationPreferences};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Serialize)]
struct TagRequest<'a> {
    email: &'a str,
    tags: &'a [String],
}

#[derive(Clone)]
enum Mode {
    /// No CRM configured; calls are dropped.
    Disabled,
    Live {
        http: reqwest::Client,
        base_url: String,
        api_key: Option<String>,
    },
    Mock(Arc<Mutex<Vec<(String, Vec<String>)>>>),
}

/// CRM client used to tag contacts on lifecycle events.
#[derive(Clone)]
pub struct CrmService {
    mode: Mode,
}

impl CrmService {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        let mode = match base_url {
            Some(base_url) => Mode::Live {
                http: reqwest::Client::new(),
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            },
            None => {
                tracing::info!("CRM_API_URL not set, CRM sync disabled");
                Mode::Disabled
            }
        };
        Self { mode }
    }

    /// CRM that records tag calls in memory.
    pub fn new_mock() -> Self {
        Self {
            mode: Mode::Mock(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Tag calls recorded in mock mode, as `(email, tags)`.
    pub fn recorded_tags(&self) -> Vec<(String, Vec<String>)> {
        match &self.mode {
            Mode::Mock(calls) => calls.lock().map(|c| c.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Add tags to the contact with this email, creating it if needed.
    pub async fn tag_contact(&self, email: &str, tags: &[String]) -> Result<()> {
        match &self.mode {
            Mode::Disabled => {
                tracing::debug!(email, ?tags, "CRM disabled, skipping tag");
                Ok(())
            }
            Mode::Mock(calls) => {
                calls
                    .lock()
                    .map_err(|_| AppError::Crm("Mock CRM poisoned".to_string()))?
                    .push((email.to_string(), tags.to_vec()));
                Ok(())
            }
            Mode::Live {
                http,
                base_url,
                api_key,
            } => {
                let mut request = http
                    .post(format!("{}/contacts/tags", base_url))
                    .json(&TagRequest { email, tags });
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| AppError::Crm(e.to_string()))?;
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::Crm(format!("HTTP {}: {}", status, body)));
                }

                tracing::info!(email, ?tags, "CRM contact tagged");
                Ok(())
            }
        }
    }

    /// Tag a contact only if the user opted in to marketing.
    ///
    /// Returns whether the tag call was made.
    pub async fn tag_contact_gated(
        &self,
        db: &SupabaseDb,
        user_id: Uuid,
        email: &str,
        tags: &[String],
    ) -> Result<bool> {
        let prefs = db
            .get_notification_preferences(user_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults_for(user_id));

        if !prefs.allows(NotificationCategory::Marketing) {
            tracing::debug!(%user_id, ?tags, "CRM tag suppressed by preferences");
            return Ok(false);
        }

        self.tag_contact(email, tags).await?;
        Ok(true)
    }
}
