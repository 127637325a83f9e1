// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transactional email through the Resend API.
//!
//! Every message belongs to a [`NotificationCategory`]; sends are skipped
//! when the recipient opted out of that category.

use crate::db::SupabaseDb;
use crate::error::{AppError, Result};
use crate::models::{NotificationCategory, NotificationPreferences};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Resend client. Without an HTTP client (mock mode) messages are kept in memory.
#[derive(Clone)]
pub struct EmailService {
    http: Option<reqwest::Client>,
    api_key: String,
    from: String,
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl EmailService {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            http: Some(reqwest::Client::new()),
            api_key,
            from,
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Email service that records messages instead of sending them.
    pub fn new_mock() -> Self {
        Self {
            http: None,
            api_key: String::new(),
            from: "mock@localhost".to_string(),
            outbox: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Messages recorded in mock mode.
    pub fn sent_messages(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    /// Send one message unconditionally.
    pub async fn send(&self, message: &EmailMessage) -> Result<()> {
        let Some(http) = &self.http else {
            tracing::debug!(to = %message.to, subject = %message.subject, "Recorded email (mock)");
            self.outbox
                .lock()
                .map_err(|_| AppError::Email("Mock outbox poisoned".to_string()))?
                .push(message.clone());
            return Ok(());
        };

        let body = ResendRequest {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        let response = http
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Email(format!("Resend request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Email(format!("HTTP {}: {}", status, text)));
        }

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }

    /// Send if the user's preferences allow the category. Returns whether it was sent.
    ///
    /// Users without a preferences row get [`NotificationPreferences::defaults_for`].
    pub async fn send_gated(
        &self,
        db: &SupabaseDb,
        user_id: Uuid,
        category: NotificationCategory,
        message: &EmailMessage,
    ) -> Result<bool> {
        let prefs = db
            .get_notification_preferences(user_id)
            .await?
            .unwrap_or_else(|| NotificationPreferences::defaults_for(user_id));

        if !prefs.allows(category) {
            tracing::debug!(%user_id, ?category, "Email suppressed by preferences");
            return Ok(false);
        }

        self.send(message).await?;
        Ok(true)
    }
}

// ─── Templates ───────────────────────────────────────────────

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn greeting(name: Option<&str>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => format!("<p>Hi {},</p>", escape_html(n.trim())),
        _ => "<p>Hi there,</p>".to_string(),
    }
}

fn format_amount(amount_cents: i64, currency: &str) -> String {
    format!(
        "{}{}.{:02} {}",
        if amount_cents < 0 { "-" } else { "" },
        amount_cents.abs() / 100,
        amount_cents.abs() % 100,
        currency.to_uppercase()
    )
}

pub fn certification_approved(to: &str, name: Option<&str>, certification: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("You're certified: {}", certification),
        html: format!(
            "{}<p>Congratulations! Your submission for <strong>{}</strong> has been approved.</p>",
            greeting(name),
            escape_html(certification)
        ),
    }
}

pub fn certification_rejected(
    to: &str,
    name: Option<&str>,
    certification: &str,
    feedback: &str,
) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Update on your {} submission", certification),
        html: format!(
            "{}<p>Your submission for <strong>{}</strong> needs another pass.</p>\
             <blockquote>{}</blockquote><p>You can resubmit from the app at any time.</p>",
            greeting(name),
            escape_html(certification),
            escape_html(feedback)
        ),
    }
}

pub fn payment_receipt(
    to: &str,
    name: Option<&str>,
    amount_cents: i64,
    currency: &str,
) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Payment received".to_string(),
        html: format!(
            "{}<p>We received your payment of {}. Thank you!</p>",
            greeting(name),
            format_amount(amount_cents, currency)
        ),
    }
}

pub fn payment_failed(to: &str, name: Option<&str>) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Your payment didn't go through".to_string(),
        html: format!(
            "{}<p>We couldn't process your latest subscription payment. \
             Please update your payment method to keep access to your courses.</p>",
            greeting(name)
        ),
    }
}

pub fn event_registration(
    to: &str,
    name: Option<&str>,
    event: &str,
    starts_at: DateTime<Utc>,
    location: Option<&str>,
) -> EmailMessage {
    let place = location
        .map(|l| format!(" at {}", escape_html(l)))
        .unwrap_or_default();
    EmailMessage {
        to: to.to_string(),
        subject: format!("You're registered: {}", event),
        html: format!(
            "{}<p>You're registered for <strong>{}</strong> on {}{}.</p>",
            greeting(name),
            escape_html(event),
            starts_at.format("%B %-d, %Y at %H:%M UTC"),
            place
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_is_escaped() {
        let msg = certification_rejected(
            "a@example.com",
            Some("Sam"),
            "Balayage",
            "<script>alert(1)</script> & retry",
        );
        assert!(msg.html.contains("&lt;script&gt;"));
        assert!(msg.html.contains("&amp; retry"));
        assert!(!msg.html.contains("<script>"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(4900, "usd"), "49.00 USD");
        assert_eq!(format_amount(5, "eur"), "0.05 EUR");
        assert_eq!(format_amount(-1250, "usd"), "-12.50 USD");
    }

    #[test]
    fn test_greeting_falls_back_without_name() {
        assert_eq!(greeting(None), "<p>Hi there,</p>");
        assert_eq!(greeting(Some("  ")), "<p>Hi there,</p>");
        assert_eq!(greeting(Some("Ana")), "<p>Hi Ana,</p>");
    }

    #[tokio::test]
    async fn test_gated_send_respects_preferences() {
        let db = SupabaseDb::new_in_memory();
        let email = EmailService::new_mock();
        let user_id = Uuid::new_v4();
        let msg = payment_failed("a@example.com", None);

        // No row: defaults allow billing mail
        assert!(email
            .send_gated(&db, user_id, NotificationCategory::Billing, &msg)
            .await
            .unwrap());

        let mut prefs = NotificationPreferences::defaults_for(user_id);
        prefs.billing = false;
        db.upsert_notification_preferences(&prefs).await.unwrap();

        assert!(!email
            .send_gated(&db, user_id, NotificationCategory::Billing, &msg)
            .await
            .unwrap());
        assert_eq!(email.sent_messages().len(), 1);
    }
}
