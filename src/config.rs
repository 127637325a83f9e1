// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! In production the hosting platform injects secrets as environment
//! variables; for local development a `.env` file is read if present.

use std::env;

/// Default spacing used by the interval drip schedule when a request omits it.
const DEFAULT_DRIP_INTERVAL_DAYS: u32 = 7;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Supabase project URL, e.g. `https://abc.supabase.co`
    pub supabase_url: String,
    /// Frontend URL (admin dashboard) allowed by CORS
    pub frontend_url: String,
    /// Sender address for transactional email
    pub email_from: String,
    /// Marketing CRM API base URL (CRM sync disabled when absent)
    pub crm_api_url: Option<String>,
    /// Spacing used by the interval drip schedule when none is given
    pub default_drip_interval_days: u32,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Supabase service-role key (bypasses row level security)
    pub supabase_service_key: String,
    /// Supabase JWT secret used to verify user access tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Stripe webhook endpoint signing secret (`whsec_...`)
    pub stripe_webhook_secret: String,
    /// Resend API key
    pub resend_api_key: String,
    /// Marketing CRM API key
    pub crm_api_key: Option<String>,
}

impl Config {
    /// Config for tests; no network endpoints are real.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            email_from: "Academy <academy@example.com>".to_string(),
            crm_api_url: None,
            default_drip_interval_days: DEFAULT_DRIP_INTERVAL_DAYS,
            port: 8080,
            supabase_service_key: "test_service_key".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            resend_api_key: "re_test_key".to_string(),
            crm_api_key: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let default_drip_interval_days = match env::var("DEFAULT_DRIP_INTERVAL_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("DEFAULT_DRIP_INTERVAL_DAYS"))?,
            Err(_) => DEFAULT_DRIP_INTERVAL_DAYS,
        };

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Academy <no-reply@localhost>".to_string()),
            crm_api_url: optional("CRM_API_URL"),
            default_drip_interval_days,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            supabase_service_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            jwt_signing_key: required("SUPABASE_JWT_SECRET")?.into_bytes(),
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            resend_api_key: required("RESEND_API_KEY")?,
            crm_api_key: optional("CRM_API_KEY"),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("SUPABASE_URL", "https://project.supabase.co/");
        env::set_var("SUPABASE_SERVICE_ROLE_KEY", "service_key");
        env::set_var("SUPABASE_JWT_SECRET", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("STRIPE_WEBHOOK_SECRET", " whsec_abc \n");
        env::set_var("RESEND_API_KEY", "re_123");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.supabase_url, "https://project.supabase.co");
        assert_eq!(config.stripe_webhook_secret, "whsec_abc");
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_drip_interval_days, DEFAULT_DRIP_INTERVAL_DAYS);
    }
}
