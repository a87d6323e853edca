// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Every hosted collaborator (model provider, chat channel, image host,
//! payment processor) is configured here once at startup.

use std::env;

/// Default number of credits granted to a freshly created profile.
pub const DEFAULT_STARTER_CREDITS: i64 = 3;

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Public base URL of the web app (checkout redirects)
    pub public_url: String,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// Exact URL Twilio posts inbound messages to; inbound signatures cover it
    pub whatsapp_webhook_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Storage backend
    pub store_backend: StoreBackend,
    /// Server port
    pub port: u16,
    /// Vision model used for captions
    pub openai_model: String,
    /// Twilio account SID
    pub twilio_account_sid: String,
    /// Fixed WhatsApp sender identity, e.g. `whatsapp:+14155238886`
    pub twilio_whatsapp_number: String,
    /// Cloudinary cloud name
    pub cloudinary_cloud_name: String,
    /// Cloudinary API key (public half)
    pub cloudinary_api_key: String,
    /// Credits granted on profile creation
    pub starter_credits: i64,
    /// Automation hook that receives confirmed drafts, if any
    pub publish_webhook_url: Option<String>,

    // --- Secrets ---
    pub openai_api_key: String,
    pub stripe_secret_key: String,
    /// Shared secret for Stripe webhook signatures
    pub stripe_webhook_secret: String,
    pub twilio_auth_token: String,
    pub cloudinary_api_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let public_url =
            env::var("PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StoreBackend::Firestore,
        };

        let starter_credits = match env::var("STARTER_CREDITS") {
            Ok(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or(ConfigError::Invalid("STARTER_CREDITS", v))?,
            Err(_) => DEFAULT_STARTER_CREDITS,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL").unwrap_or_else(|_| public_url.clone()),
            whatsapp_webhook_url: env::var("WHATSAPP_WEBHOOK_URL")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| {
                    format!("{}/api/whatsapp/webhook", public_url.trim_end_matches('/'))
                }),
            public_url,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store_backend,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            twilio_account_sid: required("TWILIO_ACCOUNT_SID")?,
            twilio_whatsapp_number: required("TWILIO_WHATSAPP_NUMBER")?,
            cloudinary_cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            cloudinary_api_key: required("CLOUDINARY_API_KEY")?,
            starter_credits,
            publish_webhook_url: env::var("PUBLISH_WEBHOOK_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            openai_api_key: required("OPENAI_API_KEY")?,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            twilio_auth_token: required("TWILIO_AUTH_TOKEN")?,
            cloudinary_api_secret: required("CLOUDINARY_API_SECRET")?,
        })
    }

    /// Deterministic config for tests. Never talks to real services.
    pub fn test_default() -> Self {
        Self {
            public_url: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            whatsapp_webhook_url: "http://localhost:3000/api/whatsapp/webhook".to_string(),
            gcp_project_id: "test-project".to_string(),
            store_backend: StoreBackend::Memory,
            port: 8080,
            openai_model: "gpt-4o".to_string(),
            twilio_account_sid: "AC_test".to_string(),
            twilio_whatsapp_number: "whatsapp:+14155238886".to_string(),
            cloudinary_cloud_name: "test-cloud".to_string(),
            cloudinary_api_key: "test_cloudinary_key".to_string(),
            starter_credits: DEFAULT_STARTER_CREDITS,
            publish_webhook_url: None,
            openai_api_key: "sk-test".to_string(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            twilio_auth_token: "test_auth_token".to_string(),
            cloudinary_api_secret: "test_cloudinary_secret".to_string(),
        }
    }
}

/// Read a required variable, trimming stray whitespace from secret bindings.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("OPENAI_API_KEY", "sk-from-env");
        env::set_var("STRIPE_SECRET_KEY", "sk_test_env");
        env::set_var("STRIPE_WEBHOOK_SECRET", " whsec_env \n");
        env::set_var("TWILIO_ACCOUNT_SID", "AC123");
        env::set_var("TWILIO_AUTH_TOKEN", "token");
        env::set_var("TWILIO_WHATSAPP_NUMBER", "whatsapp:+100");
        env::set_var("CLOUDINARY_CLOUD_NAME", "cloud");
        env::set_var("CLOUDINARY_API_KEY", "key");
        env::set_var("CLOUDINARY_API_SECRET", "secret");
        env::set_var("STORE_BACKEND", "memory");
        env::set_var("PUBLIC_URL", "https://bot.test/");
        env::remove_var("WHATSAPP_WEBHOOK_URL");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.openai_api_key, "sk-from-env");
        assert_eq!(config.stripe_webhook_secret, "whsec_env");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.whatsapp_webhook_url,
            "https://bot.test/api/whatsapp/webhook"
        );
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("Firestore".parse::<StoreBackend>().unwrap(), StoreBackend::Firestore);
        assert_eq!(" memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }
}
