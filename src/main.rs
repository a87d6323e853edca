// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pictopost API Server
//!
//! Serves the web app API, the WhatsApp webhook and the Stripe webhook.

use pictopost::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore, Store},
    services::{
        AutomationHookPublisher, CloudinaryClient, OpenAiClient, Publisher, StripeClient,
        TwilioClient,
    },
    AppState, Services,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Pictopost API");

    let db: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let publisher = config.publish_webhook_url.clone().map(|url| {
        tracing::info!(url = %url, "Confirmed drafts will be forwarded to publish hook");
        Arc::new(AutomationHookPublisher::new(url)) as Arc<dyn Publisher>
    });

    let services = Services {
        captions: Arc::new(OpenAiClient::new(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
        )),
        finisher: Arc::new(CloudinaryClient::new(
            config.cloudinary_cloud_name.clone(),
            config.cloudinary_api_key.clone(),
            config.cloudinary_api_secret.clone(),
        )),
        channel: Arc::new(TwilioClient::new(
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_whatsapp_number.clone(),
        )),
        stripe: StripeClient::new(config.stripe_secret_key.clone()),
        publisher,
    };

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, services));

    // Build router
    let app = pictopost::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pictopost=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
