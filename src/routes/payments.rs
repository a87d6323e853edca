// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit-pack purchases: Stripe checkout and the payment webhook.

use crate::db::GrantOutcome;
use crate::error::{AppError, Result};
use crate::services::stripe::{
    self, CheckoutRequest, CheckoutSession, StripeEvent, CHECKOUT_COMPLETED,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/stripe/checkout", post(create_checkout))
        .route("/api/webhooks/stripe", post(handle_stripe_event))
}

// ─── Checkout ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    #[validate(length(min = 1, max = 255))]
    pub price_id: String,
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(range(min = 1, max = 1000))]
    pub credits_amount: i64,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckoutResponse {
    pub url: String,
}

/// Start a hosted checkout for a credit pack.
async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if state.db.get_profile(&body.user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Profile {}", body.user_id)));
    }

    let url = state
        .stripe
        .create_checkout_session(&CheckoutRequest {
            price_id: &body.price_id,
            user_id: &body.user_id,
            credits_amount: body.credits_amount,
            return_url: &state.config.public_url,
        })
        .await?;

    Ok(Json(CheckoutResponse { url }))
}

// ─── Webhook ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Receive a signed Stripe event.
///
/// Only `checkout.session.completed` grants credits, at most once per event ID.
/// Storage failures surface as 5xx so Stripe redelivers.
async fn handle_stripe_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::InvalidSignature("Missing Stripe-Signature header".to_string()))?;

    stripe::verify_signature(
        signature,
        &body,
        &state.config.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    )?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;

    if event.event_type != CHECKOUT_COMPLETED {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring Stripe event");
        return Ok(Json(WebhookAck { received: true }));
    }

    let session: CheckoutSession = serde_json::from_value(event.data.object)
        .map_err(|e| AppError::BadRequest(format!("Invalid checkout session: {}", e)))?;

    let (Some(user_id), Some(credits)) = (session.user_id(), session.credits_to_add()) else {
        tracing::warn!(
            event_id = %event.id,
            session_id = %session.id,
            "Completed checkout without usable metadata"
        );
        return Ok(Json(WebhookAck { received: true }));
    };

    match state.ledger.credit(user_id, credits, &event.id).await? {
        GrantOutcome::Applied { .. } | GrantOutcome::AlreadyProcessed => {}
        GrantOutcome::NotFound => {
            tracing::error!(
                event_id = %event.id,
                user_id,
                credits,
                "Paid checkout for unknown profile"
            );
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
