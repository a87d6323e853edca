// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe API client and webhook verification.
//!
//! Handles:
//! - Hosted checkout sessions carrying the profile ID and credit amount as metadata
//! - `Stripe-Signature` verification (HMAC-SHA256, replay tolerance)
//! - Event payload types

use crate::error::AppError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type that grants credits.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

/// Parameters of a credit-pack purchase.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub price_id: &'a str,
    pub user_id: &'a str,
    pub credits_amount: i64,
    /// Base URL the customer returns to.
    pub return_url: &'a str,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self::with_base_url(secret_key, "https://api.stripe.com".to_string())
    }

    pub fn with_base_url(secret_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            secret_key,
        }
    }

    /// Create a hosted checkout session and return its URL.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<String, AppError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        let return_url = request.return_url.trim_end_matches('/');

        let form = [
            ("payment_method_types[]", "card".to_string()),
            ("line_items[0][price]", request.price_id.to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("mode", "payment".to_string()),
            ("success_url", format!("{}?success=true", return_url)),
            ("cancel_url", format!("{}?canceled=true", return_url)),
            ("metadata[userId]", request.user_id.to_string()),
            ("metadata[creditsToAdd]", request.credits_amount.to_string()),
        ];

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Payment(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Payment(format!("HTTP {}: {}", status, body)));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("JSON parse error: {}", e)))?;

        tracing::info!(
            session_id = %session.id,
            user_id = request.user_id,
            credits = request.credits_amount,
            "Checkout session created"
        );

        session
            .url
            .ok_or_else(|| AppError::Payment("Checkout session has no URL".to_string()))
    }
}

// ─── Webhook Verification ───────────────────────────────────────────────────

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against the raw body.
///
/// `now` is the current Unix time; passed in so tests can pin the clock.
pub fn verify_signature(
    header: &str,
    payload: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::InvalidSignature("Missing or invalid timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(AppError::InvalidSignature("No v1 signature".to_string()));
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(AppError::InvalidSignature(
            "Timestamp outside tolerance window".to_string(),
        ));
    }

    let expected = compute_signature(secret, timestamp, payload)?;
    let matched = candidates
        .iter()
        .any(|c| bool::from(expected.as_bytes().ct_eq(c.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(AppError::InvalidSignature("Signature mismatch".to_string()))
    }
}

// ─── Event Types ────────────────────────────────────────────────────────────

/// Stripe webhook event envelope.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// The fields of a checkout session this service reads.
#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get("userId")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Credits purchased, from `creditsToAdd` (or `creditsAmount`). `None` unless positive.
    pub fn credits_to_add(&self) -> Option<i64> {
        self.metadata
            .get("creditsToAdd")
            .or_else(|| self.metadata.get("creditsAmount"))
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
    }
}
