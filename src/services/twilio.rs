// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WhatsApp messaging through the Twilio REST API.

use crate::error::AppError;
use crate::models::ImagePayload;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the signature of an inbound webhook request.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// One outbound chat message: text, optionally with an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: String,
    pub media_url: Option<String>,
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            media_url: None,
        }
    }

    pub fn with_media(body: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            media_url: Some(media_url.into()),
        }
    }
}

/// Chat transport: fetches inbound media and delivers outbound messages.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Download an inbound attachment (authenticated against the channel).
    async fn fetch_media(&self, media_url: &str) -> Result<ImagePayload, AppError>;

    /// Send one message to `to` from the fixed sender identity.
    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), AppError>;
}

/// Twilio API client.
#[derive(Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: String, from: String) -> Self {
        Self::with_base_url(
            account_sid,
            auth_token,
            from,
            "https://api.twilio.com".to_string(),
        )
    }

    pub fn with_base_url(
        account_sid: String,
        auth_token: String,
        from: String,
        base_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            account_sid,
            auth_token,
            from,
        }
    }

    /// Parse `media_url` and check it names a resource of this account on
    /// the API host. Credentials are never sent anywhere else.
    fn account_media_url(&self, media_url: &str) -> Result<reqwest::Url, AppError> {
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AppError::Messaging(format!("Invalid Twilio base URL: {}", e)))?;
        let url = reqwest::Url::parse(media_url.trim())
            .map_err(|e| AppError::Messaging(format!("Invalid media URL: {}", e)))?;

        let account_prefix = format!("/2010-04-01/Accounts/{}/", self.account_sid);
        if url.origin() != base.origin() || !url.path().starts_with(&account_prefix) {
            return Err(AppError::Messaging(format!(
                "Refusing media URL outside the Twilio account: {}",
                url.host_str().unwrap_or_default()
            )));
        }
        Ok(url)
    }
}

// ─── Webhook Verification ───────────────────────────────────────────────────

/// Base64 HMAC-SHA1 of the webhook URL followed by every form parameter,
/// sorted by name, as `name` then `value` with no separators.
pub fn compute_request_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
) -> Result<String, AppError> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(url.as_bytes());
    for (name, value) in sorted {
        mac.update(name.as_bytes());
        mac.update(value.as_bytes());
    }
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verify an `X-Twilio-Signature` header against the URL Twilio posted to
/// and the decoded form parameters.
pub fn verify_request_signature(
    header: &str,
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
) -> Result<(), AppError> {
    let expected = compute_request_signature(auth_token, url, params)?;
    if bool::from(expected.as_bytes().ct_eq(header.trim().as_bytes())) {
        Ok(())
    } else {
        Err(AppError::InvalidSignature("Signature mismatch".to_string()))
    }
}

#[async_trait]
impl ChatChannel for TwilioClient {
    async fn fetch_media(&self, media_url: &str) -> Result<ImagePayload, AppError> {
        let url = self.account_media_url(media_url)?;

        let response = self
            .http
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| AppError::Messaging(format!("Media fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Messaging(format!(
                "Media fetch failed: HTTP {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "image/jpeg".to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Messaging(format!("Media read failed: {}", e)))?;

        if bytes.is_empty() {
            return Err(AppError::Messaging("Empty media attachment".to_string()));
        }

        tracing::debug!(content_type = %content_type, len = bytes.len(), "Fetched inbound media");
        Ok(ImagePayload::new(content_type, bytes.to_vec()))
    }

    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), AppError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );

        let mut form = vec![
            ("From", self.from.as_str()),
            ("To", to),
            ("Body", message.body.as_str()),
        ];
        if let Some(media_url) = &message.media_url {
            form.push(("MediaUrl", media_url.as_str()));
        }

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Messaging(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Messaging(format!("HTTP {}: {}", status, body)));
        }

        let sent: MessageResource = response
            .json()
            .await
            .map_err(|e| AppError::Messaging(format!("JSON parse error: {}", e)))?;

        tracing::debug!(sid = %sent.sid, "WhatsApp message queued");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}
