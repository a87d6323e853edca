// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Inbound WhatsApp webhook (Twilio form posts).

use crate::conversation::{messages, InboundMessage};
use crate::error::{AppError, Result};
use crate::services::{twilio, OutboundMessage};
use crate::AppState;
use axum::{
    extract::{Form, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/whatsapp/webhook", post(handle_message))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
}

/// Verify the request came from Twilio, run the conversation for one inbound
/// message, then deliver the replies in order.
///
/// Unsigned or mis-signed posts are rejected before anything else happens.
async fn handle_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<WebhookAck>)> {
    let signature = headers
        .get(twilio::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::InvalidSignature("Missing X-Twilio-Signature header".to_string())
        })?;

    if let Err(e) = twilio::verify_request_signature(
        signature,
        &state.config.twilio_auth_token,
        &state.config.whatsapp_webhook_url,
        &params,
    ) {
        tracing::warn!(error = %e, "Rejected unsigned WhatsApp webhook");
        return Err(e);
    }

    let inbound = inbound_message(params)?;

    let result = match state.conversation.handle(&inbound).await {
        Ok(replies) => deliver(&state, &inbound.from, &replies).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok((StatusCode::OK, Json(WebhookAck { success: true }))),
        Err(e) => {
            tracing::error!(from = %inbound.from, error = %e, "WhatsApp message handling failed");

            let notice = OutboundMessage::text(messages::GENERIC_ERROR);
            if let Err(send_err) = state.channel.send(&inbound.from, &notice).await {
                tracing::error!(error = %send_err, "Failed to send error notice");
            }

            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAck { success: false }),
            ))
        }
    }
}

/// Pick the fields this service reads out of a Twilio form post.
fn inbound_message(params: Vec<(String, String)>) -> Result<InboundMessage> {
    let mut from = None;
    let mut body = String::new();
    let mut media_url = None;

    for (name, value) in params {
        match name.as_str() {
            "From" => from = Some(value),
            "Body" => body = value,
            "MediaUrl0" => media_url = Some(value),
            _ => {}
        }
    }

    let from = from
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing From".to_string()))?;

    Ok(InboundMessage {
        from,
        body,
        media_url: media_url.filter(|u| !u.trim().is_empty()),
    })
}

async fn deliver(state: &AppState, to: &str, replies: &[OutboundMessage]) -> Result<()> {
    for reply in replies {
        state.channel.send(to, reply).await?;
    }
    Ok(())
}
