// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caption generation through the OpenAI chat completions API (vision model).
//!
//! Handles:
//! - Multi-platform captions from a photo plus business context (JSON mode)
//! - Rewriting an existing caption from a merchant's correction request

use crate::error::AppError;
use crate::models::{BusinessContext, CaptionSet, ImagePayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Writes captions for a photo.
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    /// Captions for every platform from an image and the merchant's context.
    async fn generate(
        &self,
        image: &ImagePayload,
        context: &BusinessContext,
    ) -> Result<CaptionSet, AppError>;

    /// Rewrite `previous` following the merchant's `instructions`.
    async fn revise(
        &self,
        previous: &str,
        instructions: &str,
        context: &BusinessContext,
    ) -> Result<String, AppError>;
}

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::CaptionApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("OpenAI rate limit hit (429)");
            }
            return Err(AppError::CaptionApi(format!("HTTP {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::CaptionApi(format!("JSON parse error: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::CaptionApi("Empty completion".to_string()))
    }
}

#[async_trait]
impl CaptionGenerator for OpenAiClient {
    async fn generate(
        &self,
        image: &ImagePayload,
        context: &BusinessContext,
    ) -> Result<CaptionSet, AppError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(caption_system_prompt(context)),
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: "Génère les posts.".to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.to_data_url(),
                            },
                        },
                    ]),
                },
            ],
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
            temperature: Some(0.8),
        };

        let content = self.complete(&request).await?;

        let captions: CaptionSet = serde_json::from_str(&content).map_err(|e| {
            AppError::CaptionApi(format!("Model returned malformed captions: {}", e))
        })?;

        tracing::debug!(model = %self.model, "Captions generated");
        Ok(captions)
    }

    async fn revise(
        &self,
        previous: &str,
        instructions: &str,
        context: &BusinessContext,
    ) -> Result<String, AppError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(revision_system_prompt(context)),
                ChatMessage::user(format!(
                    "LÉGENDE ACTUELLE :\n{}\n\nMODIFICATION DEMANDÉE :\n{}",
                    previous, instructions
                )),
            ],
            response_format: None,
            temperature: Some(0.7),
        };

        let content = self.complete(&request).await?;
        Ok(content.trim().to_string())
    }
}

fn context_lines(context: &BusinessContext) -> String {
    let name = context
        .business_name
        .as_deref()
        .map(|n| format!("Nom du commerce : {}", n))
        .unwrap_or_else(|| "Nom générique (ex : Votre expert)".to_string());
    let activity = context
        .activity
        .as_deref()
        .map(|a| format!("Activité : {}. ", a))
        .unwrap_or_default();
    let city = context
        .city
        .as_deref()
        .map(|c| format!("Ville : {}. ", c))
        .unwrap_or_default();
    let tone = context.brand_tone.as_deref().unwrap_or("Standard");

    format!("{}. {}{}Ton : {}.", name, activity, city, tone)
}

/// System prompt for the multi-platform generation call.
pub fn caption_system_prompt(context: &BusinessContext) -> String {
    format!(
        r#"Tu es le meilleur Community Manager de France.
CONTEXTE : {}

RÈGLES TIKTOK :
- Pas trop court. Structure en liste à puces.
- Hook + ligne vide + 3 avantages (emojis) + question de fin.

RÈGLES INSTAGRAM :
- Storytelling immersif, sauts de ligne.

RÈGLES FACEBOOK :
- Ton "quartier / communauté", rassurant.

RÈGLES GOOGLE :
- Fiche d'établissement : factuel, local, appel à venir sur place.

JSON ATTENDU :
{{
  "tiktok": {{ "hook": "...", "caption": "...", "hashtags": "..." }},
  "instagram": {{ "title": "...", "caption": "...", "hashtags": "..." }},
  "facebook": {{ "title": "...", "caption": "..." }},
  "google": {{ "caption": "..." }}
}}"#,
        context_lines(context)
    )
}

fn revision_system_prompt(context: &BusinessContext) -> String {
    format!(
        "Tu es Community Manager. CONTEXTE : {}\n\
         Réécris la légende en appliquant exactement la modification demandée. \
         Garde la même langue et les hashtags pertinents. \
         Réponds uniquement avec la nouvelle légende.",
        context_lines(context)
    )
}

// ─── API Types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(content.into()),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Plain text, or text and image parts for vision input.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
