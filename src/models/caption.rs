// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multi-platform caption payload and the image payload it is generated from.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TikTokPost {
    pub hook: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InstagramPost {
    #[serde(default)]
    pub title: String,
    pub caption: String,
    #[serde(default)]
    pub hashtags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FacebookPost {
    #[serde(default)]
    pub title: String,
    pub caption: String,
}

/// Google Business Profile update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GooglePost {
    pub caption: String,
}

/// Captions for every supported platform, as returned by `/api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CaptionSet {
    pub tiktok: TikTokPost,
    pub instagram: InstagramPost,
    pub facebook: FacebookPost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<GooglePost>,
}

impl CaptionSet {
    /// Single ready-to-post text used on WhatsApp (the Instagram variant).
    pub fn chat_caption(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        for part in [
            self.instagram.title.trim(),
            self.instagram.caption.trim(),
            self.instagram.hashtags.trim(),
        ] {
            if !part.is_empty() {
                parts.push(part);
            }
        }
        parts.join("\n\n")
    }
}

/// Raw image bytes with their MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImagePayload {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Parse a `data:<mime>;base64,<data>` URL or a bare base64 string (JPEG assumed).
    pub fn from_base64(input: &str) -> Result<Self, String> {
        let input = input.trim();
        let (content_type, data) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) = rest
                    .split_once(',')
                    .ok_or_else(|| "Malformed data URL".to_string())?;
                let content_type = meta
                    .strip_suffix(";base64")
                    .ok_or_else(|| "Only base64 data URLs are supported".to_string())?;
                (content_type.to_string(), data)
            }
            None => ("image/jpeg".to_string(), input),
        };

        if !content_type.starts_with("image/") {
            return Err(format!("Unsupported content type: {}", content_type));
        }

        let bytes = BASE64
            .decode(data)
            .map_err(|e| format!("Invalid base64 image: {}", e))?;
        if bytes.is_empty() {
            return Err("Empty image".to_string());
        }

        Ok(Self {
            content_type,
            bytes,
        })
    }

    /// Encode as a `data:` URL (what vision models and upload APIs accept inline).
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.bytes))
    }
}
