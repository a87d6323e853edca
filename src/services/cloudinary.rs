// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image retouching and hosting through the Cloudinary upload API.
//!
//! Uploads are signed (SHA-256 over the sorted parameters plus the API
//! secret). Retouching is an eager `e_improve` transformation, with the
//! merchant's logo fetched and overlaid in the bottom-right corner when one
//! is stored on the profile.

use crate::error::AppError;
use crate::models::ImagePayload;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};

const PHOTO_FOLDER: &str = "pictopost/posts";
const LOGO_FOLDER: &str = "pictopost/logos";

/// Turns a raw photo into a permanently hosted, retouched image.
#[async_trait]
pub trait ImageFinisher: Send + Sync {
    /// Retouch and host `image`, overlaying the logo at `logo_url` if given.
    /// Returns the public URL.
    async fn finish(&self, image: &ImagePayload, logo_url: Option<&str>)
        -> Result<String, AppError>;

    /// Host a merchant logo as-is. Returns the public URL.
    async fn host_logo(&self, logo: &ImagePayload, owner_id: &str) -> Result<String, AppError>;
}

/// Cloudinary API client.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self::with_base_url(
            cloud_name,
            api_key,
            api_secret,
            "https://api.cloudinary.com".to_string(),
        )
    }

    pub fn with_base_url(
        cloud_name: String,
        api_key: String,
        api_secret: String,
        base_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            cloud_name,
            api_key,
            api_secret,
        }
    }

    /// Signed upload of `image`. `params` are the signed options.
    async fn upload(
        &self,
        image: &ImagePayload,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<String, AppError> {
        params.push(("timestamp", chrono::Utc::now().timestamp().to_string()));
        let signature = sign_params(&params, &self.api_secret);

        let mut form = params;
        form.push(("file", image.to_data_url()));
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let url = format!("{}/v1_1/{}/image/upload", self.base_url, self.cloud_name);

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::ImageHost(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ImageHost(format!("HTTP {}: {}", status, body)));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::ImageHost(format!("JSON parse error: {}", e)))?;

        Ok(uploaded.secure_url)
    }
}

#[async_trait]
impl ImageFinisher for CloudinaryClient {
    async fn finish(
        &self,
        image: &ImagePayload,
        logo_url: Option<&str>,
    ) -> Result<String, AppError> {
        let transformation = retouch_transformation(logo_url);
        let url = self
            .upload(
                image,
                vec![
                    ("folder", PHOTO_FOLDER.to_string()),
                    ("transformation", transformation),
                ],
            )
            .await?;

        tracing::debug!(url = %url, with_logo = logo_url.is_some(), "Photo finished");
        Ok(url)
    }

    async fn host_logo(&self, logo: &ImagePayload, owner_id: &str) -> Result<String, AppError> {
        let url = self
            .upload(
                logo,
                vec![
                    ("folder", LOGO_FOLDER.to_string()),
                    ("overwrite", "true".to_string()),
                    ("public_id", owner_id.to_string()),
                ],
            )
            .await?;

        tracing::info!(owner_id, url = %url, "Logo hosted");
        Ok(url)
    }
}

/// Transformation chain applied to every post photo.
pub fn retouch_transformation(logo_url: Option<&str>) -> String {
    match logo_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(logo) => format!(
            "e_improve/l_fetch:{},w_0.2,fl_relative/fl_layer_apply,g_south_east,x_20,y_20",
            URL_SAFE.encode(logo)
        ),
        None => "e_improve".to_string(),
    }
}

/// Cloudinary request signature: `k=v` pairs sorted by key, joined with `&`,
/// secret appended, SHA-256 hex.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    hex::encode(Sha256::digest(format!("{}{}", to_sign, api_secret).as_bytes()))
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}
