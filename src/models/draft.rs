// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Draft post model: one generated (image, caption) pair awaiting confirmation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Delivered,
    Published,
    /// Persisted but never charged (lost the credit race); not selectable.
    Discarded,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Delivered => "delivered",
            DraftStatus::Published => "published",
            DraftStatus::Discarded => "discarded",
        }
    }
}

/// Stored draft record in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPost {
    /// Draft ID (also used as document ID)
    pub id: String,
    /// Owning profile
    pub user_id: String,
    /// Retouched, permanently hosted image
    pub image_url: String,
    pub caption: String,
    pub status: DraftStatus,
    /// Creation time (fixed-width RFC3339, sortable)
    pub created_at: String,
}
