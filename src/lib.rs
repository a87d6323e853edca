// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pictopost: turn a merchant's photo into ready-to-post social captions.
//!
//! This crate provides the backend API for the web app, the WhatsApp bot,
//! and the Stripe credit-pack flow, all sharing one credit ledger.

pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use conversation::ConversationEngine;
use db::Store;
use services::{
    CaptionGenerator, ChatChannel, CreditLedger, ImageFinisher, Publisher, StripeClient,
};
use std::sync::Arc;

/// Hosted collaborators, constructed once at startup.
pub struct Services {
    pub captions: Arc<dyn CaptionGenerator>,
    pub finisher: Arc<dyn ImageFinisher>,
    pub channel: Arc<dyn ChatChannel>,
    pub stripe: StripeClient,
    /// Automation hook for confirmed drafts; `None` means deliver-only.
    pub publisher: Option<Arc<dyn Publisher>>,
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Store>,
    pub ledger: CreditLedger,
    pub captions: Arc<dyn CaptionGenerator>,
    pub finisher: Arc<dyn ImageFinisher>,
    pub channel: Arc<dyn ChatChannel>,
    pub stripe: StripeClient,
    pub conversation: ConversationEngine,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Store>, services: Services) -> Self {
        let conversation = ConversationEngine::new(
            db.clone(),
            services.captions.clone(),
            services.finisher.clone(),
            services.channel.clone(),
            services.publisher,
        );

        Self {
            config,
            ledger: CreditLedger::new(db.clone()),
            db,
            captions: services.captions,
            finisher: services.finisher,
            channel: services.channel,
            stripe: services.stripe,
            conversation,
        }
    }
}
