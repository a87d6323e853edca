// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use pictopost::config::Config;
use pictopost::db::{FirestoreDb, MemoryStore, ProfileStore};
use pictopost::error::AppError;
use pictopost::models::{
    BusinessContext, CaptionSet, DraftPost, FacebookPost, GooglePost, ImagePayload,
    InstagramPost, OnboardingStep, TikTokPost, UserProfile,
};
use pictopost::routes::create_router;
use pictopost::services::{
    CaptionGenerator, ChatChannel, ImageFinisher, OutboundMessage, Publisher, StripeClient,
};
use pictopost::time_utils::now_rfc3339;
use pictopost::{AppState, Services};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
pub const PHONE: &str = "whatsapp:+33612345678";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fakes ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCaptions {
    pub fail: AtomicBool,
    pub generate_calls: AtomicUsize,
    pub revise_calls: AtomicUsize,
    pub contexts: Mutex<Vec<BusinessContext>>,
}

#[allow(dead_code)]
pub fn caption_set(text: &str) -> CaptionSet {
    CaptionSet {
        tiktok: TikTokPost {
            hook: "Hook".to_string(),
            caption: text.to_string(),
            hashtags: "#tiktok".to_string(),
        },
        instagram: InstagramPost {
            title: String::new(),
            caption: text.to_string(),
            hashtags: "#insta".to_string(),
        },
        facebook: FacebookPost {
            title: "FB".to_string(),
            caption: text.to_string(),
        },
        google: Some(GooglePost {
            caption: text.to_string(),
        }),
    }
}

#[async_trait]
impl CaptionGenerator for FakeCaptions {
    async fn generate(
        &self,
        _image: &ImagePayload,
        context: &BusinessContext,
    ) -> Result<CaptionSet, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::CaptionApi("model unavailable".to_string()));
        }
        let n = self.generate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.contexts.lock().unwrap().push(context.clone());
        Ok(caption_set(&format!("Caption {}", n)))
    }

    async fn revise(
        &self,
        previous: &str,
        instructions: &str,
        _context: &BusinessContext,
    ) -> Result<String, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::CaptionApi("model unavailable".to_string()));
        }
        self.revise_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} [{}]", previous, instructions))
    }
}

#[derive(Default)]
pub struct FakeFinisher {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub logos: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl ImageFinisher for FakeFinisher {
    async fn finish(
        &self,
        _image: &ImagePayload,
        logo_url: Option<&str>,
    ) -> Result<String, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::ImageHost("upload failed".to_string()));
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.logos.lock().unwrap().push(logo_url.map(str::to_string));
        Ok(format!("https://img.test/finished/{}.jpg", n))
    }

    async fn host_logo(&self, _logo: &ImagePayload, owner_id: &str) -> Result<String, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::ImageHost("upload failed".to_string()));
        }
        Ok(format!("https://img.test/logos/{}.png", owner_id))
    }
}

/// Records every outbound message instead of sending it.
#[derive(Default)]
pub struct RecordingChannel {
    pub fail_fetch: AtomicBool,
    pub sent: Mutex<Vec<(String, OutboundMessage)>>,
}

#[allow(dead_code)]
impl RecordingChannel {
    pub fn sent_to(&self, to: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == to)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    async fn fetch_media(&self, _media_url: &str) -> Result<ImagePayload, AppError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::Messaging("media fetch failed".to_string()));
        }
        Ok(ImagePayload::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]))
    }

    async fn send(&self, to: &str, message: &OutboundMessage) -> Result<(), AppError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), message.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, _profile: &UserProfile, draft: &DraftPost) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("hook down")));
        }
        self.published.lock().unwrap().push(draft.id.clone());
        Ok(())
    }
}

// ─── Test App ───────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub captions: Arc<FakeCaptions>,
    pub finisher: Arc<FakeFinisher>,
    pub channel: Arc<RecordingChannel>,
    pub publisher: Option<Arc<RecordingPublisher>>,
}

pub struct TestOptions {
    pub config: Config,
    pub stripe_base_url: String,
    pub with_publisher: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            config: Config::test_default(),
            // Nothing listens here; tests that reach Stripe pass a mock server.
            stripe_base_url: "http://127.0.0.1:9".to_string(),
            with_publisher: false,
        }
    }
}

/// Create a test app backed by the in-memory store and in-process fakes.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(TestOptions::default())
}

#[allow(dead_code)]
pub fn create_test_app_with(options: TestOptions) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let captions = Arc::new(FakeCaptions::default());
    let finisher = Arc::new(FakeFinisher::default());
    let channel = Arc::new(RecordingChannel::default());
    let publisher = options
        .with_publisher
        .then(|| Arc::new(RecordingPublisher::default()));

    let services = Services {
        captions: captions.clone(),
        finisher: finisher.clone(),
        channel: channel.clone(),
        stripe: StripeClient::with_base_url(
            options.config.stripe_secret_key.clone(),
            options.stripe_base_url,
        ),
        publisher: publisher.clone().map(|p| p as Arc<dyn Publisher>),
    };

    let state = Arc::new(AppState::new(options.config, store.clone(), services));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        captions,
        finisher,
        channel,
        publisher,
    }
}

/// Store a profile linked to `phone` at the given onboarding step.
#[allow(dead_code)]
pub async fn seed_profile(
    store: &MemoryStore,
    id: &str,
    phone: Option<&str>,
    credits: i64,
    step: Option<OnboardingStep>,
) -> UserProfile {
    let mut profile = UserProfile::new(id, credits, now_rfc3339());
    profile.whatsapp_number = phone.map(str::to_string);
    profile.onboarding_step = step;
    store.upsert_profile(&profile).await.unwrap();
    profile
}

#[allow(dead_code)]
pub async fn credits_of(store: &MemoryStore, id: &str) -> i64 {
    store
        .get_profile(id)
        .await
        .unwrap()
        .expect("profile exists")
        .credits_remaining
}
