//! Schedule orchestration engine binary.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use preel_ai::{ContentClient, SpeechClient, VideoClient};
use preel_engine::{DuePostScanner, EngineConfig, EngineDeps, ScheduleService};
use preel_firestore::{
    FirestoreClient, ScheduleRepository, SubscriptionRepository, TopicHistoryRepository,
    UserSettingsRepository,
};
use preel_notify::{Mailer, NotifyChannel};
use preel_storage::{MusicLibrary, R2Client};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("preel=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting preel-engine");

    let config = EngineConfig::from_env();
    info!("Engine config: {:?}", config);

    preel_engine::metrics::init_metrics();

    // Firestore client and repositories
    let firestore = match FirestoreClient::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create Firestore client: {}", e);
            std::process::exit(1);
        }
    };

    // R2 storage for the music library
    let r2 = match R2Client::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create R2 client: {}", e);
            std::process::exit(1);
        }
    };

    // Generation service clients
    let content = match ContentClient::from_env() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Failed to create content client: {}", e);
            std::process::exit(1);
        }
    };
    let video = match VideoClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create video client: {}", e);
            std::process::exit(1);
        }
    };
    let speech = match SpeechClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create speech client: {}", e);
            std::process::exit(1);
        }
    };

    // Outbound messaging
    let notifier = match NotifyChannel::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create notify channel: {}", e);
            std::process::exit(1);
        }
    };
    let mailer = match Mailer::from_env() {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to create mailer: {}", e);
            std::process::exit(1);
        }
    };

    if !content.health_check().await {
        warn!("Content service health check failed, continuing anyway");
    }
    if !video.health_check().await {
        warn!("Video service health check failed, continuing anyway");
    }
    if !speech.health_check().await {
        warn!("Speech service health check failed, continuing anyway");
    }

    let deps = EngineDeps {
        store: Arc::new(ScheduleRepository::new(firestore.clone())),
        trends: content.clone(),
        history: Arc::new(TopicHistoryRepository::new(firestore.clone())),
        captions: content,
        video: Arc::new(video),
        speech: Arc::new(speech),
        music: Arc::new(MusicLibrary::new(r2)),
        subscriptions: Arc::new(SubscriptionRepository::new(firestore.clone())),
        settings: Arc::new(UserSettingsRepository::new(firestore)),
        notifier: Arc::new(notifier),
        mailer: Arc::new(mailer),
    };

    let service = Arc::new(ScheduleService::new(deps));
    let scanner = DuePostScanner::new(Arc::clone(&service), &config);

    let scanner_handle = tokio::spawn(async move {
        scanner.run().await;
    });

    // Run until interrupted
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");

    scanner_handle.abort();
    info!("Engine shutdown complete");
}
