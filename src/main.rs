//! SentryFuse server entry point

use sentryfuse::{
    camera::ffmpeg::FfmpegCameraDriver,
    sources::http::{HttpAcousticSource, HttpImageSink, HttpVisionDetector},
    sources::spectral::SpectralFrequencyAnalyzer,
    state::{AppConfig, AppState},
    web_api,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentryfuse=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SentryFuse v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::default();
    tracing::info!(
        vision_url = %config.vision_url,
        acoustic_url = %config.acoustic_url,
        upload_url = %config.upload_url,
        camera_input = %config.camera_input,
        audio_device = %config.audio_device,
        "Configuration loaded"
    );

    let state = AppState {
        detector: Arc::new(HttpVisionDetector::new(config.vision_url.clone())),
        acoustic: Arc::new(HttpAcousticSource::new(config.acoustic_url.clone())),
        analyzer: Arc::new(SpectralFrequencyAnalyzer::new(
            config.audio_device.clone(),
            8000,
            200,
        )),
        image_sink: Arc::new(HttpImageSink::new(config.upload_url.clone())),
        camera_driver: Arc::new(FfmpegCameraDriver::new(
            config.camera_input.clone(),
            Duration::from_secs(5),
        )),
        active_sessions: Arc::new(AtomicU64::new(0)),
        config,
    };

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
