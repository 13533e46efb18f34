//! Application state
//!
//! Holds the configuration and the stateless collaborators shared by all
//! sessions. Per-session state (sensor fields, camera handle, gate) is
//! built fresh for each WebSocket connection.

use crate::alert_gate::{AlertGate, GateConfig};
use crate::camera::{CameraDriver, CameraManager, CameraRetryPolicy};
use crate::dispatch::AlertDispatcher;
use crate::sensor_state::SharedSensorState;
use crate::session::{SessionConfig, SessionOrchestrator};
use crate::sources::{AcousticEventSource, FrequencyAnalyzer, ImageSink, VisionDetector};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Vision inference service base URL
    pub vision_url: String,
    /// Acoustic sampling service base URL
    pub acoustic_url: String,
    /// Snapshot upload endpoint
    pub upload_url: String,
    /// Camera input (`/dev/video0` or an `rtsp://` URL)
    pub camera_input: String,
    /// ALSA device for frequency analysis
    pub audio_device: String,
    /// Per-session loop cadences
    pub session: SessionConfig,
    /// Camera acquire/reacquire policy
    pub camera_policy: CameraRetryPolicy,
    /// Alert gating policy
    pub gate: GateConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            vision_url: std::env::var("VISION_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            acoustic_url: std::env::var("ACOUSTIC_URL")
                .unwrap_or_else(|_| "http://localhost:9100".to_string()),
            upload_url: std::env::var("UPLOAD_URL")
                .unwrap_or_else(|_| "http://localhost:9200/upload".to_string()),
            camera_input: std::env::var("CAMERA_INPUT")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            audio_device: std::env::var("AUDIO_DEVICE")
                .unwrap_or_else(|_| "default".to_string()),
            session: SessionConfig::default(),
            camera_policy: CameraRetryPolicy::default(),
            gate: GateConfig::default(),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Vision inference adapter
    pub detector: Arc<dyn VisionDetector>,
    /// Acoustic sampling adapter
    pub acoustic: Arc<dyn AcousticEventSource>,
    /// Frequency analysis adapter
    pub analyzer: Arc<dyn FrequencyAnalyzer>,
    /// Snapshot upload adapter
    pub image_sink: Arc<dyn ImageSink>,
    /// Camera device driver
    pub camera_driver: Arc<dyn CameraDriver>,
    /// Live WebSocket session count (health endpoint)
    pub active_sessions: Arc<AtomicU64>,
}

impl AppState {
    /// Assemble the per-session object graph around one outbound channel.
    pub fn build_session(
        &self,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Arc<SessionOrchestrator> {
        let session_id = Uuid::new_v4();
        let shared = Arc::new(SharedSensorState::new(self.config.session.acoustic_ttl()));
        let camera = Arc::new(CameraManager::new(
            self.camera_driver.clone(),
            self.config.camera_policy.clone(),
        ));
        let gate = Arc::new(AlertGate::new(self.config.gate.clone()));
        let dispatcher = Arc::new(AlertDispatcher::new(
            shared.clone(),
            self.image_sink.clone(),
            outbound,
            format!("alert-{}", session_id),
        ));

        Arc::new(SessionOrchestrator::new(
            session_id,
            self.config.session.clone(),
            shared,
            camera,
            gate,
            dispatcher,
            self.detector.clone(),
            self.acoustic.clone(),
            self.analyzer.clone(),
        ))
    }
}
