//! SensorSource adapters - Polling Loops
//!
//! ## Responsibilities
//!
//! - Collaborator traits for the external detectors/analyzers
//! - One independent polling loop per source, each at its own cadence
//! - Writes into SharedSensorState (single writer per field)
//!
//! No adapter ever blocks another; loops observe cancellation at every
//! suspension point and exit within one polling interval.

pub mod http;
pub mod spectral;

use crate::camera::CameraManager;
use crate::error::Result;
use crate::models::{AcousticEvent, Frame, FrequencyReading, VideoDetection};
use crate::sensor_state::SharedSensorState;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Object-detection collaborator. May fail or return no detection.
#[async_trait]
pub trait VisionDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> Result<Option<VideoDetection>>;
}

/// One labeled acoustic sample
#[derive(Debug, Clone)]
pub struct AcousticSample {
    pub event_type: String,
    pub intensity_db: f64,
}

/// Acoustic-event collaborator. May be slow (network or file backed).
#[async_trait]
pub trait AcousticEventSource: Send + Sync {
    async fn sample(&self) -> Result<Option<AcousticSample>>;
}

/// Frequency-analysis collaborator.
///
/// Deliberately a blocking trait: implementations may be CPU-bound, and the
/// loop runner always calls them through `spawn_blocking`.
pub trait FrequencyAnalyzer: Send + Sync {
    fn analyze(&self) -> Result<Option<f64>>;
}

/// Image-hosting collaborator for alert thumbnails
#[async_trait]
pub trait ImageSink: Send + Sync {
    async fn upload(&self, frame: &Frame, name: &str) -> Result<String>;
}

/// Vision polling loop: read a frame, run detection, overwrite the video
/// field. A failed read clears the video field (readings are absent while
/// the camera is unavailable); the manager handles retry/reacquire.
pub async fn run_vision_loop(
    shared: Arc<SharedSensorState>,
    camera: Arc<CameraManager>,
    detector: Arc<dyn VisionDetector>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            result = camera.read_frame() => result,
        };

        match frame {
            Ok(frame) => {
                shared.set_camera_active(true);
                shared.set_latest_frame(frame.clone()).await;

                match detector.detect(&frame).await {
                    Ok(Some(detection)) => shared.set_video(detection).await,
                    Ok(None) => {
                        // no reading this poll; previous value stands
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Vision detection failed");
                    }
                }
            }
            Err(e) => {
                shared.set_camera_active(false);
                shared.clear_video().await;
                tracing::debug!(error = %e, "Camera read failed, vision reading absent");
            }
        }
    }

    tracing::debug!("Vision loop stopped");
}

/// Acoustic polling loop on a fixed cadence. Failures retain the previous
/// value; the staleness rule clears it if the source stays quiet.
pub async fn run_acoustic_loop(
    shared: Arc<SharedSensorState>,
    source: Arc<dyn AcousticEventSource>,
    cadence: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(cadence);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sample = tokio::select! {
            _ = cancel.cancelled() => break,
            result = source.sample() => result,
        };

        match sample {
            Ok(Some(sample)) => {
                shared
                    .set_acoustic(AcousticEvent {
                        event_type: sample.event_type,
                        intensity_db: sample.intensity_db,
                        observed_at: Utc::now(),
                    })
                    .await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Acoustic sample failed");
            }
        }
    }

    tracing::debug!("Acoustic loop stopped");
}

/// Frequency polling loop. The analyzer is CPU-bound by contract and runs
/// under `spawn_blocking` so it never stalls the scheduler; readings with a
/// non-positive or non-finite estimate are discarded.
pub async fn run_frequency_loop(
    shared: Arc<SharedSensorState>,
    analyzer: Arc<dyn FrequencyAnalyzer>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let analyzer = analyzer.clone();
        let analysis = tokio::select! {
            _ = cancel.cancelled() => break,
            joined = tokio::task::spawn_blocking(move || analyzer.analyze()) => joined,
        };

        match analysis {
            Ok(Ok(Some(hz))) if hz.is_finite() && hz > 0.0 => {
                shared
                    .set_frequency(FrequencyReading {
                        hz,
                        observed_at: Utc::now(),
                    })
                    .await;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Frequency analysis failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Frequency analysis task panicked");
            }
        }
    }

    tracing::debug!("Frequency loop stopped");
}
