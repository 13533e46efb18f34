//! SharedSensorState - Latest Known Readings
//!
//! ## Responsibilities
//!
//! - Hold the most recent reading from each sensor source
//! - Last-write-wins per field, single writer per field
//! - Acoustic staleness expiry (cadence + grace)
//! - Best-effort snapshots for the fusion engine
//!
//! Fields are wrapped individually so no adapter ever blocks another; a
//! snapshot may pair readings from different ticks, which is accepted.

use crate::models::{AcousticEvent, Frame, FrequencyReading, SensorSnapshot, VideoDetection};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Shared per-session sensor state
pub struct SharedSensorState {
    video: RwLock<Option<VideoDetection>>,
    acoustic: RwLock<Option<AcousticEvent>>,
    frequency: RwLock<Option<FrequencyReading>>,
    /// Most recent raw frame, kept for alert snapshot upload
    latest_frame: RwLock<Option<Frame>>,
    camera_active: AtomicBool,
    /// Acoustic readings older than this are treated as absent
    acoustic_ttl: Duration,
}

impl SharedSensorState {
    /// Create new state with the given acoustic time-to-live
    /// (source cadence + grace period)
    pub fn new(acoustic_ttl: std::time::Duration) -> Self {
        Self {
            video: RwLock::new(None),
            acoustic: RwLock::new(None),
            frequency: RwLock::new(None),
            latest_frame: RwLock::new(None),
            camera_active: AtomicBool::new(false),
            acoustic_ttl: Duration::from_std(acoustic_ttl).unwrap_or(Duration::seconds(60)),
        }
    }

    pub async fn set_video(&self, detection: VideoDetection) {
        *self.video.write().await = Some(detection);
    }

    /// Clear the video reading (camera unavailable)
    pub async fn clear_video(&self) {
        *self.video.write().await = None;
    }

    pub async fn set_acoustic(&self, event: AcousticEvent) {
        *self.acoustic.write().await = Some(event);
    }

    pub async fn set_frequency(&self, reading: FrequencyReading) {
        *self.frequency.write().await = Some(reading);
    }

    pub async fn set_latest_frame(&self, frame: Frame) {
        *self.latest_frame.write().await = Some(frame);
    }

    pub async fn latest_frame(&self) -> Option<Frame> {
        self.latest_frame.read().await.clone()
    }

    pub fn set_camera_active(&self, active: bool) {
        self.camera_active.store(active, Ordering::Relaxed);
    }

    pub fn camera_active(&self) -> bool {
        self.camera_active.load(Ordering::Relaxed)
    }

    /// Drop the acoustic reading if it has aged past its refresh cadence.
    ///
    /// Runs at the top of every fusion tick so a wedged acoustic source
    /// cannot leave one old reading perpetually influencing fusion.
    /// Returns true if a stale reading was cleared.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> bool {
        let mut acoustic = self.acoustic.write().await;
        if let Some(event) = acoustic.as_ref() {
            if now - event.observed_at > self.acoustic_ttl {
                tracing::debug!(
                    event_type = %event.event_type,
                    observed_at = %event.observed_at,
                    "Clearing stale acoustic reading"
                );
                *acoustic = None;
                return true;
            }
        }
        false
    }

    /// Take a best-effort snapshot of all fields.
    ///
    /// Each field is read atomically on its own; no lock spans fields.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> SensorSnapshot {
        SensorSnapshot {
            video: self.video.read().await.clone(),
            acoustic: self.acoustic.read().await.clone(),
            frequency: self.frequency.read().await.clone(),
            camera_active: self.camera_active(),
            taken_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn state() -> SharedSensorState {
        SharedSensorState::new(std::time::Duration::from_secs(60))
    }

    #[tokio::test]
    async fn snapshot_reflects_latest_writes() {
        let state = state();
        let now = Utc::now();

        state
            .set_video(VideoDetection {
                detected_objects: BTreeSet::from(["person".to_string()]),
                is_crowded: false,
                is_fire: false,
                captured_at: now,
            })
            .await;
        state
            .set_frequency(FrequencyReading {
                hz: 440.0,
                observed_at: now,
            })
            .await;
        state.set_camera_active(true);

        let snap = state.snapshot(now).await;
        assert!(snap.video.is_some());
        assert!(snap.acoustic.is_none());
        assert_eq!(snap.frequency.unwrap().hz, 440.0);
        assert!(snap.camera_active);
    }

    #[tokio::test]
    async fn fresh_acoustic_reading_survives_expiry() {
        let state = state();
        let now = Utc::now();

        state
            .set_acoustic(AcousticEvent {
                event_type: "impact".to_string(),
                intensity_db: 55.0,
                observed_at: now,
            })
            .await;

        assert!(!state.expire_stale(now + Duration::seconds(59)).await);
        assert!(state.snapshot(now).await.acoustic.is_some());
    }

    #[tokio::test]
    async fn stale_acoustic_reading_is_cleared() {
        let state = state();
        let now = Utc::now();

        state
            .set_acoustic(AcousticEvent {
                event_type: "impact".to_string(),
                intensity_db: 55.0,
                observed_at: now,
            })
            .await;

        assert!(state.expire_stale(now + Duration::seconds(61)).await);
        let snap = state.snapshot(now).await;
        assert!(snap.acoustic.is_none());
        // a second expiry pass is a no-op
        assert!(!state.expire_stale(now + Duration::seconds(62)).await);
    }

    #[tokio::test]
    async fn video_clear_leaves_other_fields() {
        let state = state();
        let now = Utc::now();

        state
            .set_video(VideoDetection {
                detected_objects: BTreeSet::new(),
                is_crowded: true,
                is_fire: false,
                captured_at: now,
            })
            .await;
        state
            .set_frequency(FrequencyReading {
                hz: 900.0,
                observed_at: now,
            })
            .await;

        state.clear_video().await;
        let snap = state.snapshot(now).await;
        assert!(snap.video.is_none());
        assert!(snap.frequency.is_some());
    }
}
