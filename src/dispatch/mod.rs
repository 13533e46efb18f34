//! AlertDispatcher - Snapshot Upload and Delivery
//!
//! ## Responsibilities
//!
//! - Upload the latest frame to the image sink (failure is non-fatal)
//! - Build the alert wire payload from the assessment
//! - Hand the serialized message to the session outbound channel
//!
//! Upload strictly precedes send: the payload must carry the resolved
//! thumbnail before delivery.

use crate::error::{Error, Result};
use crate::models::{AlertPayload, SensorData, ServerMessage, ThreatAssessment};
use crate::sensor_state::SharedSensorState;
use crate::sources::ImageSink;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Thumbnail used when no frame is available or the upload fails
pub const PLACEHOLDER_THUMBNAIL: &str = "/static/alert-placeholder.jpg";

/// Per-session alert dispatcher
pub struct AlertDispatcher {
    shared: Arc<SharedSensorState>,
    sink: Arc<dyn ImageSink>,
    outbound: mpsc::UnboundedSender<String>,
    /// Stable upload name, overwritten per alert
    upload_name: String,
}

impl AlertDispatcher {
    pub fn new(
        shared: Arc<SharedSensorState>,
        sink: Arc<dyn ImageSink>,
        outbound: mpsc::UnboundedSender<String>,
        upload_name: String,
    ) -> Self {
        Self {
            shared,
            sink,
            outbound,
            upload_name,
        }
    }

    /// Dispatch one alert for a positive gate decision.
    pub async fn dispatch(&self, assessment: &ThreatAssessment) -> Result<()> {
        let mut thumbnail = PLACEHOLDER_THUMBNAIL.to_string();

        if let Some(frame) = self.shared.latest_frame().await {
            match self.sink.upload(&frame, &self.upload_name).await {
                Ok(url) => thumbnail = url,
                Err(e) => {
                    tracing::warn!(error = %e, "Snapshot upload failed, keeping placeholder");
                }
            }
        }

        let payload = AlertPayload {
            types: assessment.types.clone(),
            severity: assessment.severity,
            timestamp: assessment.computed_at.to_rfc3339(),
            description: assessment.description.clone(),
            sensor_data: SensorData {
                video: assessment.source.video.clone(),
                bof: assessment.source.acoustic.clone(),
                vibration: assessment.source.frequency.clone(),
                ..SensorData::default()
            },
            status: "unresolved".to_string(),
            thumbnail,
            threat_score: assessment.score,
        };

        let json = serde_json::to_string(&ServerMessage::Alert { data: payload })?;
        self.outbound
            .send(json)
            .map_err(|_| Error::Internal("client channel closed".to_string()))?;

        tracing::info!(
            score = assessment.score,
            severity = assessment.severity.as_str(),
            types = %assessment.type_tag(),
            "Alert dispatched"
        );

        Ok(())
    }
}
