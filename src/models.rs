//! Shared models and types
//!
//! This module contains types shared across multiple modules
//! to avoid circular dependencies: sensor readings, the composite
//! threat assessment, and the client wire protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single JPEG-encoded video frame
#[derive(Debug, Clone)]
pub struct Frame(pub Vec<u8>);

impl Frame {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of one successful vision poll
///
/// Overwritten wholesale on each poll; absent while the camera is
/// unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDetection {
    pub detected_objects: BTreeSet<String>,
    pub is_crowded: bool,
    pub is_fire: bool,
    pub captured_at: DateTime<Utc>,
}

/// A labeled acoustic event with an intensity measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcousticEvent {
    pub event_type: String,
    pub intensity_db: f64,
    pub observed_at: DateTime<Utc>,
}

/// A scalar dominant-frequency estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyReading {
    pub hz: f64,
    pub observed_at: DateTime<Utc>,
}

/// Qualitative threat severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Best-effort copy of the shared sensor state at one fusion tick
///
/// Fields are read atomically per field but not as a group; a video reading
/// from one tick may sit next to an acoustic reading from an older one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub video: Option<VideoDetection>,
    pub acoustic: Option<AcousticEvent>,
    pub frequency: Option<FrequencyReading>,
    pub camera_active: bool,
    pub taken_at: DateTime<Utc>,
}

/// Composite threat assessment, one per fusion tick
///
/// Immutable once created; never persisted beyond the dispatch decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAssessment {
    /// Ordered category tags ("weapon", "fire", "crowd", "audio_anomaly",
    /// "anomaly"), or ["none"] when nothing fired
    pub types: Vec<String>,
    pub severity: Severity,
    pub score: u32,
    pub description: String,
    pub has_critical_threat: bool,
    pub source: SensorSnapshot,
    pub computed_at: DateTime<Utc>,
}

impl ThreatAssessment {
    /// Composite type tag used by the alert gate for deduplication
    pub fn type_tag(&self) -> String {
        self.types.join("+")
    }
}

/// Sensor section of the alert wire payload
///
/// `audio`, `thermal` and `weather` are wire-compat fields carried as nulls;
/// no such sensors exist in this deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorData {
    pub video: Option<VideoDetection>,
    pub bof: Option<AcousticEvent>,
    pub audio: Option<serde_json::Value>,
    pub vibration: Option<FrequencyReading>,
    pub thermal: Option<serde_json::Value>,
    pub weather: Option<serde_json::Value>,
}

/// Alert payload sent to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub severity: Severity,
    pub timestamp: String,
    pub description: String,
    #[serde(rename = "sensorData")]
    pub sensor_data: SensorData,
    pub status: String,
    pub thumbnail: String,
    #[serde(rename = "threatScore")]
    pub threat_score: u32,
}

/// Server-to-client message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished { message: String },
    Alert { data: AlertPayload },
    Response { message: serde_json::Value },
    Error { error: String },
}

/// Inbound client message shape
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(default)]
    pub message: serde_json::Value,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_tagging() {
        let msg = ServerMessage::ConnectionEstablished {
            message: "Connected successfully".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "connection_established");
        assert_eq!(json["message"], "Connected successfully");

        let msg = ServerMessage::Error {
            error: "Invalid JSON received".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn alert_payload_wire_shape() {
        let payload = AlertPayload {
            types: vec!["weapon".to_string(), "crowd".to_string()],
            severity: Severity::High,
            timestamp: Utc::now().to_rfc3339(),
            description: "weapon object detected (knife)".to_string(),
            sensor_data: SensorData::default(),
            status: "unresolved".to_string(),
            thumbnail: "placeholder".to_string(),
            threat_score: 210,
        };
        let json = serde_json::to_value(ServerMessage::Alert { data: payload }).unwrap();
        assert_eq!(json["type"], "alert");
        assert_eq!(json["data"]["type"][0], "weapon");
        assert_eq!(json["data"]["severity"], "high");
        assert_eq!(json["data"]["threatScore"], 210);
        // wire-compat sensor fields are present and null
        assert!(json["data"]["sensorData"]["thermal"].is_null());
        assert!(json["data"]["sensorData"]["weather"].is_null());
    }

    #[test]
    fn type_tag_joins_in_order() {
        let assessment = ThreatAssessment {
            types: vec!["fire".to_string(), "crowd".to_string()],
            severity: Severity::High,
            score: 240,
            description: String::new(),
            has_critical_threat: true,
            source: SensorSnapshot {
                video: None,
                acoustic: None,
                frequency: None,
                camera_active: false,
                taken_at: Utc::now(),
            },
            computed_at: Utc::now(),
        };
        assert_eq!(assessment.type_tag(), "fire+crowd");
    }
}
