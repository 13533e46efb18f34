//! HTTP-backed collaborator adapters
//!
//! ## Responsibilities
//!
//! - Vision detector adapter (multipart frame POST to an inference service)
//! - Acoustic event source adapter (JSON poll)
//! - Image sink adapter (multipart upload, returns a durable URL)

use crate::error::{Error, Result};
use crate::models::{Frame, VideoDetection};
use crate::sources::{AcousticEventSource, AcousticSample, ImageSink, VisionDetector};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// Detection service response
#[derive(Debug, Deserialize)]
struct DetectResponse {
    detected: bool,
    #[serde(default)]
    objects: Vec<String>,
    #[serde(default)]
    crowded: bool,
    #[serde(default)]
    fire: bool,
}

/// Vision detector backed by an HTTP inference service
pub struct HttpVisionDetector {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVisionDetector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(10)),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VisionDetector for HttpVisionDetector {
    async fn detect(&self, frame: &Frame) -> Result<Option<VideoDetection>> {
        let form = Form::new().part(
            "frame",
            Part::bytes(frame.0.clone())
                .file_name("frame.jpg")
                .mime_str("image/jpeg")
                .map_err(|e| Error::SourcePoll(format!("multipart build failed: {}", e)))?,
        );

        let url = format!("{}/detect", self.base_url);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::SourcePoll(format!("detection request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::SourcePoll(format!(
                "detection service returned {}",
                resp.status()
            )));
        }

        let body: DetectResponse = resp
            .json()
            .await
            .map_err(|e| Error::SourcePoll(format!("detection response parse failed: {}", e)))?;

        if !body.detected {
            return Ok(None);
        }

        Ok(Some(VideoDetection {
            detected_objects: body.objects.into_iter().collect::<BTreeSet<_>>(),
            is_crowded: body.crowded,
            is_fire: body.fire,
            captured_at: Utc::now(),
        }))
    }
}

/// Acoustic event service response
#[derive(Debug, Deserialize)]
struct AcousticResponse {
    event_type: String,
    intensity_db: f64,
}

/// Acoustic event source backed by an HTTP sampling service
pub struct HttpAcousticSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAcousticSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            // sampling backends can be slow; give them more room than the
            // vision path
            client: http_client(Duration::from_secs(30)),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AcousticEventSource for HttpAcousticSource {
    async fn sample(&self) -> Result<Option<AcousticSample>> {
        let url = format!("{}/sample", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::SourcePoll(format!("acoustic request failed: {}", e)))?;

        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::SourcePoll(format!(
                "acoustic service returned {}",
                resp.status()
            )));
        }

        let body: AcousticResponse = resp
            .json()
            .await
            .map_err(|e| Error::SourcePoll(format!("acoustic response parse failed: {}", e)))?;

        Ok(Some(AcousticSample {
            event_type: body.event_type,
            intensity_db: body.intensity_db,
        }))
    }
}

/// Upload service response
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Image sink posting alert snapshots to a hosting service.
///
/// Uploads use a stable public id per name with overwrite, so repeated
/// alerts from one session reuse the same object.
pub struct HttpImageSink {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpImageSink {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(15)),
            upload_url: upload_url.into(),
        }
    }
}

#[async_trait]
impl ImageSink for HttpImageSink {
    async fn upload(&self, frame: &Frame, name: &str) -> Result<String> {
        let form = Form::new()
            .text("public_id", name.to_string())
            .text("overwrite", "true")
            .part(
                "file",
                Part::bytes(frame.0.clone())
                    .file_name(format!("{}.jpg", name))
                    .mime_str("image/jpeg")
                    .map_err(|e| Error::Upload(format!("multipart build failed: {}", e)))?,
            );

        let resp = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Upload(format!("upload request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Upload(format!(
                "upload service returned {}",
                resp.status()
            )));
        }

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| Error::Upload(format!("upload response parse failed: {}", e)))?;

        tracing::debug!(url = %body.secure_url, "Snapshot uploaded");
        Ok(body.secure_url)
    }
}
