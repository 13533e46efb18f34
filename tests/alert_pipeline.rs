//! End-to-end pipeline tests: sensor loops -> fusion -> gate -> dispatch.
//!
//! All collaborators are in-process fakes; assertions run against the
//! serialized messages a WebSocket client would receive.

use async_trait::async_trait;
use chrono::Utc;
use sentryfuse::alert_gate::{AlertGate, GateConfig};
use sentryfuse::camera::{CameraDriver, CameraHandle, CameraManager, CameraRetryPolicy};
use sentryfuse::dispatch::AlertDispatcher;
use sentryfuse::models::{Frame, VideoDetection};
use sentryfuse::sensor_state::SharedSensorState;
use sentryfuse::session::{SessionConfig, SessionOrchestrator};
use sentryfuse::sources::{
    AcousticEventSource, AcousticSample, FrequencyAnalyzer, ImageSink, VisionDetector,
};
use sentryfuse::{Error, Result};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

struct FakeDriver {
    releases: Arc<AtomicU32>,
}

#[async_trait]
impl CameraDriver for FakeDriver {
    async fn open(&self) -> Result<Box<dyn CameraHandle>> {
        Ok(Box::new(FakeHandle {
            releases: self.releases.clone(),
        }))
    }
}

struct FakeHandle {
    releases: Arc<AtomicU32>,
}

#[async_trait]
impl CameraHandle for FakeHandle {
    async fn read_frame(&mut self) -> Result<Frame> {
        Ok(Frame(vec![0xde, 0xad]))
    }
    async fn release(&mut self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FixedDetector {
    objects: Vec<&'static str>,
    crowded: bool,
    fire: bool,
}

#[async_trait]
impl VisionDetector for FixedDetector {
    async fn detect(&self, _frame: &Frame) -> Result<Option<VideoDetection>> {
        Ok(Some(VideoDetection {
            detected_objects: self
                .objects
                .iter()
                .map(|s| s.to_string())
                .collect::<BTreeSet<_>>(),
            is_crowded: self.crowded,
            is_fire: self.fire,
            captured_at: Utc::now(),
        }))
    }
}

struct SilentAcoustic;

#[async_trait]
impl AcousticEventSource for SilentAcoustic {
    async fn sample(&self) -> Result<Option<AcousticSample>> {
        Ok(None)
    }
}

struct SilentAnalyzer;

impl FrequencyAnalyzer for SilentAnalyzer {
    fn analyze(&self) -> Result<Option<f64>> {
        Ok(None)
    }
}

struct FakeSink {
    url: Option<&'static str>,
    uploads: AtomicU32,
}

#[async_trait]
impl ImageSink for FakeSink {
    async fn upload(&self, _frame: &Frame, _name: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        match self.url {
            Some(url) => Ok(url.to_string()),
            None => Err(Error::Upload("sink down".to_string())),
        }
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        vision_interval: Duration::from_millis(10),
        acoustic_cadence: Duration::from_millis(50),
        acoustic_grace: Duration::from_millis(25),
        frequency_interval: Duration::from_millis(10),
        fusion_tick: Duration::from_millis(20),
        teardown_wait: Duration::from_secs(2),
    }
}

#[allow(clippy::type_complexity)]
fn build_pipeline(
    detector: Arc<dyn VisionDetector>,
    sink: Arc<FakeSink>,
) -> (
    Arc<SessionOrchestrator>,
    mpsc::UnboundedReceiver<String>,
    Arc<AtomicU32>,
) {
    let config = fast_config();
    let releases = Arc::new(AtomicU32::new(0));
    let shared = Arc::new(SharedSensorState::new(config.acoustic_ttl()));
    let camera = Arc::new(CameraManager::new(
        Arc::new(FakeDriver {
            releases: releases.clone(),
        }),
        CameraRetryPolicy {
            retry_delay: Duration::from_millis(10),
            ..CameraRetryPolicy::default()
        },
    ));
    let gate = Arc::new(AlertGate::new(GateConfig::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Arc::new(AlertDispatcher::new(
        shared.clone(),
        sink,
        tx,
        "alert-e2e".to_string(),
    ));

    let session = Arc::new(SessionOrchestrator::new(
        Uuid::new_v4(),
        config,
        shared,
        camera,
        gate,
        dispatcher,
        detector,
        Arc::new(SilentAcoustic),
        Arc::new(SilentAnalyzer),
    ));
    (session, rx, releases)
}

async fn next_alert(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("expected an alert within 2s")
        .expect("channel open");
    serde_json::from_str(&msg).expect("valid JSON on the wire")
}

#[tokio::test]
async fn knife_detection_produces_critical_alert() {
    let sink = Arc::new(FakeSink {
        url: Some("https://img.example/e2e.jpg"),
        uploads: AtomicU32::new(0),
    });
    let (session, mut rx, _) = build_pipeline(
        Arc::new(FixedDetector {
            objects: vec!["knife"],
            crowded: true,
            fire: false,
        }),
        sink.clone(),
    );

    session.start().await;
    let alert = next_alert(&mut rx).await;
    session.shutdown().await;

    assert_eq!(alert["type"], "alert");
    let data = &alert["data"];
    // knife 150 + crowd 60 + high base 80
    assert_eq!(data["threatScore"], 290);
    assert_eq!(data["type"][0], "weapon");
    assert_eq!(data["type"][1], "crowd");
    assert_eq!(data["severity"], "high");
    assert_eq!(data["status"], "unresolved");
    assert_eq!(data["thumbnail"], "https://img.example/e2e.jpg");
    assert!(data["sensorData"]["video"]["is_crowded"].as_bool().unwrap());
    assert!(sink.uploads.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn critical_alerts_respect_cooldown_between_dispatches() {
    let sink = Arc::new(FakeSink {
        url: Some("https://img.example/e2e.jpg"),
        uploads: AtomicU32::new(0),
    });
    let (session, mut rx, _) = build_pipeline(
        Arc::new(FixedDetector {
            objects: vec!["knife"],
            crowded: false,
            fire: false,
        }),
        sink,
    );

    session.start().await;
    let _first = next_alert(&mut rx).await;

    // the detector keeps firing every tick, yet the 10s critical cooldown
    // blocks any second alert within this window
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.shutdown().await;

    let mut extra_alerts = 0;
    while let Ok(msg) = rx.try_recv() {
        let json: serde_json::Value = serde_json::from_str(&msg).unwrap();
        if json["type"] == "alert" {
            extra_alerts += 1;
        }
    }
    assert_eq!(extra_alerts, 0);
}

#[tokio::test]
async fn upload_failure_degrades_to_placeholder() {
    let sink = Arc::new(FakeSink {
        url: None,
        uploads: AtomicU32::new(0),
    });
    let (session, mut rx, _) = build_pipeline(
        Arc::new(FixedDetector {
            objects: vec![],
            crowded: false,
            fire: true,
        }),
        sink,
    );

    session.start().await;
    let alert = next_alert(&mut rx).await;
    session.shutdown().await;

    // fire 130 + high base 80
    assert_eq!(alert["data"]["threatScore"], 210);
    assert_eq!(alert["data"]["type"][0], "fire");
    assert_eq!(alert["data"]["thumbnail"], "/static/alert-placeholder.jpg");
}

#[tokio::test]
async fn quiet_scene_never_alerts() {
    struct NullDetector;

    #[async_trait]
    impl VisionDetector for NullDetector {
        async fn detect(&self, _frame: &Frame) -> Result<Option<VideoDetection>> {
            Ok(None)
        }
    }

    let sink = Arc::new(FakeSink {
        url: Some("https://img.example/e2e.jpg"),
        uploads: AtomicU32::new(0),
    });
    let (session, mut rx, _) = build_pipeline(Arc::new(NullDetector), sink);

    session.start().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    session.shutdown().await;

    while let Ok(msg) = rx.try_recv() {
        let json: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_ne!(json["type"], "alert");
    }
}

#[tokio::test]
async fn full_session_lifecycle_releases_camera_once() {
    let sink = Arc::new(FakeSink {
        url: Some("https://img.example/e2e.jpg"),
        uploads: AtomicU32::new(0),
    });
    let (session, mut rx, releases) = build_pipeline(
        Arc::new(FixedDetector {
            objects: vec!["scissors"],
            crowded: false,
            fire: false,
        }),
        sink,
    );

    session.start().await;
    let alert = next_alert(&mut rx).await;
    // scissors 120 + high base 80
    assert_eq!(alert["data"]["threatScore"], 200);

    session.shutdown().await;
    session.shutdown().await;
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}
