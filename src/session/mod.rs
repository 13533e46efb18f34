//! SessionOrchestrator - Per-Client Loop Supervision
//!
//! ## Responsibilities
//!
//! - Connecting -> Active -> Disconnecting -> Terminated state machine
//! - Best-effort camera acquire on activation (failure never aborts the
//!   session; vision readings are simply absent)
//! - Spawning the three adapter loops and the fusion loop
//! - Cooperative cancellation and bounded teardown
//! - Exactly-once camera release before teardown completes
//!
//! Every session owns its own SharedSensorState, gate, and camera manager;
//! nothing is shared across sessions except the stateless collaborators.

use crate::alert_gate::AlertGate;
use crate::camera::CameraManager;
use crate::dispatch::AlertDispatcher;
use crate::fusion;
use crate::sensor_state::SharedSensorState;
use crate::sources::{
    self, AcousticEventSource, FrequencyAnalyzer, VisionDetector,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Session lifecycle states. Terminated is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Disconnecting,
    Terminated,
}

/// Per-session loop cadences and teardown bound
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Vision poll interval (caps the effective frame rate)
    pub vision_interval: Duration,
    /// Acoustic sampling cadence
    pub acoustic_cadence: Duration,
    /// Grace period before an unrefreshed acoustic reading is cleared
    pub acoustic_grace: Duration,
    /// Frequency analysis interval
    pub frequency_interval: Duration,
    /// Fusion tick interval
    pub fusion_tick: Duration,
    /// Bound on waiting for each loop to exit during teardown
    pub teardown_wait: Duration,
}

impl SessionConfig {
    /// Acoustic readings older than cadence + grace are stale
    pub fn acoustic_ttl(&self) -> Duration {
        self.acoustic_cadence + self.acoustic_grace
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vision_interval: Duration::from_millis(50),
            acoustic_cadence: Duration::from_secs(40),
            acoustic_grace: Duration::from_secs(20),
            frequency_interval: Duration::from_millis(200),
            fusion_tick: Duration::from_secs(1),
            teardown_wait: Duration::from_secs(5),
        }
    }
}

/// Supervises the concurrent loops of one client session
pub struct SessionOrchestrator {
    id: Uuid,
    config: SessionConfig,
    state: RwLock<SessionState>,
    shared: Arc<SharedSensorState>,
    camera: Arc<CameraManager>,
    gate: Arc<AlertGate>,
    dispatcher: Arc<AlertDispatcher>,
    detector: Arc<dyn VisionDetector>,
    acoustic: Arc<dyn AcousticEventSource>,
    analyzer: Arc<dyn FrequencyAnalyzer>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        config: SessionConfig,
        shared: Arc<SharedSensorState>,
        camera: Arc<CameraManager>,
        gate: Arc<AlertGate>,
        dispatcher: Arc<AlertDispatcher>,
        detector: Arc<dyn VisionDetector>,
        acoustic: Arc<dyn AcousticEventSource>,
        analyzer: Arc<dyn FrequencyAnalyzer>,
    ) -> Self {
        Self {
            id,
            config,
            state: RwLock::new(SessionState::Connecting),
            shared,
            camera,
            gate,
            dispatcher,
            detector,
            acoustic,
            analyzer,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Activate the session: acquire the camera best-effort and start all
    /// loops. Nothing here blocks connection acceptance beyond the bounded
    /// acquire cycle.
    pub async fn start(&self) {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Connecting {
                tracing::warn!(session_id = %self.id, state = ?*state, "Session already started");
                return;
            }
            *state = SessionState::Active;
        }

        match self.camera.acquire().await {
            Ok(()) => {
                self.shared.set_camera_active(true);
                tracing::info!(session_id = %self.id, "Camera acquired for session");
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %self.id,
                    error = %e,
                    "Camera unavailable, continuing without vision"
                );
            }
        }

        let mut tasks = self.tasks.lock().await;

        tasks.push(tokio::spawn(sources::run_vision_loop(
            self.shared.clone(),
            self.camera.clone(),
            self.detector.clone(),
            self.config.vision_interval,
            self.cancel.child_token(),
        )));
        tasks.push(tokio::spawn(sources::run_acoustic_loop(
            self.shared.clone(),
            self.acoustic.clone(),
            self.config.acoustic_cadence,
            self.cancel.child_token(),
        )));
        tasks.push(tokio::spawn(sources::run_frequency_loop(
            self.shared.clone(),
            self.analyzer.clone(),
            self.config.frequency_interval,
            self.cancel.child_token(),
        )));
        tasks.push(tokio::spawn(fusion::run_fusion_loop(
            self.shared.clone(),
            self.gate.clone(),
            self.dispatcher.clone(),
            self.config.fusion_tick,
            self.cancel.child_token(),
        )));

        tracing::info!(session_id = %self.id, loops = tasks.len(), "Session active");
    }

    /// Tear the session down: cancel every loop, await their cooperative
    /// exit (bounded), release the camera exactly once, then Terminated.
    ///
    /// Safe to call more than once; only the first call does work.
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Disconnecting | SessionState::Terminated => return,
                _ => *state = SessionState::Disconnecting,
            }
        }

        tracing::info!(session_id = %self.id, "Session disconnecting, cancelling loops");
        self.cancel.cancel();

        let tasks = {
            let mut tasks = self.tasks.lock().await;
            std::mem::take(&mut *tasks)
        };

        for task in tasks {
            match tokio::time::timeout(self.config.teardown_wait, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(session_id = %self.id, error = %e, "Loop task join error");
                }
                Err(_) => {
                    tracing::warn!(
                        session_id = %self.id,
                        "Loop did not exit within teardown bound"
                    );
                }
            }
        }

        // cleanup failures are logged inside release and never block teardown
        if let Err(e) = self.camera.release().await {
            tracing::warn!(session_id = %self.id, error = %e, "Camera release failed");
        }
        self.shared.set_camera_active(false);

        *self.state.write().await = SessionState::Terminated;
        tracing::info!(session_id = %self.id, "Session terminated");
    }
}
