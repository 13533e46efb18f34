//! SentryFuse - Multi-Sensor Threat Fusion Server
//!
//! ## Architecture (8 Components)
//!
//! 1. SharedSensorState - last-write-wins store for the latest readings
//! 2. SensorSources - one polling loop per sensor (vision/acoustic/frequency)
//! 3. CameraManager - bounded acquire, failure tracking, reacquire
//! 4. FusionEngine - additive threat scoring per tick
//! 5. AlertGate - cooldowns, score floor, per-type dedup
//! 6. AlertDispatcher - snapshot upload then WebSocket delivery
//! 7. SessionOrchestrator - per-connection loop supervision and teardown
//! 8. WebAPI - health endpoint + WebSocket sessions
//!
//! ## Design Principles
//!
//! - Sensors never block each other; each loop has its own cadence
//! - Fusion reads a best-effort snapshot, never locks the writers out
//! - Sessions are fully isolated; teardown is cooperative and bounded

pub mod alert_gate;
pub mod camera;
pub mod dispatch;
pub mod error;
pub mod fusion;
pub mod models;
pub mod sensor_state;
pub mod session;
pub mod sources;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState};
