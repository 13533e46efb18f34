//! Camera ResourceManager - Device Lifecycle
//!
//! ## Responsibilities
//!
//! - Acquire the camera with bounded retries (open + verify first read)
//! - Steady-state reads with a consecutive-failure counter
//! - Release-then-reacquire when the failure threshold is reached
//! - Idempotent release for session teardown
//!
//! The handle is exclusively owned by this manager; the fusion engine only
//! ever sees the `camera_active` flag in SharedSensorState.

pub mod ffmpeg;

use crate::error::{Error, Result};
use crate::models::Frame;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

/// Seam to the physical device. Production uses the ffmpeg driver; tests
/// script their own.
#[async_trait]
pub trait CameraDriver: Send + Sync {
    async fn open(&self) -> Result<Box<dyn CameraHandle>>;
}

/// An opened device handle
#[async_trait]
pub trait CameraHandle: Send + Sync {
    async fn read_frame(&mut self) -> Result<Frame>;
    async fn release(&mut self) -> Result<()>;
}

/// Camera lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraLifecycle {
    Uninitialized,
    Opening,
    Ready,
    Degraded,
    Released,
}

/// Retry and failure-handling policy
#[derive(Debug, Clone)]
pub struct CameraRetryPolicy {
    /// Bounded attempt count for one acquire cycle
    pub acquire_attempts: u32,
    /// Delay between acquire attempts
    pub retry_delay: Duration,
    /// Consecutive failed reads before release-then-reacquire
    pub failure_threshold: u32,
    /// Bound on a single device read
    pub read_timeout: Duration,
}

impl Default for CameraRetryPolicy {
    fn default() -> Self {
        Self {
            acquire_attempts: 3,
            retry_delay: Duration::from_secs(1),
            failure_threshold: 5,
            read_timeout: Duration::from_secs(2),
        }
    }
}

struct ManagerInner {
    handle: Option<Box<dyn CameraHandle>>,
    lifecycle: CameraLifecycle,
    consecutive_failures: u32,
}

/// Camera resource manager
pub struct CameraManager {
    driver: Arc<dyn CameraDriver>,
    policy: CameraRetryPolicy,
    inner: Mutex<ManagerInner>,
}

impl CameraManager {
    pub fn new(driver: Arc<dyn CameraDriver>, policy: CameraRetryPolicy) -> Self {
        Self {
            driver,
            policy,
            inner: Mutex::new(ManagerInner {
                handle: None,
                lifecycle: CameraLifecycle::Uninitialized,
                consecutive_failures: 0,
            }),
        }
    }

    /// Acquire the device: open, verify an initial read, retry on failure.
    ///
    /// Exhausting all attempts yields `ResourceUnavailable`.
    pub async fn acquire(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        Self::acquire_locked(&self.driver, &self.policy, &mut inner).await
    }

    async fn acquire_locked(
        driver: &Arc<dyn CameraDriver>,
        policy: &CameraRetryPolicy,
        inner: &mut ManagerInner,
    ) -> Result<()> {
        inner.lifecycle = CameraLifecycle::Opening;

        for attempt in 1..=policy.acquire_attempts {
            match driver.open().await {
                Ok(mut handle) => {
                    // an open that cannot produce a frame is a failed attempt
                    match timeout(policy.read_timeout, handle.read_frame()).await {
                        Ok(Ok(_)) => {
                            inner.handle = Some(handle);
                            inner.lifecycle = CameraLifecycle::Ready;
                            inner.consecutive_failures = 0;
                            tracing::info!(attempt = attempt, "Camera acquired");
                            return Ok(());
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(
                                attempt = attempt,
                                error = %e,
                                "Camera opened but initial read failed"
                            );
                            let _ = handle.release().await;
                        }
                        Err(_) => {
                            tracing::warn!(attempt = attempt, "Camera initial read timed out");
                            let _ = handle.release().await;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt, error = %e, "Camera open failed");
                }
            }

            if attempt < policy.acquire_attempts {
                sleep(policy.retry_delay).await;
            }
        }

        inner.lifecycle = CameraLifecycle::Uninitialized;
        Err(Error::ResourceUnavailable(format!(
            "camera acquire failed after {} attempts",
            policy.acquire_attempts
        )))
    }

    /// Read one frame from the device.
    ///
    /// Successful reads mark the handle `Ready` and reset the failure
    /// counter. A failed read marks it `Degraded`; reaching the threshold
    /// releases the handle and runs a fresh acquire cycle, resetting the
    /// counter either way. The read that tripped the threshold still
    /// reports its error.
    pub async fn read_frame(&self) -> Result<Frame> {
        let mut inner = self.inner.lock().await;

        if inner.handle.is_none() {
            return Err(Error::ResourceUnavailable("camera not acquired".to_string()));
        }

        let read = {
            let handle = inner.handle.as_mut().ok_or_else(|| {
                Error::ResourceUnavailable("camera not acquired".to_string())
            })?;
            match timeout(self.policy.read_timeout, handle.read_frame()).await {
                Ok(result) => result,
                Err(_) => Err(Error::SourcePoll("camera read timed out".to_string())),
            }
        };

        match read {
            Ok(frame) => {
                inner.lifecycle = CameraLifecycle::Ready;
                inner.consecutive_failures = 0;
                Ok(frame)
            }
            Err(e) => {
                inner.lifecycle = CameraLifecycle::Degraded;
                inner.consecutive_failures += 1;

                if inner.consecutive_failures >= self.policy.failure_threshold {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "Camera failure threshold reached, reinitializing"
                    );
                    if let Some(mut handle) = inner.handle.take() {
                        if let Err(re) = handle.release().await {
                            tracing::warn!(error = %re, "Release before reacquire failed");
                        }
                    }
                    inner.consecutive_failures = 0;
                    if let Err(ae) =
                        Self::acquire_locked(&self.driver, &self.policy, &mut inner).await
                    {
                        tracing::warn!(error = %ae, "Camera reacquire failed");
                    }
                }

                Err(e)
            }
        }
    }

    /// Release the device.
    ///
    /// Idempotent: releasing an already-released or never-acquired handle
    /// succeeds trivially. Device-level release failures are logged but do
    /// not surface.
    pub async fn release(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(mut handle) = inner.handle.take() {
            if let Err(e) = handle.release().await {
                tracing::warn!(error = %e, "Camera release reported an error");
            } else {
                tracing::info!("Camera released");
            }
        }
        inner.lifecycle = CameraLifecycle::Released;
        Ok(())
    }

    pub async fn lifecycle(&self) -> CameraLifecycle {
        self.inner.lock().await.lifecycle
    }

    pub async fn consecutive_failures(&self) -> u32 {
        self.inner.lock().await.consecutive_failures
    }
}
