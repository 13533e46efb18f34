//! ffmpeg-backed camera driver
//!
//! Captures single JPEG frames from a V4L2 device or RTSP URL by spawning
//! ffmpeg per read. Each read is its own bounded process, so "releasing" the
//! handle holds no kernel resource; the manager's lifecycle bookkeeping is
//! still exercised so a dead input is detected and retried like any other
//! device.

use crate::camera::{CameraDriver, CameraHandle};
use crate::error::{Error, Result};
use crate::models::Frame;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Camera input kinds we know how to hand to ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegCameraDriver {
    /// Device path (`/dev/video0`) or `rtsp://` URL
    input: String,
    /// Bound on one ffmpeg invocation
    capture_timeout: Duration,
}

impl FfmpegCameraDriver {
    pub fn new(input: impl Into<String>, capture_timeout: Duration) -> Self {
        Self {
            input: input.into(),
            capture_timeout,
        }
    }
}

#[async_trait]
impl CameraDriver for FfmpegCameraDriver {
    async fn open(&self) -> Result<Box<dyn CameraHandle>> {
        Ok(Box::new(FfmpegCameraHandle {
            input: self.input.clone(),
            capture_timeout: self.capture_timeout,
            released: false,
        }))
    }
}

struct FfmpegCameraHandle {
    input: String,
    capture_timeout: Duration,
    released: bool,
}

impl FfmpegCameraHandle {
    fn input_args(&self) -> Vec<&str> {
        if self.input.starts_with("rtsp://") {
            // TCP for RTSP (more reliable)
            vec!["-rtsp_transport", "tcp", "-i", &self.input]
        } else {
            vec!["-f", "v4l2", "-i", &self.input]
        }
    }
}

#[async_trait]
impl CameraHandle for FfmpegCameraHandle {
    /// Capture one frame as MJPEG on stdout.
    ///
    /// kill_on_drop ensures the ffmpeg process is killed if the timeout
    /// fires and the future is dropped, so unresponsive inputs do not
    /// accumulate zombie processes.
    async fn read_frame(&mut self) -> Result<Frame> {
        if self.released {
            return Err(Error::ResourceUnavailable(
                "camera handle already released".to_string(),
            ));
        }

        let mut args = self.input_args();
        args.extend([
            "-frames:v",
            "1",
            "-f",
            "image2pipe",
            "-vcodec",
            "mjpeg",
            "-loglevel",
            "error",
            "-y",
            "-",
        ]);

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::SourcePoll(format!("ffmpeg spawn failed: {}", e)))?;

        match tokio::time::timeout(self.capture_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(Error::SourcePoll(format!(
                        "ffmpeg failed: {}",
                        stderr.trim()
                    )));
                }
                if output.stdout.is_empty() {
                    return Err(Error::SourcePoll(
                        "ffmpeg returned empty output".to_string(),
                    ));
                }
                Ok(Frame(output.stdout))
            }
            Ok(Err(e)) => Err(Error::SourcePoll(format!("ffmpeg execution failed: {}", e))),
            Err(_) => {
                tracing::warn!(
                    timeout_sec = self.capture_timeout.as_secs(),
                    input = %self.input,
                    "ffmpeg timeout, process killed via kill_on_drop"
                );
                Err(Error::SourcePoll(format!(
                    "ffmpeg timeout ({}s)",
                    self.capture_timeout.as_secs()
                )))
            }
        }
    }

    async fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}
